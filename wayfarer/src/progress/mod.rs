//! Route progress tracking.
//!
//! Projects stabilized positions onto the active route and derives step
//! advancement, completion and remaining distance.
//!
//! # Per-update flow
//!
//! ```text
//! position ──► nearest segment (min distance, index, projected point)
//!              ├─► off-route?   min distance > off_route_threshold
//!              ├─► step advance distance to next step's waypoint < step_advance_threshold
//!              ├─► completion   distance to final point < completion_threshold (latched)
//!              └─► remaining    projected → segment end + suffix sum
//! ```
//!
//! The tracker reports off-route distance on every update but owns no timing;
//! the reroute engine decides what to do about it.

mod config;
mod route;

pub use config::ProgressConfig;
pub use route::{Instruction, Maneuver, Route, RouteError, RoutePolyline};

use serde::Serialize;

use crate::geo::{haversine_distance, project_onto_segment, Coordinate, SegmentProjection};

/// Snapshot of navigation progress after an update.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressState {
    /// Index of the instruction currently being followed. Never decreases.
    pub current_step_index: usize,
    /// Distance to the waypoint that starts the next step (meters).
    pub distance_to_next_waypoint: f64,
    /// Distance left along the route from the projected position (meters).
    pub distance_remaining: f64,
    /// Progress in percent, always within [0, 100].
    pub percent_complete: f64,
    pub is_off_route: bool,
    /// When the current off-route episode started (reroute engine bookkeeping).
    pub off_route_since: Option<u64>,
    pub reroute_attempts: u32,
    pub last_reroute_time: Option<u64>,
    /// Distance from the position to the nearest route segment (meters).
    pub distance_to_route: f64,
    pub nearest_segment_index: usize,
    /// Closest point on the route.
    pub projected: Coordinate,
    pub is_complete: bool,
}

/// Discrete progress notifications.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum ProgressEvent {
    StepChanged { index: usize },
    OffRoute { distance_m: f64 },
    RouteComplete,
}

/// Tracks a position against one route.
#[derive(Debug)]
pub struct RouteProgressTracker {
    route: Route,
    config: ProgressConfig,
    current_step: usize,
    completed: bool,
}

impl RouteProgressTracker {
    pub fn new(route: Route, config: ProgressConfig) -> Result<Self, RouteError> {
        route.validate()?;
        Ok(Self {
            route,
            config,
            current_step: 0,
            completed: false,
        })
    }

    pub fn route(&self) -> &Route {
        &self.route
    }

    pub fn config(&self) -> &ProgressConfig {
        &self.config
    }

    pub fn current_step(&self) -> usize {
        self.current_step
    }

    /// The instruction currently being followed, if the route has any.
    pub fn current_instruction(&self) -> Option<&Instruction> {
        self.route.instructions.get(self.current_step)
    }

    pub fn is_complete(&self) -> bool {
        self.completed
    }

    /// Geometric route length fixed at construction (meters).
    pub fn total_distance(&self) -> f64 {
        self.route.polyline.total_length()
    }

    /// Project a position onto the route and advance progress.
    pub fn update(&mut self, position: &Coordinate) -> (ProgressState, Vec<ProgressEvent>) {
        let mut events = Vec::new();
        let polyline = &self.route.polyline;

        let mut best_index = 0;
        let mut best: Option<SegmentProjection> = None;
        for index in 0..polyline.segment_count() {
            let Some((start, end)) = polyline.segment(index) else {
                break;
            };
            let projection = project_onto_segment(position, start, end);
            let closer = match &best {
                Some(b) => projection.distance_m < b.distance_m,
                None => true,
            };
            if closer {
                best_index = index;
                best = Some(projection);
            }
        }
        // A polyline always has at least one segment
        let Some(nearest) = best else {
            return (self.empty_state(position), events);
        };

        let is_off_route = nearest.distance_m > self.config.off_route_threshold_m;

        // Step advance, at most one per update
        let mut distance_to_next_waypoint = haversine_distance(position, polyline.last());
        if let Some(target) = self.next_waypoint() {
            let distance = haversine_distance(position, &target);
            distance_to_next_waypoint = distance;
            if distance < self.config.step_advance_threshold_m
                && self.current_step + 1 < self.route.instructions.len()
            {
                self.current_step += 1;
                tracing::info!(
                    step = self.current_step,
                    distance_m = distance,
                    "Route step advanced"
                );
                events.push(ProgressEvent::StepChanged {
                    index: self.current_step,
                });
                distance_to_next_waypoint = self
                    .next_waypoint()
                    .map(|next| haversine_distance(position, &next))
                    .unwrap_or_else(|| haversine_distance(position, polyline.last()));
            }
        }

        if !self.completed
            && haversine_distance(position, polyline.last()) < self.config.completion_threshold_m
        {
            self.completed = true;
            tracing::info!(position = %position, "Route complete");
            events.push(ProgressEvent::RouteComplete);
        }

        let polyline = &self.route.polyline;
        let segment_end = polyline
            .segment(best_index)
            .map(|(_, end)| *end)
            .unwrap_or(*polyline.last());
        let distance_remaining = haversine_distance(&nearest.point, &segment_end)
            + polyline.remaining_after(best_index);
        let percent_complete = self.percent_for(distance_remaining);

        if is_off_route {
            tracing::debug!(
                distance_m = nearest.distance_m,
                segment = best_index,
                "Position off route"
            );
            events.push(ProgressEvent::OffRoute {
                distance_m: nearest.distance_m,
            });
        }

        let state = ProgressState {
            current_step_index: self.current_step,
            distance_to_next_waypoint,
            distance_remaining,
            percent_complete,
            is_off_route,
            off_route_since: None,
            reroute_attempts: 0,
            last_reroute_time: None,
            distance_to_route: nearest.distance_m,
            nearest_segment_index: best_index,
            projected: nearest.point,
            is_complete: self.completed,
        };

        (state, events)
    }

    /// Back to the first step with the completion latch cleared.
    pub fn reset(&mut self) {
        self.current_step = 0;
        self.completed = false;
    }

    /// Install a new route (after a successful reroute) and reset.
    pub fn replace_route(&mut self, route: Route) -> Result<(), RouteError> {
        route.validate()?;
        self.route = route;
        self.reset();
        tracing::info!(
            points = self.route.polyline.len(),
            steps = self.route.instructions.len(),
            distance_m = self.total_distance(),
            "Route replaced"
        );
        Ok(())
    }

    /// Polyline point that starts the step after the current one.
    fn next_waypoint(&self) -> Option<Coordinate> {
        let points = self.route.polyline.points();
        let next_step = self.current_step + 1;
        let index = self
            .route
            .instructions
            .get(next_step)
            .and_then(|i| i.waypoint_index)
            .unwrap_or(next_step);
        points.get(index.min(points.len() - 1)).copied()
    }

    fn percent_for(&self, distance_remaining: f64) -> f64 {
        let total = self.total_distance();
        if total <= 0.0 {
            return if self.completed { 100.0 } else { 0.0 };
        }
        ((total - distance_remaining) / total * 100.0).clamp(0.0, 100.0)
    }

    fn empty_state(&self, position: &Coordinate) -> ProgressState {
        ProgressState {
            current_step_index: self.current_step,
            distance_to_next_waypoint: 0.0,
            distance_remaining: 0.0,
            percent_complete: self.percent_for(0.0),
            is_off_route: false,
            off_route_since: None,
            reroute_attempts: 0,
            last_reroute_time: None,
            distance_to_route: 0.0,
            nearest_segment_index: 0,
            projected: *position,
            is_complete: self.completed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PolicyProfile;
    use crate::geo::offset;

    fn origin() -> Coordinate {
        Coordinate::new(52.52, 13.405).unwrap()
    }

    /// Three 100 m segments heading east, one instruction per polyline point.
    fn east_route() -> Route {
        let a = origin();
        let b = offset(&a, 90.0, 100.0);
        let c = offset(&b, 90.0, 100.0);
        let d = offset(&c, 90.0, 100.0);
        let instructions = vec![
            Instruction::new("Head east", Maneuver::Depart),
            Instruction::new("Continue", Maneuver::Straight),
            Instruction::new("Continue", Maneuver::Straight),
            Instruction::new("Arrive", Maneuver::Arrive),
        ];
        Route::from_points(vec![a, b, c, d], instructions).unwrap()
    }

    fn tracker() -> RouteProgressTracker {
        RouteProgressTracker::new(east_route(), ProgressConfig::for_policy(PolicyProfile::OpenRoad))
            .unwrap()
    }

    fn along(distance_m: f64) -> Coordinate {
        offset(&origin(), 90.0, distance_m)
    }

    #[test]
    fn test_on_route_at_start() {
        let mut tracker = tracker();
        let (state, events) = tracker.update(&origin());

        assert!(events.is_empty());
        assert_eq!(state.current_step_index, 0);
        assert!(!state.is_off_route);
        assert!((state.distance_remaining - 300.0).abs() < 0.5);
        assert!(state.percent_complete < 0.5);
        assert!((state.distance_to_next_waypoint - 100.0).abs() < 0.5);
    }

    #[test]
    fn test_remaining_distance_midway() {
        let mut tracker = tracker();
        // 5 m to the side of the 150 m mark
        let p = offset(&along(150.0), 0.0, 5.0);
        let (state, _) = tracker.update(&p);

        assert_eq!(state.nearest_segment_index, 1);
        assert!((state.distance_to_route - 5.0).abs() < 0.1);
        assert!((state.distance_remaining - 150.0).abs() < 0.5);
        assert!((state.percent_complete - 50.0).abs() < 0.5);
    }

    #[test]
    fn test_off_route_reported_every_update() {
        let mut tracker = tracker();
        let p = offset(&along(150.0), 0.0, 60.0);

        for _ in 0..3 {
            let (state, events) = tracker.update(&p);
            assert!(state.is_off_route);
            assert!(matches!(
                events.as_slice(),
                [ProgressEvent::OffRoute { distance_m }] if (distance_m - 60.0).abs() < 0.5
            ));
        }
    }

    #[test]
    fn test_step_advances_once_per_update() {
        let mut tracker = tracker();
        let (state, events) = tracker.update(&along(90.0));
        assert_eq!(events, vec![ProgressEvent::StepChanged { index: 1 }]);
        assert_eq!(state.current_step_index, 1);

        // Same position again: next waypoint is 110 m away
        let (state, events) = tracker.update(&along(90.0));
        assert!(events.is_empty());
        assert_eq!(state.current_step_index, 1);
        assert!((state.distance_to_next_waypoint - 110.0).abs() < 0.5);
    }

    #[test]
    fn test_step_never_decrements() {
        let mut tracker = tracker();
        tracker.update(&along(95.0));
        tracker.update(&along(195.0));
        assert_eq!(tracker.current_step(), 2);

        // Walk back to the start
        let (state, _) = tracker.update(&origin());
        assert_eq!(state.current_step_index, 2);
    }

    #[test]
    fn test_step_stops_at_last_instruction() {
        let mut tracker = tracker();
        for d in [95.0, 195.0, 295.0, 300.0, 300.0] {
            tracker.update(&along(d));
        }
        assert_eq!(tracker.current_step(), 3);
    }

    #[test]
    fn test_waypoint_index_overrides_step_target() {
        let a = origin();
        let points: Vec<Coordinate> = (0..=4).map(|i| offset(&a, 90.0, i as f64 * 50.0)).collect();
        // Second step starts at polyline point 3 (150 m), not point 1
        let instructions = vec![
            Instruction::new("Head east", Maneuver::Depart).at_waypoint(0),
            Instruction::new("Turn left", Maneuver::TurnLeft).at_waypoint(3),
            Instruction::new("Arrive", Maneuver::Arrive).at_waypoint(4),
        ];
        let route = Route::from_points(points, instructions).unwrap();
        let mut tracker = RouteProgressTracker::new(route, ProgressConfig::default()).unwrap();

        let (_, events) = tracker.update(&along(45.0));
        assert!(events.is_empty());

        let (_, events) = tracker.update(&along(140.0));
        assert_eq!(events, vec![ProgressEvent::StepChanged { index: 1 }]);
    }

    #[test]
    fn test_scenario_e_completion_fires_once() {
        let mut tracker = tracker();
        tracker.update(&along(100.0));
        tracker.update(&along(200.0));

        let (state, events) = tracker.update(&along(290.0));
        assert!(events.contains(&ProgressEvent::RouteComplete));
        assert!(state.is_complete);

        for d in [295.0, 300.0, 299.0, 302.0] {
            let (state, events) = tracker.update(&along(d));
            assert!(!events.contains(&ProgressEvent::RouteComplete));
            assert!(state.is_complete);
        }
    }

    #[test]
    fn test_reset_clears_step_and_completion() {
        let mut tracker = tracker();
        tracker.update(&along(95.0));
        tracker.update(&along(295.0));
        assert!(tracker.is_complete());

        tracker.reset();
        assert_eq!(tracker.current_step(), 0);
        assert!(!tracker.is_complete());

        let (_, events) = tracker.update(&along(299.0));
        assert!(events.contains(&ProgressEvent::RouteComplete));
    }

    #[test]
    fn test_replace_route_resets_progress() {
        let mut tracker = tracker();
        tracker.update(&along(95.0));
        assert_eq!(tracker.current_step(), 1);

        let start = along(95.0);
        let new_route =
            Route::from_points(vec![start, offset(&start, 0.0, 400.0)], vec![]).unwrap();
        tracker.replace_route(new_route).unwrap();

        assert_eq!(tracker.current_step(), 0);
        assert!((tracker.total_distance() - 400.0).abs() < 0.5);
        let (state, _) = tracker.update(&start);
        assert!(!state.is_off_route);
    }

    #[test]
    fn test_zero_length_route() {
        let p = origin();
        let route = Route::from_points(vec![p, p], vec![]).unwrap();
        let config = ProgressConfig {
            completion_threshold_m: 10.0,
            ..ProgressConfig::default()
        };
        let mut tracker = RouteProgressTracker::new(route, config).unwrap();

        // Far away: not complete, 0 percent, no NaN
        let (state, _) = tracker.update(&offset(&p, 0.0, 30.0));
        assert_eq!(state.percent_complete, 0.0);
        assert!(state.distance_to_route.is_finite());

        let (state, events) = tracker.update(&p);
        assert_eq!(events, vec![ProgressEvent::RouteComplete]);
        assert_eq!(state.percent_complete, 100.0);
    }

    #[test]
    fn test_dense_site_is_stricter() {
        let p = offset(&along(150.0), 0.0, 30.0);

        let mut open = tracker();
        assert!(!open.update(&p).0.is_off_route);

        let mut dense =
            RouteProgressTracker::new(east_route(), ProgressConfig::for_policy(PolicyProfile::DenseSite))
                .unwrap();
        assert!(dense.update(&p).0.is_off_route);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn prop_percent_bounded_for_any_position(
                bearing_deg in 0.0..360.0_f64,
                distance in 0.0..5_000.0_f64,
            ) {
                let mut tracker = tracker();
                let p = offset(&along(150.0), bearing_deg, distance);
                let (state, _) = tracker.update(&p);
                prop_assert!((0.0..=100.0).contains(&state.percent_complete));
                prop_assert!(state.distance_remaining >= 0.0);
            }

            #[test]
            fn prop_forward_motion_is_monotonic(
                mut marks in prop::collection::vec(0.0..300.0_f64, 1..30),
                lateral in -15.0..15.0_f64,
                jitter in prop::collection::vec(-500.0..500.0_f64, 1..30),
            ) {
                marks.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
                let mut tracker = tracker();
                let mut last_step = 0;
                let mut last_percent = 0.0;

                for (i, mark) in marks.iter().enumerate() {
                    let p = offset(&along(*mark), 0.0, lateral);
                    let (state, _) = tracker.update(&p);
                    prop_assert!(state.current_step_index >= last_step);
                    prop_assert!(state.percent_complete + 1e-6 >= last_percent);
                    last_step = state.current_step_index;
                    last_percent = state.percent_complete;

                    // Occasional excursion anywhere must not move the step back
                    if let Some(j) = jitter.get(i) {
                        let (state, _) = tracker.update(&offset(&p, 0.0, *j));
                        prop_assert!(state.current_step_index >= last_step);
                        last_step = state.current_step_index;
                        // percent may drop during an excursion; re-anchor on the next mark
                        let (state, _) = tracker.update(&p);
                        last_percent = state.percent_complete;
                    }
                }
            }
        }
    }
}
