//! Navigation session.
//!
//! One session owns the five tracking components for a single navigation
//! and wires them together on every fix:
//!
//! ```text
//! Fix ─► PositionStabilizer ─► SpeedEstimator
//!                           └► RouteProgressTracker ─► RerouteDecisionEngine ─► RouteRequest
//!                                         └──────────► EtaEstimator
//! ```
//!
//! All mutation goes through `&mut self`; hosts that receive fixes on
//! several tasks serialize them through one owner (see
//! [`NavigationDriver`](crate::driver::NavigationDriver)).

use serde::Serialize;

use crate::config::NavigationConfig;
use crate::eta::{EtaEstimate, EtaEstimator};
use crate::geo::Coordinate;
use crate::progress::{ProgressEvent, ProgressState, Route, RouteError, RouteProgressTracker};
use crate::provider::{RouteRequest, RoutingError};
use crate::reroute::{RerouteDecision, RerouteDecisionEngine, RerouteStats, TriggerReason};
use crate::speed::SpeedEstimator;
use crate::stabilizer::{Fix, PositionStabilizer, StabilizedPosition, StabilizerStats};

/// Everything a progress consumer needs to hear about.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum NavigationEvent {
    StepChanged {
        index: usize,
        instruction: Option<String>,
    },
    OffRoute {
        distance_m: f64,
    },
    RouteComplete,
    RerouteRequested {
        reason: TriggerReason,
        attempt: u32,
    },
    RerouteSucceeded {
        distance_m: f64,
    },
    /// Non-fatal; navigation continues on the current route.
    RerouteFailed {
        reason: String,
    },
    RerouteExhausted {
        attempts: u32,
    },
    /// The location source went away; fixes are ignored until it resumes.
    TrackingSuspended {
        reason: String,
    },
}

impl std::fmt::Display for NavigationEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NavigationEvent::StepChanged { index, instruction } => match instruction {
                Some(text) => write!(f, "step {}: {}", index, text),
                None => write!(f, "step {}", index),
            },
            NavigationEvent::OffRoute { distance_m } => {
                write!(f, "off route ({:.0}m)", distance_m)
            }
            NavigationEvent::RouteComplete => write!(f, "route complete"),
            NavigationEvent::RerouteRequested { reason, attempt } => {
                write!(f, "reroute requested (attempt {}, {})", attempt, reason)
            }
            NavigationEvent::RerouteSucceeded { distance_m } => {
                write!(f, "rerouted ({:.0}m)", distance_m)
            }
            NavigationEvent::RerouteFailed { reason } => {
                write!(f, "reroute failed: {}, continuing on current route", reason)
            }
            NavigationEvent::RerouteExhausted { attempts } => {
                write!(f, "no reroutes left after {} attempts", attempts)
            }
            NavigationEvent::TrackingSuspended { reason } => {
                write!(f, "tracking suspended: {}", reason)
            }
        }
    }
}

/// Result of one accepted fix.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionUpdate {
    pub position: StabilizedPosition,
    pub progress: ProgressState,
    /// Current speed (km/h).
    pub speed_kmh: f64,
    pub eta: EtaEstimate,
    pub events: Vec<NavigationEvent>,
    /// Set when a reroute should be requested from the routing provider.
    pub reroute_request: Option<RouteRequest>,
}

#[derive(Debug, Clone, PartialEq)]
enum TrackingState {
    Active,
    Suspended { reason: String },
}

/// Owner of all tracking state for one navigation.
#[derive(Debug)]
pub struct NavigationSession {
    config: NavigationConfig,
    destination: Coordinate,
    stabilizer: PositionStabilizer,
    speed: SpeedEstimator,
    tracker: RouteProgressTracker,
    reroute: RerouteDecisionEngine,
    eta: EtaEstimator,
    tracking: TrackingState,
    reroute_in_flight: bool,
    last_progress: Option<ProgressState>,
    /// Latest fix timestamp seen, accepted or not.
    clock_ms: u64,
}

impl NavigationSession {
    /// Start navigating `route` towards `destination`.
    pub fn start(
        config: NavigationConfig,
        route: Route,
        destination: Coordinate,
    ) -> Result<Self, RouteError> {
        let tracker = RouteProgressTracker::new(route, config.progress.clone())?;

        // The tracker's threshold decides what counts as off-route
        let mut reroute_config = config.reroute.clone();
        if reroute_config.off_route_threshold_m != config.progress.off_route_threshold_m {
            tracing::warn!(
                progress_m = config.progress.off_route_threshold_m,
                reroute_m = reroute_config.off_route_threshold_m,
                "Off-route thresholds differ, using the progress value"
            );
            reroute_config.off_route_threshold_m = config.progress.off_route_threshold_m;
        }

        tracing::info!(
            profile = %config.travel,
            policy = %config.policy,
            destination = %destination,
            distance_m = tracker.total_distance(),
            steps = tracker.route().instructions.len(),
            "Navigation started"
        );

        Ok(Self {
            stabilizer: PositionStabilizer::new(config.stabilizer.clone()),
            speed: SpeedEstimator::new(config.speed.clone()),
            reroute: RerouteDecisionEngine::new(reroute_config),
            eta: EtaEstimator::new(config.eta.clone()),
            tracker,
            config,
            destination,
            tracking: TrackingState::Active,
            reroute_in_flight: false,
            last_progress: None,
            clock_ms: 0,
        })
    }

    /// Start navigating to the route's own end point.
    pub fn for_route(config: NavigationConfig, route: Route) -> Result<Self, RouteError> {
        let destination = *route.destination();
        Self::start(config, route, destination)
    }

    /// Process a raw fix.
    ///
    /// Returns `None` when the stabilizer drops the fix or tracking is
    /// suspended.
    pub fn on_fix(&mut self, fix: Fix) -> Option<SessionUpdate> {
        self.clock_ms = self.clock_ms.max(fix.timestamp_ms);

        if let TrackingState::Suspended { reason } = &self.tracking {
            tracing::debug!(reason = %reason, "Fix ignored while tracking is suspended");
            return None;
        }

        let position = self.stabilizer.accept(fix)?;
        let now_ms = position.timestamp_ms;
        self.speed.add_position(position.coordinate, now_ms);

        let (mut progress, progress_events) = self.tracker.update(&position.coordinate);
        let mut events: Vec<NavigationEvent> = progress_events
            .into_iter()
            .map(|event| self.to_navigation_event(event))
            .collect();

        let mut reroute_request = None;
        if !self.tracker.is_complete() {
            match self
                .reroute
                .evaluate(progress.distance_to_route, &position.coordinate, now_ms)
            {
                RerouteDecision::Trigger { reason, attempt } if !self.reroute_in_flight => {
                    self.reroute_in_flight = true;
                    reroute_request = Some(RouteRequest::new(
                        position.coordinate,
                        self.destination,
                        self.config.travel,
                    ));
                    events.push(NavigationEvent::RerouteRequested { reason, attempt });
                }
                RerouteDecision::Trigger { .. } => {
                    tracing::debug!("Reroute trigger ignored, request already outstanding");
                }
                RerouteDecision::Exhausted => {
                    events.push(NavigationEvent::RerouteExhausted {
                        attempts: self.reroute.attempts(),
                    });
                }
                RerouteDecision::Hold => {}
            }
        } else {
            self.reroute.clear_episode();
        }

        let stats = self.reroute.stats(now_ms);
        progress.off_route_since = stats.off_route_since;
        progress.reroute_attempts = stats.attempts;
        progress.last_reroute_time = stats.last_reroute_time;

        let eta = self
            .eta
            .estimate(progress.distance_remaining, &self.speed, now_ms);
        let speed_kmh = self.speed.current_speed();

        self.last_progress = Some(progress.clone());

        Some(SessionUpdate {
            position,
            progress,
            speed_kmh,
            eta,
            events,
            reroute_request,
        })
    }

    /// Feed back the routing provider's answer to the outstanding request.
    pub fn apply_reroute_result(
        &mut self,
        result: Result<Route, RoutingError>,
    ) -> Vec<NavigationEvent> {
        if !self.reroute_in_flight {
            tracing::debug!("Reroute result ignored, no request outstanding");
            return Vec::new();
        }
        self.reroute_in_flight = false;
        let now_ms = self.clock_ms;

        let result = result.and_then(|route| {
            self.tracker
                .replace_route(route)
                .map_err(RoutingError::InvalidRoute)
        });

        match result {
            Ok(()) => {
                self.reroute.complete_reroute(true, now_ms);
                let distance_m = self.tracker.total_distance();
                tracing::info!(distance_m, "Reroute succeeded");
                vec![NavigationEvent::RerouteSucceeded { distance_m }]
            }
            Err(e) => {
                self.reroute.complete_reroute(false, now_ms);
                tracing::warn!(
                    error = %e,
                    attempts = self.reroute.attempts(),
                    "Reroute failed, continuing on current route"
                );
                vec![NavigationEvent::RerouteFailed {
                    reason: e.to_string(),
                }]
            }
        }
    }

    /// The location source changed (e.g. simulated to live).
    pub fn switch_source(&mut self) {
        self.stabilizer.reset();
        self.speed.reset();
        tracing::info!("Location source switched");
    }

    /// Restart navigation on a new route, clearing all history.
    pub fn restart(&mut self, route: Route) -> Result<(), RouteError> {
        self.tracker.replace_route(route)?;
        self.destination = *self.tracker.route().destination();
        self.reroute.reset();
        self.stabilizer.reset();
        self.speed.reset();
        self.reroute_in_flight = false;
        self.last_progress = None;
        self.tracking = TrackingState::Active;
        tracing::info!("Navigation restarted");
        Ok(())
    }

    /// The location source failed; stop tracking until it resumes.
    pub fn source_unavailable(&mut self, reason: impl Into<String>) -> Vec<NavigationEvent> {
        if matches!(self.tracking, TrackingState::Suspended { .. }) {
            return Vec::new();
        }
        let reason = reason.into();
        tracing::warn!(reason = %reason, "Location source unavailable, tracking suspended");
        self.tracking = TrackingState::Suspended {
            reason: reason.clone(),
        };
        vec![NavigationEvent::TrackingSuspended { reason }]
    }

    /// Resume after [`source_unavailable`](Self::source_unavailable).
    pub fn resume_source(&mut self) {
        self.stabilizer.reset();
        self.speed.reset();
        if matches!(self.tracking, TrackingState::Suspended { .. }) {
            tracing::info!("Location source resumed");
        }
        self.tracking = TrackingState::Active;
    }

    pub fn is_suspended(&self) -> bool {
        matches!(self.tracking, TrackingState::Suspended { .. })
    }

    pub fn is_reroute_in_flight(&self) -> bool {
        self.reroute_in_flight
    }

    pub fn is_complete(&self) -> bool {
        self.tracker.is_complete()
    }

    /// Progress after the last accepted fix.
    pub fn progress(&self) -> Option<&ProgressState> {
        self.last_progress.as_ref()
    }

    pub fn config(&self) -> &NavigationConfig {
        &self.config
    }

    pub fn destination(&self) -> &Coordinate {
        &self.destination
    }

    pub fn route(&self) -> &Route {
        self.tracker.route()
    }

    pub fn reroute_stats(&self) -> RerouteStats {
        self.reroute.stats(self.clock_ms)
    }

    pub fn stabilizer_stats(&self) -> StabilizerStats {
        self.stabilizer.stats()
    }

    pub fn speed(&self) -> &SpeedEstimator {
        &self.speed
    }

    fn to_navigation_event(&self, event: ProgressEvent) -> NavigationEvent {
        match event {
            ProgressEvent::StepChanged { index } => NavigationEvent::StepChanged {
                index,
                instruction: self
                    .tracker
                    .route()
                    .instructions
                    .get(index)
                    .map(|i| i.text.clone()),
            },
            ProgressEvent::OffRoute { distance_m } => NavigationEvent::OffRoute { distance_m },
            ProgressEvent::RouteComplete => NavigationEvent::RouteComplete,
        }
    }
}
