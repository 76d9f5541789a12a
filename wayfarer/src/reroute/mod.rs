//! Reroute decision engine.
//!
//! Decides when drift from the active route justifies asking the routing
//! provider for a new one. The tracker reports distance-to-route on every
//! update; this engine adds the hysteresis, attempt budget and cooldown.
//!
//! # State Machine
//!
//! ```text
//!            distance > off_route           distance > auto_reroute (emergency)
//!  OnRoute ─────────────────────► Pending ─────────────────────────────────► Triggered
//!     ▲                             │  │    or off-route for consideration_time   │
//!     │  distance <= off_route      │  │                                          │
//!     └─────────────────────────────┘  └──── complete_reroute(false) ◄────────────┤
//!     ▲                                                                           │
//!     └────────────────────────────── complete_reroute(true) ◄────────────────────┘
//! ```
//!
//! Both trigger paths require a free attempt and an elapsed cooldown. With the
//! attempt budget spent the engine stays `OffRoutePending` and reports
//! [`RerouteDecision::Exhausted`] once.
//!
//! Position updates that move less than `min_movement_m` cannot escalate:
//! they neither start an episode nor fire the emergency trigger, so GPS
//! jitter at a standstill cannot push the engine off the route. Returning
//! within `off_route_threshold_m` always ends the episode, and the time
//! based consideration check still runs on filtered updates.

mod config;

pub use config::RerouteConfig;

use serde::Serialize;

use crate::geo::{haversine_distance, Coordinate};

/// Engine state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RerouteState {
    OnRoute,
    OffRoutePending,
    /// A reroute was requested and has not completed yet.
    RerouteTriggered,
}

impl std::fmt::Display for RerouteState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RerouteState::OnRoute => write!(f, "on-route"),
            RerouteState::OffRoutePending => write!(f, "off-route-pending"),
            RerouteState::RerouteTriggered => write!(f, "reroute-triggered"),
        }
    }
}

/// Why a reroute was triggered.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum TriggerReason {
    /// Far beyond the route; no consideration time.
    Emergency { distance_m: f64 },
    /// Off-route for at least the consideration time.
    Sustained { off_route_ms: u64 },
}

impl std::fmt::Display for TriggerReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TriggerReason::Emergency { distance_m } => {
                write!(f, "{:.0}m from route", distance_m)
            }
            TriggerReason::Sustained { off_route_ms } => {
                write!(f, "off route for {:.1}s", *off_route_ms as f64 / 1000.0)
            }
        }
    }
}

/// Outcome of one evaluation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RerouteDecision {
    /// Nothing to do.
    Hold,
    /// Request a new route now.
    Trigger { reason: TriggerReason, attempt: u32 },
    /// Off-route but out of attempts. Reported once.
    Exhausted,
}

/// Observability snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RerouteStats {
    pub state: RerouteState,
    pub attempts: u32,
    pub max_attempts: u32,
    /// Length of the current off-route episode, 0 when not pending.
    pub off_route_duration_ms: u64,
    pub off_route_since: Option<u64>,
    pub last_reroute_time: Option<u64>,
}

/// Off-route hysteresis and reroute budget.
#[derive(Debug)]
pub struct RerouteDecisionEngine {
    config: RerouteConfig,
    state: RerouteState,
    off_route_since: Option<u64>,
    attempts: u32,
    last_reroute_time: Option<u64>,
    /// Position and distance of the last evaluation that passed the movement filter.
    last_position: Option<Coordinate>,
    filtered_distance: f64,
    /// Distance passed to the most recent evaluation.
    last_distance: f64,
    exhausted_reported: bool,
}

impl Default for RerouteDecisionEngine {
    fn default() -> Self {
        Self::new(RerouteConfig::default())
    }
}

impl RerouteDecisionEngine {
    pub fn new(config: RerouteConfig) -> Self {
        Self {
            config,
            state: RerouteState::OnRoute,
            off_route_since: None,
            attempts: 0,
            last_reroute_time: None,
            last_position: None,
            filtered_distance: 0.0,
            last_distance: 0.0,
            exhausted_reported: false,
        }
    }

    pub fn config(&self) -> &RerouteConfig {
        &self.config
    }

    pub fn state(&self) -> RerouteState {
        self.state
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn off_route_since(&self) -> Option<u64> {
        self.off_route_since
    }

    pub fn last_reroute_time(&self) -> Option<u64> {
        self.last_reroute_time
    }

    /// Distance passed to the most recent evaluation.
    pub fn last_distance(&self) -> f64 {
        self.last_distance
    }

    pub fn is_exhausted(&self) -> bool {
        self.attempts >= self.config.max_attempts
    }

    /// Feed the tracker's distance-to-route for the current position.
    pub fn evaluate(
        &mut self,
        distance_to_route: f64,
        position: &Coordinate,
        now_ms: u64,
    ) -> RerouteDecision {
        let moved = self.passes_movement_filter(position);
        if moved {
            self.last_position = Some(*position);
            self.filtered_distance = distance_to_route;
        }
        self.last_distance = distance_to_route;
        let distance = self.filtered_distance;

        match self.state {
            RerouteState::RerouteTriggered => RerouteDecision::Hold,
            RerouteState::OnRoute => {
                if moved && distance > self.config.off_route_threshold_m {
                    self.state = RerouteState::OffRoutePending;
                    self.off_route_since = Some(now_ms);
                    tracing::info!(
                        from = %RerouteState::OnRoute,
                        to = %self.state,
                        distance_m = distance,
                        "Reroute state transition"
                    );
                    self.check_pending(distance, moved, now_ms)
                } else {
                    RerouteDecision::Hold
                }
            }
            RerouteState::OffRoutePending => {
                if distance_to_route <= self.config.off_route_threshold_m {
                    self.state = RerouteState::OnRoute;
                    self.off_route_since = None;
                    tracing::info!(
                        from = %RerouteState::OffRoutePending,
                        to = %self.state,
                        distance_m = distance_to_route,
                        "Reroute state transition"
                    );
                    RerouteDecision::Hold
                } else {
                    self.check_pending(distance, moved, now_ms)
                }
            }
        }
    }

    /// Report the outcome of the routing call for the last trigger.
    ///
    /// Success returns to `OnRoute`. Failure goes back to `OffRoutePending`
    /// with a fresh episode start, so a retry waits out the consideration
    /// time and the cooldown. A failure while the position is already back
    /// on the route returns to `OnRoute`.
    pub fn complete_reroute(&mut self, succeeded: bool, now_ms: u64) {
        if self.state != RerouteState::RerouteTriggered {
            tracing::debug!(state = %self.state, "Reroute completion ignored, none in flight");
            return;
        }

        if succeeded {
            self.state = RerouteState::OnRoute;
            self.off_route_since = None;
            // Distances against the new route start fresh
            self.last_position = None;
            self.filtered_distance = 0.0;
            self.last_distance = 0.0;
        } else {
            if self.config.refund_failed_attempts {
                self.attempts = self.attempts.saturating_sub(1);
                self.exhausted_reported = false;
            }
            if self.last_distance > self.config.off_route_threshold_m {
                self.state = RerouteState::OffRoutePending;
                self.off_route_since = Some(now_ms);
            } else {
                // Drifted back while the request was in flight
                self.state = RerouteState::OnRoute;
                self.off_route_since = None;
            }
        }

        tracing::info!(
            from = %RerouteState::RerouteTriggered,
            to = %self.state,
            succeeded,
            attempts = self.attempts,
            "Reroute state transition"
        );
    }

    /// Drop a pending off-route episode without touching the attempt budget.
    pub fn clear_episode(&mut self) {
        if self.state == RerouteState::OffRoutePending {
            self.state = RerouteState::OnRoute;
            self.off_route_since = None;
            tracing::debug!("Off-route episode cleared");
        }
    }

    pub fn stats(&self, now_ms: u64) -> RerouteStats {
        RerouteStats {
            state: self.state,
            attempts: self.attempts,
            max_attempts: self.config.max_attempts,
            off_route_duration_ms: self
                .off_route_since
                .map(|since| now_ms.saturating_sub(since))
                .unwrap_or(0),
            off_route_since: self.off_route_since,
            last_reroute_time: self.last_reroute_time,
        }
    }

    /// Back to `OnRoute` with all counters cleared.
    pub fn reset(&mut self) {
        self.state = RerouteState::OnRoute;
        self.off_route_since = None;
        self.attempts = 0;
        self.last_reroute_time = None;
        self.last_position = None;
        self.filtered_distance = 0.0;
        self.last_distance = 0.0;
        self.exhausted_reported = false;
    }

    fn passes_movement_filter(&self, position: &Coordinate) -> bool {
        match &self.last_position {
            Some(last) => haversine_distance(last, position) >= self.config.min_movement_m,
            None => true,
        }
    }

    fn check_pending(&mut self, distance: f64, moved: bool, now_ms: u64) -> RerouteDecision {
        if self.is_exhausted() {
            if self.exhausted_reported {
                return RerouteDecision::Hold;
            }
            self.exhausted_reported = true;
            tracing::warn!(
                attempts = self.attempts,
                distance_m = distance,
                "Reroute attempts exhausted, continuing on current route"
            );
            return RerouteDecision::Exhausted;
        }

        if let Some(last) = self.last_reroute_time {
            if now_ms.saturating_sub(last) < self.config.cooldown_ms() {
                return RerouteDecision::Hold;
            }
        }

        if moved && distance > self.config.auto_reroute_threshold_m {
            return self.trigger(TriggerReason::Emergency { distance_m: distance }, now_ms);
        }

        let since = self.off_route_since.unwrap_or(now_ms);
        let off_route_ms = now_ms.saturating_sub(since);
        if off_route_ms >= self.config.consideration_ms() {
            return self.trigger(TriggerReason::Sustained { off_route_ms }, now_ms);
        }

        RerouteDecision::Hold
    }

    fn trigger(&mut self, reason: TriggerReason, now_ms: u64) -> RerouteDecision {
        self.attempts += 1;
        self.last_reroute_time = Some(now_ms);
        self.off_route_since = None;
        self.state = RerouteState::RerouteTriggered;

        tracing::info!(
            reason = %reason,
            attempt = self.attempts,
            max_attempts = self.config.max_attempts,
            "Reroute triggered"
        );

        RerouteDecision::Trigger {
            reason,
            attempt: self.attempts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PolicyProfile;
    use crate::geo::offset;

    fn origin() -> Coordinate {
        Coordinate::new(45.8326, 6.8652).unwrap()
    }

    fn engine() -> RerouteDecisionEngine {
        RerouteDecisionEngine::new(RerouteConfig::for_policy(PolicyProfile::OpenRoad))
    }

    /// Position `i` steps of 10 m north, always past the movement filter.
    fn walk(i: u32) -> Coordinate {
        offset(&origin(), 0.0, i as f64 * 10.0)
    }

    fn is_trigger(decision: RerouteDecision) -> bool {
        matches!(decision, RerouteDecision::Trigger { .. })
    }

    #[test]
    fn test_stays_on_route_under_threshold() {
        let mut engine = engine();
        for i in 0..10 {
            let decision = engine.evaluate(30.0, &walk(i), i as u64 * 1000);
            assert_eq!(decision, RerouteDecision::Hold);
        }
        assert_eq!(engine.state(), RerouteState::OnRoute);
        assert!(engine.off_route_since().is_none());
    }

    #[test]
    fn test_scenario_c_sustained_off_route_triggers_once() {
        let mut engine = engine();
        let held = origin();

        let mut triggers = 0;
        for second in 0..=30u64 {
            let decision = engine.evaluate(60.0, &held, second * 1000);
            if second == 0 {
                assert_eq!(engine.state(), RerouteState::OffRoutePending);
                assert_eq!(engine.off_route_since(), Some(0));
            }
            if let RerouteDecision::Trigger { reason, attempt } = decision {
                triggers += 1;
                assert_eq!(second, 15);
                assert_eq!(attempt, 1);
                assert_eq!(reason, TriggerReason::Sustained { off_route_ms: 15_000 });
                assert!(engine.off_route_since().is_none());
            }
        }

        assert_eq!(triggers, 1);
        assert_eq!(engine.state(), RerouteState::RerouteTriggered);
    }

    #[test]
    fn test_emergency_distance_triggers_immediately() {
        let mut engine = engine();
        let decision = engine.evaluate(200.0, &origin(), 1_000);

        assert_eq!(
            decision,
            RerouteDecision::Trigger {
                reason: TriggerReason::Emergency { distance_m: 200.0 },
                attempt: 1
            }
        );
        assert_eq!(engine.last_reroute_time(), Some(1_000));
    }

    #[test]
    fn test_returning_to_route_clears_episode() {
        let mut engine = engine();
        engine.evaluate(70.0, &walk(0), 0);
        engine.evaluate(70.0, &walk(1), 5_000);
        assert_eq!(engine.state(), RerouteState::OffRoutePending);

        engine.evaluate(10.0, &walk(2), 8_000);
        assert_eq!(engine.state(), RerouteState::OnRoute);
        assert!(engine.off_route_since().is_none());

        // New episode starts from scratch
        engine.evaluate(70.0, &walk(3), 10_000);
        assert_eq!(engine.off_route_since(), Some(10_000));
        assert!(!is_trigger(engine.evaluate(70.0, &walk(4), 20_000)));
        assert!(is_trigger(engine.evaluate(70.0, &walk(5), 25_000)));
    }

    #[test]
    fn test_jitter_below_movement_threshold_cannot_escalate() {
        let mut engine = engine();
        engine.evaluate(60.0, &origin(), 0);
        assert_eq!(engine.state(), RerouteState::OffRoutePending);

        // A 2 m wobble into emergency range does not fire
        let wobble = offset(&origin(), 90.0, 2.0);
        assert_eq!(engine.evaluate(500.0, &wobble, 1_000), RerouteDecision::Hold);
        assert_eq!(engine.state(), RerouteState::OffRoutePending);
        assert_eq!(engine.last_distance(), 500.0);
    }

    #[test]
    fn test_small_step_back_onto_route_ends_episode() {
        let mut engine = engine();
        engine.evaluate(52.0, &origin(), 0);
        assert_eq!(engine.off_route_since(), Some(0));

        // 4 m closer, under the movement filter, but inside the threshold
        let closer = offset(&origin(), 270.0, 4.0);
        assert_eq!(engine.evaluate(48.0, &closer, 2_000), RerouteDecision::Hold);
        assert_eq!(engine.state(), RerouteState::OnRoute);
        assert!(engine.off_route_since().is_none());

        // Standing still just outside again does not restart the episode
        engine.evaluate(51.0, &origin(), 3_000);
        assert_eq!(engine.state(), RerouteState::OnRoute);
    }

    #[test]
    fn test_first_off_route_sample_after_jitter_is_ignored() {
        let mut engine = engine();
        engine.evaluate(10.0, &origin(), 0);
        let wobble = offset(&origin(), 0.0, 1.0);
        engine.evaluate(80.0, &wobble, 1_000);
        assert_eq!(engine.state(), RerouteState::OnRoute);
    }

    #[test]
    fn test_in_flight_guard_blocks_second_trigger() {
        let mut engine = engine();
        assert!(is_trigger(engine.evaluate(200.0, &walk(0), 0)));

        for i in 1..20 {
            let decision = engine.evaluate(400.0, &walk(i), i as u64 * 5_000);
            assert_eq!(decision, RerouteDecision::Hold);
        }
        assert_eq!(engine.attempts(), 1);
    }

    #[test]
    fn test_cooldown_after_successful_reroute() {
        let mut engine = engine();
        assert!(is_trigger(engine.evaluate(200.0, &walk(0), 0)));
        engine.complete_reroute(true, 2_000);
        assert_eq!(engine.state(), RerouteState::OnRoute);

        // Off the new route far enough for an emergency, but inside cooldown
        assert_eq!(
            engine.evaluate(200.0, &walk(1), 10_000),
            RerouteDecision::Hold
        );
        assert_eq!(engine.state(), RerouteState::OffRoutePending);

        let decision = engine.evaluate(200.0, &walk(2), 30_000);
        assert!(matches!(
            decision,
            RerouteDecision::Trigger { attempt: 2, .. }
        ));
    }

    #[test]
    fn test_failed_reroute_waits_consideration_and_cooldown() {
        let mut engine = engine();
        let held = origin();
        engine.evaluate(60.0, &held, 0);
        assert!(is_trigger(engine.evaluate(60.0, &held, 15_000)));

        engine.complete_reroute(false, 20_000);
        assert_eq!(engine.state(), RerouteState::OffRoutePending);
        assert_eq!(engine.off_route_since(), Some(20_000));
        assert_eq!(engine.attempts(), 1);

        // Consideration elapsed at 35 s but cooldown (since 15 s) not until 45 s
        assert_eq!(engine.evaluate(60.0, &held, 35_000), RerouteDecision::Hold);
        assert!(matches!(
            engine.evaluate(60.0, &held, 45_000),
            RerouteDecision::Trigger { attempt: 2, .. }
        ));
    }

    #[test]
    fn test_exhaustion_reported_once() {
        let mut engine = engine();
        let held = origin();
        let mut now = 0;

        for attempt in 1..=3 {
            engine.evaluate(60.0, &held, now);
            now += 60_000;
            let decision = engine.evaluate(60.0, &held, now);
            assert!(
                matches!(decision, RerouteDecision::Trigger { attempt: a, .. } if a == attempt),
                "attempt {} got {:?}",
                attempt,
                decision
            );
            engine.complete_reroute(false, now);
        }

        now += 60_000;
        assert_eq!(engine.evaluate(60.0, &held, now), RerouteDecision::Exhausted);
        for _ in 0..5 {
            now += 60_000;
            assert_eq!(engine.evaluate(60.0, &held, now), RerouteDecision::Hold);
        }
        assert_eq!(engine.attempts(), 3);
        assert_eq!(engine.state(), RerouteState::OffRoutePending);
    }

    #[test]
    fn test_refund_failed_attempts() {
        let config = RerouteConfig {
            refund_failed_attempts: true,
            ..RerouteConfig::for_policy(PolicyProfile::OpenRoad)
        };
        let mut engine = RerouteDecisionEngine::new(config);
        assert!(is_trigger(engine.evaluate(200.0, &walk(0), 0)));
        engine.complete_reroute(false, 1_000);
        assert_eq!(engine.attempts(), 0);
    }

    #[test]
    fn test_clear_episode_keeps_attempts() {
        let mut engine = engine();
        assert!(is_trigger(engine.evaluate(200.0, &walk(0), 0)));
        engine.complete_reroute(false, 1_000);
        assert_eq!(engine.state(), RerouteState::OffRoutePending);

        engine.clear_episode();
        assert_eq!(engine.state(), RerouteState::OnRoute);
        assert!(engine.off_route_since().is_none());
        assert_eq!(engine.attempts(), 1);
    }

    #[test]
    fn test_complete_without_trigger_is_ignored() {
        let mut engine = engine();
        engine.complete_reroute(false, 1_000);
        assert_eq!(engine.state(), RerouteState::OnRoute);
        assert!(engine.off_route_since().is_none());
    }

    #[test]
    fn test_stats_report_episode_duration() {
        let mut engine = engine();
        engine.evaluate(60.0, &origin(), 4_000);
        let stats = engine.stats(10_000);

        assert_eq!(stats.state, RerouteState::OffRoutePending);
        assert_eq!(stats.off_route_duration_ms, 6_000);
        assert_eq!(stats.max_attempts, 3);
        assert_eq!(stats.attempts, 0);
    }

    #[test]
    fn test_reset_clears_counters() {
        let mut engine = engine();
        engine.evaluate(200.0, &walk(0), 0);
        engine.reset();

        assert_eq!(engine.state(), RerouteState::OnRoute);
        assert_eq!(engine.attempts(), 0);
        assert!(engine.last_reroute_time().is_none());
        assert!(is_trigger(engine.evaluate(200.0, &walk(1), 1_000)));
    }

    #[test]
    fn test_dense_site_reacts_sooner() {
        let mut engine =
            RerouteDecisionEngine::new(RerouteConfig::for_policy(PolicyProfile::DenseSite));
        let held = origin();
        engine.evaluate(25.0, &held, 0);
        assert!(is_trigger(engine.evaluate(25.0, &held, 8_000)));
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        #[derive(Debug, Clone)]
        enum Step {
            Update { distance: f64, step_m: f64, dt_ms: u64 },
            Complete { succeeded: bool },
        }

        fn step() -> impl Strategy<Value = Step> {
            prop_oneof![
                4 => (0.0..400.0_f64, 0.0..20.0_f64, 0u64..20_000)
                    .prop_map(|(distance, step_m, dt_ms)| Step::Update { distance, step_m, dt_ms }),
                1 => any::<bool>().prop_map(|succeeded| Step::Complete { succeeded }),
            ]
        }

        proptest! {
            #[test]
            fn prop_engine_invariants(steps in prop::collection::vec(step(), 1..80)) {
                let config = RerouteConfig::for_policy(PolicyProfile::OpenRoad);
                let threshold = config.off_route_threshold_m;
                let max_attempts = config.max_attempts;
                let mut engine = RerouteDecisionEngine::new(config);

                let mut now = 0u64;
                let mut position = origin();

                for step in steps {
                    match step {
                        Step::Update { distance, step_m, dt_ms } => {
                            now += dt_ms;
                            position = offset(&position, 0.0, step_m);
                            engine.evaluate(distance, &position, now);
                        }
                        Step::Complete { succeeded } => {
                            engine.complete_reroute(succeeded, now);
                        }
                    }

                    prop_assert!(engine.attempts() <= max_attempts);
                    if engine.last_distance() <= threshold {
                        prop_assert!(engine.off_route_since().is_none());
                    }
                }
            }
        }
    }
}
