//! Reroute policy thresholds.

use std::time::Duration;

use crate::config::PolicyProfile;

/// Configuration for [`RerouteDecisionEngine`](super::RerouteDecisionEngine).
#[derive(Debug, Clone, PartialEq)]
pub struct RerouteConfig {
    /// Distance from the route that starts an off-route episode (meters).
    pub off_route_threshold_m: f64,
    /// Distance that triggers a reroute without waiting (meters).
    pub auto_reroute_threshold_m: f64,
    /// How long the position must stay off-route before a reroute.
    pub consideration_time: Duration,
    /// Minimum time between two reroute requests.
    pub cooldown: Duration,
    pub max_attempts: u32,
    /// Displacement below which updates cannot escalate off-route state (meters).
    pub min_movement_m: f64,
    /// Give the attempt back when the routing provider fails.
    pub refund_failed_attempts: bool,
}

impl Default for RerouteConfig {
    fn default() -> Self {
        Self::for_policy(PolicyProfile::default())
    }
}

impl RerouteConfig {
    /// Policy defaults.
    ///
    /// | Policy    | Off-route | Auto | Consider | Cooldown | Attempts | Movement |
    /// |-----------|-----------|------|----------|----------|----------|----------|
    /// | OpenRoad  | 50 m      | 150 m| 15 s     | 30 s     | 3        | 5 m      |
    /// | DenseSite | 20 m      | 60 m | 8 s      | 20 s     | 5        | 3 m      |
    pub fn for_policy(policy: PolicyProfile) -> Self {
        match policy {
            PolicyProfile::OpenRoad => Self {
                off_route_threshold_m: 50.0,
                auto_reroute_threshold_m: 150.0,
                consideration_time: Duration::from_secs(15),
                cooldown: Duration::from_secs(30),
                max_attempts: 3,
                min_movement_m: 5.0,
                refund_failed_attempts: false,
            },
            PolicyProfile::DenseSite => Self {
                off_route_threshold_m: 20.0,
                auto_reroute_threshold_m: 60.0,
                consideration_time: Duration::from_secs(8),
                cooldown: Duration::from_secs(20),
                max_attempts: 5,
                min_movement_m: 3.0,
                refund_failed_attempts: false,
            },
        }
    }

    pub(super) fn consideration_ms(&self) -> u64 {
        self.consideration_time.as_millis() as u64
    }

    pub(super) fn cooldown_ms(&self) -> u64 {
        self.cooldown.as_millis() as u64
    }
}
