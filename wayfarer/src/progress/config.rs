//! Route progress thresholds.

use crate::config::PolicyProfile;

/// Thresholds for [`RouteProgressTracker`](super::RouteProgressTracker).
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressConfig {
    /// Distance from the route above which the position is off-route (meters).
    pub off_route_threshold_m: f64,
    /// Distance to the next step's waypoint that advances the step (meters).
    pub step_advance_threshold_m: f64,
    /// Distance to the final point that completes the route (meters).
    pub completion_threshold_m: f64,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self::for_policy(PolicyProfile::default())
    }
}

impl ProgressConfig {
    /// Thresholds for a policy profile.
    ///
    /// | Policy    | Off-route | Step advance | Completion |
    /// |-----------|-----------|--------------|------------|
    /// | OpenRoad  | 50 m      | 20 m         | 20 m       |
    /// | DenseSite | 20 m      | 10 m         | 10 m       |
    pub fn for_policy(policy: PolicyProfile) -> Self {
        match policy {
            PolicyProfile::OpenRoad => Self {
                off_route_threshold_m: 50.0,
                step_advance_threshold_m: 20.0,
                completion_threshold_m: 20.0,
            },
            PolicyProfile::DenseSite => Self {
                off_route_threshold_m: 20.0,
                step_advance_threshold_m: 10.0,
                completion_threshold_m: 10.0,
            },
        }
    }
}
