//! Stabilizer tuning.

use std::time::Duration;

use crate::config::TravelProfile;

/// Default maximum accepted accuracy radius (meters).
pub const DEFAULT_MAX_ACCURACY_M: f64 = 30.0;

/// Default smoothing window length (samples).
pub const DEFAULT_SMOOTHING_WINDOW: usize = 5;

/// Configuration for [`PositionStabilizer`](super::PositionStabilizer).
#[derive(Debug, Clone, PartialEq)]
pub struct StabilizerConfig {
    /// Fixes with a larger accuracy radius are dropped.
    pub max_accuracy_m: f64,
    /// Minimum time between two emitted positions.
    pub min_update_interval: Duration,
    /// Implied speeds above this are treated as position jumps (m/s).
    pub speed_threshold_mps: f64,
    /// Number of accepted fixes averaged into each emitted position.
    pub smoothing_window: usize,
}

impl Default for StabilizerConfig {
    fn default() -> Self {
        Self::for_travel(TravelProfile::default())
    }
}

impl StabilizerConfig {
    /// Defaults for a travel profile.
    ///
    /// | Profile | Interval | Jump threshold |
    /// |---------|----------|----------------|
    /// | Walking | 2.0 s    | 8 m/s          |
    /// | Cycling | 1.5 s    | 20 m/s         |
    /// | Driving | 1.5 s    | 60 m/s         |
    pub fn for_travel(profile: TravelProfile) -> Self {
        let (interval_ms, speed_threshold_mps) = match profile {
            TravelProfile::Walking => (2_000, 8.0),
            TravelProfile::Cycling => (1_500, 20.0),
            TravelProfile::Driving => (1_500, 60.0),
        };

        Self {
            max_accuracy_m: DEFAULT_MAX_ACCURACY_M,
            min_update_interval: Duration::from_millis(interval_ms),
            speed_threshold_mps,
            smoothing_window: DEFAULT_SMOOTHING_WINDOW,
        }
    }
}
