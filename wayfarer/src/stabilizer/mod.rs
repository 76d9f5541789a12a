//! Position stabilization for raw location fixes.
//!
//! Device location fixes are noisy: accuracy varies from a few meters to
//! hundreds, fixes arrive in bursts, and multipath occasionally produces a
//! reading hundreds of meters away. The stabilizer turns that stream into a
//! trajectory the rest of the tracking core can trust.
//!
//! # Gates
//!
//! ```text
//! Fix --[accuracy > max_accuracy]-----------------> dropped (LowAccuracy)
//!     --[dt since last emit < min_update_interval]-> dropped (Throttled)
//!     --[implied speed > speed_threshold]---------> dropped (ImplausibleJump)
//!     --> window push --> weighted average --> StabilizedPosition
//! ```
//!
//! Rejections are silent drops: the contract is "no output", not an error.

mod config;

pub use config::StabilizerConfig;

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::geo::{haversine_distance, Coordinate};

/// A raw position reading from the location source.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Fix {
    /// Reported position.
    pub coordinate: Coordinate,
    /// Accuracy radius in meters (68% confidence, as platforms report it).
    #[serde(alias = "accuracy")]
    pub accuracy_m: f64,
    /// Timestamp in milliseconds (monotonic or epoch, consistent per session).
    #[serde(alias = "timestamp")]
    pub timestamp_ms: u64,
}

impl Fix {
    pub fn new(coordinate: Coordinate, accuracy_m: f64, timestamp_ms: u64) -> Self {
        Self {
            coordinate,
            accuracy_m,
            timestamp_ms,
        }
    }
}

/// A fix that passed all gates, smoothed over the recent window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StabilizedPosition {
    pub coordinate: Coordinate,
    /// Mean accuracy of the samples in the smoothing window (meters).
    pub accuracy_m: f64,
    /// Window fill ratio (0-1); low right after start or reset.
    pub confidence: f64,
    pub timestamp_ms: u64,
}

/// Why a fix was dropped.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RejectReason {
    /// Non-finite or negative accuracy, or an out-of-range coordinate.
    InvalidFix,
    /// Accuracy radius above the configured maximum.
    LowAccuracy { accuracy_m: f64 },
    /// Arrived too soon after the last emitted position (or went back in time).
    Throttled { elapsed_ms: i64 },
    /// Implied speed from the last emitted position is not physically plausible.
    ImplausibleJump { speed_mps: f64 },
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RejectReason::InvalidFix => write!(f, "invalid fix"),
            RejectReason::LowAccuracy { accuracy_m } => {
                write!(f, "low accuracy ({:.1}m)", accuracy_m)
            }
            RejectReason::Throttled { elapsed_ms } => write!(f, "throttled ({}ms)", elapsed_ms),
            RejectReason::ImplausibleJump { speed_mps } => {
                write!(f, "implausible jump ({:.1} m/s)", speed_mps)
            }
        }
    }
}

/// Counters for accepted and dropped fixes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StabilizerStats {
    pub accepted: u64,
    pub invalid: u64,
    pub low_accuracy: u64,
    pub throttled: u64,
    pub implausible: u64,
}

impl StabilizerStats {
    pub fn rejected(&self) -> u64 {
        self.invalid + self.low_accuracy + self.throttled + self.implausible
    }
}

#[derive(Debug, Clone, Copy)]
struct WindowSample {
    coordinate: Coordinate,
    accuracy_m: f64,
}

/// Filters and smooths raw fixes.
#[derive(Debug)]
pub struct PositionStabilizer {
    config: StabilizerConfig,
    window: VecDeque<WindowSample>,
    last_emitted: Option<StabilizedPosition>,
    stats: StabilizerStats,
}

impl Default for PositionStabilizer {
    fn default() -> Self {
        Self::new(StabilizerConfig::default())
    }
}

impl PositionStabilizer {
    pub fn new(config: StabilizerConfig) -> Self {
        let capacity = config.smoothing_window.max(1);
        Self {
            config,
            window: VecDeque::with_capacity(capacity),
            last_emitted: None,
            stats: StabilizerStats::default(),
        }
    }

    pub fn config(&self) -> &StabilizerConfig {
        &self.config
    }

    /// Run a fix through the gates, returning the smoothed position if accepted.
    pub fn accept(&mut self, fix: Fix) -> Option<StabilizedPosition> {
        self.evaluate(fix).ok()
    }

    /// Like [`accept`](Self::accept) but reports why a fix was dropped.
    pub fn evaluate(&mut self, fix: Fix) -> Result<StabilizedPosition, RejectReason> {
        if let Err(reason) = self.check_gates(&fix) {
            self.record_rejection(&reason);
            tracing::debug!(
                position = %fix.coordinate,
                accuracy_m = fix.accuracy_m,
                timestamp_ms = fix.timestamp_ms,
                reason = %reason,
                "Stabilizer: fix dropped"
            );
            return Err(reason);
        }

        let window_size = self.config.smoothing_window.max(1);
        self.window.push_back(WindowSample {
            coordinate: fix.coordinate,
            accuracy_m: fix.accuracy_m,
        });
        while self.window.len() > window_size {
            self.window.pop_front();
        }

        // A single sample averages to itself; skip the arithmetic so it is exact
        let coordinate = if self.window.len() >= window_size.min(2) && self.window.len() > 1 {
            self.weighted_average()
        } else {
            fix.coordinate
        };

        let accuracy_m =
            self.window.iter().map(|s| s.accuracy_m).sum::<f64>() / self.window.len() as f64;
        let confidence = (self.window.len() as f64 / window_size as f64).min(1.0);

        let position = StabilizedPosition {
            coordinate,
            accuracy_m,
            confidence,
            timestamp_ms: fix.timestamp_ms,
        };

        self.last_emitted = Some(position);
        self.stats.accepted += 1;

        Ok(position)
    }

    /// Clear the smoothing window and last-emitted bookkeeping.
    ///
    /// Call when the location source changes (e.g. simulated to live) or
    /// navigation restarts.
    pub fn reset(&mut self) {
        self.window.clear();
        self.last_emitted = None;
        tracing::debug!("Stabilizer reset");
    }

    /// Most recent emitted position.
    pub fn last_position(&self) -> Option<&StabilizedPosition> {
        self.last_emitted.as_ref()
    }

    pub fn window_len(&self) -> usize {
        self.window.len()
    }

    pub fn stats(&self) -> StabilizerStats {
        self.stats
    }

    fn check_gates(&self, fix: &Fix) -> Result<(), RejectReason> {
        if !fix.coordinate.is_valid() || !fix.accuracy_m.is_finite() || fix.accuracy_m < 0.0 {
            return Err(RejectReason::InvalidFix);
        }

        if fix.accuracy_m > self.config.max_accuracy_m {
            return Err(RejectReason::LowAccuracy {
                accuracy_m: fix.accuracy_m,
            });
        }

        let Some(last) = self.last_emitted else {
            return Ok(());
        };

        let elapsed_ms = fix.timestamp_ms as i64 - last.timestamp_ms as i64;
        if elapsed_ms < self.config.min_update_interval.as_millis() as i64 || elapsed_ms <= 0 {
            return Err(RejectReason::Throttled { elapsed_ms });
        }

        let distance = haversine_distance(&last.coordinate, &fix.coordinate);
        let speed_mps = distance / (elapsed_ms as f64 / 1000.0);
        if speed_mps > self.config.speed_threshold_mps {
            return Err(RejectReason::ImplausibleJump { speed_mps });
        }

        Ok(())
    }

    fn record_rejection(&mut self, reason: &RejectReason) {
        match reason {
            RejectReason::InvalidFix => self.stats.invalid += 1,
            RejectReason::LowAccuracy { .. } => self.stats.low_accuracy += 1,
            RejectReason::Throttled { .. } => self.stats.throttled += 1,
            RejectReason::ImplausibleJump { .. } => self.stats.implausible += 1,
        }
    }

    /// Inverse-accuracy weighted mean of the window (weight = 1 / (accuracy + 1)).
    fn weighted_average(&self) -> Coordinate {
        let mut lat_sum = 0.0;
        let mut lon_sum = 0.0;
        let mut weight_sum = 0.0;

        for sample in &self.window {
            let weight = 1.0 / (sample.accuracy_m + 1.0);
            lat_sum += sample.coordinate.latitude * weight;
            lon_sum += sample.coordinate.longitude * weight;
            weight_sum += weight;
        }

        Coordinate::new_unchecked(lat_sum / weight_sum, lon_sum / weight_sum)
    }
}
