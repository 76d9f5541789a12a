//! Speed estimation from stabilized positions.
//!
//! Keeps a bounded history of accepted positions (oldest first) and derives:
//!
//! - **current speed**: path distance over the last few samples divided by
//!   the time since the first of them, capped to suppress GPS spikes
//! - **average speed**: cumulative distance over elapsed time since start
//!
//! Positions closer than the noise floor to the previous sample are not
//! stored, so a user standing still does not accumulate jitter distance.
//! Their timestamps still count as "observed", which lets the current speed
//! decay toward zero while the user is stationary.

use std::collections::VecDeque;

use crate::config::TravelProfile;
use crate::geo::{haversine_distance, Coordinate};

/// Samples closer than this to the last stored sample are ignored (meters).
const DEFAULT_NOISE_FLOOR_M: f64 = 1.0;

/// Number of recent samples used for the current speed.
const DEFAULT_SPEED_WINDOW: usize = 5;

/// Maximum samples retained.
const DEFAULT_MAX_HISTORY: usize = 30;

/// Speeds at or below this are "not moving" (km/h).
const DEFAULT_MOVEMENT_THRESHOLD_KMH: f64 = 0.5;

/// m/s → km/h
const MPS_TO_KMH: f64 = 3.6;

/// Configuration for [`SpeedEstimator`].
#[derive(Debug, Clone, PartialEq)]
pub struct SpeedConfig {
    pub noise_floor_m: f64,
    pub window: usize,
    pub max_history: usize,
    /// Ceiling applied to the current speed (km/h).
    pub max_speed_kmh: f64,
    pub movement_threshold_kmh: f64,
}

impl Default for SpeedConfig {
    fn default() -> Self {
        Self::for_travel(TravelProfile::default())
    }
}

impl SpeedConfig {
    pub fn for_travel(profile: TravelProfile) -> Self {
        let max_speed_kmh = match profile {
            TravelProfile::Walking | TravelProfile::Cycling => 50.0,
            TravelProfile::Driving => 200.0,
        };

        Self {
            noise_floor_m: DEFAULT_NOISE_FLOOR_M,
            window: DEFAULT_SPEED_WINDOW,
            max_history: DEFAULT_MAX_HISTORY,
            max_speed_kmh,
            movement_threshold_kmh: DEFAULT_MOVEMENT_THRESHOLD_KMH,
        }
    }
}

/// A stored position sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpeedSample {
    pub coordinate: Coordinate,
    pub timestamp_ms: u64,
}

/// Derives speed from a sliding window of positions.
#[derive(Debug)]
pub struct SpeedEstimator {
    config: SpeedConfig,
    samples: VecDeque<SpeedSample>,
    /// Latest timestamp seen, stored or not.
    last_observed_ms: Option<u64>,
    /// Timestamp of the first stored sample since start/reset.
    started_at_ms: Option<u64>,
    total_distance_m: f64,
}

impl Default for SpeedEstimator {
    fn default() -> Self {
        Self::new(SpeedConfig::default())
    }
}

impl SpeedEstimator {
    pub fn new(config: SpeedConfig) -> Self {
        Self {
            samples: VecDeque::with_capacity(config.max_history),
            config,
            last_observed_ms: None,
            started_at_ms: None,
            total_distance_m: 0.0,
        }
    }

    /// Record a position.
    ///
    /// Returns `true` if the sample was stored, `false` if it was within the
    /// noise floor of the previous sample or older than the latest one.
    pub fn add_position(&mut self, coordinate: Coordinate, timestamp_ms: u64) -> bool {
        if let Some(observed) = self.last_observed_ms {
            if timestamp_ms < observed {
                return false;
            }
        }
        self.last_observed_ms = Some(timestamp_ms);

        if let Some(last) = self.samples.back() {
            let distance = haversine_distance(&last.coordinate, &coordinate);
            if distance < self.config.noise_floor_m {
                return false;
            }
            self.total_distance_m += distance;
        } else if self.started_at_ms.is_none() {
            self.started_at_ms = Some(timestamp_ms);
        }

        self.samples.push_back(SpeedSample {
            coordinate,
            timestamp_ms,
        });
        while self.samples.len() > self.config.max_history.max(2) {
            self.samples.pop_front();
        }

        true
    }

    /// Current speed over the recent window (km/h), capped.
    pub fn current_speed(&self) -> f64 {
        let window = self.config.window.max(2);
        let len = self.samples.len();
        if len < 2 {
            return 0.0;
        }

        let recent: Vec<&SpeedSample> = self.samples.iter().skip(len.saturating_sub(window)).collect();
        let distance: f64 = recent
            .windows(2)
            .map(|pair| haversine_distance(&pair[0].coordinate, &pair[1].coordinate))
            .sum();

        let first_ms = recent[0].timestamp_ms;
        let end_ms = self
            .last_observed_ms
            .unwrap_or(recent[recent.len() - 1].timestamp_ms);
        let elapsed_s = end_ms.saturating_sub(first_ms) as f64 / 1000.0;
        if elapsed_s <= 0.0 {
            return 0.0;
        }

        (distance / elapsed_s * MPS_TO_KMH).min(self.config.max_speed_kmh)
    }

    /// Average speed since the first sample (km/h).
    pub fn average_speed(&self) -> f64 {
        let (Some(start), Some(end)) = (self.started_at_ms, self.last_observed_ms) else {
            return 0.0;
        };
        let elapsed_s = end.saturating_sub(start) as f64 / 1000.0;
        if elapsed_s <= 0.0 {
            return 0.0;
        }
        self.total_distance_m / elapsed_s * MPS_TO_KMH
    }

    pub fn is_moving(&self) -> bool {
        self.current_speed() > self.config.movement_threshold_kmh
    }

    /// Cumulative stored distance since start (meters).
    pub fn total_distance(&self) -> f64 {
        self.total_distance_m
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    /// Samples oldest first.
    pub fn samples(&self) -> impl Iterator<Item = &SpeedSample> {
        self.samples.iter()
    }

    /// Clear history and counters (new navigation session or source switch).
    pub fn reset(&mut self) {
        self.samples.clear();
        self.last_observed_ms = None;
        self.started_at_ms = None;
        self.total_distance_m = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::offset;

    fn origin() -> Coordinate {
        Coordinate::new(47.3769, 8.5417).unwrap()
    }

    /// Walk north at `mps` m/s, one sample per second.
    fn walk(estimator: &mut SpeedEstimator, mps: f64, seconds: u64) {
        for s in 0..=seconds {
            let p = offset(&origin(), 0.0, mps * s as f64);
            estimator.add_position(p, s * 1000);
        }
    }

    #[test]
    fn test_empty_estimator() {
        let estimator = SpeedEstimator::default();
        assert_eq!(estimator.current_speed(), 0.0);
        assert_eq!(estimator.average_speed(), 0.0);
        assert!(!estimator.is_moving());
    }

    #[test]
    fn test_constant_walking_speed() {
        let mut estimator = SpeedEstimator::default();
        walk(&mut estimator, 1.5, 20);

        // 1.5 m/s = 5.4 km/h
        assert!((estimator.current_speed() - 5.4).abs() < 0.05);
        assert!((estimator.average_speed() - 5.4).abs() < 0.05);
        assert!(estimator.is_moving());
        assert!((estimator.total_distance() - 30.0).abs() < 0.1);
    }

    #[test]
    fn test_noise_floor_ignores_jitter() {
        let mut estimator = SpeedEstimator::default();
        assert!(estimator.add_position(origin(), 0));
        assert!(!estimator.add_position(offset(&origin(), 90.0, 0.4), 1_000));
        assert!(!estimator.add_position(offset(&origin(), 270.0, 0.6), 2_000));
        assert_eq!(estimator.sample_count(), 1);
        assert_eq!(estimator.total_distance(), 0.0);
    }

    #[test]
    fn test_speed_decays_when_stationary() {
        let mut estimator = SpeedEstimator::default();
        walk(&mut estimator, 1.5, 4);
        let moving = estimator.current_speed();

        // Stand still: jitter within the noise floor for a minute
        let stop = offset(&origin(), 0.0, 6.0);
        for s in 5..65u64 {
            estimator.add_position(offset(&stop, 90.0, 0.3), s * 1000);
        }

        assert!(estimator.current_speed() < moving / 5.0);
        assert!(!estimator.is_moving());
    }

    #[test]
    fn test_current_speed_is_capped() {
        let config = SpeedConfig {
            max_speed_kmh: 50.0,
            ..SpeedConfig::default()
        };
        let mut estimator = SpeedEstimator::new(config);
        // 100 m/s GPS spike
        estimator.add_position(origin(), 0);
        estimator.add_position(offset(&origin(), 0.0, 100.0), 1_000);

        assert_eq!(estimator.current_speed(), 50.0);
    }

    #[test]
    fn test_current_speed_uses_recent_window() {
        let mut estimator = SpeedEstimator::default();
        // Slow for 20s then fast for 10s
        walk(&mut estimator, 1.0, 20);
        let slow_end = offset(&origin(), 0.0, 20.0);
        for s in 1..=10u64 {
            let p = offset(&slow_end, 0.0, 4.0 * s as f64);
            estimator.add_position(p, (20 + s) * 1000);
        }

        // Current reflects the 4 m/s leg, average blends both
        assert!((estimator.current_speed() - 14.4).abs() < 0.1);
        let avg = estimator.average_speed();
        assert!(avg > 3.6 && avg < 14.4, "average {}", avg);
    }

    #[test]
    fn test_history_is_bounded() {
        let config = SpeedConfig {
            max_history: 10,
            ..SpeedConfig::default()
        };
        let mut estimator = SpeedEstimator::new(config);
        walk(&mut estimator, 2.0, 50);

        assert_eq!(estimator.sample_count(), 10);
        let oldest = estimator.samples().next().unwrap();
        assert_eq!(oldest.timestamp_ms, 41_000);
        // Average still covers the whole session
        assert!((estimator.average_speed() - 7.2).abs() < 0.05);
    }

    #[test]
    fn test_out_of_order_sample_ignored() {
        let mut estimator = SpeedEstimator::default();
        estimator.add_position(origin(), 5_000);
        assert!(!estimator.add_position(offset(&origin(), 0.0, 10.0), 4_000));
        assert_eq!(estimator.sample_count(), 1);
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut estimator = SpeedEstimator::default();
        walk(&mut estimator, 1.5, 10);
        estimator.reset();

        assert_eq!(estimator.sample_count(), 0);
        assert_eq!(estimator.total_distance(), 0.0);
        assert_eq!(estimator.average_speed(), 0.0);
        assert_eq!(estimator.current_speed(), 0.0);
    }
}
