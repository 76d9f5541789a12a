//! Arrival time estimation.
//!
//! Picks the most trustworthy speed available and divides the remaining
//! distance by it:
//!
//! 1. current speed, when moving and above [`MIN_USABLE_SPEED_KMH`]
//! 2. average speed since start, when above [`MIN_USABLE_SPEED_KMH`]
//! 3. the travel profile's fallback speed

use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;

use crate::config::TravelProfile;
use crate::speed::SpeedEstimator;

/// Measured speeds at or below this are not used for estimates (km/h).
pub const MIN_USABLE_SPEED_KMH: f64 = 1.0;

/// Configuration for [`EtaEstimator`].
#[derive(Debug, Clone, PartialEq)]
pub struct EtaConfig {
    /// Speed assumed when no usable measurement exists (km/h).
    pub fallback_speed_kmh: f64,
}

impl Default for EtaConfig {
    fn default() -> Self {
        Self::for_travel(TravelProfile::default())
    }
}

impl EtaConfig {
    /// Walking 5 km/h, cycling 15 km/h, driving 40 km/h.
    pub fn for_travel(profile: TravelProfile) -> Self {
        let fallback_speed_kmh = match profile {
            TravelProfile::Walking => 5.0,
            TravelProfile::Cycling => 15.0,
            TravelProfile::Driving => 40.0,
        };
        Self { fallback_speed_kmh }
    }
}

/// Which speed an estimate is based on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SpeedSource {
    Current,
    Average,
    Fallback,
}

impl std::fmt::Display for SpeedSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SpeedSource::Current => write!(f, "current"),
            SpeedSource::Average => write!(f, "average"),
            SpeedSource::Fallback => write!(f, "fallback"),
        }
    }
}

/// Time to arrival.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EtaEstimate {
    pub eta_seconds: f64,
    /// `now + eta`, in the caller's timestamp base (milliseconds).
    pub arrival_timestamp_ms: u64,
    pub speed_kmh: f64,
    pub source: SpeedSource,
}

impl EtaEstimate {
    /// Arrival as UTC wall-clock time.
    ///
    /// Only meaningful when the session uses Unix epoch milliseconds.
    pub fn arrival_utc(&self) -> Option<DateTime<Utc>> {
        let millis = i64::try_from(self.arrival_timestamp_ms).ok()?;
        Utc.timestamp_millis_opt(millis).single()
    }

    /// Minutes left, rounded to the nearest minute.
    pub fn minutes(&self) -> u64 {
        (self.eta_seconds / 60.0).round() as u64
    }
}

/// Combines remaining distance with measured speed.
#[derive(Debug, Clone, Default)]
pub struct EtaEstimator {
    config: EtaConfig,
}

impl EtaEstimator {
    pub fn new(config: EtaConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EtaConfig {
        &self.config
    }

    pub fn estimate(
        &self,
        distance_remaining_m: f64,
        speed: &SpeedEstimator,
        now_ms: u64,
    ) -> EtaEstimate {
        let current = speed.current_speed();
        let average = speed.average_speed();

        let (speed_kmh, source) = if speed.is_moving() && current > MIN_USABLE_SPEED_KMH {
            (current, SpeedSource::Current)
        } else if average > MIN_USABLE_SPEED_KMH {
            (average, SpeedSource::Average)
        } else {
            (self.config.fallback_speed_kmh, SpeedSource::Fallback)
        };

        let distance_km = distance_remaining_m.max(0.0) / 1000.0;
        let eta_seconds = if speed_kmh > 0.0 {
            distance_km / speed_kmh * 3600.0
        } else {
            0.0
        };

        EtaEstimate {
            eta_seconds,
            arrival_timestamp_ms: now_ms.saturating_add((eta_seconds * 1000.0).round() as u64),
            speed_kmh,
            source,
        }
    }
}
