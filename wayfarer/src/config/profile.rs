//! Travel and policy profiles.
//!
//! Two independent axes select the tuning of the tracking core:
//!
//! - [`TravelProfile`]: how the user moves (walking, cycling, driving). Drives
//!   fix throttling, plausibility limits and ETA fallback speed.
//! - [`PolicyProfile`]: where the user moves. Open roads tolerate more
//!   drift before a reroute than a dense site such as a campground, where
//!   paths are close together and a wrong turn matters sooner.

use serde::{Deserialize, Serialize};

/// How the user is travelling.
///
/// Serialized with the profile names routing APIs expect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TravelProfile {
    #[default]
    #[serde(rename = "foot-walking")]
    Walking,
    #[serde(rename = "cycling-regular")]
    Cycling,
    #[serde(rename = "driving-car")]
    Driving,
}

impl TravelProfile {
    /// Routing API profile identifier.
    pub fn as_str(&self) -> &'static str {
        match self {
            TravelProfile::Walking => "foot-walking",
            TravelProfile::Cycling => "cycling-regular",
            TravelProfile::Driving => "driving-car",
        }
    }
}

impl std::fmt::Display for TravelProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for TravelProfile {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "walking" | "foot" | "foot-walking" => Ok(TravelProfile::Walking),
            "cycling" | "bike" | "cycling-regular" => Ok(TravelProfile::Cycling),
            "driving" | "car" | "driving-car" => Ok(TravelProfile::Driving),
            other => Err(format!(
                "unknown travel profile '{}' (expected walking, cycling or driving)",
                other
            )),
        }
    }
}

/// Off-route and reroute policy family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PolicyProfile {
    /// General street network: looser thresholds, fewer reroutes.
    #[default]
    OpenRoad,
    /// Dense site with closely spaced paths: tighter thresholds, quicker
    /// reaction, more attempts.
    DenseSite,
}

impl PolicyProfile {
    pub fn as_str(&self) -> &'static str {
        match self {
            PolicyProfile::OpenRoad => "open-road",
            PolicyProfile::DenseSite => "dense-site",
        }
    }
}

impl std::fmt::Display for PolicyProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for PolicyProfile {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "open-road" | "open_road" | "road" => Ok(PolicyProfile::OpenRoad),
            "dense-site" | "dense_site" | "site" | "campground" => Ok(PolicyProfile::DenseSite),
            other => Err(format!(
                "unknown policy profile '{}' (expected open-road or dense-site)",
                other
            )),
        }
    }
}
