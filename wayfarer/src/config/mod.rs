//! Configuration for the tracking core.
//!
//! Each component owns a config struct with `Default` and a profile
//! constructor. [`NavigationConfig`] bundles them for one session:
//!
//! - [`TravelProfile`] selects stabilizer, speed and ETA tuning
//! - [`PolicyProfile`] selects progress and reroute thresholds
//!
//! # Example
//!
//! ```
//! use wayfarer::config::{NavigationConfig, PolicyProfile, TravelProfile};
//!
//! let config = NavigationConfig::for_profile(TravelProfile::Cycling, PolicyProfile::DenseSite);
//! assert_eq!(config.reroute.max_attempts, 5);
//! ```

mod file;
mod profile;

pub use file::{config_directory, config_file_path, ConfigFileError, ProfileOverride};
pub use profile::{PolicyProfile, TravelProfile};

use crate::eta::EtaConfig;
use crate::progress::ProgressConfig;
use crate::reroute::RerouteConfig;
use crate::speed::SpeedConfig;
use crate::stabilizer::StabilizerConfig;

/// All tuning for one navigation session.
#[derive(Debug, Clone, PartialEq)]
pub struct NavigationConfig {
    pub travel: TravelProfile,
    pub policy: PolicyProfile,
    pub stabilizer: StabilizerConfig,
    pub speed: SpeedConfig,
    pub progress: ProgressConfig,
    pub reroute: RerouteConfig,
    pub eta: EtaConfig,
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self::for_profile(TravelProfile::default(), PolicyProfile::default())
    }
}

impl NavigationConfig {
    pub fn for_profile(travel: TravelProfile, policy: PolicyProfile) -> Self {
        Self {
            travel,
            policy,
            stabilizer: StabilizerConfig::for_travel(travel),
            speed: SpeedConfig::for_travel(travel),
            progress: ProgressConfig::for_policy(policy),
            reroute: RerouteConfig::for_policy(policy),
            eta: EtaConfig::for_travel(travel),
        }
    }
}
