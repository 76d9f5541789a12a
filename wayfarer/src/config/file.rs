//! Configuration file handling for ~/.wayfarer/config.ini.
//!
//! The file only overrides what it names. `[navigation]` picks the profiles
//! whose defaults everything else starts from:
//!
//! ```ini
//! [navigation]
//! profile = cycling
//! policy = dense-site
//!
//! [stabilizer]
//! max_accuracy_m = 25
//! min_update_interval_ms = 1000
//!
//! [reroute]
//! max_attempts = 4
//! refund_failed_attempts = true
//! ```

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use ini::{Ini, Properties};
use thiserror::Error;

use super::{NavigationConfig, PolicyProfile, TravelProfile};

/// Configuration file errors.
#[derive(Debug, Error)]
pub enum ConfigFileError {
    /// Failed to read or parse the config file
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] ini::Error),

    /// Invalid configuration value
    #[error("Invalid configuration: {section}.{key} = '{value}' - {reason}")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
        reason: String,
    },
}

/// Profile choices that take precedence over the file's `[navigation]`
/// section (e.g. from command-line flags).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProfileOverride {
    pub travel: Option<TravelProfile>,
    pub policy: Option<PolicyProfile>,
}

impl NavigationConfig {
    /// Load configuration from the default path (~/.wayfarer/config.ini).
    pub fn load() -> Result<Self, ConfigFileError> {
        Self::load_from(&config_file_path())
    }

    /// Load configuration from a specific path.
    ///
    /// If the file doesn't exist, returns defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigFileError> {
        Self::load_with(path, ProfileOverride::default())
    }

    /// Load from `path`, with `overrides` replacing the file's profile
    /// choices. Section values in the file still apply on top.
    pub fn load_with(path: &Path, overrides: ProfileOverride) -> Result<Self, ConfigFileError> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::for_profile(
                overrides.travel.unwrap_or_default(),
                overrides.policy.unwrap_or_default(),
            ));
        }

        let ini = Ini::load_from_file(path)?;
        let config = parse_ini(&ini, overrides)?;
        tracing::info!(
            path = %path.display(),
            profile = %config.travel,
            policy = %config.policy,
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Parse configuration from INI text.
    pub fn from_ini_str(content: &str) -> Result<Self, ConfigFileError> {
        let ini = Ini::load_from_str(content).map_err(ini::Error::Parse)?;
        parse_ini(&ini, ProfileOverride::default())
    }
}

/// Get the path to the config directory (~/.wayfarer).
pub fn config_directory() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".wayfarer")
}

/// Get the path to the config file (~/.wayfarer/config.ini).
pub fn config_file_path() -> PathBuf {
    config_directory().join("config.ini")
}

/// Build a config from profile defaults overlaid with the INI values.
fn parse_ini(ini: &Ini, overrides: ProfileOverride) -> Result<NavigationConfig, ConfigFileError> {
    let mut travel = TravelProfile::default();
    let mut policy = PolicyProfile::default();

    // [navigation] section
    if let Some(section) = ini.section(Some("navigation")) {
        if let Some(v) = section.get("profile") {
            travel = v.parse().map_err(|reason| invalid("navigation", "profile", v, reason))?;
        }
        if let Some(v) = section.get("policy") {
            policy = v.parse().map_err(|reason| invalid("navigation", "policy", v, reason))?;
        }
    }

    let mut config = NavigationConfig::for_profile(
        overrides.travel.unwrap_or(travel),
        overrides.policy.unwrap_or(policy),
    );

    // [stabilizer] section
    if let Some(section) = ini.section(Some("stabilizer")) {
        let s = Section::new("stabilizer", section);
        if let Some(v) = s.non_negative("max_accuracy_m")? {
            config.stabilizer.max_accuracy_m = v;
        }
        if let Some(v) = s.parse::<u64>("min_update_interval_ms", "must be milliseconds")? {
            config.stabilizer.min_update_interval = Duration::from_millis(v);
        }
        if let Some(v) = s.positive("speed_threshold_mps")? {
            config.stabilizer.speed_threshold_mps = v;
        }
        if let Some(v) = s.count("smoothing_window")? {
            config.stabilizer.smoothing_window = v;
        }
    }

    // [speed] section
    if let Some(section) = ini.section(Some("speed")) {
        let s = Section::new("speed", section);
        if let Some(v) = s.non_negative("noise_floor_m")? {
            config.speed.noise_floor_m = v;
        }
        if let Some(v) = s.count("window")? {
            config.speed.window = v;
        }
        if let Some(v) = s.count("max_history")? {
            config.speed.max_history = v;
        }
        if let Some(v) = s.positive("max_speed_kmh")? {
            config.speed.max_speed_kmh = v;
        }
        if let Some(v) = s.non_negative("movement_threshold_kmh")? {
            config.speed.movement_threshold_kmh = v;
        }
    }

    // off_route_threshold_m may be given in either section but is one setting
    let mut progress_off_route = None;
    let mut reroute_off_route = None;

    // [progress] section
    if let Some(section) = ini.section(Some("progress")) {
        let s = Section::new("progress", section);
        progress_off_route = s.positive("off_route_threshold_m")?;
        if let Some(v) = s.positive("step_advance_threshold_m")? {
            config.progress.step_advance_threshold_m = v;
        }
        if let Some(v) = s.positive("completion_threshold_m")? {
            config.progress.completion_threshold_m = v;
        }
    }

    // [reroute] section
    if let Some(section) = ini.section(Some("reroute")) {
        let s = Section::new("reroute", section);
        reroute_off_route = s.positive("off_route_threshold_m")?;
        if let Some(v) = s.positive("auto_reroute_threshold_m")? {
            config.reroute.auto_reroute_threshold_m = v;
        }
        if let Some(v) = s.parse::<u64>("consideration_time_secs", "must be seconds")? {
            config.reroute.consideration_time = Duration::from_secs(v);
        }
        if let Some(v) = s.parse::<u64>("cooldown_secs", "must be seconds")? {
            config.reroute.cooldown = Duration::from_secs(v);
        }
        if let Some(v) = s.parse::<u32>("max_attempts", "must be a non-negative integer")? {
            config.reroute.max_attempts = v;
        }
        if let Some(v) = s.non_negative("min_movement_m")? {
            config.reroute.min_movement_m = v;
        }
        if let Some(v) = s.parse::<bool>("refund_failed_attempts", "must be true or false")? {
            config.reroute.refund_failed_attempts = v;
        }
    }

    // [eta] section
    if let Some(section) = ini.section(Some("eta")) {
        let s = Section::new("eta", section);
        if let Some(v) = s.positive("fallback_speed_kmh")? {
            config.eta.fallback_speed_kmh = v;
        }
    }

    match (progress_off_route, reroute_off_route) {
        (Some(p), Some(r)) if p != r => {
            return Err(invalid(
                "reroute",
                "off_route_threshold_m",
                &r.to_string(),
                format!("must match progress.off_route_threshold_m ({})", p),
            ));
        }
        (Some(v), _) | (None, Some(v)) => {
            config.progress.off_route_threshold_m = v;
            config.reroute.off_route_threshold_m = v;
        }
        (None, None) => {}
    }

    if config.reroute.auto_reroute_threshold_m < config.reroute.off_route_threshold_m {
        return Err(invalid(
            "reroute",
            "auto_reroute_threshold_m",
            &config.reroute.auto_reroute_threshold_m.to_string(),
            "must not be smaller than off_route_threshold_m".to_string(),
        ));
    }

    Ok(config)
}

fn invalid(section: &str, key: &str, value: &str, reason: String) -> ConfigFileError {
    ConfigFileError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: value.to_string(),
        reason,
    }
}

/// Typed accessors over one INI section.
struct Section<'a> {
    name: &'static str,
    properties: &'a Properties,
}

impl<'a> Section<'a> {
    fn new(name: &'static str, properties: &'a Properties) -> Self {
        Self { name, properties }
    }

    fn parse<T: FromStr>(&self, key: &str, reason: &str) -> Result<Option<T>, ConfigFileError> {
        let Some(raw) = self.properties.get(key) else {
            return Ok(None);
        };
        let v = raw.trim();
        v.parse()
            .map(Some)
            .map_err(|_| invalid(self.name, key, v, reason.to_string()))
    }

    fn positive(&self, key: &str) -> Result<Option<f64>, ConfigFileError> {
        self.checked_f64(key, |v| v > 0.0, "must be a positive number")
    }

    fn non_negative(&self, key: &str) -> Result<Option<f64>, ConfigFileError> {
        self.checked_f64(key, |v| v >= 0.0, "must be zero or a positive number")
    }

    fn count(&self, key: &str) -> Result<Option<usize>, ConfigFileError> {
        match self.parse::<usize>(key, "must be a positive integer")? {
            Some(0) => Err(invalid(self.name, key, "0", "must be at least 1".to_string())),
            other => Ok(other),
        }
    }

    fn checked_f64(
        &self,
        key: &str,
        check: impl Fn(f64) -> bool,
        reason: &str,
    ) -> Result<Option<f64>, ConfigFileError> {
        match self.parse::<f64>(key, reason)? {
            Some(v) if !v.is_finite() || !check(v) => {
                Err(invalid(self.name, key, &v.to_string(), reason.to_string()))
            }
            other => Ok(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_nonexistent_returns_defaults() {
        let path = Path::new("/nonexistent/path/config.ini");
        let config = NavigationConfig::load_from(path).unwrap();
        assert_eq!(config, NavigationConfig::default());
    }

    #[test]
    fn test_profile_defaults_then_overrides() {
        let config = NavigationConfig::from_ini_str(
            "[navigation]\nprofile = cycling\npolicy = dense-site\n\n[reroute]\nmax_attempts = 2\n",
        )
        .unwrap();

        assert_eq!(config.travel, TravelProfile::Cycling);
        assert_eq!(config.policy, PolicyProfile::DenseSite);
        assert_eq!(config.stabilizer.speed_threshold_mps, 20.0);
        assert_eq!(config.progress.off_route_threshold_m, 20.0);
        assert_eq!(config.reroute.max_attempts, 2);
        assert_eq!(config.reroute.consideration_time, Duration::from_secs(8));
    }

    #[test]
    fn test_all_sections() {
        let content = r#"
[stabilizer]
max_accuracy_m = 25
min_update_interval_ms = 1000
speed_threshold_mps = 10.5
smoothing_window = 3

[speed]
noise_floor_m = 2
window = 4
max_history = 20
max_speed_kmh = 30
movement_threshold_kmh = 1

[progress]
off_route_threshold_m = 40
step_advance_threshold_m = 15
completion_threshold_m = 12

[reroute]
off_route_threshold_m = 40
auto_reroute_threshold_m = 120
consideration_time_secs = 10
cooldown_secs = 25
min_movement_m = 4
refund_failed_attempts = true

[eta]
fallback_speed_kmh = 4.5
"#;
        let config = NavigationConfig::from_ini_str(content).unwrap();

        assert_eq!(config.stabilizer.max_accuracy_m, 25.0);
        assert_eq!(config.stabilizer.min_update_interval, Duration::from_secs(1));
        assert_eq!(config.stabilizer.speed_threshold_mps, 10.5);
        assert_eq!(config.stabilizer.smoothing_window, 3);
        assert_eq!(config.speed.noise_floor_m, 2.0);
        assert_eq!(config.speed.window, 4);
        assert_eq!(config.speed.max_history, 20);
        assert_eq!(config.speed.max_speed_kmh, 30.0);
        assert_eq!(config.progress.step_advance_threshold_m, 15.0);
        assert_eq!(config.progress.completion_threshold_m, 12.0);
        assert_eq!(config.reroute.auto_reroute_threshold_m, 120.0);
        assert_eq!(config.reroute.cooldown, Duration::from_secs(25));
        assert!(config.reroute.refund_failed_attempts);
        assert_eq!(config.eta.fallback_speed_kmh, 4.5);
    }

    #[test]
    fn test_invalid_profile() {
        let err = NavigationConfig::from_ini_str("[navigation]\nprofile = jetpack\n").unwrap_err();
        match err {
            ConfigFileError::InvalidValue {
                section, key, value, ..
            } => {
                assert_eq!(section, "navigation");
                assert_eq!(key, "profile");
                assert_eq!(value, "jetpack");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_rejects_negative_threshold() {
        let err =
            NavigationConfig::from_ini_str("[progress]\noff_route_threshold_m = -5\n").unwrap_err();
        assert!(err.to_string().contains("progress.off_route_threshold_m"));
    }

    #[test]
    fn test_rejects_zero_window() {
        let err = NavigationConfig::from_ini_str("[stabilizer]\nsmoothing_window = 0\n").unwrap_err();
        assert!(matches!(err, ConfigFileError::InvalidValue { .. }));
    }

    #[test]
    fn test_rejects_auto_below_off_route() {
        let err = NavigationConfig::from_ini_str("[reroute]\nauto_reroute_threshold_m = 30\n")
            .unwrap_err();
        assert!(err.to_string().contains("auto_reroute_threshold_m"));
    }

    #[test]
    fn test_rejects_conflicting_off_route_thresholds() {
        let err = NavigationConfig::from_ini_str(
            "[progress]\noff_route_threshold_m = 200\n\n[reroute]\noff_route_threshold_m = 30\n",
        )
        .unwrap_err();

        match err {
            ConfigFileError::InvalidValue { section, key, .. } => {
                assert_eq!(section, "reroute");
                assert_eq!(key, "off_route_threshold_m");
            }
            other => panic!("expected InvalidValue, got {:?}", other),
        }
    }

    #[test]
    fn test_off_route_threshold_in_one_section_sets_both() {
        let config =
            NavigationConfig::from_ini_str("[progress]\noff_route_threshold_m = 35\n").unwrap();
        assert_eq!(config.progress.off_route_threshold_m, 35.0);
        assert_eq!(config.reroute.off_route_threshold_m, 35.0);

        let config =
            NavigationConfig::from_ini_str("[reroute]\noff_route_threshold_m = 70\n").unwrap();
        assert_eq!(config.progress.off_route_threshold_m, 70.0);
        assert_eq!(config.reroute.off_route_threshold_m, 70.0);
    }

    #[test]
    fn test_profile_override_keeps_section_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.ini");
        std::fs::write(
            &path,
            "[navigation]\nprofile = walking\n\n[reroute]\nmax_attempts = 7\n",
        )
        .unwrap();

        let config = NavigationConfig::load_with(
            &path,
            ProfileOverride {
                travel: Some(TravelProfile::Driving),
                policy: None,
            },
        )
        .unwrap();

        assert_eq!(config.travel, TravelProfile::Driving);
        assert_eq!(config.stabilizer.speed_threshold_mps, 60.0);
        assert_eq!(config.reroute.max_attempts, 7);
    }

    #[test]
    fn test_profile_override_without_file() {
        let config = NavigationConfig::load_with(
            Path::new("/nonexistent/config.ini"),
            ProfileOverride {
                travel: None,
                policy: Some(PolicyProfile::DenseSite),
            },
        )
        .unwrap();
        assert_eq!(
            config,
            NavigationConfig::for_profile(TravelProfile::Walking, PolicyProfile::DenseSite)
        );
    }

    #[test]
    fn test_config_path_under_home() {
        let path = config_file_path();
        assert!(path.ends_with(".wayfarer/config.ini"));
    }
}
