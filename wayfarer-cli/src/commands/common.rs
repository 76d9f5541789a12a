//! Common types and utilities shared across CLI commands.

use std::fs;
use std::path::{Path, PathBuf};

use clap::{Args, ValueEnum};
use console::style;
use serde::de::DeserializeOwned;
use wayfarer::config::{config_file_path, NavigationConfig, ProfileOverride};
use wayfarer::progress::Route;
use wayfarer::session::{NavigationEvent, SessionUpdate};
use wayfarer::stabilizer::Fix;
use wayfarer::{PolicyProfile, TravelProfile};

use crate::error::CliError;

/// Travel profile selection for CLI arguments.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq)]
pub enum ProfileArg {
    /// On foot (5 km/h fallback, 8 m/s jump limit)
    Walking,
    /// Bicycle (15 km/h fallback, 20 m/s jump limit)
    Cycling,
    /// Car (40 km/h fallback, 60 m/s jump limit)
    Driving,
}

impl From<ProfileArg> for TravelProfile {
    fn from(arg: ProfileArg) -> Self {
        match arg {
            ProfileArg::Walking => TravelProfile::Walking,
            ProfileArg::Cycling => TravelProfile::Cycling,
            ProfileArg::Driving => TravelProfile::Driving,
        }
    }
}

/// Reroute policy selection for CLI arguments.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq)]
pub enum PolicyArg {
    /// Open roads: 50 m off-route threshold, 15 s consideration
    OpenRoad,
    /// Dense sites (campuses, festivals): 20 m threshold, 8 s consideration
    DenseSite,
}

impl From<PolicyArg> for PolicyProfile {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::OpenRoad => PolicyProfile::OpenRoad,
            PolicyArg::DenseSite => PolicyProfile::DenseSite,
        }
    }
}

/// Options shared by every subcommand.
#[derive(Debug, Clone, Args)]
pub struct GlobalOptions {
    /// Travel profile (overrides [navigation] profile in config.ini)
    #[arg(long, value_enum, global = true)]
    pub profile: Option<ProfileArg>,

    /// Reroute policy (overrides [navigation] policy in config.ini)
    #[arg(long, value_enum, global = true)]
    pub policy: Option<PolicyArg>,

    /// Config file to use instead of ~/.wayfarer/config.ini
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Print one JSON object per update instead of text
    #[arg(long, global = true)]
    pub json: bool,

    /// Debug logging (and log to stdout)
    #[arg(long, global = true)]
    pub debug: bool,
}

impl GlobalOptions {
    pub fn config_path(&self) -> PathBuf {
        self.config.clone().unwrap_or_else(config_file_path)
    }

    /// Load the config file with the command-line profile choices applied.
    pub fn load_config(&self) -> Result<NavigationConfig, CliError> {
        let overrides = ProfileOverride {
            travel: self.profile.map(Into::into),
            policy: self.policy.map(Into::into),
        };
        Ok(NavigationConfig::load_with(&self.config_path(), overrides)?)
    }
}

fn read_file(path: &Path) -> Result<String, CliError> {
    fs::read_to_string(path).map_err(|error| CliError::FileRead {
        path: path.to_path_buf(),
        error,
    })
}

fn parse_json<T: DeserializeOwned>(path: &Path, content: &str) -> Result<T, CliError> {
    serde_json::from_str(content).map_err(|error| CliError::Parse {
        path: path.to_path_buf(),
        error,
    })
}

/// Load and validate a route JSON file.
pub fn load_route(path: &Path) -> Result<Route, CliError> {
    let route: Route = parse_json(path, &read_file(path)?)?;
    route.validate()?;
    Ok(route)
}

/// Load fixes from a JSON array or from one JSON object per line.
pub fn load_fixes(path: &Path) -> Result<Vec<Fix>, CliError> {
    let content = read_file(path)?;
    if content.trim_start().starts_with('[') {
        return parse_json(path, &content);
    }

    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(|line| parse_json(path, line))
        .collect()
}

/// Print one session update in the selected output format.
pub fn print_update(update: &SessionUpdate, json: bool) {
    if json {
        match serde_json::to_string(update) {
            Ok(line) => println!("{}", line),
            Err(e) => tracing::warn!(error = %e, "Failed to serialize update"),
        }
        return;
    }

    let progress = &update.progress;
    let status = if progress.is_complete {
        style("arrived").green()
    } else if progress.is_off_route {
        style("off-route").red()
    } else {
        style("on-route").cyan()
    };

    println!(
        "{:>10}  {:<9}  step {:<2} {:>6.0}m left  {:>5.1}%  {:>5.1} km/h  eta {} min",
        update.position.timestamp_ms,
        status,
        progress.current_step_index,
        progress.distance_remaining,
        progress.percent_complete,
        update.speed_kmh,
        update.eta.minutes(),
    );

    for event in &update.events {
        print_event(event, false);
    }
}

/// Print a single navigation event.
pub fn print_event(event: &NavigationEvent, json: bool) {
    if json {
        match serde_json::to_string(event) {
            Ok(line) => println!("{}", line),
            Err(e) => tracing::warn!(error = %e, "Failed to serialize event"),
        }
        return;
    }

    let marker = match event {
        NavigationEvent::RouteComplete | NavigationEvent::RerouteSucceeded { .. } => {
            style("  ✓").green()
        }
        NavigationEvent::OffRoute { .. }
        | NavigationEvent::RerouteFailed { .. }
        | NavigationEvent::RerouteExhausted { .. }
        | NavigationEvent::TrackingSuspended { .. } => style("  !").yellow(),
        _ => style("  →").cyan(),
    };
    println!("{} {}", marker, event);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_fixes_array_and_lines() {
        let dir = tempfile::tempdir().unwrap();

        let array = dir.path().join("fixes.json");
        fs::write(
            &array,
            r#"[{"coordinate": {"lat": 1.0, "lng": 2.0}, "accuracy": 5.0, "timestamp": 0},
                {"coordinate": {"lat": 1.0, "lng": 2.0}, "accuracy": 5.0, "timestamp": 1000}]"#,
        )
        .unwrap();
        assert_eq!(load_fixes(&array).unwrap().len(), 2);

        let lines = dir.path().join("fixes.jsonl");
        fs::write(
            &lines,
            "# recorded on a bench\n\
             {\"coordinate\": {\"latitude\": 1.0, \"longitude\": 2.0}, \"accuracy_m\": 4.0, \"timestamp_ms\": 5}\n\
             \n",
        )
        .unwrap();
        let fixes = load_fixes(&lines).unwrap();
        assert_eq!(fixes.len(), 1);
        assert_eq!(fixes[0].timestamp_ms, 5);
    }

    #[test]
    fn test_load_route_rejects_bad_waypoint() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("route.json");
        fs::write(
            &path,
            r#"{"geometry": [{"lat": 0.0, "lng": 0.0}, {"lat": 0.0, "lng": 0.001}],
                "instructions": [{"text": "Go", "type": "depart", "waypoint_index": 5}]}"#,
        )
        .unwrap();

        assert!(matches!(load_route(&path), Err(CliError::Route(_))));
    }

    #[test]
    fn test_missing_file_is_read_error() {
        let result = load_route(Path::new("/nonexistent/route.json"));
        assert!(matches!(result, Err(CliError::FileRead { .. })));
    }

    #[test]
    fn test_flags_override_profile() {
        let options = GlobalOptions {
            profile: Some(ProfileArg::Driving),
            policy: Some(PolicyArg::DenseSite),
            config: Some(PathBuf::from("/nonexistent/config.ini")),
            json: false,
            debug: false,
        };
        let config = options.load_config().unwrap();
        assert_eq!(config.travel, TravelProfile::Driving);
        assert_eq!(config.policy, PolicyProfile::DenseSite);
    }
}
