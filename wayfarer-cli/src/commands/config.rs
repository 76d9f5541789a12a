//! Configuration CLI commands.
//!
//! Provides `config show` and `config path` for inspecting the settings a
//! replay or simulation would run with.

use clap::Subcommand;
use wayfarer::config::NavigationConfig;

use super::common::GlobalOptions;
use crate::error::CliError;

/// Config subcommands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Show the effective configuration (file plus --profile/--policy)
    Show,

    /// Show the configuration file path
    Path,
}

/// Run a config subcommand.
pub fn run(command: ConfigCommands, options: &GlobalOptions) -> Result<(), CliError> {
    match command {
        ConfigCommands::Show => run_show(options),
        ConfigCommands::Path => {
            let path = options.config_path();
            println!("{}", path.display());
            if !path.exists() {
                println!("(file does not exist, defaults are used)");
            }
            Ok(())
        }
    }
}

fn run_show(options: &GlobalOptions) -> Result<(), CliError> {
    let config = options.load_config()?;
    for line in render(&config) {
        println!("{}", line);
    }
    Ok(())
}

/// Effective configuration in config.ini layout.
fn render(config: &NavigationConfig) -> Vec<String> {
    let s = &config.stabilizer;
    let sp = &config.speed;
    let p = &config.progress;
    let r = &config.reroute;

    vec![
        "[navigation]".to_string(),
        format!("profile = {}", config.travel),
        format!("policy = {}", config.policy),
        String::new(),
        "[stabilizer]".to_string(),
        format!("max_accuracy_m = {}", s.max_accuracy_m),
        format!("min_update_interval_ms = {}", s.min_update_interval.as_millis()),
        format!("speed_threshold_mps = {}", s.speed_threshold_mps),
        format!("smoothing_window = {}", s.smoothing_window),
        String::new(),
        "[speed]".to_string(),
        format!("noise_floor_m = {}", sp.noise_floor_m),
        format!("window = {}", sp.window),
        format!("max_history = {}", sp.max_history),
        format!("max_speed_kmh = {}", sp.max_speed_kmh),
        format!("movement_threshold_kmh = {}", sp.movement_threshold_kmh),
        String::new(),
        "[progress]".to_string(),
        format!("off_route_threshold_m = {}", p.off_route_threshold_m),
        format!("step_advance_threshold_m = {}", p.step_advance_threshold_m),
        format!("completion_threshold_m = {}", p.completion_threshold_m),
        String::new(),
        "[reroute]".to_string(),
        format!("off_route_threshold_m = {}", r.off_route_threshold_m),
        format!("auto_reroute_threshold_m = {}", r.auto_reroute_threshold_m),
        format!("consideration_time_secs = {}", r.consideration_time.as_secs()),
        format!("cooldown_secs = {}", r.cooldown.as_secs()),
        format!("max_attempts = {}", r.max_attempts),
        format!("min_movement_m = {}", r.min_movement_m),
        format!("refund_failed_attempts = {}", r.refund_failed_attempts),
        String::new(),
        "[eta]".to_string(),
        format!("fallback_speed_kmh = {}", config.eta.fallback_speed_kmh),
    ]
}
