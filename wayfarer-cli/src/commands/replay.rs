//! Replay recorded fixes against a route.
//!
//! Runs synchronously through a [`NavigationSession`]. Reroute requests are
//! answered in place by the offline straight-line router, or refused when
//! `--reroute fail` is given.

use std::path::PathBuf;

use clap::{Args, ValueEnum};
use serde::Serialize;
use wayfarer::config::NavigationConfig;
use wayfarer::progress::Route;
use wayfarer::provider::{RoutingError, StraightLineProvider};
use wayfarer::session::{NavigationEvent, NavigationSession, SessionUpdate};
use wayfarer::stabilizer::Fix;

use super::common::{self, GlobalOptions};
use crate::error::CliError;

/// How reroute requests are answered during a replay.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Default)]
pub enum RerouteMode {
    /// Straight line from the current position to the destination
    #[default]
    StraightLine,
    /// Every request fails (exercises retry and exhaustion)
    Fail,
}

/// Arguments for `wayfarer replay`.
#[derive(Debug, Args)]
pub struct ReplayArgs {
    /// Route JSON file
    #[arg(long)]
    pub route: PathBuf,

    /// Fixes as a JSON array or one JSON object per line
    #[arg(long)]
    pub fixes: PathBuf,

    /// How to answer reroute requests
    #[arg(long, value_enum, default_value = "straight-line")]
    pub reroute: RerouteMode,
}

/// What a replay reports as it goes.
#[derive(Debug, Clone, Copy)]
pub enum ReplayOutput<'a> {
    /// An accepted fix
    Update(&'a SessionUpdate),
    /// Outcome of answering a reroute request
    Event(&'a NavigationEvent),
}

/// Totals printed after a replay.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReplaySummary {
    pub fixes: usize,
    pub accepted: u64,
    pub rejected: u64,
    pub reroute_attempts: u32,
    pub completed: bool,
    pub percent_complete: f64,
    pub distance_remaining_m: f64,
}

/// Run `wayfarer replay`.
pub fn run(args: ReplayArgs, options: &GlobalOptions) -> Result<(), CliError> {
    let config = options.load_config()?;
    let route = common::load_route(&args.route)?;
    let fixes = common::load_fixes(&args.fixes)?;

    tracing::info!(
        route = %args.route.display(),
        fixes = fixes.len(),
        profile = %config.travel,
        policy = %config.policy,
        "Starting replay"
    );

    let json = options.json;
    let summary = replay(config, route, &fixes, args.reroute, |output| match output {
        ReplayOutput::Update(update) => common::print_update(update, json),
        ReplayOutput::Event(event) => common::print_event(event, json),
    })?;

    if json {
        println!(
            "{}",
            serde_json::to_string(&summary).unwrap_or_else(|_| "{}".to_string())
        );
    } else {
        println!();
        println!("Replay Summary");
        println!("==============");
        println!("  Fixes:            {}", summary.fixes);
        println!("  Accepted:         {}", summary.accepted);
        println!("  Rejected:         {}", summary.rejected);
        println!("  Reroute attempts: {}", summary.reroute_attempts);
        println!("  Progress:         {:.1}%", summary.percent_complete);
        println!("  Remaining:        {:.0}m", summary.distance_remaining_m);
        println!(
            "  Completed:        {}",
            if summary.completed { "yes" } else { "no" }
        );
    }

    Ok(())
}

/// Feed every fix through a fresh session, reporting each accepted fix and
/// each reroute outcome to `on_output`.
pub fn replay(
    config: NavigationConfig,
    route: Route,
    fixes: &[Fix],
    mode: RerouteMode,
    mut on_output: impl FnMut(ReplayOutput<'_>),
) -> Result<ReplaySummary, CliError> {
    let mut session = NavigationSession::for_route(config, route)?;
    let router = StraightLineProvider::new();

    for fix in fixes {
        let Some(update) = session.on_fix(*fix) else {
            continue;
        };
        on_output(ReplayOutput::Update(&update));

        if let Some(request) = update.reroute_request {
            let result = match mode {
                RerouteMode::StraightLine => router.build_route(&request),
                RerouteMode::Fail => Err(RoutingError::Network(
                    "rerouting disabled for this replay".to_string(),
                )),
            };
            for event in session.apply_reroute_result(result) {
                on_output(ReplayOutput::Event(&event));
            }
        }
    }

    let stats = session.stabilizer_stats();
    let progress = session.progress();
    Ok(ReplaySummary {
        fixes: fixes.len(),
        accepted: stats.accepted,
        rejected: stats.rejected(),
        reroute_attempts: session.reroute_stats().attempts,
        completed: session.is_complete(),
        percent_complete: progress.map(|p| p.percent_complete).unwrap_or(0.0),
        distance_remaining_m: progress
            .map(|p| p.distance_remaining)
            .unwrap_or_else(|| session.route().polyline.total_length()),
    })
}
