//! Simulate a trip along a route through the async driver.
//!
//! Synthesizes fixes at the profile's fallback speed (or `--speed-kmh`),
//! optionally stepping sideways off the route for a while, and paces them
//! in accelerated real time so the routing provider's latency overlaps with
//! tracking the way it would on a device.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, Utc};
use clap::Args;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use wayfarer::config::NavigationConfig;
use wayfarer::eta::EtaEstimator;
use wayfarer::geo::{bearing, interpolate, offset, Coordinate};
use wayfarer::progress::Route;
use wayfarer::provider::StraightLineProvider;
use wayfarer::session::{NavigationEvent, NavigationSession};
use wayfarer::speed::SpeedEstimator;
use wayfarer::stabilizer::Fix;
use wayfarer::{LocationUpdate, NavigationDriver};

use super::common::{self, GlobalOptions};
use crate::error::CliError;

/// Arguments for `wayfarer simulate`.
#[derive(Debug, Args)]
pub struct SimulateArgs {
    /// Route JSON file
    #[arg(long)]
    pub route: PathBuf,

    /// Travel speed (default: the profile's fallback speed)
    #[arg(long)]
    pub speed_kmh: Option<f64>,

    /// Leave the route after this many meters
    #[arg(long)]
    pub detour_at: Option<f64>,

    /// How far to step off the route (meters)
    #[arg(long, default_value = "80")]
    pub detour_offset: f64,

    /// How long to stay off the route (seconds)
    #[arg(long, default_value = "30")]
    pub detour_secs: u64,

    /// Reported fix accuracy (meters)
    #[arg(long, default_value = "5")]
    pub accuracy: f64,

    /// Time acceleration (simulated seconds per real second)
    #[arg(long, default_value = "50")]
    pub speedup: f64,

    /// Simulated routing latency (milliseconds, real time)
    #[arg(long, default_value = "250")]
    pub latency_ms: u64,
}

/// Parameters for fix synthesis.
#[derive(Debug, Clone, PartialEq)]
pub struct TripPlan {
    pub speed_mps: f64,
    pub interval_ms: u64,
    pub accuracy_m: f64,
    pub detour: Option<Detour>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detour {
    /// Distance along the route where the detour starts (meters).
    pub at_m: f64,
    pub offset_m: f64,
    pub hold_ms: u64,
}

impl TripPlan {
    fn from_args(args: &SimulateArgs, config: &NavigationConfig) -> Result<Self, CliError> {
        let speed_kmh = args.speed_kmh.unwrap_or(config.eta.fallback_speed_kmh);
        if speed_kmh.is_nan() || speed_kmh <= 0.0 {
            return Err(CliError::InvalidArgument(format!(
                "--speed-kmh must be positive, got {}",
                speed_kmh
            )));
        }
        if args.speedup.is_nan() || args.speedup <= 0.0 {
            return Err(CliError::InvalidArgument(format!(
                "--speedup must be positive, got {}",
                args.speedup
            )));
        }

        let interval_ms = (config.stabilizer.min_update_interval.as_millis() as u64).max(1_000);
        let detour = args.detour_at.map(|at_m| Detour {
            at_m,
            offset_m: args.detour_offset.max(0.0),
            hold_ms: args.detour_secs * 1_000,
        });

        Ok(Self {
            speed_mps: speed_kmh / 3.6,
            interval_ms,
            accuracy_m: args.accuracy,
            detour,
        })
    }

    /// Fixes for the whole trip, starting at `start_ms`.
    pub fn fixes(&self, route: &Route, start_ms: u64) -> Vec<Fix> {
        let step_m = self.speed_mps * self.interval_ms as f64 / 1000.0;
        let total_m = route.polyline.total_length();
        let mut positions = Vec::new();
        let mut detoured = false;
        let mut along = 0.0;

        loop {
            let (point, heading) = point_along(route, along);
            positions.push(point);

            if let Some(detour) = self.detour.filter(|d| !detoured && along >= d.at_m) {
                detoured = true;
                positions.extend(detour_positions(&point, heading, &detour, step_m, self.interval_ms));
            }

            if along >= total_m - 1e-6 {
                break;
            }
            along = (along + step_m).min(total_m);
        }

        positions
            .into_iter()
            .enumerate()
            .map(|(i, coordinate)| {
                Fix::new(coordinate, self.accuracy_m, start_ms + i as u64 * self.interval_ms)
            })
            .collect()
    }
}

/// Out to the side at travel speed, hold, and back.
fn detour_positions(
    origin: &Coordinate,
    heading: f64,
    detour: &Detour,
    step_m: f64,
    interval_ms: u64,
) -> Vec<Coordinate> {
    let side = heading + 90.0;
    let mut positions = Vec::new();

    let mut lateral = 0.0;
    while lateral < detour.offset_m {
        lateral = (lateral + step_m).min(detour.offset_m);
        positions.push(offset(origin, side, lateral));
    }
    let far = offset(origin, side, detour.offset_m);
    for _ in 0..detour.hold_ms / interval_ms.max(1) {
        positions.push(far);
    }
    while lateral > 0.0 {
        lateral = (lateral - step_m).max(0.0);
        positions.push(offset(origin, side, lateral));
    }
    positions
}

/// Point `distance_m` along the route and the heading of its segment.
fn point_along(route: &Route, distance_m: f64) -> (Coordinate, f64) {
    let polyline = &route.polyline;
    let mut remaining = distance_m.max(0.0);

    for index in 0..polyline.segment_count() {
        let Some((start, end)) = polyline.segment(index) else {
            break;
        };
        let length = polyline.segment_length(index);
        if remaining <= length || index + 1 == polyline.segment_count() {
            let t = if length > 0.0 {
                (remaining / length).min(1.0)
            } else {
                1.0
            };
            return (interpolate(start, end, t), bearing(start, end));
        }
        remaining -= length;
    }

    (*polyline.last(), 0.0)
}

/// Run `wayfarer simulate`.
pub fn run(args: SimulateArgs, options: &GlobalOptions) -> Result<(), CliError> {
    let config = options.load_config()?;
    let route = common::load_route(&args.route)?;
    let plan = TripPlan::from_args(&args, &config)?;

    let start_ms = Utc::now().timestamp_millis().max(0) as u64;
    let fixes = plan.fixes(&route, start_ms);
    let pace = Duration::from_secs_f64(plan.interval_ms as f64 / 1000.0 / args.speedup);
    let provider =
        Arc::new(StraightLineProvider::new().with_latency(Duration::from_millis(args.latency_ms)));

    if !options.json {
        print_plan(&config, &route, &plan, start_ms, fixes.len());
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(CliError::Runtime)?;

    let session = NavigationSession::for_route(config, route)?;
    let session = runtime.block_on(drive(session, provider, fixes, pace, options.json))?;

    print_outcome(&session, options.json);
    Ok(())
}

fn print_plan(config: &NavigationConfig, route: &Route, plan: &TripPlan, start_ms: u64, count: usize) {
    let total_m = route.polyline.total_length();
    let planned = EtaEstimator::new(config.eta.clone()).estimate(
        total_m,
        &SpeedEstimator::new(config.speed.clone()),
        start_ms,
    );
    let arrival = planned
        .arrival_utc()
        .map(|utc| utc.with_timezone(&Local).format("%H:%M:%S").to_string())
        .unwrap_or_else(|| "unknown".to_string());

    println!("Simulating {:.0}m trip ({} / {})", total_m, config.travel, config.policy);
    println!(
        "  {:.1} km/h, fix every {}ms, {} fixes",
        plan.speed_mps * 3.6,
        plan.interval_ms,
        count
    );
    if let Some(detour) = &plan.detour {
        println!(
            "  Detour {:.0}m off route at {:.0}m for {}s",
            detour.offset_m,
            detour.at_m,
            detour.hold_ms / 1000
        );
    }
    println!("  Planned arrival at {} (~{} min)", arrival, planned.minutes());
    println!();
}

async fn drive(
    session: NavigationSession,
    provider: Arc<StraightLineProvider>,
    fixes: Vec<Fix>,
    pace: Duration,
    json: bool,
) -> Result<NavigationSession, CliError> {
    let (driver, _progress_rx) = NavigationDriver::new(session, provider);
    let (location_tx, location_rx) = mpsc::channel(32);
    let (event_tx, mut event_rx) = mpsc::channel::<NavigationEvent>(64);
    let cancel = CancellationToken::new();

    let driver_handle = tokio::spawn(driver.run(location_rx, event_tx, cancel.clone()));

    let printer = tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            common::print_event(&event, json);
        }
    });

    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupted, stopping simulation");
            interrupt.cancel();
        }
    });

    let mut ticker = tokio::time::interval(pace);
    for fix in fixes {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }
        if location_tx.send(LocationUpdate::Fix(fix)).await.is_err() {
            break;
        }
    }
    drop(location_tx);

    let session = driver_handle
        .await
        .map_err(|e| CliError::TaskFailed(e.to_string()))?;
    let _ = printer.await;
    Ok(session)
}

fn print_outcome(session: &NavigationSession, json: bool) {
    let stats = session.reroute_stats();
    let progress = session.progress();

    if json {
        let summary = serde_json::json!({
            "completed": session.is_complete(),
            "reroute_attempts": stats.attempts,
            "percent_complete": progress.map(|p| p.percent_complete),
            "distance_remaining_m": progress.map(|p| p.distance_remaining),
        });
        println!("{}", summary);
        return;
    }

    println!();
    println!("Simulation Summary");
    println!("==================");
    println!(
        "  Completed:        {}",
        if session.is_complete() { "yes" } else { "no" }
    );
    println!("  Reroute attempts: {}/{}", stats.attempts, stats.max_attempts);
    if let Some(progress) = progress {
        println!("  Progress:         {:.1}%", progress.percent_complete);
        println!("  Remaining:        {:.0}m", progress.distance_remaining);
    }
}
