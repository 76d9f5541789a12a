//! Wayfarer - position stabilization and route progress for turn-by-turn navigation
//!
//! The crate turns a stream of raw location fixes into navigation state:
//!
//! - [`stabilizer`] drops inaccurate, too-frequent or implausible fixes and
//!   smooths the rest
//! - [`speed`] estimates current and average speed from accepted positions
//! - [`progress`] projects positions onto the route polyline and tracks steps
//! - [`reroute`] decides when an off-route user should get a new route
//! - [`eta`] turns remaining distance and speed into an arrival estimate
//!
//! [`session::NavigationSession`] wires them together for one navigation,
//! and [`driver::NavigationDriver`] runs a session on a tokio task against a
//! [`provider::RoutingProvider`].
//!
//! All components take caller-supplied timestamps (milliseconds) and never
//! read a clock themselves.
//!
//! # Example
//!
//! ```
//! use wayfarer::config::NavigationConfig;
//! use wayfarer::geo::{offset, Coordinate};
//! use wayfarer::progress::Route;
//! use wayfarer::session::NavigationSession;
//! use wayfarer::stabilizer::Fix;
//!
//! let start = Coordinate::new(51.5007, -0.1246).unwrap();
//! let route = Route::from_points(vec![start, offset(&start, 0.0, 400.0)], vec![]).unwrap();
//! let mut session = NavigationSession::for_route(NavigationConfig::default(), route).unwrap();
//!
//! let update = session.on_fix(Fix::new(start, 5.0, 0)).unwrap();
//! assert!(update.progress.distance_remaining > 390.0);
//! assert!(!update.progress.is_off_route);
//! ```

pub mod config;
pub mod driver;
pub mod eta;
pub mod geo;
pub mod logging;
pub mod progress;
pub mod provider;
pub mod reroute;
pub mod session;
pub mod speed;
pub mod stabilizer;

pub use config::{NavigationConfig, PolicyProfile, TravelProfile};
pub use driver::{LocationUpdate, NavigationDriver};
pub use geo::Coordinate;
pub use progress::{ProgressState, Route};
pub use session::{NavigationEvent, NavigationSession, SessionUpdate};
pub use stabilizer::Fix;

/// Library version, from Cargo.toml.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
