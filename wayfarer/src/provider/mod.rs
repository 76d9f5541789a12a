//! Routing provider abstraction.
//!
//! The tracking core never computes routes itself. When the reroute engine
//! triggers, the session produces a [`RouteRequest`] and the host hands it
//! to a [`RoutingProvider`]. The result goes back through
//! `NavigationSession::apply_reroute_result`.

mod straight_line;

use std::future::Future;

use serde::Serialize;
use thiserror::Error;

use crate::config::TravelProfile;
use crate::geo::Coordinate;
use crate::progress::{Route, RouteError};

pub use straight_line::StraightLineProvider;

/// Errors returned by routing providers.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RoutingError {
    /// Transport failure (timeout, connection refused, HTTP error)
    #[error("Network error: {0}")]
    Network(String),

    /// The provider could not find a route between the points
    #[error("No route found: {0}")]
    NoRoute(String),

    /// The provider answered with something that could not be understood
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// The provider returned geometry the tracker cannot use
    #[error("Invalid route: {0}")]
    InvalidRoute(#[from] RouteError),

    /// The request was abandoned before the provider answered
    #[error("Request cancelled")]
    Cancelled,
}

/// Parameters for a route computation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RouteRequest {
    pub origin: Coordinate,
    pub destination: Coordinate,
    pub profile: TravelProfile,
}

impl RouteRequest {
    pub fn new(origin: Coordinate, destination: Coordinate, profile: TravelProfile) -> Self {
        Self {
            origin,
            destination,
            profile,
        }
    }
}

/// Async trait for route computation backends.
///
/// Implementations must be cheap to share; the driver keeps one behind an
/// `Arc` and issues at most one request at a time.
pub trait RoutingProvider: Send + Sync {
    /// Computes a route for the request.
    fn request_route(
        &self,
        request: &RouteRequest,
    ) -> impl Future<Output = Result<Route, RoutingError>> + Send;

    /// Returns the provider's name for logging and identification.
    fn name(&self) -> &str;
}
