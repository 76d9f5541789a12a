//! Offline provider that routes in a straight line.
//!
//! Useful for simulation and tests: every request succeeds (unless a maximum
//! distance is set) with a two-point route from origin to destination.

use std::time::Duration;

use super::{RouteRequest, RoutingError, RoutingProvider};
use crate::eta::EtaConfig;
use crate::geo::{bearing, haversine_distance};
use crate::progress::{Instruction, Maneuver, Route, RoutePolyline};

/// Straight-line route synthesizer.
#[derive(Debug, Clone, Default)]
pub struct StraightLineProvider {
    latency: Option<Duration>,
    max_distance_m: Option<f64>,
}

impl StraightLineProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every response, to mimic a network round trip.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Refuse routes longer than this with [`RoutingError::NoRoute`].
    pub fn with_max_distance(mut self, max_distance_m: f64) -> Self {
        self.max_distance_m = Some(max_distance_m);
        self
    }

    /// Build the route synchronously.
    pub fn build_route(&self, request: &RouteRequest) -> Result<Route, RoutingError> {
        let distance_m = haversine_distance(&request.origin, &request.destination);
        if let Some(max) = self.max_distance_m {
            if distance_m > max {
                return Err(RoutingError::NoRoute(format!(
                    "{:.0}m exceeds the {:.0}m limit",
                    distance_m, max
                )));
            }
        }

        let speed_kmh = EtaConfig::for_travel(request.profile).fallback_speed_kmh;
        let duration_s = distance_m / 1000.0 / speed_kmh * 3600.0;
        let heading = cardinal(bearing(&request.origin, &request.destination));

        let instructions = vec![
            Instruction::new(format!("Head {}", heading), Maneuver::Depart)
                .with_distance(distance_m, duration_s)
                .at_waypoint(0),
            Instruction::new("Arrive at destination", Maneuver::Arrive).at_waypoint(1),
        ];
        let polyline = RoutePolyline::new(vec![request.origin, request.destination])?;

        Ok(Route::new(polyline, instructions, distance_m, duration_s)?)
    }
}

impl RoutingProvider for StraightLineProvider {
    async fn request_route(&self, request: &RouteRequest) -> Result<Route, RoutingError> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        self.build_route(request)
    }

    fn name(&self) -> &str {
        "straight-line"
    }
}

/// Eight-point compass name for a bearing.
fn cardinal(bearing_deg: f64) -> &'static str {
    const NAMES: [&str; 8] = [
        "north",
        "northeast",
        "east",
        "southeast",
        "south",
        "southwest",
        "west",
        "northwest",
    ];
    let index = ((bearing_deg.rem_euclid(360.0) + 22.5) / 45.0) as usize % 8;
    NAMES[index]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TravelProfile;
    use crate::geo::{offset, Coordinate};

    fn request(distance_m: f64, bearing_deg: f64, profile: TravelProfile) -> RouteRequest {
        let origin = Coordinate::new(59.3293, 18.0686).unwrap();
        RouteRequest::new(origin, offset(&origin, bearing_deg, distance_m), profile)
    }

    #[tokio::test]
    async fn test_builds_two_point_route() {
        let provider = StraightLineProvider::new();
        let route = provider
            .request_route(&request(1_000.0, 90.0, TravelProfile::Walking))
            .await
            .unwrap();

        assert_eq!(route.polyline.len(), 2);
        assert!((route.distance_m - 1_000.0).abs() < 1.0);
        // 1 km at 5 km/h
        assert!((route.duration_s - 720.0).abs() < 1.0);
        assert_eq!(route.instructions[0].text, "Head east");
        assert_eq!(route.instructions[1].maneuver, Maneuver::Arrive);
    }

    #[tokio::test]
    async fn test_max_distance_refuses() {
        let provider = StraightLineProvider::new().with_max_distance(500.0);
        let result = provider
            .request_route(&request(2_000.0, 0.0, TravelProfile::Cycling))
            .await;
        assert!(matches!(result, Err(RoutingError::NoRoute(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_latency_is_applied() {
        let provider = StraightLineProvider::new().with_latency(Duration::from_secs(2));
        let started = tokio::time::Instant::now();
        provider
            .request_route(&request(100.0, 0.0, TravelProfile::Driving))
            .await
            .unwrap();
        assert!(started.elapsed() >= Duration::from_secs(2));
    }

    #[test]
    fn test_cardinal_names() {
        assert_eq!(cardinal(0.0), "north");
        assert_eq!(cardinal(359.0), "north");
        assert_eq!(cardinal(44.0), "northeast");
        assert_eq!(cardinal(180.0), "south");
        assert_eq!(cardinal(270.0), "west");
    }
}
