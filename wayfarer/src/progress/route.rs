//! Route geometry and turn-by-turn instructions.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::geo::{haversine_distance, Coordinate, GeoError};

/// Errors constructing a route.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RouteError {
    /// A polyline needs at least one segment.
    #[error("route polyline needs at least 2 points, got {0}")]
    TooFewPoints(usize),

    /// A polyline point is outside the valid coordinate range.
    #[error("invalid polyline point {index}: {source}")]
    InvalidPoint {
        index: usize,
        #[source]
        source: GeoError,
    },

    /// An instruction references a polyline point that does not exist.
    #[error("instruction {step} references waypoint {waypoint} but polyline has {len} points")]
    WaypointOutOfRange {
        step: usize,
        waypoint: usize,
        len: usize,
    },
}

/// Ordered route geometry with precomputed segment lengths.
///
/// Serializes as a plain array of coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Coordinate>", into = "Vec<Coordinate>")]
pub struct RoutePolyline {
    points: Vec<Coordinate>,
    /// `segment_lengths[i]` is the length of `points[i]`→`points[i + 1]`.
    segment_lengths: Vec<f64>,
    /// `remaining_after[i]` is the summed length of all segments after `i`.
    remaining_after: Vec<f64>,
    total_m: f64,
}

impl RoutePolyline {
    pub fn new(points: Vec<Coordinate>) -> Result<Self, RouteError> {
        if points.len() < 2 {
            return Err(RouteError::TooFewPoints(points.len()));
        }
        for (index, point) in points.iter().enumerate() {
            Coordinate::new(point.latitude, point.longitude)
                .map_err(|source| RouteError::InvalidPoint { index, source })?;
        }

        let segment_lengths: Vec<f64> = points
            .windows(2)
            .map(|pair| haversine_distance(&pair[0], &pair[1]))
            .collect();

        let mut remaining_after = vec![0.0; segment_lengths.len()];
        for i in (0..segment_lengths.len().saturating_sub(1)).rev() {
            remaining_after[i] = remaining_after[i + 1] + segment_lengths[i + 1];
        }

        let total_m = segment_lengths.iter().sum();

        Ok(Self {
            points,
            segment_lengths,
            remaining_after,
            total_m,
        })
    }

    pub fn points(&self) -> &[Coordinate] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Always false; a polyline has at least two points.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn segment_count(&self) -> usize {
        self.segment_lengths.len()
    }

    /// Segment endpoints, `None` past the end.
    pub fn segment(&self, index: usize) -> Option<(&Coordinate, &Coordinate)> {
        Some((self.points.get(index)?, self.points.get(index + 1)?))
    }

    pub fn segment_length(&self, index: usize) -> f64 {
        self.segment_lengths.get(index).copied().unwrap_or(0.0)
    }

    /// Length of every segment after `index`.
    pub fn remaining_after(&self, index: usize) -> f64 {
        self.remaining_after.get(index).copied().unwrap_or(0.0)
    }

    /// Total geometric length (meters).
    pub fn total_length(&self) -> f64 {
        self.total_m
    }

    pub fn first(&self) -> &Coordinate {
        &self.points[0]
    }

    pub fn last(&self) -> &Coordinate {
        &self.points[self.points.len() - 1]
    }
}

impl TryFrom<Vec<Coordinate>> for RoutePolyline {
    type Error = RouteError;

    fn try_from(points: Vec<Coordinate>) -> Result<Self, Self::Error> {
        Self::new(points)
    }
}

impl From<RoutePolyline> for Vec<Coordinate> {
    fn from(polyline: RoutePolyline) -> Self {
        polyline.points
    }
}

/// Maneuver at the start of an instruction step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Maneuver {
    Depart,
    Straight,
    SlightLeft,
    SlightRight,
    TurnLeft,
    TurnRight,
    SharpLeft,
    SharpRight,
    KeepLeft,
    KeepRight,
    UTurn,
    Roundabout,
    Arrive,
    #[default]
    #[serde(other)]
    Unknown,
}

impl std::fmt::Display for Maneuver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Maneuver::Depart => "depart",
            Maneuver::Straight => "straight",
            Maneuver::SlightLeft => "slight left",
            Maneuver::SlightRight => "slight right",
            Maneuver::TurnLeft => "turn left",
            Maneuver::TurnRight => "turn right",
            Maneuver::SharpLeft => "sharp left",
            Maneuver::SharpRight => "sharp right",
            Maneuver::KeepLeft => "keep left",
            Maneuver::KeepRight => "keep right",
            Maneuver::UTurn => "u-turn",
            Maneuver::Roundabout => "roundabout",
            Maneuver::Arrive => "arrive",
            Maneuver::Unknown => "continue",
        };
        write!(f, "{}", s)
    }
}

/// One turn-by-turn step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instruction {
    pub text: String,
    /// Step length (meters).
    #[serde(alias = "distance", default)]
    pub distance_m: f64,
    /// Step duration (seconds).
    #[serde(alias = "duration", default)]
    pub duration_s: f64,
    #[serde(default, alias = "type")]
    pub maneuver: Maneuver,
    /// Polyline index where this step begins, when the router reports it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub waypoint_index: Option<usize>,
}

impl Instruction {
    pub fn new(text: impl Into<String>, maneuver: Maneuver) -> Self {
        Self {
            text: text.into(),
            distance_m: 0.0,
            duration_s: 0.0,
            maneuver,
            waypoint_index: None,
        }
    }

    pub fn with_distance(mut self, distance_m: f64, duration_s: f64) -> Self {
        self.distance_m = distance_m;
        self.duration_s = duration_s;
        self
    }

    pub fn at_waypoint(mut self, index: usize) -> Self {
        self.waypoint_index = Some(index);
        self
    }
}

/// A computed route as returned by a routing provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    #[serde(alias = "geometry")]
    pub polyline: RoutePolyline,
    #[serde(default)]
    pub instructions: Vec<Instruction>,
    /// Provider-reported total distance (meters).
    #[serde(alias = "distance", default)]
    pub distance_m: f64,
    /// Provider-reported total duration (seconds).
    #[serde(alias = "duration", default)]
    pub duration_s: f64,
}

impl Route {
    /// Build a route, checking that instruction waypoints exist.
    ///
    /// A non-positive `distance_m` is replaced by the polyline length.
    pub fn new(
        polyline: RoutePolyline,
        instructions: Vec<Instruction>,
        distance_m: f64,
        duration_s: f64,
    ) -> Result<Self, RouteError> {
        let route = Self {
            distance_m: if distance_m > 0.0 {
                distance_m
            } else {
                polyline.total_length()
            },
            polyline,
            instructions,
            duration_s,
        };
        route.validate()?;
        Ok(route)
    }

    /// Build a route from raw points.
    pub fn from_points(
        points: Vec<Coordinate>,
        instructions: Vec<Instruction>,
    ) -> Result<Self, RouteError> {
        let polyline = RoutePolyline::new(points)?;
        let duration_s = instructions.iter().map(|i| i.duration_s).sum();
        Self::new(polyline, instructions, 0.0, duration_s)
    }

    /// Check instruction waypoint indices against the polyline.
    pub fn validate(&self) -> Result<(), RouteError> {
        let len = self.polyline.len();
        for (step, instruction) in self.instructions.iter().enumerate() {
            if let Some(waypoint) = instruction.waypoint_index {
                if waypoint >= len {
                    return Err(RouteError::WaypointOutOfRange {
                        step,
                        waypoint,
                        len,
                    });
                }
            }
        }
        Ok(())
    }

    pub fn destination(&self) -> &Coordinate {
        self.polyline.last()
    }

    pub fn origin(&self) -> &Coordinate {
        self.polyline.first()
    }
}
