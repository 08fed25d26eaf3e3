//! Domain models shared across Fleet Gateway services
//!
//! Routes are external, read-only entities from the relay's perspective: the
//! catalog owns them, the relay only resolves and lists them. Coordinates are
//! WGS84 decimal degrees.

use serde::{Deserialize, Serialize};
use validator::Validate;

/// A geographic coordinate
///
/// Serializes as a `{lat, lng}` object in catalog payloads; the viewer wire
/// protocol carries positions as `[lat, lng]` pairs, converted via the array
/// impls below.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Validate)]
pub struct Position {
    /// Latitude in decimal degrees
    #[validate(range(min = -90.0, max = 90.0))]
    pub lat: f64,

    /// Longitude in decimal degrees
    #[validate(range(min = -180.0, max = 180.0))]
    pub lng: f64,
}

impl Position {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

impl From<[f64; 2]> for Position {
    fn from(pair: [f64; 2]) -> Self {
        Self {
            lat: pair[0],
            lng: pair[1],
        }
    }
}

impl From<Position> for [f64; 2] {
    fn from(position: Position) -> Self {
        [position.lat, position.lng]
    }
}

/// A predefined journey with fixed start and end positions
///
/// Immutable once created; the relay never mutates routes, it only binds
/// viewer sessions to them while tracking is active.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Route {
    /// Unique route identifier
    #[validate(length(min = 1, max = 64))]
    pub route_id: String,

    /// Display name shown to viewers
    #[validate(length(min = 1, max = 255))]
    pub title: String,

    /// Where the vehicle departs
    #[validate]
    pub start_position: Position,

    /// Where the route ends
    #[validate]
    pub end_position: Position,
}

impl Route {
    pub fn new(
        route_id: impl Into<String>,
        title: impl Into<String>,
        start_position: Position,
        end_position: Position,
    ) -> Self {
        Self {
            route_id: route_id.into(),
            title: title.into(),
            start_position,
            end_position,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_route() -> Route {
        Route::new(
            "r1",
            "Harbor loop",
            Position::new(-23.5506, -46.6333),
            Position::new(-23.5424, -46.6297),
        )
    }

    #[test]
    fn test_valid_route_passes_validation() {
        assert!(sample_route().validate().is_ok());
    }

    #[test]
    fn test_latitude_out_of_range_fails_validation() {
        let mut route = sample_route();
        route.start_position.lat = 91.0;
        assert!(route.validate().is_err());
    }

    #[test]
    fn test_empty_route_id_fails_validation() {
        let mut route = sample_route();
        route.route_id = String::new();
        assert!(route.validate().is_err());
    }

    #[test]
    fn test_route_serializes_camel_case() {
        let json = serde_json::to_value(sample_route()).unwrap();
        assert_eq!(json["routeId"], "r1");
        assert!(json["startPosition"]["lat"].is_f64());
        assert!(json["endPosition"]["lng"].is_f64());
    }

    #[test]
    fn test_position_pair_conversion_is_lat_first() {
        let position = Position::from([10.0, 20.0]);
        assert_eq!(position.lat, 10.0);
        assert_eq!(position.lng, 20.0);

        let pair: [f64; 2] = position.into();
        assert_eq!(pair, [10.0, 20.0]);
    }

    #[test]
    fn test_position_serializes_as_object() {
        let json = serde_json::to_string(&Position::new(1.5, -2.5)).unwrap();
        assert_eq!(json, r#"{"lat":1.5,"lng":-2.5}"#);
    }
}
