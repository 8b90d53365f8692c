//! Geographic math helpers: great-circle distance and small-offset
//! meter/degree conversions.
//!
//! All positions are WGS-84 latitude/longitude in degrees with altitude in
//! meters. The meter-to-degree conversions use the flat-earth small-offset
//! approximation (111 km per degree, longitude scaled by cos(latitude)),
//! which is what the error-circle and heatmap grids need at the scales
//! involved (tens of meters to a few kilometers).

use serde::{Deserialize, Serialize};

/// Mean Earth radius in meters, used by the haversine formula.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Approximate meters per degree of latitude.
pub const METERS_PER_DEGREE: f64 = 111_000.0;

/// A geographic position.
///
/// Invariants: `-90 <= latitude <= 90`, `-180 <= longitude <= 180`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    /// Latitude in degrees, positive north.
    pub latitude: f64,
    /// Longitude in degrees, positive east.
    pub longitude: f64,
    /// Altitude in meters above the ellipsoid.
    pub altitude: f64,
}

impl Location {
    pub fn new(latitude: f64, longitude: f64, altitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            altitude,
        }
    }
}

/// Great-circle distance between two locations in meters.
///
/// Altitude is ignored; the haversine formula operates on the sphere surface.
pub fn haversine_distance(a: &Location, b: &Location) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let dlat = (b.latitude - a.latitude).to_radians();
    let dlon = (b.longitude - a.longitude).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * h.sqrt().asin()
}

/// Offset a location by `dx_east` / `dy_north` meters.
///
/// The longitude step is scaled by the cosine of the center latitude, so the
/// approximation degrades near the poles.
pub fn offset_by_meters(center: &Location, dx_east: f64, dy_north: f64) -> Location {
    let lat_offset = dy_north / METERS_PER_DEGREE;
    let lon_offset = dx_east / (METERS_PER_DEGREE * center.latitude.to_radians().cos());
    Location {
        latitude: center.latitude + lat_offset,
        longitude: center.longitude + lon_offset,
        altitude: center.altitude,
    }
}

/// Generate `vertex_count` points on a circle of `radius_m` meters around
/// `center`, at equally spaced angles in `[0, 2*pi)`.
///
/// The ring is open; callers that need a closed ring (GeoJSON/KML polygons)
/// repeat the first vertex themselves.
pub fn circle_vertices(center: &Location, radius_m: f64, vertex_count: usize) -> Vec<Location> {
    let cos_lat = center.latitude.to_radians().cos();
    (0..vertex_count)
        .map(|i| {
            let theta = 2.0 * std::f64::consts::PI * i as f64 / vertex_count as f64;
            Location {
                latitude: center.latitude + (radius_m / METERS_PER_DEGREE) * theta.sin(),
                longitude: center.longitude
                    + (radius_m / (METERS_PER_DEGREE * cos_lat)) * theta.cos(),
                altitude: center.altitude,
            }
        })
        .collect()
}
