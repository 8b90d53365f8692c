//! Probability heatmap around the position estimate.
//!
//! A fixed 20x20 grid spans one error radius in every direction from the
//! estimate. Each grid point gets a Gaussian probability in the great-circle
//! distance from the center, with the error radius as the standard
//! deviation. Points below the noise floor are dropped.

use serde::Serialize;

use crate::geo::{self, Location};

/// Grid points per axis.
pub const GRID_SIZE: usize = 20;

/// Points at or below this probability are omitted from the output.
const MIN_PROBABILITY: f64 = 0.01;

/// One emitted grid point.
#[derive(Debug, Clone, Serialize)]
pub struct HeatmapPoint {
    pub location: Location,
    /// Gaussian probability in `(0, 1]`.
    pub probability: f64,
}

/// Evaluate the probability grid around `center`.
pub fn generate_heatmap(center: &Location, error_radius_m: f64) -> Vec<HeatmapPoint> {
    let step_m = 2.0 * error_radius_m / GRID_SIZE as f64;
    let variance_term = 2.0 * error_radius_m * error_radius_m;

    let mut points = Vec::with_capacity(GRID_SIZE * GRID_SIZE);
    for row in 0..GRID_SIZE {
        let dy_north = -error_radius_m + row as f64 * step_m;
        for col in 0..GRID_SIZE {
            let dx_east = -error_radius_m + col as f64 * step_m;
            let location = geo::offset_by_meters(center, dx_east, dy_north);
            let distance_m = geo::haversine_distance(center, &location);
            let probability = (-distance_m * distance_m / variance_term).exp();
            if probability > MIN_PROBABILITY {
                points.push(HeatmapPoint {
                    location,
                    probability,
                });
            }
        }
    }
    points
}
