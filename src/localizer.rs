//! Position estimation from receiver geometry and TDOA measurements.
//!
//! The current solver returns the receiver centroid with an uncertainty
//! radius derived from measurement confidence and receiver spacing. It is a
//! placeholder for a hyperbolic least-squares fit; a future solver consumes
//! the same measurement list through the same interface, so only this module
//! changes.

use serde::Serialize;

use crate::geo::{self, Location};
use crate::receiver::ReceiverInfo;
use crate::tdoa::TdoaMeasurement;

/// Lower clamp for the error radius in meters.
pub const MIN_ERROR_RADIUS_M: f64 = 10.0;

/// Upper clamp for the error radius in meters.
pub const MAX_ERROR_RADIUS_M: f64 = 5_000.0;

/// Estimated transmitter position with uncertainty.
#[derive(Debug, Clone, Serialize)]
pub struct PositionEstimate {
    pub location: Location,
    /// Mean confidence of the measurements that drove the estimate.
    pub confidence: f64,
    /// Radius of uncertainty in meters, clamped to
    /// `[MIN_ERROR_RADIUS_M, MAX_ERROR_RADIUS_M]`.
    pub error_radius_m: f64,
}

/// Estimate the transmitter position.
///
/// The error radius scales inversely with confidence and with receiver
/// spacing: tightly clustered receivers dilute geometric precision, so a
/// kilometer-scale spacing is treated as the neutral baseline.
pub fn localize(receivers: &[ReceiverInfo], measurements: &[TdoaMeasurement]) -> PositionEstimate {
    if measurements.len() < 3 {
        log::warn!(
            "only {} TDOA measurements available; position quality will suffer",
            measurements.len()
        );
    }

    let count = receivers.len() as f64;
    let location = Location {
        latitude: receivers.iter().map(|r| r.location.latitude).sum::<f64>() / count,
        longitude: receivers.iter().map(|r| r.location.longitude).sum::<f64>() / count,
        altitude: 0.0,
    };

    let confidence = if measurements.is_empty() {
        0.0
    } else {
        measurements.iter().map(|m| m.confidence).sum::<f64>() / measurements.len() as f64
    };

    let mut spacing_sum = 0.0;
    let mut spacing_count = 0usize;
    for i in 0..receivers.len() {
        for j in (i + 1)..receivers.len() {
            spacing_sum += geo::haversine_distance(&receivers[i].location, &receivers[j].location);
            spacing_count += 1;
        }
    }
    let avg_spacing_m = spacing_sum / spacing_count.max(1) as f64;

    let base_error_m = 100.0 / confidence;
    let gdop_factor = 1_000.0 / avg_spacing_m;
    let raw_radius = base_error_m * gdop_factor;
    let error_radius_m = if raw_radius.is_finite() {
        raw_radius.clamp(MIN_ERROR_RADIUS_M, MAX_ERROR_RADIUS_M)
    } else {
        MAX_ERROR_RADIUS_M
    };

    log::info!(
        "estimate ({:.6}, {:.6}), confidence {confidence:.3}, error radius {error_radius_m:.0} m",
        location.latitude,
        location.longitude
    );

    PositionEstimate {
        location,
        confidence,
        error_radius_m,
    }
}
