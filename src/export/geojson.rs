//! GeoJSON export (RFC 7946 FeatureCollection).
//!
//! One deviation from the RFC: the top-level object carries a `properties`
//! member summarizing the run. Consumers generally tolerate unknown
//! members, and it keeps the run metadata next to the features.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use serde_json::{json, Value};

use crate::error::Result;
use crate::export::{export_error, RESULT_TITLE};
use crate::geo::{self, Location};
use crate::heatmap::HeatmapPoint;
use crate::processor::LocationResult;
use crate::receiver::ReceiverSummary;
use crate::tdoa::TdoaMeasurement;

/// Vertices of the error-circle polygon ring (before closing).
const ERROR_RING_VERTICES: usize = 64;

/// Heatmap points at or below this probability are left out of the export.
const HEATMAP_EXPORT_FLOOR: f64 = 0.1;

/// Serialize the result as a GeoJSON file.
pub fn write_geojson(result: &LocationResult, path: &Path) -> Result<()> {
    let document = build_document(result);
    let file = File::create(path)
        .map_err(|e| export_error(&format!("failed to create '{}'", path.display()), e))?;
    serde_json::to_writer_pretty(BufWriter::new(file), &document)
        .map_err(|e| export_error("GeoJSON serialization failed", e))?;
    Ok(())
}

pub(crate) fn build_document(result: &LocationResult) -> Value {
    let mut features = vec![transmitter_feature(result), error_circle_feature(result)];
    for receiver in &result.receivers {
        features.push(receiver_feature(receiver));
    }
    for measurement in &result.measurements {
        if let Some(feature) = baseline_feature(result, measurement) {
            features.push(feature);
        }
    }
    for point in &result.heatmap {
        if point.probability > HEATMAP_EXPORT_FLOOR {
            features.push(heatmap_feature(point));
        }
    }

    json!({
        "type": "FeatureCollection",
        "properties": {
            "title": RESULT_TITLE,
            "algorithm": result.algorithm.as_str(),
            "frequency_mhz": result.frequency_hz as f64 / 1e6,
            "confidence": result.confidence,
            "error_radius_m": result.error_radius_m,
            "processing_time": result.processing_time.to_rfc3339(),
        },
        "features": features,
    })
}

fn coordinates(location: &Location) -> Value {
    json!([location.longitude, location.latitude])
}

fn transmitter_feature(result: &LocationResult) -> Value {
    json!({
        "type": "Feature",
        "geometry": {
            "type": "Point",
            "coordinates": coordinates(&result.location),
        },
        "properties": {
            "kind": "transmitter",
            "confidence": result.confidence,
            "error_radius_m": result.error_radius_m,
        },
    })
}

fn error_circle_feature(result: &LocationResult) -> Value {
    let mut ring: Vec<Value> =
        geo::circle_vertices(&result.location, result.error_radius_m, ERROR_RING_VERTICES)
            .iter()
            .map(coordinates)
            .collect();
    // GeoJSON rings close explicitly.
    if let Some(first) = ring.first().cloned() {
        ring.push(first);
    }

    json!({
        "type": "Feature",
        "geometry": {
            "type": "Polygon",
            "coordinates": [ring],
        },
        "properties": {
            "kind": "error-area",
            "radius_m": result.error_radius_m,
        },
    })
}

fn receiver_feature(receiver: &ReceiverSummary) -> Value {
    json!({
        "type": "Feature",
        "geometry": {
            "type": "Point",
            "coordinates": coordinates(&receiver.location),
        },
        "properties": {
            "kind": "receiver",
            "id": receiver.id,
            "snr_db": receiver.snr_db,
            "source_file": receiver.source_file,
        },
    })
}

/// Baseline between a measurement's receiver pair. Skipped (with a warning)
/// if either endpoint is missing from the result's receiver list.
fn baseline_feature(result: &LocationResult, measurement: &TdoaMeasurement) -> Option<Value> {
    let endpoint = |id: &str| {
        result
            .receivers
            .iter()
            .find(|r| r.id == id)
            .map(|r| r.location)
    };
    let (Some(first), Some(second)) = (
        endpoint(&measurement.receiver1_id),
        endpoint(&measurement.receiver2_id),
    ) else {
        log::warn!(
            "baseline {}-{} references an unknown receiver",
            measurement.receiver1_id,
            measurement.receiver2_id
        );
        return None;
    };

    Some(json!({
        "type": "Feature",
        "geometry": {
            "type": "LineString",
            "coordinates": [coordinates(&first), coordinates(&second)],
        },
        "properties": {
            "kind": "baseline",
            "receivers": format!("{}-{}", measurement.receiver1_id, measurement.receiver2_id),
            "time_diff_ns": measurement.time_diff_ns,
            "distance_diff_m": measurement.distance_diff_m,
            "confidence": measurement.confidence,
            "correlation_peak": measurement.correlation_peak,
        },
    }))
}

fn heatmap_feature(point: &HeatmapPoint) -> Value {
    json!({
        "type": "Feature",
        "geometry": {
            "type": "Point",
            "coordinates": coordinates(&point.location),
        },
        "properties": {
            "kind": "heatmap",
            "probability": point.probability,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil;

    fn feature_kinds(document: &Value) -> Vec<&str> {
        document["features"]
            .as_array()
            .unwrap()
            .iter()
            .map(|f| f["properties"]["kind"].as_str().unwrap())
            .collect()
    }

    #[test]
    fn test_document_feature_inventory() {
        let result = testutil::sample_result();
        let document = build_document(&result);

        assert_eq!(document["type"], "FeatureCollection");
        let kinds = feature_kinds(&document);
        assert_eq!(kinds.iter().filter(|k| **k == "transmitter").count(), 1);
        assert_eq!(kinds.iter().filter(|k| **k == "error-area").count(), 1);
        assert_eq!(kinds.iter().filter(|k| **k == "receiver").count(), 3);
        assert_eq!(kinds.iter().filter(|k| **k == "baseline").count(), 3);

        let properties = &document["properties"];
        assert_eq!(properties["algorithm"], "heatmap");
        assert!(properties["processing_time"].as_str().unwrap().contains('T'));
        assert!((properties["frequency_mhz"].as_f64().unwrap() - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_error_ring_is_closed() {
        let result = testutil::sample_result();
        let document = build_document(&result);

        let polygon = document["features"]
            .as_array()
            .unwrap()
            .iter()
            .find(|f| f["geometry"]["type"] == "Polygon")
            .unwrap();
        let ring = polygon["geometry"]["coordinates"][0].as_array().unwrap();
        assert_eq!(ring.len(), ERROR_RING_VERTICES + 1);
        assert_eq!(ring.first(), ring.last());
    }

    #[test]
    fn test_low_probability_heatmap_points_excluded() {
        let result = testutil::sample_result();
        let document = build_document(&result);

        let heatmap_probabilities: Vec<f64> = document["features"]
            .as_array()
            .unwrap()
            .iter()
            .filter(|f| f["properties"]["kind"] == "heatmap")
            .map(|f| f["properties"]["probability"].as_f64().unwrap())
            .collect();
        assert!(!heatmap_probabilities.is_empty());
        assert!(heatmap_probabilities.iter().all(|p| *p > 0.1));
        // The fixture contains points at and below the floor that must not
        // survive.
        assert!(
            heatmap_probabilities.len() < result.heatmap.len(),
            "floor did not filter anything"
        );
    }

    #[test]
    fn test_file_round_trips_as_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("result.geojson");
        let result = testutil::sample_result();

        write_geojson(&result, &path).unwrap();
        let reparsed: Value =
            serde_json::from_reader(std::fs::File::open(&path).unwrap()).unwrap();
        assert_eq!(reparsed["type"], "FeatureCollection");
        assert!(reparsed["features"].as_array().unwrap().len() >= 8);
    }
}
