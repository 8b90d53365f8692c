//! Shared fixtures for unit tests: deterministic test signals, metadata, and
//! receiver sets.
//!
//! Test signals are band-limited multi-tone mixes rather than white noise:
//! the multi-resolution search decimates without filtering, so it needs a
//! correlation peak wide enough to survive an 8:1 decimation. Thirty tones
//! between 0.004 and 0.02 cycles/sample with fixed pseudo-random phases give
//! a smooth, aperiodic signal whose autocorrelation peaks sharply at zero
//! and decays within a few tens of samples.

use std::f64::consts::TAU;

use chrono::DateTime;
use num_complex::Complex32;

use crate::capture::{constants, Metadata};
use crate::geo::Location;
use crate::heatmap::HeatmapPoint;
use crate::processor::{Algorithm, LocationResult};
use crate::receiver::{ReceiverInfo, ReceiverSummary};
use crate::tdoa::TdoaMeasurement;

const TONE_COUNT: usize = 30;

/// Route `log` output through the test harness; safe to call repeatedly.
pub(crate) fn init_test_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Deterministic real-valued band-limited signal; `offset` selects the
/// starting sample so shifted copies can be cut from one long run.
pub(crate) fn band_noise(len: usize, offset: usize) -> Vec<Complex32> {
    band_noise_seeded(len, offset, 0x2545_F491_4F6C_DD1D)
}

/// Like [`band_noise`] with an explicit phase seed, for generating mutually
/// uncorrelated signals.
pub(crate) fn band_noise_seeded(len: usize, offset: usize, seed: u64) -> Vec<Complex32> {
    let mut phases = [0.0f64; TONE_COUNT];
    let mut state = seed;
    for phase in phases.iter_mut() {
        state = state
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);
        *phase = (state >> 11) as f64 / (1u64 << 53) as f64 * TAU;
    }

    (0..len)
        .map(|i| {
            let n = (offset + i) as f64;
            let mut value = 0.0;
            for (j, phase) in phases.iter().enumerate() {
                let freq = 0.004 + 0.016 * j as f64 / (TONE_COUNT - 1) as f64;
                value += (TAU * freq * n + phase).sin();
            }
            Complex32::new((value / TONE_COUNT as f64) as f32, 0.0)
        })
        .collect()
}

pub(crate) fn metadata(
    frequency: u64,
    sample_rate: u32,
    gps_location: Location,
    collection_secs: i64,
    sample_count: u32,
) -> Metadata {
    Metadata {
        file_format_version: constants::FORMAT_VERSION,
        frequency,
        sample_rate,
        collection_time: DateTime::from_timestamp(collection_secs, 0).unwrap(),
        gps_location,
        gps_timestamp: DateTime::from_timestamp(collection_secs, 0).unwrap(),
        device_info: "rtl-sdr test rig".to_string(),
        collection_id: "unit-test".to_string(),
        sample_count,
    }
}

fn triangle_locations(side_deg: f64) -> [Location; 3] {
    [
        Location::new(0.0, 0.0, 0.0),
        Location::new(0.0, side_deg, 0.0),
        Location::new(side_deg, 0.0, 0.0),
    ]
}

fn receiver(index: usize, location: Location, meta: Metadata, samples: Vec<Complex32>) -> ReceiverInfo {
    ReceiverInfo {
        id: format!("R{}", index + 1),
        location,
        source_file: format!("rx{index}.dat").into(),
        snr_db: 10.0,
        metadata: meta,
        samples,
    }
}

/// Three receivers on a right triangle, all hearing the same signal.
pub(crate) fn receiver_triangle(
    frequency: u64,
    sample_rate: u32,
    sample_count: usize,
) -> Vec<ReceiverInfo> {
    let signal = band_noise(sample_count, 0);
    triangle_locations(0.001)
        .into_iter()
        .enumerate()
        .map(|(index, location)| {
            let meta = metadata(
                frequency,
                sample_rate,
                location,
                1_700_000_000,
                sample_count as u32,
            );
            receiver(index, location, meta, signal.clone())
        })
        .collect()
}

/// Like [`receiver_triangle`] with a configurable side length in degrees.
pub(crate) fn receiver_triangle_at(
    side_deg: f64,
    frequency: u64,
    sample_rate: u32,
    sample_count: usize,
) -> Vec<ReceiverInfo> {
    let signal = band_noise(sample_count, 0);
    triangle_locations(side_deg)
        .into_iter()
        .enumerate()
        .map(|(index, location)| {
            let meta = metadata(
                frequency,
                sample_rate,
                location,
                1_700_000_000,
                sample_count as u32,
            );
            receiver(index, location, meta, signal.clone())
        })
        .collect()
}

/// Triangle where the third receiver's capture lags the others by
/// `shift` samples.
pub(crate) fn receiver_triangle_with_shift(
    frequency: u64,
    sample_rate: u32,
    sample_count: usize,
    shift: usize,
) -> Vec<ReceiverInfo> {
    let full = band_noise(sample_count + shift, 0);
    let synced = full[shift..].to_vec();
    let lagged = full[..sample_count].to_vec();

    triangle_locations(0.001)
        .into_iter()
        .enumerate()
        .map(|(index, location)| {
            let samples = if index == 2 {
                lagged.clone()
            } else {
                synced.clone()
            };
            let meta = metadata(
                frequency,
                sample_rate,
                location,
                1_700_000_000,
                sample_count as u32,
            );
            receiver(index, location, meta, samples)
        })
        .collect()
}

/// Triangle where every receiver hears an unrelated signal.
pub(crate) fn receiver_triangle_independent(
    frequency: u64,
    sample_rate: u32,
    sample_count: usize,
) -> Vec<ReceiverInfo> {
    triangle_locations(0.001)
        .into_iter()
        .enumerate()
        .map(|(index, location)| {
            let seed = 0x9E37_79B9_0000_0001u64 ^ ((index as u64 + 1) << 17);
            let samples = band_noise_seeded(sample_count, 0, seed);
            let meta = metadata(
                frequency,
                sample_rate,
                location,
                1_700_000_000,
                sample_count as u32,
            );
            receiver(index, location, meta, samples)
        })
        .collect()
}

/// Fully populated result fixture for exporter tests.
pub(crate) fn sample_result() -> LocationResult {
    let center = Location::new(0.000333, 0.000333, 0.0);
    let receivers: Vec<ReceiverSummary> = triangle_locations(0.001)
        .into_iter()
        .enumerate()
        .map(|(index, location)| ReceiverSummary {
            id: format!("R{}", index + 1),
            location,
            source_file: format!("rx{index}.dat"),
            snr_db: 12.5 + index as f64,
        })
        .collect();

    let pair = |a: usize, b: usize, time_diff_ns: f64, confidence: f64| TdoaMeasurement {
        receiver1_id: format!("R{a}"),
        receiver2_id: format!("R{b}"),
        time_diff_ns,
        distance_diff_m: time_diff_ns * crate::tdoa::SPEED_OF_LIGHT_M_S / 1e9,
        confidence,
        correlation_peak: confidence,
    };

    // Includes points at and below the GeoJSON export floor on purpose.
    let heatmap = vec![
        HeatmapPoint {
            location: center,
            probability: 1.0,
        },
        HeatmapPoint {
            location: Location::new(0.0004, 0.0004, 0.0),
            probability: 0.5,
        },
        HeatmapPoint {
            location: Location::new(0.0005, 0.0005, 0.0),
            probability: 0.1,
        },
        HeatmapPoint {
            location: Location::new(0.0006, 0.0006, 0.0),
            probability: 0.02,
        },
    ];

    LocationResult {
        algorithm: Algorithm::Heatmap,
        frequency_hz: 100_000_000,
        processing_time: DateTime::from_timestamp(1_700_000_100, 0).unwrap(),
        location: center,
        confidence: 0.92,
        error_radius_m: 150.0,
        receivers,
        measurements: vec![
            pair(1, 2, 0.0, 0.95),
            pair(1, 3, 250.0, 0.9),
            pair(2, 3, -250.0, 0.91),
        ],
        heatmap,
        used_fallback: false,
    }
}
