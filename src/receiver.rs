//! Receiver loading and cross-validation.
//!
//! Each capture file becomes one `ReceiverInfo` record owning its sample
//! buffer. Loads run sequentially in input order; receiver ids are assigned
//! positionally (`R1`, `R2`, ...). After loading, the set is validated as a
//! whole: a usable TDOA geometry needs at least three receivers tuned
//! identically, spaced apart, and synchronized in time.

use std::path::{Path, PathBuf};

use num_complex::Complex32;
use serde::Serialize;

use crate::capture::{read_capture, Metadata};
use crate::error::{Error, Result};
use crate::geo::{self, Location};
use crate::progress::ProgressReporter;

/// Minimum number of receivers for a TDOA solution.
pub const MIN_RECEIVERS: usize = 3;

/// Minimum usable baseline between any receiver pair in meters.
pub const MIN_PAIR_DISTANCE_M: f64 = 10.0;

/// Maximum capture start-time drift from the first receiver in seconds.
pub const MAX_TIME_DRIFT_S: f64 = 1.0;

/// One loaded receiver with its sample buffer.
///
/// The buffer is owned for the duration of processing and dropped once
/// localization no longer needs it; results carry a [`ReceiverSummary`]
/// instead.
#[derive(Debug, Clone)]
pub struct ReceiverInfo {
    /// Positional id, `R1` through `RN` in input order.
    pub id: String,
    /// GPS position recorded in the capture header.
    pub location: Location,
    /// Path the capture was loaded from.
    pub source_file: PathBuf,
    /// Estimated signal-to-noise ratio in dB.
    pub snr_db: f64,
    /// Full capture header.
    pub metadata: Metadata,
    /// IQ samples in capture order.
    pub samples: Vec<Complex32>,
}

/// Sample-free receiver record carried in results and exports.
#[derive(Debug, Clone, Serialize)]
pub struct ReceiverSummary {
    pub id: String,
    pub location: Location,
    pub source_file: String,
    pub snr_db: f64,
}

impl ReceiverInfo {
    pub fn summary(&self) -> ReceiverSummary {
        ReceiverSummary {
            id: self.id.clone(),
            location: self.location,
            source_file: self.source_file.display().to_string(),
            snr_db: self.snr_db,
        }
    }
}

/// Load all capture files into receiver records and validate the set.
pub fn load_receivers(
    paths: &[PathBuf],
    progress: &dyn ProgressReporter,
) -> Result<Vec<ReceiverInfo>> {
    if paths.len() < MIN_RECEIVERS {
        return Err(Error::TooFewInputs { count: paths.len() });
    }

    let mut receivers = Vec::with_capacity(paths.len());
    for (index, path) in paths.iter().enumerate() {
        progress.update_subprogress(
            index as f64 / paths.len() as f64,
            &format!("reading {}", path.display()),
        );
        receivers.push(load_receiver(path, index)?);
    }
    validate_receivers(&receivers)?;
    Ok(receivers)
}

fn load_receiver(path: &Path, index: usize) -> Result<ReceiverInfo> {
    let (metadata, samples) = read_capture(path)?;
    let snr_db = estimate_snr_db(&samples);
    log::info!(
        "loaded {} ({} samples @ {} Hz, {:.1} dB SNR)",
        path.display(),
        samples.len(),
        metadata.sample_rate,
        snr_db
    );
    Ok(ReceiverInfo {
        id: format!("R{}", index + 1),
        location: metadata.gps_location,
        source_file: path.to_path_buf(),
        snr_db,
        metadata,
        samples,
    })
}

/// Estimate SNR in dB from sample powers.
///
/// The noise floor is taken as the mean of the weakest quartile of sample
/// powers; the ratio of average power to that floor approximates SNR for
/// bursty signals. Degenerate inputs (under 4 samples, zero floor) report
/// 0 dB.
pub fn estimate_snr_db(samples: &[Complex32]) -> f64 {
    if samples.len() < 4 {
        return 0.0;
    }

    let mut power: Vec<f64> = samples
        .iter()
        .map(|s| (s.re as f64).powi(2) + (s.im as f64).powi(2))
        .collect();
    let avg_power = power.iter().sum::<f64>() / power.len() as f64;

    power.sort_unstable_by(f64::total_cmp);
    let quartile = &power[..power.len() / 4];
    let noise_floor = quartile.iter().sum::<f64>() / quartile.len() as f64;

    if noise_floor > 0.0 {
        10.0 * (avg_power / noise_floor).log10()
    } else {
        0.0
    }
}

/// Check that the loaded receivers form a usable TDOA set.
pub fn validate_receivers(receivers: &[ReceiverInfo]) -> Result<()> {
    if receivers.len() < MIN_RECEIVERS {
        return Err(Error::TooFewInputs {
            count: receivers.len(),
        });
    }

    let first = &receivers[0].metadata;
    for receiver in &receivers[1..] {
        if receiver.metadata.frequency != first.frequency {
            return Err(Error::IncompatibleReceivers { field: "frequency" });
        }
        if receiver.metadata.sample_rate != first.sample_rate {
            return Err(Error::IncompatibleReceivers {
                field: "sample_rate",
            });
        }
    }

    for i in 0..receivers.len() {
        for j in (i + 1)..receivers.len() {
            let distance_m =
                geo::haversine_distance(&receivers[i].location, &receivers[j].location);
            if distance_m < MIN_PAIR_DISTANCE_M {
                return Err(Error::ReceiversTooClose {
                    distance_m,
                    min_m: MIN_PAIR_DISTANCE_M,
                });
            }
        }
    }

    for receiver in &receivers[1..] {
        let drift = receiver.metadata.collection_time - first.collection_time;
        let drift_s = drift.num_milliseconds().abs() as f64 / 1_000.0;
        if drift_s > MAX_TIME_DRIFT_S {
            return Err(Error::TimeSyncFailure {
                drift_s,
                limit_s: MAX_TIME_DRIFT_S,
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil;

    #[test]
    fn test_snr_of_constant_power_is_zero() {
        // Every sample has the same power, so floor == average.
        let samples = vec![Complex32::new(0.6, 0.8); 1_000];
        assert!(estimate_snr_db(&samples).abs() < 1e-9);
    }

    #[test]
    fn test_snr_positive_for_bursty_signal() {
        // Three quarters silence-ish, one quarter strong signal.
        let mut samples = vec![Complex32::new(0.01, 0.0); 750];
        samples.extend(vec![Complex32::new(1.0, 0.0); 250]);
        let snr = estimate_snr_db(&samples);
        assert!(snr > 20.0, "got {snr}");
    }

    #[test]
    fn test_snr_of_silence_is_zero() {
        let samples = vec![Complex32::new(0.0, 0.0); 100];
        assert_eq!(estimate_snr_db(&samples), 0.0);
    }

    #[test]
    fn test_validation_accepts_good_geometry() {
        let receivers = testutil::receiver_triangle(100_000_000, 2_000_000, 1_000);
        assert!(validate_receivers(&receivers).is_ok());
    }

    #[test]
    fn test_validation_rejects_frequency_mismatch() {
        let mut receivers = testutil::receiver_triangle(100_000_000, 2_000_000, 1_000);
        receivers[1].metadata.frequency = 101_000_000;
        assert!(matches!(
            validate_receivers(&receivers),
            Err(Error::IncompatibleReceivers { field: "frequency" })
        ));
    }

    #[test]
    fn test_validation_rejects_sample_rate_mismatch() {
        let mut receivers = testutil::receiver_triangle(100_000_000, 2_000_000, 1_000);
        receivers[2].metadata.sample_rate = 2_048_000;
        assert!(matches!(
            validate_receivers(&receivers),
            Err(Error::IncompatibleReceivers {
                field: "sample_rate"
            })
        ));
    }

    #[test]
    fn test_validation_rejects_coincident_receivers() {
        let mut receivers = testutil::receiver_triangle(100_000_000, 2_000_000, 1_000);
        let location = receivers[0].location;
        for receiver in &mut receivers {
            receiver.location = location;
        }
        assert!(matches!(
            validate_receivers(&receivers),
            Err(Error::ReceiversTooClose { .. })
        ));
    }

    #[test]
    fn test_validation_rejects_clock_drift() {
        let mut receivers = testutil::receiver_triangle(100_000_000, 2_000_000, 1_000);
        receivers[2].metadata.collection_time =
            receivers[2].metadata.collection_time + chrono::Duration::milliseconds(1_500);
        assert!(matches!(
            validate_receivers(&receivers),
            Err(Error::TimeSyncFailure { .. })
        ));
    }

    #[test]
    fn test_validation_rejects_pair_count_below_minimum() {
        let receivers = testutil::receiver_triangle(100_000_000, 2_000_000, 1_000);
        assert!(matches!(
            validate_receivers(&receivers[..2]),
            Err(Error::TooFewInputs { count: 2 })
        ));
    }
}
