//! Pairwise TDOA analysis.
//!
//! Every ordered receiver pair `(i, j)` with `i < j` is cross-correlated and
//! the winning lag converted into a signed time difference of arrival. A
//! failed pair is logged and skipped rather than aborting the run; the
//! solver can work with whatever subset survives, and a run only fails when
//! no pair at all produced a measurement.

use std::sync::atomic::{AtomicUsize, Ordering};

use rayon::prelude::*;
use serde::Serialize;

use crate::correlation;
use crate::error::{Error, Result};
use crate::processor::CancelToken;
use crate::progress::ProgressReporter;
use crate::receiver::ReceiverInfo;

/// Speed of light in m/s, for converting time differences into range
/// differences.
pub const SPEED_OF_LIGHT_M_S: f64 = 299_792_458.0;

/// One pairwise TDOA measurement.
///
/// Invariant: `distance_diff_m == time_diff_ns * SPEED_OF_LIGHT_M_S / 1e9`.
/// The pair is ordered by receiver index, so each pair appears once.
#[derive(Debug, Clone, Serialize)]
pub struct TdoaMeasurement {
    pub receiver1_id: String,
    pub receiver2_id: String,
    /// Signed arrival-time difference in nanoseconds; positive when the
    /// signal reached `receiver2` later.
    pub time_diff_ns: f64,
    /// The same difference expressed as a range difference in meters.
    pub distance_diff_m: f64,
    /// Correlation-peak confidence in `[0, 1]`.
    pub confidence: f64,
    /// Signed correlation value at the winning lag.
    pub correlation_peak: f64,
}

/// Result of analyzing all receiver pairs.
#[derive(Debug, Clone)]
pub struct TdoaAnalysis {
    /// Measurements selected for localization, in pair order.
    pub measurements: Vec<TdoaMeasurement>,
    /// True when no measurement met the confidence threshold and the
    /// unfiltered set was used instead.
    pub used_fallback: bool,
}

/// Correlate every receiver pair and form TDOA measurements.
///
/// Pairs run on the rayon pool; results are collected back in pair order so
/// the outcome is deterministic regardless of scheduling. Cancellation is
/// observed between pairs (and between correlation stages inside each pair).
pub fn analyze(
    receivers: &[ReceiverInfo],
    confidence_threshold: f64,
    progress: &dyn ProgressReporter,
    cancel: &CancelToken,
) -> Result<TdoaAnalysis> {
    let sample_rate = receivers[0].metadata.sample_rate;
    let pairs: Vec<(usize, usize)> = (0..receivers.len())
        .flat_map(|i| ((i + 1)..receivers.len()).map(move |j| (i, j)))
        .collect();

    let completed = AtomicUsize::new(0);
    let outcomes: Vec<Option<TdoaMeasurement>> = pairs
        .par_iter()
        .map(|&(i, j)| {
            if cancel.is_cancelled() {
                return None;
            }
            let outcome = correlate_pair(&receivers[i], &receivers[j], sample_rate, cancel);
            let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
            progress.update_subprogress(
                done as f64 / pairs.len() as f64,
                &format!("{}-{}", receivers[i].id, receivers[j].id),
            );
            outcome
        })
        .collect();
    cancel.check()?;

    let all_measurements: Vec<TdoaMeasurement> = outcomes.into_iter().flatten().collect();
    if all_measurements.is_empty() {
        return Err(Error::NoValidMeasurements);
    }

    let kept: Vec<TdoaMeasurement> = all_measurements
        .iter()
        .filter(|m| m.confidence >= confidence_threshold)
        .cloned()
        .collect();

    if kept.is_empty() {
        log::warn!(
            "no measurement reached confidence {confidence_threshold}; \
             falling back to all {} measurements",
            all_measurements.len()
        );
        return Ok(TdoaAnalysis {
            measurements: all_measurements,
            used_fallback: true,
        });
    }

    log::info!(
        "kept {}/{} measurements at confidence >= {confidence_threshold}",
        kept.len(),
        all_measurements.len()
    );
    Ok(TdoaAnalysis {
        measurements: kept,
        used_fallback: false,
    })
}

/// Correlate one pair, converting failures into a logged skip.
fn correlate_pair(
    first: &ReceiverInfo,
    second: &ReceiverInfo,
    sample_rate: u32,
    cancel: &CancelToken,
) -> Option<TdoaMeasurement> {
    match correlation::correlate(&first.samples, &second.samples, cancel) {
        Ok(peak) => {
            let time_diff_ns = peak.lag as f64 * 1e9 / sample_rate as f64;
            Some(TdoaMeasurement {
                receiver1_id: first.id.clone(),
                receiver2_id: second.id.clone(),
                time_diff_ns,
                distance_diff_m: time_diff_ns * SPEED_OF_LIGHT_M_S / 1e9,
                confidence: peak.confidence(),
                correlation_peak: peak.value,
            })
        }
        Err(Error::Cancelled) => None,
        Err(e) => {
            log::warn!("correlation of {} and {} failed: {e}", first.id, second.id);
            None
        }
    }
}
