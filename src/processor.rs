//! Pipeline driver: capture files in, localization result out.
//!
//! `process_files` wires the loader, analyzer, localizer, and heatmap
//! generator together. One invocation produces one [`LocationResult`]; no
//! state outlives the call. Receiver sample buffers are dropped as soon as
//! localization no longer needs them, so exporting works on a compact,
//! sample-free result.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::geo::Location;
use crate::heatmap::{self, HeatmapPoint};
use crate::localizer;
use crate::progress::{LogProgress, ProgressReporter};
use crate::receiver::{self, ReceiverInfo, ReceiverSummary, MIN_RECEIVERS};
use crate::tdoa::{self, TdoaMeasurement};

/// Output shape selector. Both variants share the same solver; `Heatmap`
/// additionally evaluates the probability grid.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Algorithm {
    #[default]
    Basic,
    Heatmap,
}

impl Algorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            Algorithm::Basic => "basic",
            Algorithm::Heatmap => "heatmap",
        }
    }
}

/// Processing configuration.
#[derive(Debug, Clone)]
pub struct ProcessorConfig {
    pub algorithm: Algorithm,
    /// Measurements below this confidence are dropped (with fallback to the
    /// full set when nothing survives). Must lie in `[0, 1]`.
    pub confidence_threshold: f64,
    /// Plausibility bound on transmitter range in km. Must be positive.
    pub max_distance_km: f64,
    /// Reserved for band filtering; carried but not yet consumed.
    pub frequency_range: Vec<String>,
    /// Verbose progress reporting.
    pub verbose: bool,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            algorithm: Algorithm::Basic,
            confidence_threshold: 0.5,
            max_distance_km: 100.0,
            frequency_range: Vec::new(),
            verbose: false,
        }
    }
}

impl ProcessorConfig {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(Error::Config {
                message: format!(
                    "confidence threshold {} outside [0, 1]",
                    self.confidence_threshold
                ),
            });
        }
        if !(self.max_distance_km > 0.0) {
            return Err(Error::Config {
                message: format!("max distance {} km must be positive", self.max_distance_km),
            });
        }
        Ok(())
    }

    /// Build a log-backed progress reporter honoring the verbosity setting.
    pub fn progress_reporter(&self) -> LogProgress {
        LogProgress::new(self.verbose)
    }
}

/// Cooperative cancellation signal.
///
/// Long operations poll the token between receiver pairs and between
/// correlation stages; a cancelled run discards partial results and returns
/// [`Error::Cancelled`].
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Safe to call from any thread.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }

    /// Error out if cancellation was requested.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Complete output of one processing run.
#[derive(Debug, Clone, Serialize)]
pub struct LocationResult {
    pub algorithm: Algorithm,
    /// Center frequency shared by all captures, in Hz.
    pub frequency_hz: u64,
    /// When this result was produced.
    pub processing_time: DateTime<Utc>,
    pub location: Location,
    pub confidence: f64,
    pub error_radius_m: f64,
    pub receivers: Vec<ReceiverSummary>,
    /// Measurements the solver used, in pair order.
    pub measurements: Vec<TdoaMeasurement>,
    /// Probability grid; empty unless the heatmap algorithm ran.
    pub heatmap: Vec<HeatmapPoint>,
    /// True when the confidence filter emptied and the unfiltered
    /// measurement set was used.
    pub used_fallback: bool,
}

impl LocationResult {
    /// One-line human-readable summary.
    pub fn summary(&self) -> String {
        format!(
            "transmitter near ({:.6}, {:.6}) +/- {:.0} m, confidence {:.2}, {} measurements",
            self.location.latitude,
            self.location.longitude,
            self.error_radius_m,
            self.confidence,
            self.measurements.len()
        )
    }
}

/// Run the full pipeline over a set of capture files.
pub fn process_files(
    paths: &[PathBuf],
    config: &ProcessorConfig,
    progress: &dyn ProgressReporter,
    cancel: &CancelToken,
) -> Result<LocationResult> {
    config.validate()?;
    if paths.len() < MIN_RECEIVERS {
        return Err(Error::TooFewInputs { count: paths.len() });
    }

    progress.start_step("Loading capture files");
    let receivers = receiver::load_receivers(paths, progress)?;
    progress.complete_step();
    cancel.check()?;

    progress.start_step("Correlating receiver pairs");
    let analysis = tdoa::analyze(&receivers, config.confidence_threshold, progress, cancel)?;
    progress.complete_step();
    cancel.check()?;

    progress.start_step("Estimating transmitter position");
    let estimate = localizer::localize(&receivers, &analysis.measurements);
    progress.complete_step();

    let frequency_hz = receivers[0].metadata.frequency;
    let summaries: Vec<ReceiverSummary> = receivers.iter().map(ReceiverInfo::summary).collect();
    // Sample buffers are no longer needed past this point.
    drop(receivers);

    let heatmap = match config.algorithm {
        Algorithm::Heatmap => {
            progress.start_step("Generating probability heatmap");
            let points = heatmap::generate_heatmap(&estimate.location, estimate.error_radius_m);
            progress.complete_step();
            points
        }
        Algorithm::Basic => Vec::new(),
    };
    progress.finish();

    let result = LocationResult {
        algorithm: config.algorithm,
        frequency_hz,
        processing_time: Utc::now(),
        location: estimate.location,
        confidence: estimate.confidence,
        error_radius_m: estimate.error_radius_m,
        receivers: summaries,
        measurements: analysis.measurements,
        heatmap,
        used_fallback: analysis.used_fallback,
    };
    log::info!("{}", result.summary());
    Ok(result)
}
