//! Error types shared across the capture codec and the processing pipeline.
//!
//! A single crate-wide error enum keeps the surface small: codec failures,
//! receiver compatibility problems, and export failures all flow through the
//! same `Result` alias. Per-pair correlation failures are the one exception
//! to fail-fast handling; the analyzer recovers them locally.

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Processing error kinds.
///
/// Everything except pairwise correlation failures aborts processing. Numeric
/// edge cases inside the correlation math (NaN, zero variance) do not surface
/// here at all; they yield neutral zero correlations instead.
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid processor configuration (threshold out of range, bad distance).
    #[error("invalid configuration: {message}")]
    Config { message: String },

    /// Fewer capture files than the minimum the solver needs.
    #[error("TDOA needs at least 3 capture files, got {count}")]
    TooFewInputs { count: usize },

    /// File open/read/mmap failure.
    #[error("IO error: {message}")]
    Io { message: String },

    /// The first five bytes of the file are not the ARGUS magic.
    #[error("not an ARGUS capture file (bad magic)")]
    InvalidMagic,

    /// The file ended before the named field could be fully decoded.
    #[error("capture file truncated at {field}")]
    Truncated { field: &'static str },

    /// The capture carries a format version this reader does not understand.
    #[error("unsupported capture format version {version}")]
    UnsupportedVersion { version: u16 },

    /// Receivers disagree on a field that must be identical across captures.
    #[error("receivers disagree on {field}")]
    IncompatibleReceivers { field: &'static str },

    /// A receiver pair is closer than the minimum usable baseline.
    #[error("receivers too close together ({distance_m:.1} m, minimum {min_m:.0} m)")]
    ReceiversTooClose { distance_m: f64, min_m: f64 },

    /// Capture start times drift further apart than the sync window allows.
    #[error("receiver clocks out of sync ({drift_s:.3} s drift, limit {limit_s:.0} s)")]
    TimeSyncFailure { drift_s: f64, limit_s: f64 },

    /// Not enough samples to run the correlation search.
    #[error("insufficient samples for correlation ({available} available, {required} required)")]
    InsufficientSamples { available: usize, required: usize },

    /// Every receiver pair failed to produce a usable correlation.
    #[error("no valid TDOA measurements could be computed")]
    NoValidMeasurements,

    /// Output file creation or serialization failure.
    #[error("export failed: {message}")]
    Export { message: String },

    /// Processing was cancelled; partial results were discarded.
    #[error("processing cancelled")]
    Cancelled,
}

impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Self {
        Error::Io {
            message: error.to_string(),
        }
    }
}
