//! Offline TDOA transmitter localization.
//!
//! This crate turns synchronized IQ captures from three or more
//! geographically separated receivers into an estimated transmitter
//! position. Each receiver pair is cross-correlated to recover the signal's
//! relative arrival delay; the resulting time-difference-of-arrival
//! measurements are fused with the receiver geometry into a position,
//! confidence, and radius of uncertainty, optionally with a probability
//! heatmap. Results export as GeoJSON, KML, or CSV.
//!
//! The capture files themselves come from the ARGUS field collector; their
//! binary layout is documented in [`capture`].

pub mod capture;
pub mod correlation;
pub mod error;
pub mod export;
pub mod geo;
pub mod heatmap;
pub mod localizer;
pub mod processor;
pub mod progress;
pub mod receiver;
pub mod tdoa;

#[cfg(test)]
pub(crate) mod testutil;

pub use capture::{read_capture, write_capture, Metadata};
pub use error::{Error, Result};
pub use export::{export, ExportFormat};
pub use geo::Location;
pub use processor::{process_files, Algorithm, CancelToken, LocationResult, ProcessorConfig};
pub use progress::{LogProgress, NullProgress, ProgressReporter};
pub use receiver::{ReceiverInfo, ReceiverSummary};
pub use tdoa::TdoaMeasurement;
