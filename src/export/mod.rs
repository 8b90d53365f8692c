//! Result serialization into geospatial formats.
//!
//! Three writers share one result type: GeoJSON for web maps and tooling,
//! KML for Google Earth, and CSV for spreadsheets. Each writer takes the
//! result by shared reference and owns nothing.

pub mod csv;
pub mod geojson;
pub mod kml;

pub use self::csv::write_csv;
pub use geojson::write_geojson;
pub use kml::write_kml;

use std::path::Path;

use crate::error::{Error, Result};
use crate::processor::LocationResult;

/// Title carried in every export's metadata block.
pub(crate) const RESULT_TITLE: &str = "ARGUS transmitter localization";

/// Output format selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    GeoJson,
    Kml,
    Csv,
}

impl ExportFormat {
    /// Guess the format from a file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        let extension = path.extension()?.to_str()?.to_ascii_lowercase();
        match extension.as_str() {
            "json" | "geojson" => Some(Self::GeoJson),
            "kml" => Some(Self::Kml),
            "csv" => Some(Self::Csv),
            _ => None,
        }
    }
}

/// Write `result` to `path` in the requested format.
pub fn export(result: &LocationResult, path: &Path, format: ExportFormat) -> Result<()> {
    match format {
        ExportFormat::GeoJson => geojson::write_geojson(result, path),
        ExportFormat::Kml => kml::write_kml(result, path),
        ExportFormat::Csv => self::csv::write_csv(result, path),
    }
}

/// Shorthand for wrapping writer failures.
pub(crate) fn export_error(context: &str, error: impl std::fmt::Display) -> Error {
    Error::Export {
        message: format!("{context}: {error}"),
    }
}
