//! CSV export: a `#`-prefixed metadata preamble followed by the receiver,
//! measurement, and (when present) heatmap tables.
//!
//! Tables have different shapes, so the writer runs in flexible mode and
//! separates them with blank records. Comment rows are single-field records
//! that contain no delimiter, so they serialize unquoted.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use crate::error::Result;
use crate::export::{export_error, RESULT_TITLE};
use crate::processor::LocationResult;

type CsvWriter = csv::Writer<BufWriter<File>>;

/// Serialize the result as a CSV file.
pub fn write_csv(result: &LocationResult, path: &Path) -> Result<()> {
    let file = File::create(path)
        .map_err(|e| export_error(&format!("failed to create '{}'", path.display()), e))?;
    let mut writer = csv::WriterBuilder::new()
        .flexible(true)
        .from_writer(BufWriter::new(file));

    write_preamble(&mut writer, result)?;
    write_receivers(&mut writer, result)?;
    write_measurements(&mut writer, result)?;
    if !result.heatmap.is_empty() {
        write_heatmap(&mut writer, result)?;
    }

    writer
        .flush()
        .map_err(|e| export_error("CSV flush failed", e))?;
    Ok(())
}

fn write_preamble(writer: &mut CsvWriter, result: &LocationResult) -> Result<()> {
    let rows = [
        format!("# {RESULT_TITLE}"),
        format!("# Algorithm: {}", result.algorithm.as_str()),
        format!("# Frequency (MHz): {:.6}", result.frequency_hz as f64 / 1e6),
        format!(
            "# Processing time: {}",
            result.processing_time.to_rfc3339()
        ),
        format!("# Estimated latitude: {:.8}", result.location.latitude),
        format!("# Estimated longitude: {:.8}", result.location.longitude),
        format!("# Confidence: {:.4}", result.confidence),
        format!("# Error radius (m): {:.1}", result.error_radius_m),
    ];
    for row in rows {
        record(writer, &[&row])?;
    }
    blank(writer)
}

fn write_receivers(writer: &mut CsvWriter, result: &LocationResult) -> Result<()> {
    record(
        writer,
        &["id", "latitude", "longitude", "altitude", "snr_db", "source_file"],
    )?;
    for receiver in &result.receivers {
        record(
            writer,
            &[
                &receiver.id,
                &format!("{:.8}", receiver.location.latitude),
                &format!("{:.8}", receiver.location.longitude),
                &format!("{:.2}", receiver.location.altitude),
                &format!("{:.2}", receiver.snr_db),
                &receiver.source_file,
            ],
        )?;
    }
    blank(writer)
}

fn write_measurements(writer: &mut CsvWriter, result: &LocationResult) -> Result<()> {
    record(
        writer,
        &[
            "receiver1",
            "receiver2",
            "time_diff_ns",
            "distance_diff_m",
            "confidence",
            "correlation_peak",
        ],
    )?;
    for measurement in &result.measurements {
        record(
            writer,
            &[
                &measurement.receiver1_id,
                &measurement.receiver2_id,
                &format!("{:.3}", measurement.time_diff_ns),
                &format!("{:.3}", measurement.distance_diff_m),
                &format!("{:.4}", measurement.confidence),
                &format!("{:.6}", measurement.correlation_peak),
            ],
        )?;
    }
    Ok(())
}

fn write_heatmap(writer: &mut CsvWriter, result: &LocationResult) -> Result<()> {
    blank(writer)?;
    record(writer, &["latitude", "longitude", "probability"])?;
    for point in &result.heatmap {
        record(
            writer,
            &[
                &format!("{:.8}", point.location.latitude),
                &format!("{:.8}", point.location.longitude),
                &format!("{:.6}", point.probability),
            ],
        )?;
    }
    Ok(())
}

fn record(writer: &mut CsvWriter, fields: &[&str]) -> Result<()> {
    writer
        .write_record(fields)
        .map_err(|e| export_error("CSV write failed", e))
}

fn blank(writer: &mut CsvWriter) -> Result<()> {
    record(writer, &[""])
}
