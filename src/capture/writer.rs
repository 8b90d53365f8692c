//! Capture file writing.
//!
//! Writes are sequential with no padding or alignment; the sample count on
//! disk is always derived from the sample slice so the header can never
//! disagree with the payload.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use byteorder::{LittleEndian, WriteBytesExt};
use chrono::{DateTime, Utc};
use num_complex::Complex32;

use crate::capture::{constants, Metadata};
use crate::error::{Error, Result};

/// Write a capture file to disk.
pub fn write_capture(path: &Path, metadata: &Metadata, samples: &[Complex32]) -> Result<()> {
    let file = File::create(path).map_err(|e| Error::Io {
        message: format!("failed to create '{}': {}", path.display(), e),
    })?;
    let mut writer = BufWriter::new(file);
    write_capture_to(&mut writer, metadata, samples)?;
    writer.flush()?;
    Ok(())
}

/// Serialize a capture into any writer.
///
/// `device_info` and `collection_id` longer than 255 bytes are truncated at
/// the nearest UTF-8 boundary; everything else round-trips bit-exactly.
pub fn write_capture_to<W: Write>(
    writer: &mut W,
    metadata: &Metadata,
    samples: &[Complex32],
) -> Result<()> {
    writer.write_all(constants::MAGIC)?;
    writer.write_u16::<LittleEndian>(metadata.file_format_version)?;
    writer.write_u64::<LittleEndian>(metadata.frequency)?;
    writer.write_u32::<LittleEndian>(metadata.sample_rate)?;
    write_timestamp(writer, &metadata.collection_time)?;

    writer.write_f64::<LittleEndian>(metadata.gps_location.latitude)?;
    writer.write_f64::<LittleEndian>(metadata.gps_location.longitude)?;
    writer.write_f64::<LittleEndian>(metadata.gps_location.altitude)?;
    write_timestamp(writer, &metadata.gps_timestamp)?;

    write_string(writer, "device_info", &metadata.device_info)?;
    write_string(writer, "collection_id", &metadata.collection_id)?;

    writer.write_u32::<LittleEndian>(samples.len() as u32)?;
    for sample in samples {
        writer.write_f32::<LittleEndian>(sample.re)?;
        writer.write_f32::<LittleEndian>(sample.im)?;
    }
    Ok(())
}

fn write_timestamp<W: Write>(writer: &mut W, timestamp: &DateTime<Utc>) -> Result<()> {
    writer.write_i64::<LittleEndian>(timestamp.timestamp())?;
    writer.write_i32::<LittleEndian>(timestamp.timestamp_subsec_nanos() as i32)?;
    Ok(())
}

fn write_string<W: Write>(writer: &mut W, field: &str, value: &str) -> Result<()> {
    let bytes = truncate_at_char_boundary(value, constants::MAX_STRING_LEN);
    if bytes.len() < value.len() {
        log::warn!(
            "{field} is {} bytes, truncating to {}",
            value.len(),
            bytes.len()
        );
    }
    writer.write_u8(bytes.len() as u8)?;
    writer.write_all(bytes)?;
    Ok(())
}

/// Longest prefix of `value` that fits in `max` bytes without splitting a
/// UTF-8 sequence.
fn truncate_at_char_boundary(value: &str, max: usize) -> &[u8] {
    if value.len() <= max {
        return value.as_bytes();
    }
    let mut end = max;
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    &value.as_bytes()[..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::reader::decode_capture;
    use crate::capture::read_capture;
    use crate::geo::Location;
    use crate::testutil;

    #[test]
    fn test_round_trip_in_memory() {
        let samples = testutil::band_noise(1024, 0);
        let metadata = testutil::metadata(
            433_920_000,
            2_400_000,
            Location::new(-33.5, 151.25, 12.5),
            1_700_000_123,
            samples.len() as u32,
        );

        let mut bytes = Vec::new();
        write_capture_to(&mut bytes, &metadata, &samples).unwrap();
        let (decoded_metadata, decoded_samples) = decode_capture(&bytes).unwrap();

        assert_eq!(decoded_metadata, metadata);
        assert_eq!(decoded_samples, samples);
    }

    #[test]
    fn test_round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("capture.dat");

        let samples = testutil::band_noise(2048, 17);
        let metadata = testutil::metadata(
            100_000_000,
            2_000_000,
            Location::new(51.0, 7.0, 60.0),
            1_700_000_456,
            samples.len() as u32,
        );

        write_capture(&path, &metadata, &samples).unwrap();
        let (decoded_metadata, decoded_samples) = read_capture(&path).unwrap();

        assert_eq!(decoded_metadata, metadata);
        assert_eq!(decoded_samples, samples);
    }

    #[test]
    fn test_subsecond_timestamps_round_trip() {
        use chrono::DateTime;

        let samples = testutil::band_noise(8, 0);
        let mut metadata = testutil::metadata(
            100_000_000,
            2_000_000,
            Location::new(0.0, 0.0, 0.0),
            1_700_000_000,
            samples.len() as u32,
        );
        metadata.collection_time = DateTime::from_timestamp(1_700_000_000, 123_456_789).unwrap();
        metadata.gps_timestamp = DateTime::from_timestamp(1_700_000_001, 987_654_321).unwrap();

        let mut bytes = Vec::new();
        write_capture_to(&mut bytes, &metadata, &samples).unwrap();
        let (decoded, _) = decode_capture(&bytes).unwrap();
        assert_eq!(decoded.collection_time, metadata.collection_time);
        assert_eq!(decoded.gps_timestamp, metadata.gps_timestamp);
    }

    #[test]
    fn test_long_strings_truncated_to_255_bytes() {
        let samples = testutil::band_noise(8, 0);
        let mut metadata = testutil::metadata(
            100_000_000,
            2_000_000,
            Location::new(0.0, 0.0, 0.0),
            1_700_000_000,
            samples.len() as u32,
        );
        metadata.device_info = "d".repeat(300);
        metadata.collection_id = "c".repeat(256);

        let mut bytes = Vec::new();
        write_capture_to(&mut bytes, &metadata, &samples).unwrap();
        let (decoded, _) = decode_capture(&bytes).unwrap();

        assert_eq!(decoded.device_info, "d".repeat(255));
        assert_eq!(decoded.collection_id, "c".repeat(255));
    }

    #[test]
    fn test_truncation_respects_char_boundaries() {
        // 2-byte code points: 255 is mid-character, so the prefix is 254.
        let value = "\u{00e9}".repeat(200);
        let truncated = truncate_at_char_boundary(&value, 255);
        assert_eq!(truncated.len(), 254);
        assert!(std::str::from_utf8(truncated).is_ok());
    }
}
