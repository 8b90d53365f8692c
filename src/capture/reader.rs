//! Capture file reading with size-dependent IO strategy.
//!
//! Small files are read into a buffer; large files (hundreds of megabytes of
//! samples are common) are memory-mapped read-only and decoded in place. The
//! mapping lives only for the duration of the decode; the returned sample
//! vector owns its memory, so the map is released on every exit path.

use std::fs::File;
use std::io::{Cursor, Read};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt};
use chrono::{DateTime, Utc};
use num_complex::Complex32;

use crate::capture::{constants, Metadata};
use crate::error::{Error, Result};
use crate::geo::Location;

/// Read and decode a capture file.
///
/// Files below [`constants::MMAP_THRESHOLD`] are read with a plain buffered
/// read; larger files are memory-mapped.
pub fn read_capture(path: &Path) -> Result<(Metadata, Vec<Complex32>)> {
    let mut file = File::open(path).map_err(|e| Error::Io {
        message: format!("failed to open '{}': {}", path.display(), e),
    })?;
    let file_size = file
        .metadata()
        .map_err(|e| Error::Io {
            message: format!("failed to stat '{}': {}", path.display(), e),
        })?
        .len();

    if file_size >= constants::MMAP_THRESHOLD {
        let mmap = unsafe { memmap2::Mmap::map(&file) }.map_err(|e| Error::Io {
            message: format!("failed to memory-map '{}': {}", path.display(), e),
        })?;
        decode_capture(&mmap)
    } else {
        let mut bytes = Vec::with_capacity(file_size as usize);
        file.read_to_end(&mut bytes).map_err(|e| Error::Io {
            message: format!("failed to read '{}': {}", path.display(), e),
        })?;
        decode_capture(&bytes)
    }
}

/// Decode a complete capture image from memory.
pub(crate) fn decode_capture(bytes: &[u8]) -> Result<(Metadata, Vec<Complex32>)> {
    let mut cursor = Cursor::new(bytes);

    let mut magic = [0u8; 5];
    cursor
        .read_exact(&mut magic)
        .map_err(|_| Error::Truncated { field: "magic" })?;
    if &magic != constants::MAGIC {
        return Err(Error::InvalidMagic);
    }

    let file_format_version = read_u16(&mut cursor, "file_format_version")?;
    if file_format_version < constants::MIN_FORMAT_VERSION
        || file_format_version > constants::FORMAT_VERSION
    {
        return Err(Error::UnsupportedVersion {
            version: file_format_version,
        });
    }

    let frequency = read_u64(&mut cursor, "frequency")?;
    let sample_rate = read_u32(&mut cursor, "sample_rate")?;
    let collection_time = read_timestamp(&mut cursor, "collection_time")?;

    let gps_location = Location {
        latitude: read_f64(&mut cursor, "gps_latitude")?,
        longitude: read_f64(&mut cursor, "gps_longitude")?,
        altitude: read_f64(&mut cursor, "gps_altitude")?,
    };
    let gps_timestamp = read_timestamp(&mut cursor, "gps_timestamp")?;

    let device_info = read_string(&mut cursor, "device_info")?;
    let collection_id = read_string(&mut cursor, "collection_id")?;
    let sample_count = read_u32(&mut cursor, "sample_count")?;

    let header_len = cursor.position() as usize;
    let samples = decode_samples(&bytes[header_len..], sample_count)?;

    let metadata = Metadata {
        file_format_version,
        frequency,
        sample_rate,
        collection_time,
        gps_location,
        gps_timestamp,
        device_info,
        collection_id,
        sample_count,
    };
    Ok((metadata, samples))
}

/// Decode the sample region into owned complex samples.
///
/// On little-endian hosts the region is reinterpreted as a contiguous `f32`
/// view when 4-byte aligned; otherwise (or on big-endian hosts) each sample
/// is decoded explicitly. Samples start right after the header, whose layout
/// puts them on a natural `f32` boundary for buffered reads; mapped reads
/// re-check because the base address is up to the allocator.
fn decode_samples(bytes: &[u8], sample_count: u32) -> Result<Vec<Complex32>> {
    let count = sample_count as usize;
    let needed = count
        .checked_mul(constants::BYTES_PER_SAMPLE)
        .ok_or(Error::Truncated { field: "samples" })?;
    let region = bytes
        .get(..needed)
        .ok_or(Error::Truncated { field: "samples" })?;

    #[cfg(target_endian = "little")]
    if region.as_ptr() as usize % std::mem::align_of::<f32>() == 0 {
        // Bounds and alignment both checked above.
        let floats: &[f32] =
            unsafe { std::slice::from_raw_parts(region.as_ptr() as *const f32, count * 2) };
        return Ok(floats
            .chunks_exact(2)
            .map(|iq| Complex32::new(iq[0], iq[1]))
            .collect());
    }

    Ok(region
        .chunks_exact(constants::BYTES_PER_SAMPLE)
        .map(|chunk| {
            let re = f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
            let im = f32::from_le_bytes([chunk[4], chunk[5], chunk[6], chunk[7]]);
            Complex32::new(re, im)
        })
        .collect())
}

fn read_u16(cursor: &mut Cursor<&[u8]>, field: &'static str) -> Result<u16> {
    cursor
        .read_u16::<LittleEndian>()
        .map_err(|_| Error::Truncated { field })
}

fn read_u32(cursor: &mut Cursor<&[u8]>, field: &'static str) -> Result<u32> {
    cursor
        .read_u32::<LittleEndian>()
        .map_err(|_| Error::Truncated { field })
}

fn read_u64(cursor: &mut Cursor<&[u8]>, field: &'static str) -> Result<u64> {
    cursor
        .read_u64::<LittleEndian>()
        .map_err(|_| Error::Truncated { field })
}

fn read_f64(cursor: &mut Cursor<&[u8]>, field: &'static str) -> Result<f64> {
    cursor
        .read_f64::<LittleEndian>()
        .map_err(|_| Error::Truncated { field })
}

/// Unix seconds (`i64`) followed by nanoseconds (`i32`).
fn read_timestamp(cursor: &mut Cursor<&[u8]>, field: &'static str) -> Result<DateTime<Utc>> {
    let secs = cursor
        .read_i64::<LittleEndian>()
        .map_err(|_| Error::Truncated { field })?;
    let nanos = cursor
        .read_i32::<LittleEndian>()
        .map_err(|_| Error::Truncated { field })?;
    DateTime::from_timestamp(secs, nanos.max(0) as u32).ok_or(Error::Truncated { field })
}

/// A length byte followed by that many bytes of UTF-8.
fn read_string(cursor: &mut Cursor<&[u8]>, field: &'static str) -> Result<String> {
    let len = cursor.read_u8().map_err(|_| Error::Truncated { field })? as usize;
    let mut bytes = vec![0u8; len];
    cursor
        .read_exact(&mut bytes)
        .map_err(|_| Error::Truncated { field })?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}
