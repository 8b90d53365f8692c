//! ARGUS capture file format: metadata plus raw complex IQ samples.
//!
//! A capture file is what the field collector writes next to each receiver:
//! a small little-endian header (center frequency, sample rate, GPS position
//! and timestamps, device strings) followed by the raw sample stream as
//! interleaved `f32` real/imaginary pairs. This module is the single
//! compatibility surface shared with the collector, so the byte layout in
//! `constants` and the reader/writer below must not drift.

pub mod reader;
pub mod writer;

pub use reader::read_capture;
pub use writer::{write_capture, write_capture_to};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::geo::Location;

/// Capture format constants.
pub mod constants {
    /// File magic, the first five bytes of every capture.
    pub const MAGIC: &[u8; 5] = b"ARGUS";

    /// Format version stamped by the current writer.
    pub const FORMAT_VERSION: u16 = 2;

    /// Oldest format version the reader accepts.
    pub const MIN_FORMAT_VERSION: u16 = 1;

    /// Files at or above this size are memory-mapped instead of read into a
    /// buffer.
    pub const MMAP_THRESHOLD: u64 = 5 * 1024 * 1024;

    /// One IQ sample: two little-endian `f32` values (real, imaginary).
    pub const BYTES_PER_SAMPLE: usize = 8;

    /// Maximum encodable length of the device-info and collection-id
    /// strings; they carry a single length byte.
    pub const MAX_STRING_LEN: usize = 255;
}

/// Capture metadata embedded in the file header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    /// Format version of the file this metadata was read from (or will be
    /// written as).
    pub file_format_version: u16,
    /// Center frequency in Hz.
    pub frequency: u64,
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Start of capture.
    pub collection_time: DateTime<Utc>,
    /// Receiver position at capture time.
    pub gps_location: Location,
    /// Timestamp of the GPS fix backing `gps_location`.
    pub gps_timestamp: DateTime<Utc>,
    /// Free-form device description, at most 255 bytes on disk.
    pub device_info: String,
    /// Collection campaign identifier, at most 255 bytes on disk.
    pub collection_id: String,
    /// Number of IQ samples following the header.
    pub sample_count: u32,
}
