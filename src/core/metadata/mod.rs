//! # Metadata Module
//!
//! Extracts capture time and GPS position from embedded EXIF metadata.
//!
//! ## Timestamp fallback chain
//! The first field that is present *and* parses wins:
//! 1. `DateTimeOriginal` (capture time)
//! 2. `DateTimeDigitized`
//! 3. `DateTime` (modification time) of the primary image
//! 4. `DateTime` of the secondary (thumbnail) block
//!
//! Every candidate is parsed with the EXIF pattern `YYYY:MM:DD HH:MM:SS`.
//!
//! ## Coordinates
//! See [`gps`]. Latitude and longitude are resolved together or not at all.
//!
//! Extraction never fails: bytes without metadata simply yield nothing.

pub mod gps;

pub use gps::{apply_hemisphere, dms_to_decimal, Axis, Coordinates, GpsFields, GpsValue};

use chrono::{DateTime, NaiveDateTime, Utc};
use exif::{Exif, In, Reader, Tag, Value};
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use tracing::debug;

/// Date-time pattern used by every EXIF timestamp field
pub const EXIF_DATETIME_FORMAT: &str = "%Y:%m:%d %H:%M:%S";

/// What could be recovered from a photo's metadata
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedMetadata {
    /// Capture time, if any timestamp field parsed
    pub timestamp: Option<DateTime<Utc>>,
    /// GPS position, if both axes were well-formed
    pub coordinates: Option<Coordinates>,
}

impl ExtractedMetadata {
    pub fn latitude(&self) -> Option<f64> {
        self.coordinates.map(|c| c.latitude)
    }

    pub fn longitude(&self) -> Option<f64> {
        self.coordinates.map(|c| c.longitude)
    }

    /// Check if any metadata was extracted
    pub fn has_data(&self) -> bool {
        self.timestamp.is_some() || self.coordinates.is_some()
    }
}

/// The raw metadata strings and values the resolver chooses between
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawMetadata {
    pub capture_time: Option<String>,
    pub digitized_time: Option<String>,
    pub modified_time: Option<String>,
    pub secondary_time: Option<String>,
    pub gps: GpsFields,
}

impl RawMetadata {
    /// Collect the relevant fields from a parsed EXIF container
    pub fn from_exif(exif: &Exif) -> Self {
        Self {
            capture_time: ascii_field(exif, Tag::DateTimeOriginal, In::PRIMARY),
            digitized_time: ascii_field(exif, Tag::DateTimeDigitized, In::PRIMARY),
            modified_time: ascii_field(exif, Tag::DateTime, In::PRIMARY),
            secondary_time: ascii_field(exif, Tag::DateTime, In::THUMBNAIL),
            gps: GpsFields::from_exif(exif),
        }
    }

    /// Walk the timestamp fallback chain
    pub fn resolve_timestamp(&self) -> Option<DateTime<Utc>> {
        let candidates = [
            ("DateTimeOriginal", &self.capture_time),
            ("DateTimeDigitized", &self.digitized_time),
            ("DateTime", &self.modified_time),
            ("DateTime (secondary)", &self.secondary_time),
        ];

        candidates.iter().find_map(|(name, value)| {
            let text = value.as_deref()?;
            let parsed = parse_exif_datetime(text);
            if parsed.is_none() {
                debug!("Skipping unparseable {} value {:?}", name, text);
            }
            parsed
        })
    }

    pub fn resolve(&self) -> ExtractedMetadata {
        ExtractedMetadata {
            timestamp: self.resolve_timestamp(),
            coordinates: self.gps.resolve(),
        }
    }
}

/// Parse an EXIF date-time string (`2023:06:15 10:30:00`) as UTC
pub fn parse_exif_datetime(text: &str) -> Option<DateTime<Utc>> {
    let trimmed = text.trim_end_matches('\0').trim();
    NaiveDateTime::parse_from_str(trimmed, EXIF_DATETIME_FORMAT)
        .ok()
        .map(|naive| DateTime::from_naive_utc_and_offset(naive, Utc))
}

/// Pulls capture metadata out of raw photo bytes
#[derive(Debug, Clone, Copy, Default)]
pub struct MetadataExtractor;

impl MetadataExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Extract timestamp and coordinates; absent fields are `None`
    pub fn extract(&self, bytes: &[u8]) -> ExtractedMetadata {
        let mut cursor = Cursor::new(bytes);
        let exif = match Reader::new().read_from_container(&mut cursor) {
            Ok(exif) => exif,
            Err(e) => {
                debug!("No EXIF metadata: {}", e);
                return ExtractedMetadata::default();
            }
        };

        let metadata = RawMetadata::from_exif(&exif).resolve();
        debug!(
            timestamp = ?metadata.timestamp,
            coordinates = ?metadata.coordinates,
            "Extracted metadata"
        );
        metadata
    }
}

/// Helper to extract a trimmed, non-empty string from an EXIF ASCII field
pub(crate) fn ascii_field(exif: &Exif, tag: Tag, ifd: In) -> Option<String> {
    let field = exif.get_field(tag, ifd)?;
    if let Value::Ascii(ref vec) = field.value {
        if let Some(bytes) = vec.first() {
            if let Ok(s) = std::str::from_utf8(bytes) {
                let trimmed = s.trim_end_matches('\0').trim();
                if !trimmed.is_empty() {
                    return Some(trimmed.to_string());
                }
            }
        }
    }
    None
}
