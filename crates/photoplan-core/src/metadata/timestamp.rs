use chrono::NaiveDateTime;
use exif::Tag;

use super::tags::TagTable;
use crate::error::DateParseError;

/// Layout of the original-capture tag. Date parts are colon separated.
pub const CAPTURE_FORMAT: &str = "%Y:%m:%d %H:%M:%S";

/// Parse a capture timestamp such as `2023:06:15 14:30:00`.
///
/// The result carries no time zone; it is whatever local time the camera
/// recorded.
pub fn parse_capture_time(raw: &str) -> Result<NaiveDateTime, DateParseError> {
    NaiveDateTime::parse_from_str(raw.trim(), CAPTURE_FORMAT).map_err(|e| DateParseError {
        raw: raw.to_string(),
        reason: e.to_string(),
    })
}

/// Capture time of the file, if tagged.
///
/// An absent tag is `Ok(None)`; a present but malformed one is an error.
pub fn capture_time(tags: &TagTable) -> Result<Option<NaiveDateTime>, DateParseError> {
    match tags.ascii(Tag::DateTimeOriginal) {
        Some(raw) => parse_capture_time(&raw).map(Some),
        None => Ok(None),
    }
}
