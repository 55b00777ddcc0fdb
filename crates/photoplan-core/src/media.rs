use std::path::PathBuf;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Place of a file that carries no usable geolocation.
pub const UNKNOWN_PLACE: &str = "Unknown";

/// What the scanner learned about one photo.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataRecord {
    pub file_path: PathBuf,
    /// Resolved place name, [`UNKNOWN_PLACE`] when untagged.
    pub place: String,
    /// Capture time as recorded by the camera (no zone).
    pub captured_at: Option<NaiveDateTime>,
}

impl MetadataRecord {
    pub fn new(file_path: PathBuf) -> Self {
        Self {
            file_path,
            place: UNKNOWN_PLACE.to_string(),
            captured_at: None,
        }
    }

    pub fn has_place(&self) -> bool {
        self.place != UNKNOWN_PLACE
    }
}
