//! Error kinds for metadata extraction, planning and copying.
//!
//! Per-file kinds (`MetadataError`, `CoordinateError`, `DateParseError`,
//! `GeocodeError`) are absorbed by the scanner. `PlanError` is the only
//! one allowed to fail a whole analysis.

use std::path::PathBuf;

use thiserror::Error;

/// The file could not be opened for tag reading.
#[derive(Error, Debug)]
pub enum MetadataError {
    #[error("metadata unavailable for {path}: {source}")]
    Unavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Malformed GPS tag data.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoordinateError {
    #[error("zero denominator in {component} component")]
    ZeroDenominator { component: &'static str },

    #[error("invalid hemisphere reference {0:?}")]
    InvalidHemisphere(String),

    #[error("expected 3 rational components, found {0}")]
    ComponentCount(usize),

    #[error("unexpected value type for {0}")]
    UnexpectedType(&'static str),
}

/// The capture timestamp tag is present but does not follow `YYYY:MM:DD HH:MM:SS`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("malformed capture timestamp {raw:?}: {reason}")]
pub struct DateParseError {
    pub raw: String,
    pub reason: String,
}

/// Reverse-geocoding lookup failed.
#[derive(Error, Debug)]
pub enum GeocodeError {
    #[error("geocoder returned {0}")]
    Status(reqwest::StatusCode),

    #[error("geocoder request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("geocoder response has no display_name")]
    MissingName,
}

/// Plan request failed. No partial plan is ever returned alongside this.
#[derive(Error, Debug)]
pub enum PlanError {
    #[error("no API key configured (set OPENAI_API_KEY)")]
    MissingApiKey,

    #[error("chat request failed: {0}")]
    Transport(String),

    #[error("chat endpoint returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("chat response contained no message content")]
    EmptyResponse,

    #[error("response is not a valid plan: {0}")]
    InvalidJson(String),

    #[error("plan entry {index} references a path that was not submitted: {path}")]
    UnknownSource { index: usize, path: String },

    #[error("plan entry {index} lists source {path} more than once")]
    DuplicateSource { index: usize, path: String },

    #[error("plan entry {index} destination escapes {root}: {path}")]
    UnsafeDestination {
        index: usize,
        path: String,
        root: PathBuf,
    },

    #[error("plan entry {index} reuses destination {path}")]
    DuplicateDestination { index: usize, path: PathBuf },

    #[error("plan uses {0} destination folders but only one was allowed")]
    SingleFolderViolated(usize),
}

/// Saved plan could not be used.
#[derive(Error, Debug)]
pub enum PlanFileError {
    #[error("plan file I/O: {0}")]
    Io(#[from] std::io::Error),

    #[error("plan file is not valid: {0}")]
    Format(#[from] serde_json::Error),

    #[error("plan file version {found} is not supported (expected {expected})")]
    Version { found: u32, expected: u32 },

    #[error("plan or its source files changed since the plan was made")]
    Stale,
}

/// Copy could not start or was interrupted.
#[derive(Error, Debug)]
pub enum CopyError {
    #[error("no plan to copy; run an analysis first")]
    NoPlan,

    #[error(transparent)]
    Cancelled(#[from] CancelledError),
}

/// Error indicating the operation was cancelled.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Operation cancelled")]
pub struct CancelledError;

/// Extension not in the selectable set.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unsupported extension {0:?}")]
pub struct UnsupportedExtension(pub String);

/// Folder scan could not run to completion.
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("folder {path} is not readable: {source}")]
    Root {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Cancelled(#[from] CancelledError),
}

/// Failure of a full analyze run (scan + plan).
#[derive(Error, Debug)]
pub enum AnalyzeError {
    #[error(transparent)]
    Scan(#[from] ScanError),

    #[error(transparent)]
    Plan(#[from] PlanError),

    #[error(transparent)]
    Cancelled(#[from] CancelledError),

    #[error("analysis needs a target folder outside the import folder")]
    NotReady,

    #[error("analysis thread panicked")]
    Panicked,
}
