pub mod app;
pub mod chat;
pub mod config;
pub mod control;
pub mod error;
pub mod geocode;
pub mod media;
pub mod metadata;
pub mod plan_file;
pub mod planner;
pub mod scan;
pub mod writer;

#[cfg(test)]
mod test_support;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

pub use app::{spawn_analysis, AnalysisHandle, AppState};
pub use chat::{ChatBackend, OpenAiChat};
pub use config::Config;
pub use control::CancellationToken;
pub use error::{AnalyzeError, CancelledError, CopyError, PlanError, PlanFileError, ScanError};
pub use geocode::{NominatimResolver, PlaceResolver};
pub use media::MetadataRecord;
pub use plan_file::PlanFile;
pub use planner::{Placement, PlacementPlan, PlanRequest};
pub use scan::ExtensionFilter;
pub use writer::{execute_plan, CopyReport};

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzeOptions {
    pub input: PathBuf,
    pub output: PathBuf,
    #[serde(default = "default_true")]
    pub multiple_folders: bool,
    /// Send the existing contents of `output` to the planner.
    #[serde(default)]
    pub include_destination: bool,
    #[serde(default)]
    pub extensions: ExtensionFilter,
}

impl AnalyzeOptions {
    pub fn new(input: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            multiple_folders: true,
            include_destination: false,
            extensions: ExtensionFilter::default(),
        }
    }
}

/// Type alias for progress callback: `(stage, current, total, message)`.
pub type ProgressCallback<'a> = dyn Fn(&str, u64, u64, &str) + Send + Sync + 'a;

/// Scan the import folder and ask `backend` for a placement plan.
pub fn analyze(
    options: &AnalyzeOptions,
    resolver: &dyn PlaceResolver,
    backend: &dyn ChatBackend,
    progress: &ProgressCallback<'_>,
    cancel: Option<&CancellationToken>,
) -> Result<PlacementPlan, AnalyzeError> {
    let input = absolute(&options.input);
    let output = absolute(&options.output);
    // Output inside input would rescan already placed files
    if output.starts_with(&input) {
        return Err(AnalyzeError::NotReady);
    }

    let records = scan::scan_folder(&input, &options.extensions, resolver, progress, cancel)?;

    if records.is_empty() {
        info!(input = %input.display(), "nothing to plan");
        return Ok(PlacementPlan {
            destination_root: output,
            entries: Vec::new(),
        });
    }

    control::check(cancel)?;

    let listing = if options.include_destination {
        scan::list_destination(&output)
    } else {
        Vec::new()
    };

    let request = PlanRequest {
        records: &records,
        destination_root: &output,
        destination_listing: &listing,
        multiple_folders: options.multiple_folders,
    };
    Ok(planner::request_plan(backend, &request)?)
}

fn absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}
