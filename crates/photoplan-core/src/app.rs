//! Application state owned by a front end, and the background analysis task.
//!
//! Nothing else in the crate reads this state; scanners and planners take
//! their inputs as arguments.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::{debug, info};

use crate::chat::ChatBackend;
use crate::control::CancellationToken;
use crate::error::{AnalyzeError, CopyError, ScanError};
use crate::geocode::PlaceResolver;
use crate::planner::PlacementPlan;
use crate::scan::ExtensionFilter;
use crate::writer::{self, CopyReport};
use crate::{AnalyzeOptions, ProgressCallback};

/// Folders, options and the current plan of one session.
#[derive(Debug, Clone)]
pub struct AppState {
    import_folder: Option<PathBuf>,
    target_folder: Option<PathBuf>,
    pub include_destination: bool,
    pub multiple_folders: bool,
    pub overwrite: bool,
    pub extensions: ExtensionFilter,
    plan: Option<Arc<PlacementPlan>>,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            import_folder: None,
            target_folder: None,
            include_destination: false,
            multiple_folders: true,
            overwrite: false,
            extensions: ExtensionFilter::default(),
            plan: None,
        }
    }
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Choosing a folder invalidates any plan made for the previous one.
    pub fn select_import_folder(&mut self, folder: impl Into<PathBuf>) {
        self.import_folder = Some(folder.into());
        self.plan = None;
    }

    pub fn select_target_folder(&mut self, folder: impl Into<PathBuf>) {
        self.target_folder = Some(folder.into());
        self.plan = None;
    }

    pub fn import_folder(&self) -> Option<&Path> {
        self.import_folder.as_deref()
    }

    pub fn target_folder(&self) -> Option<&Path> {
        self.target_folder.as_deref()
    }

    /// Both folders chosen and the target is not the import folder or
    /// inside it.
    pub fn can_analyze(&self) -> bool {
        match (&self.import_folder, &self.target_folder) {
            (Some(import), Some(target)) => !target.starts_with(import),
            _ => false,
        }
    }

    pub fn can_copy(&self) -> bool {
        self.plan.is_some()
    }

    pub fn analyze_options(&self) -> Option<AnalyzeOptions> {
        if !self.can_analyze() {
            return None;
        }
        Some(AnalyzeOptions {
            input: self.import_folder.clone()?,
            output: self.target_folder.clone()?,
            multiple_folders: self.multiple_folders,
            include_destination: self.include_destination,
            extensions: self.extensions.clone(),
        })
    }

    pub fn accept_plan(&mut self, plan: PlacementPlan) -> Arc<PlacementPlan> {
        let plan = Arc::new(plan);
        self.plan = Some(Arc::clone(&plan));
        plan
    }

    pub fn plan(&self) -> Option<Arc<PlacementPlan>> {
        self.plan.clone()
    }

    pub fn copy(
        &self,
        progress: &ProgressCallback<'_>,
        cancel: Option<&CancellationToken>,
    ) -> Result<CopyReport, CopyError> {
        let plan = self.plan.as_ref().ok_or(CopyError::NoPlan)?;
        Ok(writer::execute_plan(plan, self.overwrite, progress, cancel)?)
    }
}

/// A running analysis.
pub struct AnalysisHandle {
    token: CancellationToken,
    handle: JoinHandle<Result<PlacementPlan, AnalyzeError>>,
}

impl AnalysisHandle {
    /// Abandon the scan at the next file boundary, or skip the plan request.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    pub fn join(self) -> Result<PlacementPlan, AnalyzeError> {
        self.handle.join().map_err(|_| AnalyzeError::Panicked)?
    }
}

/// Run scan and plan request on a worker thread.
pub fn spawn_analysis(
    options: AnalyzeOptions,
    resolver: Arc<dyn PlaceResolver>,
    backend: Arc<dyn ChatBackend>,
    progress: Arc<ProgressCallback<'static>>,
    token: CancellationToken,
) -> AnalysisHandle {
    let worker_token = token.clone();
    debug!(input = %options.input.display(), "starting analysis");
    let handle = thread::spawn(move || {
        let result = crate::analyze(
            &options,
            resolver.as_ref(),
            backend.as_ref(),
            progress.as_ref(),
            Some(&worker_token),
        );
        if matches!(
            result,
            Err(AnalyzeError::Cancelled(_) | AnalyzeError::Scan(ScanError::Cancelled(_)))
        ) {
            info!(input = %options.input.display(), "analysis cancelled");
        }
        result
    });
    AnalysisHandle { token, handle }
}
