use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use filetime::FileTime;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::control::{self, CancellationToken};
use crate::error::CancelledError;
use crate::planner::PlacementPlan;
use crate::ProgressCallback;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyOutcome {
    Copied,
    /// Destination existed and overwrite was off.
    Skipped,
}

/// Result of the copy phase.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CopyReport {
    pub copied: Vec<PathBuf>,
    pub skipped: Vec<PathBuf>,
    pub failed: Vec<(PathBuf, String)>,
}

/// Copy one file, keeping its modification time. The destination's parent
/// directory must already exist.
///
/// A file or symlink already at the destination is skipped unless
/// `overwrite`; a symlink is then replaced, never written through. A
/// directory or other special file there is an error.
pub fn copy_file(source: &Path, destination: &Path, overwrite: bool) -> io::Result<CopyOutcome> {
    match fs::symlink_metadata(destination) {
        Ok(meta) if meta.is_dir() => {
            return Err(io::Error::other("destination is a directory"));
        }
        Ok(meta) if !meta.is_file() && !meta.file_type().is_symlink() => {
            return Err(io::Error::other("destination is not a regular file"));
        }
        Ok(_) if !overwrite => return Ok(CopyOutcome::Skipped),
        Ok(meta) if meta.file_type().is_symlink() => fs::remove_file(destination)?,
        Ok(_) => {
            if fs::canonicalize(source)? == fs::canonicalize(destination)? {
                return Err(io::Error::other("source and destination are the same file"));
            }
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }

    fs::copy(source, destination)?;

    let meta = fs::metadata(source)?;
    let mtime = FileTime::from_last_modification_time(&meta);
    if let Err(e) = filetime::set_file_mtime(destination, mtime) {
        debug!(path = %destination.display(), error = %e, "could not preserve mtime");
    }
    Ok(CopyOutcome::Copied)
}

/// Create `dir` and check that it resolves inside `root`, so a symlinked
/// folder under the root cannot redirect the copy elsewhere.
fn prepare_dir(dir: &Path, root: &Path) -> io::Result<()> {
    fs::create_dir_all(dir)?;
    let resolved = fs::canonicalize(dir)?;
    if !resolved.starts_with(fs::canonicalize(root)?) {
        return Err(io::Error::other(format!(
            "{} resolves outside {}",
            dir.display(),
            root.display()
        )));
    }
    Ok(())
}

/// Copy every placement of `plan`. A failed file is recorded and the loop
/// moves on; cancellation is checked between files.
pub fn execute_plan(
    plan: &PlacementPlan,
    overwrite: bool,
    progress: &ProgressCallback<'_>,
    cancel: Option<&CancellationToken>,
) -> Result<CopyReport, CancelledError> {
    let total = plan.len() as u64;
    let mut report = CopyReport::default();
    let mut created_dirs: HashSet<PathBuf> = HashSet::new();

    for (i, placement) in plan.iter().enumerate() {
        if let Err(e) = control::check(cancel) {
            info!(copied = report.copied.len(), "copy cancelled");
            return Err(e);
        }
        progress("copy", i as u64, total, &placement.destination.display().to_string());

        let result = match placement.destination.parent() {
            // Create and check directory only once per unique path
            Some(dir) if !created_dirs.contains(dir) => {
                prepare_dir(dir, &plan.destination_root).map(|_| {
                    created_dirs.insert(dir.to_path_buf());
                })
            }
            _ => Ok(()),
        }
        .and_then(|_| copy_file(&placement.source, &placement.destination, overwrite));

        match result {
            Ok(CopyOutcome::Copied) => {
                debug!(
                    source = %placement.source.display(),
                    destination = %placement.destination.display(),
                    "copied"
                );
                report.copied.push(placement.destination.clone());
            }
            Ok(CopyOutcome::Skipped) => {
                info!(destination = %placement.destination.display(), "already exists, skipping");
                report.skipped.push(placement.destination.clone());
            }
            Err(e) => {
                warn!(source = %placement.source.display(), error = %e, "copy failed");
                report.failed.push((placement.destination.clone(), e.to_string()));
            }
        }
    }

    info!(
        copied = report.copied.len(),
        skipped = report.skipped.len(),
        failed = report.failed.len(),
        "copy complete"
    );
    Ok(report)
}
