use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use filetime::FileTime;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::error::PlanFileError;
use crate::planner::PlacementPlan;

/// Current plan file format version
const PLAN_FILE_VERSION: u32 = 1;

/// A reviewed plan written to disk between `analyze` and `copy`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanFile {
    pub version: u32,
    pub created_at: DateTime<Utc>,
    /// Digest over the plan entries and the size/mtime of every source.
    pub fingerprint: String,
    pub plan: PlacementPlan,
}

impl PlanFile {
    pub fn new(plan: PlacementPlan) -> Result<Self, PlanFileError> {
        let fingerprint = compute_fingerprint(&plan)?;
        Ok(Self {
            version: PLAN_FILE_VERSION,
            created_at: Utc::now(),
            fingerprint,
            plan,
        })
    }

    /// Load a plan file. The version must match; freshness is checked by
    /// [`into_current_plan`](Self::into_current_plan).
    pub fn load(path: &Path) -> Result<Self, PlanFileError> {
        let file = File::open(path)?;
        let plan_file: PlanFile = serde_json::from_reader(BufReader::new(file))?;
        if plan_file.version != PLAN_FILE_VERSION {
            return Err(PlanFileError::Version {
                found: plan_file.version,
                expected: PLAN_FILE_VERSION,
            });
        }
        Ok(plan_file)
    }

    /// Write to `path` via a temp file and rename. On failure the temp file
    /// is removed and `path` is left as it was.
    pub fn save(&self, path: &Path) -> Result<(), PlanFileError> {
        let temp_path = temp_path_for(path);
        if let Err(e) = self.write_to(&temp_path) {
            let _ = fs::remove_file(&temp_path);
            return Err(e);
        }
        fs::rename(&temp_path, path)?;
        debug!(path = %path.display(), entries = self.plan.len(), "plan saved");
        Ok(())
    }

    fn write_to(&self, path: &Path) -> Result<(), PlanFileError> {
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(&mut writer, self)?;
        let file = writer.into_inner().map_err(|e| e.into_error())?;
        file.sync_all()?;
        Ok(())
    }

    /// Whether the plan and its sources are unchanged since creation.
    pub fn is_current(&self) -> bool {
        compute_fingerprint(&self.plan).map_or(false, |f| f == self.fingerprint)
    }

    pub fn into_current_plan(self) -> Result<PlacementPlan, PlanFileError> {
        if !self.is_current() {
            return Err(PlanFileError::Stale);
        }
        Ok(self.plan)
    }
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

fn compute_fingerprint(plan: &PlacementPlan) -> std::io::Result<String> {
    let mut hasher = Sha256::new();
    hasher.update(plan.destination_root.to_string_lossy().as_bytes());

    let mut entries: Vec<_> = plan.iter().collect();
    entries.sort_by(|a, b| a.source.cmp(&b.source));

    for entry in entries {
        let meta = fs::metadata(&entry.source)?;
        let mtime = FileTime::from_last_modification_time(&meta);
        hasher.update([0]);
        hasher.update(entry.source.to_string_lossy().as_bytes());
        hasher.update([0]);
        hasher.update(entry.destination.to_string_lossy().as_bytes());
        hasher.update(meta.len().to_le_bytes());
        hasher.update(mtime.unix_seconds().to_le_bytes());
        hasher.update(mtime.nanoseconds().to_le_bytes());
    }
    Ok(hex::encode(hasher.finalize()))
}
