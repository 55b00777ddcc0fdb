use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::control::{self, CancellationToken};
use crate::error::{ScanError, UnsupportedExtension};
use crate::geocode::PlaceResolver;
use crate::media::MetadataRecord;
use crate::metadata::{capture_time, geolocation, read_tags};
use crate::ProgressCallback;

/// Extensions scanned when the user makes no selection.
pub const SCAN_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "tiff"];

/// Camera RAW extensions the user may additionally select.
pub const RAW_EXTENSIONS: &[&str] = &["nef", "cr2", "arw", "raf"];

/// Set of file extensions to scan. Matching ignores case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtensionFilter {
    extensions: BTreeSet<String>,
}

impl Default for ExtensionFilter {
    fn default() -> Self {
        Self {
            extensions: SCAN_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
        }
    }
}

impl ExtensionFilter {
    /// Build a filter from user-selected extensions (`"JPG"`, `".nef"`, ...).
    pub fn new<I, S>(selected: I) -> Result<Self, UnsupportedExtension>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut extensions = BTreeSet::new();
        for ext in selected {
            let normalized = ext.as_ref().trim().trim_start_matches('.').to_ascii_lowercase();
            if !is_selectable(&normalized) {
                return Err(UnsupportedExtension(ext.as_ref().to_string()));
            }
            extensions.insert(normalized);
        }
        if extensions.is_empty() {
            return Ok(Self::default());
        }
        Ok(Self { extensions })
    }

    pub fn matches(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map_or(false, |e| self.extensions.contains(&e.to_ascii_lowercase()))
    }

    pub fn extensions(&self) -> impl Iterator<Item = &str> {
        self.extensions.iter().map(String::as_str)
    }
}

fn is_selectable(ext: &str) -> bool {
    SCAN_EXTENSIONS.contains(&ext) || RAW_EXTENSIONS.contains(&ext)
}

/// Recursively list files under `root` whose extension passes `filter`,
/// in walk order.
pub fn collect_files(root: &Path, filter: &ExtensionFilter) -> Result<Vec<PathBuf>, ScanError> {
    let meta = fs::metadata(root).map_err(|source| ScanError::Root {
        path: root.to_path_buf(),
        source,
    })?;
    if !meta.is_dir() {
        return Err(ScanError::Root {
            path: root.to_path_buf(),
            source: io::Error::other("not a directory"),
        });
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(root).follow_links(true) {
        match entry {
            Ok(e) if e.file_type().is_file() && filter.matches(e.path()) => {
                files.push(e.into_path());
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, "skipping unreadable entry"),
        }
    }
    Ok(files)
}

/// Build the record for one file. Never fails: unreadable metadata leaves
/// the place unknown and the date absent.
pub fn extract_record(path: &Path, resolver: &dyn PlaceResolver) -> MetadataRecord {
    let mut record = MetadataRecord::new(path.to_path_buf());

    let tags = match read_tags(path) {
        Ok(tags) => tags,
        Err(e) => {
            warn!(error = %e, "skipping metadata");
            return record;
        }
    };

    match geolocation(&tags) {
        Some(Ok(coords)) => record.place = resolver.resolve(coords),
        Some(Err(e)) => warn!(path = %path.display(), error = %e, "malformed GPS tags"),
        None => debug!(path = %path.display(), "no geolocation"),
    }

    match capture_time(&tags) {
        Ok(captured_at) => record.captured_at = captured_at,
        Err(e) => warn!(path = %path.display(), error = %e, "ignoring capture time"),
    }

    record
}

/// Scan `root` and produce one record per matching file.
///
/// Per-file problems never abort the scan. Cancellation abandons the whole
/// folder.
pub fn scan_folder(
    root: &Path,
    filter: &ExtensionFilter,
    resolver: &dyn PlaceResolver,
    progress: &ProgressCallback<'_>,
    cancel: Option<&CancellationToken>,
) -> Result<Vec<MetadataRecord>, ScanError> {
    control::check(cancel)?;
    let files = collect_files(root, filter)?;
    let total = files.len() as u64;

    let mut records = Vec::with_capacity(files.len());
    for (i, path) in files.iter().enumerate() {
        control::check(cancel)?;
        progress("scan", i as u64, total, &path.display().to_string());
        records.push(extract_record(path, resolver));
    }

    info!(
        root = %root.display(),
        files = records.len(),
        located = records.iter().filter(|r| r.has_place()).count(),
        "scan complete"
    );
    Ok(records)
}

/// Recursive listing of what already exists under the destination root,
/// relative to it. Directories end with `/`. A missing root lists nothing.
pub fn list_destination(root: &Path) -> Vec<String> {
    if !root.is_dir() {
        return Vec::new();
    }
    WalkDir::new(root)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .filter_map(|e| {
            let rel = pathdiff::diff_paths(e.path(), root)?;
            let mut line = rel.to_string_lossy().replace('\\', "/");
            if e.file_type().is_dir() {
                line.push('/');
            }
            Some(line)
        })
        .collect()
}
