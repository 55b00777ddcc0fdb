//! Turning scanned records into a placement plan via a chat model.
//!
//! The model's answer is untrusted. It must be a JSON array of
//! `{input_image_path, output_image_path}` objects, every input must be a
//! path we submitted, and every output must land inside the destination
//! root. Anything else fails the whole plan.

use std::collections::{HashMap, HashSet};
use std::path::{Component, Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use unicode_normalization::UnicodeNormalization;

use crate::chat::ChatBackend;
use crate::error::PlanError;
use crate::media::MetadataRecord;

pub const SYSTEM_PROMPT: &str = "\
You are a program that gets as input images and data about them, such as places and dates, \
and outputs where the files should be located.
Always answer in JSON, with the keys \"input_image_path\" and \"output_image_path\". \
Output just a JSON array of such objects and nothing else. Start with [ and end with ].
Use the input paths exactly as given. Output paths must be inside the output folder.
If \"Multiple folders allowed\" is false, put all files into a single folder.";

static FENCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)^```[A-Za-z]*[ \t]*\r?\n(.*?)\r?\n?```$").unwrap());

/// Everything the model is told about one planning round.
pub struct PlanRequest<'a> {
    pub records: &'a [MetadataRecord],
    pub destination_root: &'a Path,
    /// Existing entries under the destination root, see [`crate::scan::list_destination`].
    pub destination_listing: &'a [String],
    pub multiple_folders: bool,
}

/// One accepted source → destination pair. Destinations are absolute
/// (joined onto the destination root).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placement {
    pub source: PathBuf,
    pub destination: PathBuf,
}

/// A validated plan. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacementPlan {
    pub destination_root: PathBuf,
    pub entries: Vec<Placement>,
}

impl PlacementPlan {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Placement> {
        self.entries.iter()
    }

    /// Destination of `placement` relative to the destination root.
    pub fn relative_destination(&self, placement: &Placement) -> PathBuf {
        pathdiff::diff_paths(&placement.destination, &self.destination_root)
            .unwrap_or_else(|| placement.destination.clone())
    }
}

#[derive(Serialize)]
struct PromptRecord<'a> {
    path: String,
    place: &'a str,
    date: Option<String>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawPlacement {
    input_image_path: String,
    output_image_path: String,
}

/// User prompt: records as JSON, the folder flag and the destination listing.
pub fn build_prompt(request: &PlanRequest<'_>) -> Result<String, PlanError> {
    let records: Vec<PromptRecord<'_>> = request
        .records
        .iter()
        .map(|r| PromptRecord {
            path: r.file_path.to_string_lossy().into_owned(),
            place: &r.place,
            date: r.captured_at.map(|d| d.format("%Y-%m-%d %H:%M:%S").to_string()),
        })
        .collect();
    let records =
        serde_json::to_string_pretty(&records).map_err(|e| PlanError::InvalidJson(e.to_string()))?;

    let listing = if request.destination_listing.is_empty() {
        "(empty)".to_string()
    } else {
        request.destination_listing.join("\n")
    };

    Ok(format!(
        "Image Info:\n{}\nMultiple folders allowed: {}\nOutput folder: {}\nExisting contents of the output folder:\n{}",
        records,
        request.multiple_folders,
        request.destination_root.display(),
        listing
    ))
}

/// Ask `backend` for a plan and validate it.
pub fn request_plan(
    backend: &dyn ChatBackend,
    request: &PlanRequest<'_>,
) -> Result<PlacementPlan, PlanError> {
    let prompt = build_prompt(request)?;
    debug!(records = request.records.len(), prompt_len = prompt.len(), "requesting plan");

    let response = backend.complete(SYSTEM_PROMPT, &prompt)?;
    let plan = parse_plan(&response, request)?;

    info!(entries = plan.len(), "plan accepted");
    Ok(plan)
}

/// Parse and validate a model response against the request it answers.
pub fn parse_plan(response: &str, request: &PlanRequest<'_>) -> Result<PlacementPlan, PlanError> {
    let body = strip_fence(response.trim());
    let raw: Vec<RawPlacement> =
        serde_json::from_str(body).map_err(|e| PlanError::InvalidJson(e.to_string()))?;

    let submitted: HashMap<String, &Path> = request
        .records
        .iter()
        .map(|r| (normalize(&r.file_path.to_string_lossy()), r.file_path.as_path()))
        .collect();

    let mut seen_sources = HashSet::new();
    let mut seen_destinations = HashSet::new();
    let mut entries = Vec::with_capacity(raw.len());

    for (index, entry) in raw.into_iter().enumerate() {
        let key = normalize(&entry.input_image_path);
        let Some(&source) = submitted.get(&key) else {
            return Err(PlanError::UnknownSource {
                index,
                path: entry.input_image_path,
            });
        };
        if !seen_sources.insert(key) {
            return Err(PlanError::DuplicateSource {
                index,
                path: entry.input_image_path,
            });
        }

        let destination = resolve_destination(request.destination_root, &entry.output_image_path)
            .ok_or_else(|| PlanError::UnsafeDestination {
                index,
                path: entry.output_image_path.clone(),
                root: request.destination_root.to_path_buf(),
            })?;
        if !seen_destinations.insert(destination.clone()) {
            return Err(PlanError::DuplicateDestination {
                index,
                path: destination,
            });
        }

        entries.push(Placement {
            source: source.to_path_buf(),
            destination,
        });
    }

    if !request.multiple_folders {
        let folders: HashSet<&Path> = entries.iter().filter_map(|e| e.destination.parent()).collect();
        if folders.len() > 1 {
            return Err(PlanError::SingleFolderViolated(folders.len()));
        }
    }

    let unplanned = request.records.len().saturating_sub(entries.len());
    if unplanned > 0 {
        warn!(unplanned, "files without a placement will not be copied");
    }

    Ok(PlacementPlan {
        destination_root: request.destination_root.to_path_buf(),
        entries,
    })
}

fn strip_fence(text: &str) -> &str {
    FENCE_RE
        .captures(text)
        .and_then(|c| c.get(1))
        .map_or(text, |m| m.as_str().trim())
}

fn normalize(path: &str) -> String {
    path.nfc().collect()
}

/// Map a model-supplied output path onto the destination root.
/// `None` if it would leave the root or names the root itself.
fn resolve_destination(root: &Path, raw: &str) -> Option<PathBuf> {
    let candidate = Path::new(raw.trim());
    let relative = match candidate.strip_prefix(root) {
        Ok(rest) => rest,
        Err(_) if candidate.is_absolute() => return None,
        Err(_) => candidate,
    };

    let mut clean = PathBuf::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => clean.push(part),
            Component::CurDir => {}
            _ => return None,
        }
    }
    if clean.as_os_str().is_empty() {
        return None;
    }
    Some(root.join(clean))
}
