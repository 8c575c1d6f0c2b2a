//! Capture discovery
//!
//! Lists the capture layers exported into a captures folder.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::config::Conventions;
use crate::error::{ModStackError, Result};
use crate::layers::{CaptureInfo, LayerRole, RoleRegistry};
use crate::storage::LayerStorage;

/// One capture layer found on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureEntry {
    pub path: PathBuf,
    pub identifier: String,
    pub info: CaptureInfo,
    /// SHA-256 of the file content, hex encoded.
    pub fingerprint: String,
}

impl CaptureEntry {
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Whether `path` names a captures folder (`captures` or `capture`).
pub fn is_capture_folder(path: &Path, conventions: &Conventions) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(|name| name == conventions.captures_folder || name == conventions.legacy_capture_folder)
        .unwrap_or(false)
}

/// The canonical captures folder of a project directory.
pub fn capture_dir(project_dir: &Path, conventions: &Conventions) -> PathBuf {
    project_dir
        .join(&conventions.deps_folder)
        .join(&conventions.captures_folder)
}

/// List the capture layers directly inside `dir`, newest name first.
///
/// Files that do not open as layers, or open without the capture role, are
/// skipped. A missing directory yields an empty list.
///
/// # Errors
/// `ValidationInput` when `dir` is not a captures folder, and storage
/// failures while walking the directory or fingerprinting a capture.
pub fn discover_captures<S>(storage: &S, dir: &Path, conventions: &Conventions) -> Result<Vec<CaptureEntry>>
where
    S: LayerStorage + ?Sized,
{
    if !is_capture_folder(dir, conventions) {
        return Err(ModStackError::invalid_input(format!(
            "{} is not a capture folder",
            dir.display()
        )));
    }
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut entries = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry.map_err(|e| ModStackError::Io(e.into()))?;
        if !entry.file_type().is_file() || !conventions.is_layer_file(entry.path()) {
            continue;
        }

        let identifier = entry.path().display().to_string();
        let layer = match storage.open(&identifier) {
            Ok(layer) => layer,
            Err(err) => {
                warn!(path = %identifier, error = %err, "skipping unreadable layer file");
                continue;
            }
        };
        if !RoleRegistry::has_role(&layer, LayerRole::Capture) {
            continue;
        }

        entries.push(CaptureEntry {
            path: entry.path().to_path_buf(),
            info: CaptureInfo::read(&layer),
            fingerprint: storage.fingerprint(&identifier)?,
            identifier,
        });
    }

    entries.sort_by(|a, b| b.file_name().cmp(&a.file_name()));
    debug!(dir = %dir.display(), captures = entries.len(), "captures discovered");
    Ok(entries)
}
