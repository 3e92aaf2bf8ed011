//! Artifact naming and removal.
//!
//! Request artifacts are `<key>.req`, response artifacts `<key>.resp`, all
//! flat in the broker directory.

use std::ffi::OsStr;
use std::io;
use std::path::{Path, PathBuf};

pub const REQUEST_EXTENSION: &str = "req";
pub const RESPONSE_EXTENSION: &str = "resp";

/// Path of the artifact for `key`, or `None` if the key cannot be a plain
/// file name inside the broker directory.
pub fn artifact_path(directory: &Path, key: &str, extension: &str) -> Option<PathBuf> {
    if key.is_empty() || key == "." || key == ".." || key.contains(['/', '\\', '\0']) {
        return None;
    }
    Some(directory.join(format!("{key}.{extension}")))
}

/// Message key of an artifact (its file stem).
pub fn artifact_key(path: &Path) -> Option<String> {
    path.file_stem()?.to_str().map(str::to_string)
}

pub fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .and_then(OsStr::to_str)
        .is_some_and(|ext| ext.eq_ignore_ascii_case(extension))
}

pub fn is_response_artifact(path: &Path) -> bool {
    has_extension(path, RESPONSE_EXTENSION)
}

/// Either kind of artifact; anything else in the directory is left alone.
pub fn is_artifact(path: &Path) -> bool {
    has_extension(path, REQUEST_EXTENSION) || is_response_artifact(path)
}

/// Delete an artifact, logging instead of failing.
///
/// Returns true if this call removed the file.
pub async fn remove_artifact(path: &Path) -> bool {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {
            tracing::info!(file = %display_name(path), "Artifact removed");
            true
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => false,
        Err(e) => {
            tracing::error!(file = %display_name(path), error = %e, "Failed to remove artifact");
            false
        }
    }
}

pub(crate) fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
