//! Artifact selection.
//!
//! Picks up to `count` source artifacts from a directory (non-recursive). A source
//! artifact is a file whose name ends in [`ARTIFACT_EXTENSION`] and contains
//! [`RAW_MARKER`], so processed products sitting next to the raw frames are skipped.
//!
//! Order is whatever the directory listing yields. It is *not* sorted and is not
//! guaranteed to be stable across platforms or runs.

use crate::error::{AppResult, LoadTestError};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Extension of source artifacts.
pub const ARTIFACT_EXTENSION: &str = ".fits";

/// Substring marking an unprocessed artifact.
pub const RAW_MARKER: &str = "raw";

/// Whether a file name follows the source-artifact naming convention.
pub fn is_source_artifact(file_name: &str) -> bool {
    file_name.ends_with(ARTIFACT_EXTENSION) && file_name.contains(RAW_MARKER)
}

/// Select up to `count` source artifacts from `directory`, in listing order.
///
/// Returns fewer paths (possibly none) when fewer matches exist.
pub async fn select(directory: &Path, count: usize) -> AppResult<Vec<PathBuf>> {
    let listing_error = |source| LoadTestError::ArtifactSource {
        path: directory.to_path_buf(),
        source,
    };

    let mut selected = Vec::new();
    if count == 0 {
        return Ok(selected);
    }

    let mut entries = tokio::fs::read_dir(directory).await.map_err(listing_error)?;
    while let Some(entry) = entries.next_entry().await.map_err(listing_error)? {
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if is_source_artifact(name) {
            selected.push(entry.path());
            if selected.len() == count {
                break;
            }
        }
    }

    debug!(
        directory = %directory.display(),
        requested = count,
        selected = selected.len(),
        "artifacts selected"
    );
    Ok(selected)
}
