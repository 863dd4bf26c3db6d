use std::path::{Path, PathBuf};

use thiserror::Error;

use super::metadata::TRASH_DIR_NAME;
use crate::error::SyncError;

#[derive(Debug, Error)]
pub enum PathError {
    #[error("file name is empty")]
    Empty,
    #[error("file name contains unsupported component: {0}")]
    UnsupportedComponent(String),
}

impl From<PathError> for SyncError {
    fn from(err: PathError) -> Self {
        SyncError::Internal(err.to_string())
    }
}

/// Maps a file name into a sync directory. Names are the identity on both
/// sides, so anything that would escape the flat directory is rejected.
pub fn url_for(root: &Path, file_name: &str) -> Result<PathBuf, PathError> {
    if file_name.is_empty() {
        return Err(PathError::Empty);
    }
    if file_name.contains('/') || file_name.contains('\\') || file_name == "." || file_name == ".."
    {
        return Err(PathError::UnsupportedComponent(file_name.to_string()));
    }
    Ok(root.join(file_name))
}

/// Target url inside the cloud replica's reserved trash directory.
pub fn trash_url_for(container: &Path, file_name: &str) -> Result<PathBuf, PathError> {
    Ok(url_for(&container.join(TRASH_DIR_NAME), file_name)?)
}

/// Temp-file sibling written before an atomic replace of `target`.
pub(crate) fn partial_path(target: &Path) -> PathBuf {
    target.with_extension(format!(
        "{}partial",
        target
            .extension()
            .map(|ext| format!("{}.", ext.to_string_lossy()))
            .unwrap_or_default()
    ))
}
