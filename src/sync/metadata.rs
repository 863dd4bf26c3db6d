use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Reserved subdirectory of the cloud replica holding files marked for
/// deletion. A cloud-side removal moves the file here; bytes are never
/// erased by this engine.
pub const TRASH_DIR_NAME: &str = ".Trash";

/// Snapshot of one file in the local directory at observation time.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalItem {
    /// Unique key within the local side.
    pub file_name: String,
    pub file_url: PathBuf,
    pub file_size: Option<u64>,
    pub content_type: String,
    pub creation_date: i64,
    pub last_modification_date: i64,
}

/// Snapshot of one file in the cloud replica at observation time.
#[derive(Debug, Clone, PartialEq)]
pub struct CloudItem {
    /// Unique key within the cloud side.
    pub file_name: String,
    pub file_url: PathBuf,
    pub file_size: Option<u64>,
    pub content_type: String,
    pub creation_date: i64,
    pub last_modification_date: i64,
    /// False while the platform has not materialized the bytes locally.
    pub is_downloaded: bool,
    pub download_fraction: Option<f64>,
    /// Derived from the url containing the reserved trash directory.
    pub is_in_trash: bool,
}

/// Complete mapping from file name to metadata on one side at one instant.
pub type LocalInventory = HashMap<String, LocalItem>;
pub type CloudInventory = HashMap<String, CloudItem>;

pub fn is_trash_url(url: &Path) -> bool {
    url.components()
        .any(|component| component.as_os_str() == TRASH_DIR_NAME)
}

pub(crate) fn unix_seconds(time: std::time::SystemTime) -> i64 {
    match time.duration_since(std::time::UNIX_EPOCH) {
        Ok(since) => since.as_secs() as i64,
        Err(before) => -(before.duration().as_secs() as i64),
    }
}

pub fn content_type_for(extension: &str) -> &'static str {
    match extension {
        "kml" => "application/vnd.google-earth.kml+xml",
        "kmz" => "application/vnd.google-earth.kmz",
        "gpx" => "application/gpx+xml",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trash_membership_is_derived_from_the_url() {
        assert!(is_trash_url(Path::new("/container/.Trash/a.kml")));
        assert!(!is_trash_url(Path::new("/container/a.kml")));
        assert!(!is_trash_url(Path::new("/container/Trash/a.kml")));
    }

    #[test]
    fn known_extensions_map_to_content_types() {
        assert_eq!(
            content_type_for("kml"),
            "application/vnd.google-earth.kml+xml"
        );
        assert_eq!(content_type_for("bin"), "application/octet-stream");
    }
}
