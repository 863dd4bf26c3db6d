use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;

const DEFAULT_LOCAL_DIR_NAME: &str = "Bookmarks";
const DEFAULT_CONTAINER_DIR_NAME: &str = "CloudBookmarks";
const DEFAULT_EXTENSION: &str = "kml";
const DEFAULT_DEVICE_NAME: &str = "this-device";
const DEFAULT_BATCH_WINDOW_MS: u64 = 1000;

#[derive(Clone, Debug)]
pub struct SyncConfig {
    pub local_root: PathBuf,
    pub container_root: PathBuf,
    /// Extension the engine operates on, without the leading dot.
    pub extension: String,
    /// Name mixed into collision-copy file names.
    pub device_name: String,
    /// Coalescing window for bursts of file-system notifications.
    pub batch_window: Duration,
    pub sync_enabled: bool,
}

impl SyncConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let home = dirs::home_dir().context("home directory is unavailable")?;
        let local_root = std::env::var("MARKSYNC_LOCAL_DIR")
            .ok()
            .map(|value| expand_with_home(&value, &home))
            .unwrap_or_else(|| home.join(DEFAULT_LOCAL_DIR_NAME));
        let container_root = std::env::var("MARKSYNC_CONTAINER_DIR")
            .ok()
            .map(|value| expand_with_home(&value, &home))
            .unwrap_or_else(|| home.join(DEFAULT_CONTAINER_DIR_NAME));
        let extension = std::env::var("MARKSYNC_EXTENSION")
            .map(|value| value.trim_start_matches('.').to_string())
            .ok()
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| DEFAULT_EXTENSION.to_string());
        let device_name = std::env::var("MARKSYNC_DEVICE_NAME")
            .or_else(|_| std::env::var("HOSTNAME"))
            .ok()
            .map(|value| sanitize_device_name(&value))
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| DEFAULT_DEVICE_NAME.to_string());
        let batch_window = Duration::from_millis(read_u64_env(
            "MARKSYNC_BATCH_WINDOW_MS",
            DEFAULT_BATCH_WINDOW_MS,
        ));
        let sync_enabled = read_bool_env("MARKSYNC_ENABLE_SYNC", true);

        Ok(Self {
            local_root,
            container_root,
            extension,
            device_name,
            batch_window,
            sync_enabled,
        })
    }
}

fn expand_with_home(value: &str, home: &Path) -> PathBuf {
    if value == "~" {
        return home.to_path_buf();
    }
    if let Some(rest) = value.strip_prefix("~/") {
        return home.join(rest);
    }
    PathBuf::from(value)
}

/// The device name lands inside generated file names; keep it path-safe.
fn sanitize_device_name(value: &str) -> String {
    value
        .trim()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' {
                c
            } else {
                '-'
            }
        })
        .collect()
}

fn read_u64_env(name: &str, default: u64) -> u64 {
    std::env::var(name)
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(default)
}

fn read_bool_env(name: &str, default: bool) -> bool {
    std::env::var(name)
        .ok()
        .map(|value| {
            matches!(
                value.trim().to_ascii_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            )
        })
        .unwrap_or(default)
}
