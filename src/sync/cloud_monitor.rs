use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::conflict::FileVersion;
use super::local_monitor::spawn_rescan_loop;
use super::metadata::{
    CloudInventory, CloudItem, TRASH_DIR_NAME, content_type_for, unix_seconds,
};
use super::monitor::{CloudMonitorControl, EventSender, MonitorControl, MonitorEvent};
use super::paths;
use crate::error::SyncError;

const PARTIAL_SUFFIX: &str = ".partial";

/// Capabilities of the platform owning the cloud replica, consumed by the
/// I/O orchestrator. Downloads are asynchronous: `start_download` returns
/// immediately and progress surfaces through the next cloud inventory.
#[async_trait]
pub trait CloudPlatform: Send + Sync {
    fn is_available(&self) -> bool;
    async fn container_url(&self) -> Result<PathBuf, SyncError>;
    async fn start_download(&self, item: &CloudItem) -> Result<(), SyncError>;
    /// Unresolved conflicting versions of the file at `url`; empty when
    /// the file has a single agreed-upon version.
    async fn unresolved_versions(&self, url: &Path) -> Result<Vec<FileVersion>, SyncError>;
    async fn mark_versions_resolved(&self, url: &Path) -> Result<(), SyncError>;
}

/// Watches the materialized cloud container directory. Items under the
/// reserved trash subdirectory report `is_in_trash`; a `.partial` sibling
/// written by the platform daemon marks an item as not yet downloaded.
pub struct CloudDirMonitor {
    container: PathBuf,
    extension: String,
    batch_window: Duration,
    events: EventSender,
    paused: Arc<AtomicBool>,
    running: Mutex<Option<Running>>,
}

struct Running {
    _watcher: RecommendedWatcher,
    cancel: CancellationToken,
    pings: mpsc::UnboundedSender<()>,
}

impl CloudDirMonitor {
    pub fn new(
        container: PathBuf,
        extension: String,
        batch_window: Duration,
        events: EventSender,
    ) -> Self {
        Self {
            container,
            extension,
            batch_window,
            events,
            paused: Arc::new(AtomicBool::new(false)),
            running: Mutex::new(None),
        }
    }
}

impl MonitorControl for CloudDirMonitor {
    fn start(&self) -> Result<(), SyncError> {
        let mut running = self.running.lock().expect("monitor mutex poisoned");
        if running.is_some() {
            return Ok(());
        }
        if !self.container.is_dir() {
            return Err(SyncError::ContainerNotFound);
        }

        let inventory = scan_cloud(&self.container, &self.extension)?;
        let _ = self.events.send(MonitorEvent::CloudGathered(inventory));

        let (ping_tx, ping_rx) = mpsc::unbounded_channel();
        let watcher_tx = ping_tx.clone();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            if res.is_ok() {
                let _ = watcher_tx.send(());
            }
        })
        .map_err(|err| SyncError::Internal(err.to_string()))?;
        // Recursive so tombstones appearing in the trash are observed too.
        watcher
            .watch(&self.container, RecursiveMode::Recursive)
            .map_err(|err| SyncError::Internal(err.to_string()))?;

        let cancel = CancellationToken::new();
        let container = self.container.clone();
        let extension = self.extension.clone();
        spawn_rescan_loop(
            self.batch_window,
            self.events.clone(),
            Arc::clone(&self.paused),
            cancel.clone(),
            ping_rx,
            move || scan_cloud(&container, &extension),
            MonitorEvent::CloudUpdated,
        );

        self.paused.store(false, Ordering::SeqCst);
        *running = Some(Running {
            _watcher: watcher,
            cancel,
            pings: ping_tx,
        });
        Ok(())
    }

    fn stop(&self) {
        if let Some(running) = self.running.lock().expect("monitor mutex poisoned").take() {
            running.cancel.cancel();
        }
    }

    fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
        self.request_scan();
    }

    fn request_scan(&self) {
        if let Some(running) = self.running.lock().expect("monitor mutex poisoned").as_ref() {
            let _ = running.pings.send(());
        }
    }
}

impl CloudMonitorControl for CloudDirMonitor {
    fn is_available(&self) -> bool {
        self.container.is_dir()
    }

    fn is_started(&self) -> bool {
        self.running.lock().expect("monitor mutex poisoned").is_some()
    }

    fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    fn fetch_container_url(&self) -> Result<PathBuf, SyncError> {
        if self.container.is_dir() {
            Ok(self.container.clone())
        } else {
            Err(SyncError::ContainerNotFound)
        }
    }
}

/// Full scan of the container: live items in the root, tombstones in the
/// trash, pending downloads from `.partial` sentinels.
pub fn scan_cloud(container: &Path, extension: &str) -> std::io::Result<CloudInventory> {
    let mut inventory = CloudInventory::new();
    let partial_suffix = format!(".{extension}{PARTIAL_SUFFIX}");
    let mut partials: HashMap<String, u64> = HashMap::new();

    for entry in std::fs::read_dir(container)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if let Some(base) = name.strip_suffix(PARTIAL_SUFFIX)
            && name.ends_with(&partial_suffix)
        {
            partials.insert(base.to_string(), entry.metadata()?.len());
        }
    }

    for entry in std::fs::read_dir(container)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let path = entry.path();
        if path.extension() != Some(std::ffi::OsStr::new(extension)) {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        let meta = entry.metadata()?;
        let pending = partials.remove(&name);
        let fraction = pending.and_then(|done| {
            (meta.len() > 0).then(|| (done as f64 / meta.len() as f64).clamp(0.0, 1.0))
        });
        let modified = meta.modified().map(unix_seconds).unwrap_or_default();
        let created = meta.created().map(unix_seconds).unwrap_or(modified);
        inventory.insert(
            name.clone(),
            CloudItem {
                file_name: name,
                file_url: path,
                file_size: Some(meta.len()),
                content_type: content_type_for(extension).to_string(),
                creation_date: created,
                last_modification_date: modified,
                is_downloaded: pending.is_none(),
                download_fraction: if pending.is_none() { Some(1.0) } else { fraction },
                is_in_trash: false,
            },
        );
    }

    // Items the platform is still materializing: only the sentinel exists.
    for (name, _) in partials {
        let partial_meta = std::fs::metadata(container.join(format!("{name}{PARTIAL_SUFFIX}")))?;
        let modified = partial_meta.modified().map(unix_seconds).unwrap_or_default();
        inventory.insert(
            name.clone(),
            CloudItem {
                file_url: container.join(&name),
                file_name: name,
                file_size: None,
                content_type: content_type_for(extension).to_string(),
                creation_date: modified,
                last_modification_date: modified,
                is_downloaded: false,
                download_fraction: None,
                is_in_trash: false,
            },
        );
    }

    let trash = container.join(TRASH_DIR_NAME);
    if trash.is_dir() {
        for entry in std::fs::read_dir(&trash)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let path = entry.path();
            if path.extension() != Some(std::ffi::OsStr::new(extension)) {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            // A live item recreated after deletion shadows its tombstone.
            if inventory.contains_key(&name) {
                continue;
            }
            let meta = entry.metadata()?;
            let modified = meta.modified().map(unix_seconds).unwrap_or_default();
            let created = meta.created().map(unix_seconds).unwrap_or(modified);
            inventory.insert(
                name.clone(),
                CloudItem {
                    file_name: name,
                    file_url: path,
                    file_size: Some(meta.len()),
                    content_type: content_type_for(extension).to_string(),
                    creation_date: created,
                    last_modification_date: modified,
                    is_downloaded: true,
                    download_fraction: Some(1.0),
                    is_in_trash: true,
                },
            );
        }
    }

    Ok(inventory)
}

/// Directory-backed stand-in for the platform's cloud daemon: the
/// container is a plain folder, downloads materialize pending `.partial`
/// sentinels, and no version store exists.
pub struct FolderPlatform {
    container: PathBuf,
}

impl FolderPlatform {
    pub fn new(container: PathBuf) -> Self {
        Self { container }
    }
}

#[async_trait]
impl CloudPlatform for FolderPlatform {
    fn is_available(&self) -> bool {
        self.container.is_dir()
    }

    async fn container_url(&self) -> Result<PathBuf, SyncError> {
        if self.container.is_dir() {
            Ok(self.container.clone())
        } else {
            Err(SyncError::ContainerNotFound)
        }
    }

    async fn start_download(&self, item: &CloudItem) -> Result<(), SyncError> {
        let partial = paths::partial_path(&item.file_url);
        match tokio::fs::rename(&partial, &item.file_url).await {
            Ok(()) => Ok(()),
            // Nothing pending; the next observation decides what remains.
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    async fn unresolved_versions(&self, _url: &Path) -> Result<Vec<FileVersion>, SyncError> {
        Ok(Vec::new())
    }

    async fn mark_versions_resolved(&self, _url: &Path) -> Result<(), SyncError> {
        Ok(())
    }
}
