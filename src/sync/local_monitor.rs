use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::metadata::{LocalInventory, LocalItem, content_type_for, unix_seconds};
use super::monitor::{EventSender, MonitorControl, MonitorEvent};
use crate::error::SyncError;

/// Watches the local bookmark directory and reports complete inventories:
/// one `LocalGathered` per start, then a debounced `LocalUpdated` per burst
/// of file-system notifications.
pub struct LocalDirMonitor {
    root: PathBuf,
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

impl LocalDirMonitor {
    pub fn new(
        root: PathBuf,
        extension: String,
        batch_window: Duration,
        events: EventSender,
    ) -> Self {
        Self {
            root,
            extension,
            batch_window,
            events,
            paused: Arc::new(AtomicBool::new(false)),
            running: Mutex::new(None),
        }
    }
}

impl MonitorControl for LocalDirMonitor {
    fn start(&self) -> Result<(), SyncError> {
        let mut running = self.running.lock().expect("monitor mutex poisoned");
        if running.is_some() {
            return Ok(());
        }

        let inventory = scan_local(&self.root, &self.extension)?;
        let _ = self.events.send(MonitorEvent::LocalGathered(inventory));

        let (ping_tx, ping_rx) = mpsc::unbounded_channel();
        let watcher_tx = ping_tx.clone();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            if res.is_ok() {
                let _ = watcher_tx.send(());
            }
        })
        .map_err(|err| SyncError::Internal(err.to_string()))?;
        watcher
            .watch(&self.root, RecursiveMode::NonRecursive)
            .map_err(|err| SyncError::Internal(err.to_string()))?;

        let cancel = CancellationToken::new();
        let root = self.root.clone();
        let extension = self.extension.clone();
        spawn_rescan_loop(
            self.batch_window,
            self.events.clone(),
            Arc::clone(&self.paused),
            cancel.clone(),
            ping_rx,
            move || scan_local(&root, &extension),
            MonitorEvent::LocalUpdated,
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
        // Whatever changed while paused is folded into one fresh inventory.
        self.request_scan();
    }

    fn request_scan(&self) {
        if let Some(running) = self.running.lock().expect("monitor mutex poisoned").as_ref() {
            let _ = running.pings.send(());
        }
    }
}

/// Shared debounce loop of both directory monitors: coalesce a burst of
/// notifications over one batching window, then emit a full rescan.
pub(crate) fn spawn_rescan_loop<I, F>(
    batch_window: Duration,
    events: EventSender,
    paused: Arc<AtomicBool>,
    cancel: CancellationToken,
    mut pings: mpsc::UnboundedReceiver<()>,
    scan: F,
    emit: fn(I) -> MonitorEvent,
) where
    I: Send + 'static,
    F: Fn() -> std::io::Result<I> + Send + 'static,
{
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                ping = pings.recv() => {
                    if ping.is_none() {
                        break;
                    }
                    tokio::time::sleep(batch_window).await;
                    while pings.try_recv().is_ok() {}
                    if paused.load(Ordering::SeqCst) {
                        continue;
                    }
                    match scan() {
                        Ok(inventory) => {
                            let _ = events.send(emit(inventory));
                        }
                        Err(err) => {
                            let _ = events.send(MonitorEvent::MonitorError(SyncError::from(err)));
                        }
                    }
                }
            }
        }
    });
}

/// Full scan of the flat local directory, filtered to one extension.
pub fn scan_local(root: &Path, extension: &str) -> std::io::Result<LocalInventory> {
    let mut inventory = LocalInventory::new();
    for entry in std::fs::read_dir(root)? {
        let entry = entry?;
        let file_type = entry.file_type()?;
        if file_type.is_symlink() || !file_type.is_file() {
            continue;
        }
        let path = entry.path();
        if path.extension() != Some(std::ffi::OsStr::new(extension)) {
            continue;
        }
        let Some(file_name) = path.file_name().map(|name| name.to_string_lossy().into_owned())
        else {
            continue;
        };
        let meta = entry.metadata()?;
        let modified = meta.modified().map(unix_seconds).unwrap_or_default();
        let created = meta.created().map(unix_seconds).unwrap_or(modified);
        inventory.insert(
            file_name.clone(),
            LocalItem {
                file_name,
                file_url: path,
                file_size: Some(meta.len()),
                content_type: content_type_for(extension).to_string(),
                creation_date: created,
                last_modification_date: modified,
            },
        );
    }
    Ok(inventory)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::monitor::event_channel;
    use tempfile::tempdir;
    use tokio::time::timeout;

    #[test]
    fn scan_filters_by_extension_and_skips_directories() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("a.kml"), b"<kml/>").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"not a bookmark").unwrap();
        std::fs::create_dir(dir.path().join("nested.kml")).unwrap();

        let inventory = scan_local(dir.path(), "kml").unwrap();
        assert_eq!(inventory.len(), 1);
        let item = &inventory["a.kml"];
        assert_eq!(item.file_size, Some(6));
        assert_eq!(item.file_url, dir.path().join("a.kml"));
    }

    #[tokio::test]
    async fn start_gathers_once_and_rescans_on_request() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("a.kml"), b"a").unwrap();

        let (tx, mut rx) = event_channel();
        let monitor = LocalDirMonitor::new(
            dir.path().to_path_buf(),
            "kml".to_string(),
            Duration::from_millis(10),
            tx,
        );
        monitor.start().unwrap();

        let gathered = timeout(Duration::from_secs(1), rx.recv()).await.unwrap();
        match gathered {
            Some(MonitorEvent::LocalGathered(inventory)) => {
                assert_eq!(inventory.len(), 1);
            }
            other => panic!("expected gathered inventory, got {other:?}"),
        }

        std::fs::write(dir.path().join("b.kml"), b"b").unwrap();
        monitor.request_scan();
        let updated = timeout(Duration::from_secs(1), rx.recv()).await.unwrap();
        match updated {
            Some(MonitorEvent::LocalUpdated(inventory)) => {
                assert_eq!(inventory.len(), 2);
            }
            other => panic!("expected updated inventory, got {other:?}"),
        }

        monitor.stop();
    }

    #[tokio::test]
    async fn paused_monitor_suppresses_updates_until_resume() {
        let dir = tempdir().unwrap();
        let (tx, mut rx) = event_channel();
        let monitor = LocalDirMonitor::new(
            dir.path().to_path_buf(),
            "kml".to_string(),
            Duration::from_millis(10),
            tx,
        );
        monitor.start().unwrap();
        assert!(matches!(
            timeout(Duration::from_secs(1), rx.recv()).await.unwrap(),
            Some(MonitorEvent::LocalGathered(_))
        ));

        monitor.pause();
        std::fs::write(dir.path().join("late.kml"), b"late").unwrap();
        monitor.request_scan();
        assert!(
            timeout(Duration::from_millis(200), rx.recv()).await.is_err(),
            "paused monitor must not emit"
        );

        monitor.resume();
        let updated = timeout(Duration::from_secs(1), rx.recv()).await.unwrap();
        match updated {
            Some(MonitorEvent::LocalUpdated(inventory)) => {
                assert!(inventory.contains_key("late.kml"));
            }
            other => panic!("expected updated inventory, got {other:?}"),
        }

        monitor.stop();
    }
}
