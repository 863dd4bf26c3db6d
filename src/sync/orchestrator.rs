use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tokio::sync::Semaphore;

use super::cloud_monitor::CloudPlatform;
use super::conflict::{self, FileVersion};
use super::coordinated;
use super::metadata::{CloudItem, LocalItem};
use super::paths;
use super::reconcile::Action;
use crate::bookmarks::{BookmarkLoader, LoadFinished};
use crate::error::SyncError;

#[derive(Debug, Default, Clone, Copy)]
struct BatchFlags {
    in_progress: bool,
    reload_bookmarks: bool,
}

/// What one drained batch reported back to the controller.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub errors: Vec<SyncError>,
    pub initial_sync_completed: bool,
}

/// Executes reconcile batches one action at a time against the shared file
/// system. Failures are collected per action and never abort siblings; the
/// monitors' next observation re-derives whatever is still outstanding.
pub struct Orchestrator {
    local_root: PathBuf,
    device_name: String,
    platform: Arc<dyn CloudPlatform>,
    bookmarks: Arc<dyn BookmarkLoader>,
    flags: Mutex<BatchFlags>,
    reload_done: Arc<Semaphore>,
}

impl Orchestrator {
    pub fn new(
        local_root: PathBuf,
        device_name: String,
        platform: Arc<dyn CloudPlatform>,
        bookmarks: Arc<dyn BookmarkLoader>,
    ) -> Self {
        Self {
            local_root,
            device_name,
            platform,
            bookmarks,
            flags: Mutex::new(BatchFlags::default()),
            reload_done: Arc::new(Semaphore::new(0)),
        }
    }

    pub fn is_in_progress(&self) -> bool {
        self.flags.lock().expect("flags mutex poisoned").in_progress
    }

    pub async fn run_batch(&self, actions: Vec<Action>) -> BatchOutcome {
        {
            let mut flags = self.flags.lock().expect("flags mutex poisoned");
            flags.in_progress = true;
        }

        let mut outcome = BatchOutcome::default();
        for action in actions {
            eprintln!(
                "[marksyncd] action start: kind={} file={}",
                action.kind(),
                action.file_name().unwrap_or("-")
            );
            match self.execute(&action).await {
                Ok(()) => {
                    eprintln!(
                        "[marksyncd] action done: kind={} file={}",
                        action.kind(),
                        action.file_name().unwrap_or("-")
                    );
                }
                Err(err) => {
                    eprintln!(
                        "[marksyncd] action failed: kind={} file={} err={}",
                        action.kind(),
                        action.file_name().unwrap_or("-"),
                        err
                    );
                    outcome.errors.push(err);
                }
            }
            if matches!(action, Action::InitialSyncCompleted) {
                outcome.initial_sync_completed = true;
            }
        }

        let reload = {
            let mut flags = self.flags.lock().expect("flags mutex poisoned");
            flags.in_progress = false;
            std::mem::take(&mut flags.reload_bookmarks)
        };
        if reload {
            self.reload_and_wait().await;
        }

        outcome
    }

    async fn execute(&self, action: &Action) -> Result<(), SyncError> {
        match action {
            Action::StartDownload(item) => self.platform.start_download(item).await,
            Action::CreateLocal(item) | Action::UpdateLocal(item) => {
                self.write_local_from_cloud(item).await
            }
            Action::RemoveLocal(item) => self.remove_local(item).await,
            Action::CreateCloud(item) | Action::UpdateCloud(item) => {
                self.write_cloud_from_local(item).await
            }
            Action::RemoveCloud(item) => self.trash_cloud(item).await,
            Action::ResolveVersionConflict(item) => {
                self.resolve_version_conflict(&item.file_url).await
            }
            Action::ResolveInitialCollision(item) => self.resolve_initial_collision(item).await,
            Action::InitialSyncCompleted => Ok(()),
            Action::ReportError(err) => Err(err.clone()),
        }
    }

    async fn reload_and_wait(&self) {
        self.bookmarks
            .load(LoadFinished::new(self.reload_done.clone()));
        if let Ok(permit) = self.reload_done.acquire().await {
            permit.forget();
        }
    }

    fn mark_reload(&self) {
        self.flags
            .lock()
            .expect("flags mutex poisoned")
            .reload_bookmarks = true;
    }
}

include!("orchestrator_impl_ops.rs");

async fn run_blocking<T, F>(f: F) -> Result<T, SyncError>
where
    F: FnOnce() -> io::Result<T> + Send + 'static,
    T: Send + 'static,
{
    match tokio::task::spawn_blocking(f).await {
        Ok(result) => result.map_err(SyncError::from),
        Err(join) => Err(SyncError::Internal(join.to_string())),
    }
}

/// Coordinated copy: reader lock on the source, writer lock on the
/// destination, temp-file write with atomic rename, modification date
/// stamped from the source item.
fn copy_coordinated(source: &Path, target: &Path, modified: i64) -> io::Result<()> {
    let _read = coordinated::read(source)?;
    let _write = coordinated::write(target)?;
    conflict::replace_with(target, source, modified)
}

#[cfg(test)]
#[path = "orchestrator_tests.rs"]
mod tests;
