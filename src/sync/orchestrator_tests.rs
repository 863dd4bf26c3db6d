use super::*;
use crate::sync::cloud_monitor::FolderPlatform;
use crate::sync::metadata::TRASH_DIR_NAME;
use async_trait::async_trait;
use filetime::FileTime;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::{TempDir, tempdir};

struct CountingLoader {
    loads: AtomicUsize,
}

impl CountingLoader {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            loads: AtomicUsize::new(0),
        })
    }
}

impl BookmarkLoader for CountingLoader {
    fn load(&self, done: LoadFinished) {
        self.loads.fetch_add(1, Ordering::SeqCst);
        done.signal();
    }
}

struct VersionedPlatform {
    container: PathBuf,
    versions: Mutex<HashMap<PathBuf, Vec<FileVersion>>>,
    resolved: Mutex<Vec<PathBuf>>,
}

#[async_trait]
impl CloudPlatform for VersionedPlatform {
    fn is_available(&self) -> bool {
        true
    }

    async fn container_url(&self) -> Result<PathBuf, SyncError> {
        Ok(self.container.clone())
    }

    async fn start_download(&self, _item: &CloudItem) -> Result<(), SyncError> {
        Ok(())
    }

    async fn unresolved_versions(&self, url: &Path) -> Result<Vec<FileVersion>, SyncError> {
        Ok(self
            .versions
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .unwrap_or_default())
    }

    async fn mark_versions_resolved(&self, url: &Path) -> Result<(), SyncError> {
        self.versions.lock().unwrap().remove(url);
        self.resolved.lock().unwrap().push(url.to_path_buf());
        Ok(())
    }
}

struct Fixture {
    local: TempDir,
    container: TempDir,
    loader: Arc<CountingLoader>,
}

impl Fixture {
    fn new() -> Self {
        Self {
            local: tempdir().unwrap(),
            container: tempdir().unwrap(),
            loader: CountingLoader::new(),
        }
    }

    fn orchestrator(&self) -> Orchestrator {
        Orchestrator::new(
            self.local.path().to_path_buf(),
            "phone".to_string(),
            Arc::new(FolderPlatform::new(self.container.path().to_path_buf())),
            Arc::clone(&self.loader) as Arc<dyn BookmarkLoader>,
        )
    }

    fn cloud_item(&self, name: &str, modified: i64) -> CloudItem {
        CloudItem {
            file_name: name.to_string(),
            file_url: self.container.path().join(name),
            file_size: None,
            content_type: "application/vnd.google-earth.kml+xml".to_string(),
            creation_date: modified,
            last_modification_date: modified,
            is_downloaded: true,
            download_fraction: Some(1.0),
            is_in_trash: false,
        }
    }

    fn local_item(&self, name: &str, modified: i64) -> LocalItem {
        LocalItem {
            file_name: name.to_string(),
            file_url: self.local.path().join(name),
            file_size: None,
            content_type: "application/vnd.google-earth.kml+xml".to_string(),
            creation_date: modified,
            last_modification_date: modified,
        }
    }
}

fn mtime_of(path: &Path) -> i64 {
    FileTime::from_last_modification_time(&std::fs::metadata(path).unwrap()).unix_seconds()
}

#[tokio::test]
async fn create_local_copies_bytes_stamps_mtime_and_reloads_bookmarks() {
    let fixture = Fixture::new();
    std::fs::write(fixture.container.path().join("a.kml"), b"<kml/>").unwrap();
    let orchestrator = fixture.orchestrator();

    let outcome = orchestrator
        .run_batch(vec![Action::CreateLocal(fixture.cloud_item("a.kml", 1_234))])
        .await;

    assert!(outcome.errors.is_empty());
    let target = fixture.local.path().join("a.kml");
    assert_eq!(std::fs::read(&target).unwrap(), b"<kml/>");
    assert_eq!(mtime_of(&target), 1_234);
    assert_eq!(fixture.loader.loads.load(Ordering::SeqCst), 1);
    assert!(!orchestrator.is_in_progress());
}

#[tokio::test]
async fn update_cloud_copies_bytes_and_stamps_the_local_date() {
    let fixture = Fixture::new();
    std::fs::write(fixture.local.path().join("b.kml"), b"edited").unwrap();
    std::fs::write(fixture.container.path().join("b.kml"), b"stale").unwrap();
    let orchestrator = fixture.orchestrator();

    let outcome = orchestrator
        .run_batch(vec![Action::UpdateCloud(fixture.local_item("b.kml", 99))])
        .await;

    assert!(outcome.errors.is_empty());
    let target = fixture.container.path().join("b.kml");
    assert_eq!(std::fs::read(&target).unwrap(), b"edited");
    assert_eq!(mtime_of(&target), 99);
    // Cloud-side writes alone do not touch the local model.
    assert_eq!(fixture.loader.loads.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn remove_local_treats_absence_as_success() {
    let fixture = Fixture::new();
    let orchestrator = fixture.orchestrator();

    let outcome = orchestrator
        .run_batch(vec![Action::RemoveLocal(fixture.cloud_item("gone.kml", 1))])
        .await;

    assert!(outcome.errors.is_empty());
    assert_eq!(fixture.loader.loads.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn remove_cloud_moves_into_trash_and_purges_the_older_tombstone() {
    let fixture = Fixture::new();
    std::fs::write(fixture.container.path().join("c.kml"), b"new corpse").unwrap();
    let trash_dir = fixture.container.path().join(TRASH_DIR_NAME);
    std::fs::create_dir(&trash_dir).unwrap();
    std::fs::write(trash_dir.join("c.kml"), b"old corpse").unwrap();
    let orchestrator = fixture.orchestrator();

    let outcome = orchestrator
        .run_batch(vec![Action::RemoveCloud(fixture.local_item("c.kml", 1))])
        .await;

    assert!(outcome.errors.is_empty());
    assert!(!fixture.container.path().join("c.kml").exists());
    assert_eq!(std::fs::read(trash_dir.join("c.kml")).unwrap(), b"new corpse");
}

#[tokio::test]
async fn a_failing_action_does_not_abort_its_siblings() {
    let fixture = Fixture::new();
    std::fs::write(fixture.container.path().join("ok.kml"), b"fine").unwrap();
    let orchestrator = fixture.orchestrator();

    let outcome = orchestrator
        .run_batch(vec![
            // Source bytes are missing, so this one fails.
            Action::CreateLocal(fixture.cloud_item("missing.kml", 5)),
            Action::CreateLocal(fixture.cloud_item("ok.kml", 6)),
        ])
        .await;

    assert_eq!(outcome.errors.len(), 1);
    assert!(matches!(outcome.errors[0], SyncError::FileUnavailable(_)));
    assert_eq!(
        std::fs::read(fixture.local.path().join("ok.kml")).unwrap(),
        b"fine"
    );
}

#[tokio::test]
async fn initial_sync_completed_is_reported_in_the_outcome() {
    let fixture = Fixture::new();
    let orchestrator = fixture.orchestrator();

    let outcome = orchestrator
        .run_batch(vec![Action::InitialSyncCompleted])
        .await;

    assert!(outcome.errors.is_empty());
    assert!(outcome.initial_sync_completed);
}

#[tokio::test]
async fn initial_collision_copy_preserves_history_under_device_name() {
    let fixture = Fixture::new();
    let source = fixture.local.path().join("x.kml");
    std::fs::write(&source, b"my history").unwrap();
    filetime::set_file_mtime(&source, FileTime::from_unix_time(50, 0)).unwrap();
    let orchestrator = fixture.orchestrator();

    let outcome = orchestrator
        .run_batch(vec![Action::ResolveInitialCollision(
            fixture.local_item("x.kml", 50),
        )])
        .await;

    assert!(outcome.errors.is_empty());
    let copy = fixture.local.path().join("x_phone_1.kml");
    assert_eq!(std::fs::read(&copy).unwrap(), b"my history");
    assert_eq!(mtime_of(&copy), 50);
    assert_eq!(fixture.loader.loads.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn cloud_write_diverts_to_version_conflict_resolution() {
    let fixture = Fixture::new();
    let current = fixture.container.path().join("v.kml");
    std::fs::write(&current, b"current").unwrap();
    std::fs::write(fixture.local.path().join("v.kml"), b"local edit").unwrap();
    let latest = fixture.container.path().join("v.kml.version2");
    std::fs::write(&latest, b"latest version").unwrap();

    let platform = Arc::new(VersionedPlatform {
        container: fixture.container.path().to_path_buf(),
        versions: Mutex::new(HashMap::from([(
            current.clone(),
            vec![
                FileVersion {
                    url: fixture.container.path().join("v.kml.version1"),
                    last_modification_date: 10,
                },
                FileVersion {
                    url: latest.clone(),
                    last_modification_date: 30,
                },
            ],
        )])),
        resolved: Mutex::new(Vec::new()),
    });
    let orchestrator = Orchestrator::new(
        fixture.local.path().to_path_buf(),
        "phone".to_string(),
        Arc::clone(&platform) as Arc<dyn CloudPlatform>,
        Arc::clone(&fixture.loader) as Arc<dyn BookmarkLoader>,
    );

    let outcome = orchestrator
        .run_batch(vec![Action::UpdateCloud(fixture.local_item("v.kml", 40))])
        .await;

    assert!(outcome.errors.is_empty());
    // The loser survives under a fresh name, the winner replaces current.
    assert_eq!(
        std::fs::read(fixture.container.path().join("v_1.kml")).unwrap(),
        b"current"
    );
    assert_eq!(std::fs::read(&current).unwrap(), b"latest version");
    assert_eq!(mtime_of(&current), 30);
    assert_eq!(*platform.resolved.lock().unwrap(), vec![current]);
    assert_eq!(fixture.loader.loads.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn missing_container_surfaces_container_not_found() {
    let fixture = Fixture::new();
    std::fs::write(fixture.local.path().join("a.kml"), b"bytes").unwrap();
    let missing = fixture.container.path().join("vanished");
    let orchestrator = Orchestrator::new(
        fixture.local.path().to_path_buf(),
        "phone".to_string(),
        Arc::new(FolderPlatform::new(missing)),
        Arc::clone(&fixture.loader) as Arc<dyn BookmarkLoader>,
    );

    let outcome = orchestrator
        .run_batch(vec![Action::CreateCloud(fixture.local_item("a.kml", 1))])
        .await;

    assert_eq!(outcome.errors, vec![SyncError::ContainerNotFound]);
}

#[tokio::test]
async fn reported_errors_flow_through_the_outcome() {
    let fixture = Fixture::new();
    let orchestrator = fixture.orchestrator();

    let outcome = orchestrator
        .run_batch(vec![Action::ReportError(SyncError::NoNetwork)])
        .await;

    assert_eq!(outcome.errors, vec![SyncError::NoNetwork]);
}
