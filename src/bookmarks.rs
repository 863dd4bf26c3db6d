use std::sync::Arc;

use tokio::sync::Semaphore;

/// Completion signal handed to the bookmark loader; the orchestrator
/// blocks the end of a batch on it.
pub struct LoadFinished {
    permits: Arc<Semaphore>,
}

impl LoadFinished {
    pub(crate) fn new(permits: Arc<Semaphore>) -> Self {
        Self { permits }
    }

    pub fn signal(self) {
        self.permits.add_permits(1);
    }
}

/// The application component that re-reads local files into the in-memory
/// bookmark model after the orchestrator mutates the local directory.
pub trait BookmarkLoader: Send + Sync {
    /// Must eventually call `done.signal()`, on any thread.
    fn load(&self, done: LoadFinished);
}

/// Loader used by the standalone daemon, which has no in-memory model.
pub struct NoopBookmarkLoader;

impl BookmarkLoader for NoopBookmarkLoader {
    fn load(&self, done: LoadFinished) {
        eprintln!("[marksyncd] bookmark reload requested (no embedded model)");
        done.signal();
    }
}
