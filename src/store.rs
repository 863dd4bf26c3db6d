use std::io;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("state file is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
    #[error("platform data directory is unavailable")]
    MissingDataDir,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct PersistedState {
    #[serde(default)]
    initial_sync_done: bool,
}

/// Persists the one flag that must survive restarts: whether the first
/// both-sides reconciliation has completed. Missing file means it has not.
#[derive(Debug, Clone)]
pub struct SyncStateStore {
    path: PathBuf,
}

impl SyncStateStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn new_default() -> Result<Self, StoreError> {
        let mut path = dirs::data_dir().ok_or(StoreError::MissingDataDir)?;
        path.push("marksyncd");
        path.push("state.json");
        Ok(Self::new(path))
    }

    pub fn initial_sync_done(&self) -> Result<bool, StoreError> {
        match std::fs::read(&self.path) {
            Ok(bytes) => Ok(serde_json::from_slice::<PersistedState>(&bytes)?.initial_sync_done),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    pub fn set_initial_sync_done(&self, done: bool) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let state = PersistedState {
            initial_sync_done: done,
        };
        std::fs::write(&self.path, serde_json::to_vec_pretty(&state)?)?;
        Ok(())
    }
}
