use std::path::PathBuf;

use tokio::sync::mpsc;

use super::metadata::{CloudInventory, LocalInventory};
use crate::error::SyncError;

/// What a directory monitor must deliver: complete inventories, never
/// deltas. `LocalGathered`/`CloudGathered` fire exactly once per start
/// (the initial full scan); updates repeat the full current inventory.
#[derive(Debug, Clone)]
pub enum MonitorEvent {
    LocalGathered(LocalInventory),
    LocalUpdated(LocalInventory),
    CloudGathered(CloudInventory),
    CloudUpdated(CloudInventory),
    MonitorError(SyncError),
}

pub type EventSender = mpsc::UnboundedSender<MonitorEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<MonitorEvent>;

pub fn event_channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}

/// Capability set every monitor exposes to the lifecycle controller.
pub trait MonitorControl: Send + Sync {
    fn start(&self) -> Result<(), SyncError>;
    fn stop(&self);
    /// Suppresses update emission; observed changes are folded into the
    /// full inventory emitted on resume.
    fn pause(&self);
    fn resume(&self);
    /// Requests an out-of-band full rescan (bookmark-change notifications).
    fn request_scan(&self);
}

/// Extra surface of the cloud-side monitor.
pub trait CloudMonitorControl: MonitorControl {
    fn is_available(&self) -> bool;
    fn is_started(&self) -> bool;
    fn is_paused(&self) -> bool;
    fn fetch_container_url(&self) -> Result<PathBuf, SyncError>;
}
