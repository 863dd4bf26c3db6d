use super::metadata::{CloudInventory, CloudItem, LocalInventory, LocalItem};
use crate::error::SyncError;

/// Inputs of one reconciliation pass.
#[derive(Debug, Clone)]
pub enum SyncEvent {
    FinishedGatheringLocal(LocalInventory),
    FinishedGatheringCloud(CloudInventory),
    UpdatedLocal(LocalInventory),
    UpdatedCloud(CloudInventory),
    Error(SyncError),
    Reset,
}

/// Outputs of one reconciliation pass, executed by the I/O orchestrator.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    CreateLocal(CloudItem),
    UpdateLocal(CloudItem),
    RemoveLocal(CloudItem),
    StartDownload(CloudItem),
    CreateCloud(LocalItem),
    UpdateCloud(LocalItem),
    RemoveCloud(LocalItem),
    ResolveVersionConflict(CloudItem),
    ResolveInitialCollision(LocalItem),
    InitialSyncCompleted,
    ReportError(SyncError),
}

impl Action {
    pub fn kind(&self) -> &'static str {
        match self {
            Action::CreateLocal(_) => "create_local",
            Action::UpdateLocal(_) => "update_local",
            Action::RemoveLocal(_) => "remove_local",
            Action::StartDownload(_) => "start_download",
            Action::CreateCloud(_) => "create_cloud",
            Action::UpdateCloud(_) => "update_cloud",
            Action::RemoveCloud(_) => "remove_cloud",
            Action::ResolveVersionConflict(_) => "resolve_version_conflict",
            Action::ResolveInitialCollision(_) => "resolve_initial_collision",
            Action::InitialSyncCompleted => "initial_sync_completed",
            Action::ReportError(_) => "report_error",
        }
    }

    pub fn file_name(&self) -> Option<&str> {
        match self {
            Action::CreateLocal(item)
            | Action::UpdateLocal(item)
            | Action::RemoveLocal(item)
            | Action::StartDownload(item)
            | Action::ResolveVersionConflict(item) => Some(&item.file_name),
            Action::CreateCloud(item)
            | Action::UpdateCloud(item)
            | Action::RemoveCloud(item)
            | Action::ResolveInitialCollision(item) => Some(&item.file_name),
            Action::InitialSyncCompleted | Action::ReportError(_) => None,
        }
    }
}

/// Engine phase derived from the gathered flags alone; `Reset` is the only
/// way back to `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnginePhase {
    Idle,
    /// Cloud gathered, local scan outstanding.
    GatheringLocal,
    /// Local gathered, cloud scan outstanding.
    GatheringCloud,
    Running,
}

/// The reconciliation state machine's memory. Owned by the controller for
/// the lifetime of a sync session; items pass through it for one pass and
/// are discarded.
#[derive(Debug, Clone, Default)]
pub struct EngineState {
    last_local: LocalInventory,
    last_cloud: CloudInventory,
    local_gathered: bool,
    cloud_gathered: bool,
    initial_sync_done: bool,
}

impl EngineState {
    pub fn with_initial_sync_done(done: bool) -> Self {
        Self {
            initial_sync_done: done,
            ..Self::default()
        }
    }

    pub fn initial_sync_done(&self) -> bool {
        self.initial_sync_done
    }

    pub fn phase(&self) -> EnginePhase {
        match (self.local_gathered, self.cloud_gathered) {
            (false, false) => EnginePhase::Idle,
            (false, true) => EnginePhase::GatheringLocal,
            (true, false) => EnginePhase::GatheringCloud,
            (true, true) => EnginePhase::Running,
        }
    }

    /// Maps one observed event to the actions that converge both sides.
    /// Pure apart from mutating `self`; no I/O, single-threaded invocation.
    pub fn resolve(&mut self, event: SyncEvent) -> Vec<Action> {
        match event {
            SyncEvent::FinishedGatheringLocal(inventory) => {
                self.last_local = inventory;
                self.local_gathered = true;
                if self.cloud_gathered {
                    self.initial_pass()
                } else {
                    Vec::new()
                }
            }
            SyncEvent::FinishedGatheringCloud(inventory) => {
                self.last_cloud = inventory;
                self.cloud_gathered = true;
                if self.local_gathered {
                    self.initial_pass()
                } else {
                    Vec::new()
                }
            }
            SyncEvent::UpdatedCloud(inventory) => {
                let actions = reconcile_cloud_to_local(&inventory, &self.last_local);
                self.last_cloud = inventory;
                actions
            }
            SyncEvent::UpdatedLocal(inventory) => {
                let actions =
                    reconcile_local_to_cloud(&inventory, &self.last_local, &self.last_cloud);
                self.last_local = inventory;
                actions
            }
            SyncEvent::Error(err) => vec![Action::ReportError(err)],
            SyncEvent::Reset => {
                *self = EngineState::with_initial_sync_done(self.initial_sync_done);
                Vec::new()
            }
        }
    }

    /// Both sides just finished gathering; decide by emptiness.
    fn initial_pass(&mut self) -> Vec<Action> {
        match (self.last_local.is_empty(), self.last_cloud.is_empty()) {
            (true, true) => Vec::new(),
            (true, false) => {
                let mut actions = reconcile_cloud_to_local(&self.last_cloud, &self.last_local);
                self.finish_initial_sync(&mut actions);
                actions
            }
            (false, true) => {
                let mut actions: Vec<Action> = sorted_values(&self.last_local)
                    .into_iter()
                    .map(|item| Action::CreateCloud(item.clone()))
                    .collect();
                self.finish_initial_sync(&mut actions);
                actions
            }
            (false, false) => {
                if self.initial_sync_done {
                    let mut actions = reconcile_cloud_to_local(&self.last_cloud, &self.last_local);
                    actions.extend(reconcile_local_to_cloud(
                        &self.last_local,
                        &self.last_local,
                        &self.last_cloud,
                    ));
                    actions
                } else {
                    // Both sides carry independent histories for the first
                    // time: preserve every local item under a device-suffixed
                    // copy, then let the cloud inventory flow in normally.
                    let mut actions: Vec<Action> = sorted_values(&self.last_local)
                        .into_iter()
                        .map(|item| Action::ResolveInitialCollision(item.clone()))
                        .collect();
                    actions.extend(reconcile_cloud_to_local(&self.last_cloud, &self.last_local));
                    self.finish_initial_sync(&mut actions);
                    actions
                }
            }
        }
    }

    fn finish_initial_sync(&mut self, actions: &mut Vec<Action>) {
        if !self.initial_sync_done {
            self.initial_sync_done = true;
            actions.push(Action::InitialSyncCompleted);
        }
    }
}

/// Incremental cloud→local pass: `cloud` is the fresh inventory, `local`
/// the previously observed local one. Removals are emitted after creates
/// and updates.
fn reconcile_cloud_to_local(cloud: &CloudInventory, local: &LocalInventory) -> Vec<Action> {
    let mut upserts = Vec::new();
    let mut removals = Vec::new();

    for item in sorted_values(cloud) {
        match local.get(&item.file_name) {
            None => {
                if item.is_in_trash {
                    continue;
                }
                if item.is_downloaded {
                    upserts.push(Action::CreateLocal(item.clone()));
                } else {
                    upserts.push(Action::StartDownload(item.clone()));
                }
            }
            Some(previous) => {
                if item.is_in_trash {
                    removals.push(Action::RemoveLocal(item.clone()));
                } else if item.last_modification_date > previous.last_modification_date {
                    if item.is_downloaded {
                        upserts.push(Action::UpdateLocal(item.clone()));
                    } else {
                        upserts.push(Action::StartDownload(item.clone()));
                    }
                }
            }
        }
    }

    upserts.extend(removals);
    upserts
}

/// Incremental local→cloud pass: `current` is the fresh local inventory,
/// `previous` the one observed before it, `cloud` the currently stored
/// cloud inventory. Removals are emitted after creates and updates.
fn reconcile_local_to_cloud(
    current: &LocalInventory,
    previous: &LocalInventory,
    cloud: &CloudInventory,
) -> Vec<Action> {
    let mut actions = Vec::new();

    for item in sorted_values(current) {
        match cloud.get(&item.file_name) {
            None => actions.push(Action::CreateCloud(item.clone())),
            Some(remote) => {
                if !remote.is_in_trash
                    && item.last_modification_date > remote.last_modification_date
                {
                    actions.push(Action::UpdateCloud(item.clone()));
                }
            }
        }
    }

    for item in sorted_values(previous) {
        if !current.contains_key(&item.file_name) {
            actions.push(Action::RemoveCloud(item.clone()));
        }
    }

    actions
}

/// Deterministic iteration over an inventory regardless of hash order.
fn sorted_values<V>(inventory: &std::collections::HashMap<String, V>) -> Vec<&V> {
    let mut keys: Vec<&String> = inventory.keys().collect();
    keys.sort();
    keys.into_iter().map(|key| &inventory[key]).collect()
}

#[cfg(test)]
#[path = "reconcile_tests.rs"]
mod tests;
