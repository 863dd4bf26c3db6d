use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

use crate::error::SyncError;
use crate::store::SyncStateStore;
use crate::sync::monitor::{CloudMonitorControl, EventReceiver, MonitorControl, MonitorEvent};
use crate::sync::orchestrator::Orchestrator;
use crate::sync::reconcile::{EngineState, SyncEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    Stopped,
    Running,
    Paused,
}

/// Platform surface granting a grace period when the app moves to the
/// background while a batch is still in flight.
pub trait BackgroundExecutor: Send + Sync {
    fn begin_extension(&self, on_expire: Box<dyn FnOnce() + Send>) -> ExtensionToken;
}

pub struct ExtensionToken {
    cancel: CancellationToken,
}

impl ExtensionToken {
    pub fn new(cancel: CancellationToken) -> Self {
        Self { cancel }
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}

/// Timer-backed executor used where the platform offers no native
/// background-task extension.
pub struct TimedBackgroundExecutor {
    pub grace: Duration,
}

impl Default for TimedBackgroundExecutor {
    fn default() -> Self {
        Self {
            grace: Duration::from_secs(25),
        }
    }
}

impl BackgroundExecutor for TimedBackgroundExecutor {
    fn begin_extension(&self, on_expire: Box<dyn FnOnce() + Send>) -> ExtensionToken {
        let cancel = CancellationToken::new();
        let guard = cancel.clone();
        let grace = self.grace;
        tokio::spawn(async move {
            tokio::select! {
                _ = guard.cancelled() => {}
                _ = tokio::time::sleep(grace) => on_expire(),
            }
        });
        ExtensionToken::new(cancel)
    }
}

/// Owns the monitors, the state machine and the orchestrator for one sync
/// session and drives them through start/stop/pause/resume and the app's
/// foreground/background transitions.
pub struct SyncController {
    local: Arc<dyn MonitorControl>,
    cloud: Arc<dyn CloudMonitorControl>,
    orchestrator: Arc<Orchestrator>,
    store: SyncStateStore,
    background: Arc<dyn BackgroundExecutor>,
    engine: Mutex<EngineState>,
    state: Mutex<ControllerState>,
    events: tokio::sync::Mutex<EventReceiver>,
    loop_cancel: Mutex<Option<CancellationToken>>,
    extension: Mutex<Option<ExtensionToken>>,
}

impl SyncController {
    pub fn new(
        local: Arc<dyn MonitorControl>,
        cloud: Arc<dyn CloudMonitorControl>,
        orchestrator: Arc<Orchestrator>,
        store: SyncStateStore,
        events: EventReceiver,
        background: Arc<dyn BackgroundExecutor>,
    ) -> Self {
        Self {
            local,
            cloud,
            orchestrator,
            store,
            background,
            engine: Mutex::new(EngineState::default()),
            state: Mutex::new(ControllerState::Stopped),
            events: tokio::sync::Mutex::new(events),
            loop_cancel: Mutex::new(None),
            extension: Mutex::new(None),
        }
    }

    pub fn state(&self) -> ControllerState {
        *self.state.lock().expect("state mutex poisoned")
    }

    /// Starts a sync session: cloud monitor first, then the local one, then
    /// the event loop feeding the state machine and the orchestrator.
    pub fn start(self: &Arc<Self>) -> Result<(), SyncError> {
        if self.state() != ControllerState::Stopped {
            return Ok(());
        }
        if !self.cloud.is_available() {
            return Err(SyncError::CloudUnavailable);
        }

        let initial_done = self.store.initial_sync_done().unwrap_or(false);
        *self.engine.lock().expect("engine mutex poisoned") =
            EngineState::with_initial_sync_done(initial_done);

        self.cloud.start()?;
        if let Err(err) = self.local.start() {
            self.cloud.stop();
            return Err(err);
        }

        let cancel = CancellationToken::new();
        *self.loop_cancel.lock().expect("loop mutex poisoned") = Some(cancel.clone());
        let controller = Arc::clone(self);
        tokio::spawn(async move {
            let mut events = controller.events.lock().await;
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    event = events.recv() => {
                        let Some(event) = event else { break };
                        controller.handle_event(event).await;
                    }
                }
            }
        });

        *self.state.lock().expect("state mutex poisoned") = ControllerState::Running;
        eprintln!("[marksyncd] sync started");
        Ok(())
    }

    /// Stops the session. In-flight file operations run to completion; the
    /// monitors simply stop delivering new events.
    pub fn stop(&self) {
        {
            let mut state = self.state.lock().expect("state mutex poisoned");
            if *state == ControllerState::Stopped {
                return;
            }
            *state = ControllerState::Stopped;
        }
        self.local.stop();
        self.cloud.stop();
        if let Some(cancel) = self.loop_cancel.lock().expect("loop mutex poisoned").take() {
            cancel.cancel();
        }
        self.engine
            .lock()
            .expect("engine mutex poisoned")
            .resolve(SyncEvent::Reset);
        eprintln!("[marksyncd] sync stopped");
    }

    pub fn pause(&self) {
        let mut state = self.state.lock().expect("state mutex poisoned");
        if *state != ControllerState::Running {
            return;
        }
        self.local.pause();
        self.cloud.pause();
        *state = ControllerState::Paused;
        eprintln!("[marksyncd] sync paused");
    }

    pub fn resume(&self) {
        let mut state = self.state.lock().expect("state mutex poisoned");
        if *state != ControllerState::Paused {
            return;
        }
        self.local.resume();
        self.cloud.resume();
        *state = ControllerState::Running;
        eprintln!("[marksyncd] sync resumed");
    }

    /// App became active: any background extension is cancelled, then the
    /// session is started or resumed as needed.
    pub fn become_active(self: &Arc<Self>) -> Result<(), SyncError> {
        if let Some(token) = self.extension.lock().expect("extension mutex poisoned").take() {
            token.cancel();
        }
        match self.state() {
            ControllerState::Stopped => self.start(),
            ControllerState::Paused => {
                self.resume();
                Ok(())
            }
            ControllerState::Running => Ok(()),
        }
    }

    /// App entered the background: pause immediately when idle, otherwise
    /// keep running under an extension whose expiry pauses the monitors.
    pub fn enter_background(self: &Arc<Self>) {
        if self.state() != ControllerState::Running {
            return;
        }
        if !self.orchestrator.is_in_progress() {
            self.pause();
            return;
        }
        let controller = Arc::clone(self);
        let token = self.background.begin_extension(Box::new(move || {
            eprintln!("[marksyncd] background extension expired");
            controller.pause();
            controller
                .extension
                .lock()
                .expect("extension mutex poisoned")
                .take();
        }));
        *self.extension.lock().expect("extension mutex poisoned") = Some(token);
    }

    /// Drives start/stop from the sync-enabled setting.
    pub fn watch_settings(self: &Arc<Self>, mut enabled: watch::Receiver<bool>) {
        let controller = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                let wanted = *enabled.borrow_and_update();
                if wanted {
                    if let Err(err) = controller.start() {
                        eprintln!("[marksyncd] start failed: {err}");
                    }
                } else {
                    controller.stop();
                }
                if enabled.changed().await.is_err() {
                    break;
                }
            }
        });
    }

    /// The app edited bookmarks in place; fold the change into the next
    /// local inventory. Ignored while paused or stopped.
    pub fn subscribe_bookmark_changes(self: &Arc<Self>, mut changes: mpsc::UnboundedReceiver<()>) {
        let controller = Arc::clone(self);
        tokio::spawn(async move {
            while changes.recv().await.is_some() {
                if controller.state() == ControllerState::Running {
                    controller.local.request_scan();
                }
            }
        });
    }

    async fn handle_event(&self, event: MonitorEvent) {
        let event = match event {
            MonitorEvent::LocalGathered(inventory) => SyncEvent::FinishedGatheringLocal(inventory),
            MonitorEvent::LocalUpdated(inventory) => SyncEvent::UpdatedLocal(inventory),
            MonitorEvent::CloudGathered(inventory) => SyncEvent::FinishedGatheringCloud(inventory),
            MonitorEvent::CloudUpdated(inventory) => SyncEvent::UpdatedCloud(inventory),
            MonitorEvent::MonitorError(err) => SyncEvent::Error(err),
        };
        let actions = self
            .engine
            .lock()
            .expect("engine mutex poisoned")
            .resolve(event);
        if actions.is_empty() {
            return;
        }
        eprintln!("[marksyncd] reconcile pass: {} action(s)", actions.len());

        let outcome = self.orchestrator.run_batch(actions).await;
        if outcome.initial_sync_completed
            && let Err(err) = self.store.set_initial_sync_done(true)
        {
            eprintln!("[marksyncd] warning: failed to persist initial sync flag: {err}");
        }
        let fatal = outcome.errors.iter().any(SyncError::is_fatal);
        for err in &outcome.errors {
            eprintln!("[marksyncd] sync error: {err}");
        }
        if fatal {
            eprintln!("[marksyncd] fatal error, stopping sync");
            self.stop();
        }
    }
}

#[cfg(test)]
#[path = "controller_tests.rs"]
mod tests;
