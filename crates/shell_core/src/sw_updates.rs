use std::{
    collections::HashSet,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use shared::{
    domain::{PlatformFeature, RegistrationId, WorkerState},
    protocol::ServiceWorkerMessage,
};
use tokio::sync::{broadcast, broadcast::error::RecvError, watch, Mutex};
use tracing::{debug, info, warn};

use crate::{
    capabilities::CapabilityRegistry,
    host::{PageHost, ServiceWorker, ServiceWorkerContainer, ServiceWorkerRegistration},
    sw_refresh::BackgroundRefresh,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateFlowState {
    Unsupported,
    NotReady,
    Checking,
    UpToDate,
    Downloading,
    ReadyToApply,
    /// First install finished; nothing to apply.
    OfflineReady,
    CheckFailed,
    Applied,
}

impl UpdateFlowState {
    pub fn message(self) -> &'static str {
        match self {
            Self::Unsupported => "Service worker not supported on this browser.",
            Self::NotReady => "Service worker not ready yet.",
            Self::Checking => "Checking for updates…",
            Self::UpToDate => "App is up to date.",
            Self::Downloading => "Update downloading…",
            Self::ReadyToApply => "Update ready to apply.",
            Self::OfflineReady => "App ready for offline use.",
            Self::CheckFailed => "Unable to check for updates right now.",
            Self::Applied => "Update applied. Reloading…",
        }
    }

    fn show_apply(self, previous: bool) -> bool {
        match self {
            Self::ReadyToApply => true,
            Self::UpToDate | Self::Applied | Self::Unsupported => false,
            _ => previous,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateFlowSnapshot {
    pub state: UpdateFlowState,
    pub message: &'static str,
    /// True iff a waiting worker is known to exist.
    pub show_apply: bool,
}

impl UpdateFlowSnapshot {
    fn new(state: UpdateFlowState, show_apply: bool) -> Self {
        Self {
            state,
            message: state.message(),
            show_apply,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateFlowEvent {
    StateChanged(UpdateFlowSnapshot),
    ReloadRequested,
}

/// Presents the update lifecycle of the page's service-worker registration
/// and reloads once a new worker takes control.
pub struct UpdateController {
    container: Arc<dyn ServiceWorkerContainer>,
    page: Arc<dyn PageHost>,
    capabilities: Arc<CapabilityRegistry>,
    refresh: Arc<BackgroundRefresh>,
    status: watch::Sender<UpdateFlowSnapshot>,
    events: broadcast::Sender<UpdateFlowEvent>,
    bound_registrations: Mutex<HashSet<RegistrationId>>,
    controller_change_bound: AtomicBool,
    applied: AtomicBool,
}

impl UpdateController {
    pub fn new(
        container: Arc<dyn ServiceWorkerContainer>,
        page: Arc<dyn PageHost>,
        capabilities: Arc<CapabilityRegistry>,
        refresh: Arc<BackgroundRefresh>,
    ) -> Arc<Self> {
        let (status, _) = watch::channel(UpdateFlowSnapshot::new(UpdateFlowState::NotReady, false));
        let (events, _) = broadcast::channel(64);
        Arc::new(Self {
            container,
            page,
            capabilities,
            refresh,
            status,
            events,
            bound_registrations: Mutex::new(HashSet::new()),
            controller_change_bound: AtomicBool::new(false),
            applied: AtomicBool::new(false),
        })
    }

    pub fn snapshot(&self) -> UpdateFlowSnapshot {
        *self.status.borrow()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<UpdateFlowSnapshot> {
        self.status.subscribe()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<UpdateFlowEvent> {
        self.events.subscribe()
    }

    pub fn refresh(&self) -> &Arc<BackgroundRefresh> {
        &self.refresh
    }

    fn transition(&self, state: UpdateFlowState) {
        let mut next = None;
        self.status.send_modify(|snapshot| {
            *snapshot = UpdateFlowSnapshot::new(state, state.show_apply(snapshot.show_apply));
            next = Some(*snapshot);
        });
        if let Some(snapshot) = next {
            debug!(
                "sw-updates: state={:?} show_apply={}",
                snapshot.state, snapshot.show_apply
            );
            let _ = self.events.send(UpdateFlowEvent::StateChanged(snapshot));
        }
    }

    /// Classifies the registration and, on its first bind only, starts
    /// listening for new installs.
    pub async fn bind_update_flow(self: &Arc<Self>, registration: Arc<dyn ServiceWorkerRegistration>) {
        if registration.has_waiting() {
            self.transition(UpdateFlowState::ReadyToApply);
        } else {
            self.transition(UpdateFlowState::UpToDate);
        }

        {
            let mut bound = self.bound_registrations.lock().await;
            if !bound.insert(registration.id()) {
                debug!("sw-updates: registration already bound id={}", registration.id().0);
                return;
            }
        }

        let mut update_found = registration.subscribe_update_found();
        let controller = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                match update_found.recv().await {
                    Ok(()) | Err(RecvError::Lagged(_)) => {
                        controller.handle_update_found(registration.as_ref())
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });
    }

    fn handle_update_found(self: &Arc<Self>, registration: &dyn ServiceWorkerRegistration) {
        self.transition(UpdateFlowState::Downloading);
        let Some(worker) = registration.installing() else {
            return;
        };

        let controller = Arc::clone(self);
        tokio::spawn(async move {
            controller.watch_installing_worker(worker).await;
        });
    }

    async fn watch_installing_worker(&self, worker: Arc<dyn ServiceWorker>) {
        let mut state = worker.subscribe_state();
        loop {
            if *state.borrow_and_update() == WorkerState::Installed {
                if self.container.has_controller() {
                    self.transition(UpdateFlowState::ReadyToApply);
                } else {
                    self.transition(UpdateFlowState::OfflineReady);
                }
                return;
            }
            if state.changed().await.is_err() {
                return;
            }
        }
    }

    /// Listens for the first controller change. Later calls do nothing.
    pub fn bind_controller_change(self: &Arc<Self>) {
        if self.controller_change_bound.swap(true, Ordering::SeqCst) {
            return;
        }
        let mut changes = self.container.subscribe_controller_change();
        let controller = Arc::clone(self);
        tokio::spawn(async move {
            match changes.recv().await {
                Ok(()) | Err(RecvError::Lagged(_)) => controller.handle_controller_change(),
                Err(RecvError::Closed) => {}
            }
        });
    }

    /// A new worker took control: announce it and reload the page, once.
    pub fn handle_controller_change(&self) {
        if self.applied.swap(true, Ordering::SeqCst) {
            return;
        }
        self.transition(UpdateFlowState::Applied);
        info!("sw-updates: controller changed, reloading");
        let _ = self.events.send(UpdateFlowEvent::ReloadRequested);
        self.page.reload();
    }

    async fn supported(&self) -> bool {
        if self
            .capabilities
            .is_supported(PlatformFeature::ServiceWorker)
            .await
        {
            return true;
        }
        self.transition(UpdateFlowState::Unsupported);
        false
    }

    /// Asks the waiting worker to take over. Returns whether it was asked.
    pub async fn apply_update(&self) -> bool {
        if !self.supported().await {
            return false;
        }
        let registration = match self.container.get_registration().await {
            Ok(Some(registration)) => registration,
            Ok(None) => return false,
            Err(err) => {
                warn!("sw-updates: registration lookup failed error={err:#}");
                return false;
            }
        };
        if !registration.has_waiting() {
            return false;
        }
        match registration.post_to_waiting(ServiceWorkerMessage::SkipWaiting) {
            Ok(posted) => posted,
            Err(err) => {
                warn!("sw-updates: skip waiting failed error={err:#}");
                false
            }
        }
    }

    pub async fn check_for_updates(self: &Arc<Self>) {
        if !self.supported().await {
            return;
        }
        self.transition(UpdateFlowState::Checking);

        let registration = match self.container.get_registration().await {
            Ok(Some(registration)) => registration,
            Ok(None) => {
                self.transition(UpdateFlowState::NotReady);
                return;
            }
            Err(err) => {
                warn!("sw-updates: registration lookup failed error={err:#}");
                self.transition(UpdateFlowState::CheckFailed);
                return;
            }
        };

        if let Err(err) = registration.update().await {
            warn!("sw-updates: update check failed error={err:#}");
            self.transition(UpdateFlowState::CheckFailed);
            return;
        }
        self.bind_update_flow(registration).await;
    }

    fn not_installed(&self) {
        self.transition(UpdateFlowState::NotReady);
        self.refresh
            .set_status("Background refresh will start once the app is installed.");
    }

    /// Startup wiring: classify the current registration, register background
    /// refresh and listen for controller changes.
    pub async fn init(self: &Arc<Self>) -> Option<Arc<dyn ServiceWorkerRegistration>> {
        if !self.supported().await {
            self.refresh
                .set_status("Background refresh unavailable on this browser.");
            return None;
        }

        let registration = match self.container.get_registration().await {
            Ok(Some(registration)) => registration,
            Ok(None) => {
                self.not_installed();
                return None;
            }
            Err(err) => {
                warn!("sw-updates: registration lookup failed error={err:#}");
                self.not_installed();
                return None;
            }
        };

        self.bind_update_flow(Arc::clone(&registration)).await;
        self.refresh
            .register_background_refresh(Arc::clone(&registration))
            .await;
        self.bind_controller_change();
        Some(registration)
    }
}

#[cfg(test)]
#[path = "tests/sw_updates_tests.rs"]
mod tests;
