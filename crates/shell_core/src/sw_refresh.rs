use std::{sync::Arc, time::Duration};

use shared::{domain::PlatformFeature, protocol::ServiceWorkerMessage};
use tokio::{
    sync::{broadcast::error::RecvError, watch, Mutex},
    time::Instant,
};
use tracing::{debug, info, warn};

use crate::{
    capabilities::CapabilityRegistry,
    host::{NetworkHints, PageHost, PageLifecycleEvent, ServiceWorkerRegistration},
};

pub const REFRESH_TAG: &str = "panda-refresh";
pub const PERIODIC_REFRESH_MIN_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);
pub const FOREGROUND_REFRESH_MIN_INTERVAL: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshMode {
    Periodic,
    OneShot,
    Foreground,
}

#[derive(Default)]
struct RefreshState {
    fallback_bound: bool,
    last_foreground_refresh: Option<Instant>,
}

/// Keeps cached assets fresh: periodic sync when the platform offers it,
/// one-shot sync next, and foreground refresh requests as the last resort.
pub struct BackgroundRefresh {
    network: Arc<dyn NetworkHints>,
    page: Arc<dyn PageHost>,
    capabilities: Arc<CapabilityRegistry>,
    status: watch::Sender<String>,
    state: Mutex<RefreshState>,
}

impl BackgroundRefresh {
    pub fn new(
        network: Arc<dyn NetworkHints>,
        page: Arc<dyn PageHost>,
        capabilities: Arc<CapabilityRegistry>,
    ) -> Arc<Self> {
        let (status, _) = watch::channel(String::new());
        Arc::new(Self {
            network,
            page,
            capabilities,
            status,
            state: Mutex::new(RefreshState::default()),
        })
    }

    pub fn sync_status(&self) -> String {
        self.status.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<String> {
        self.status.subscribe()
    }

    pub fn set_status(&self, message: impl Into<String>) {
        let message = message.into();
        debug!("sw-refresh: status={message}");
        self.status.send_replace(message);
    }

    pub async fn register_background_refresh(
        self: &Arc<Self>,
        registration: Arc<dyn ServiceWorkerRegistration>,
    ) -> RefreshMode {
        let periodic = if self
            .capabilities
            .is_supported(PlatformFeature::PeriodicBackgroundSync)
            .await
        {
            registration.periodic_sync()
        } else {
            None
        };
        if let Some(periodic) = periodic {
            match periodic
                .register(REFRESH_TAG, Some(PERIODIC_REFRESH_MIN_INTERVAL))
                .await
            {
                Ok(()) => {
                    self.set_status("Background refresh enabled.");
                    return RefreshMode::Periodic;
                }
                Err(err) => debug!("sw-refresh: periodic sync refused error={err:#}"),
            }
        }

        let sync = if self
            .capabilities
            .is_supported(PlatformFeature::BackgroundSync)
            .await
        {
            registration.sync()
        } else {
            None
        };
        if let Some(sync) = sync {
            match sync.register(REFRESH_TAG, None).await {
                Ok(()) => {
                    self.set_status("Background refresh queued for next online session.");
                    return RefreshMode::OneShot;
                }
                Err(err) => debug!("sw-refresh: one-shot sync refused error={err:#}"),
            }
        }

        self.bind_foreground_refresh_fallback(Arc::clone(&registration))
            .await;
        self.request_foreground_refresh(registration.as_ref(), "startup")
            .await;
        RefreshMode::Foreground
    }

    /// Posts `REFRESH_ASSETS` to the active worker when online and the last
    /// foreground refresh is old enough.
    pub async fn request_foreground_refresh(
        &self,
        registration: &dyn ServiceWorkerRegistration,
        reason: &str,
    ) -> bool {
        if !registration.has_active() || !self.network.is_online() {
            return false;
        }

        let mut state = self.state.lock().await;
        if let Some(last) = state.last_foreground_refresh {
            if last.elapsed() < FOREGROUND_REFRESH_MIN_INTERVAL {
                return false;
            }
        }

        let message = ServiceWorkerMessage::RefreshAssets {
            reason: Some(reason.to_string()),
        };
        match registration.post_to_active(message) {
            Ok(true) => {
                state.last_foreground_refresh = Some(Instant::now());
                drop(state);
                self.set_status(format!("Foreground refresh queued ({reason})."));
                true
            }
            Ok(false) => false,
            Err(err) => {
                drop(state);
                warn!("sw-refresh: foreground refresh failed reason={reason} error={err:#}");
                self.set_status("Foreground refresh unavailable right now.");
                false
            }
        }
    }

    async fn bind_foreground_refresh_fallback(
        self: &Arc<Self>,
        registration: Arc<dyn ServiceWorkerRegistration>,
    ) {
        {
            let mut state = self.state.lock().await;
            if state.fallback_bound {
                return;
            }
            state.fallback_bound = true;
        }

        let mut lifecycle = self.page.subscribe_lifecycle();
        let refresh = Arc::clone(self);
        tokio::spawn(async move {
            // Focus only counts while the page is visible; it starts out visible.
            let mut visible = true;
            loop {
                let reason = match lifecycle.recv().await {
                    Ok(PageLifecycleEvent::Visible) => {
                        visible = true;
                        "visible"
                    }
                    Ok(PageLifecycleEvent::Hidden) => {
                        visible = false;
                        continue;
                    }
                    Ok(PageLifecycleEvent::Focus) if visible => "visible",
                    Ok(PageLifecycleEvent::Online) => "online",
                    Ok(_) => continue,
                    Err(RecvError::Lagged(skipped)) => {
                        debug!("sw-refresh: lifecycle events skipped count={skipped}");
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                };
                refresh
                    .request_foreground_refresh(registration.as_ref(), reason)
                    .await;
            }
        });

        info!("sw-refresh: foreground fallback bound");
        self.set_status("Foreground refresh fallback enabled (reconnect/open).");
    }
}

#[cfg(test)]
#[path = "tests/sw_refresh_tests.rs"]
mod tests;
