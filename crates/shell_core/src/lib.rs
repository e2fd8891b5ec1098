pub mod capabilities;
pub mod host;
pub mod onboarding;
pub mod sw_refresh;
pub mod sw_updates;
pub mod view_bootstrap;
pub mod view_loader;
pub mod view_paths;

#[cfg(test)]
#[path = "tests/fakes.rs"]
mod fakes;

use std::sync::Arc;

use tracing::info;

pub use capabilities::{CapabilityProbe, CapabilityRegistry, StaticCapabilities};
pub use host::{DocumentHost, NetworkHints, PageHost, ServiceWorkerContainer};
pub use onboarding::{OnboardingCheck, PreferencesOnboardingCheck};
pub use sw_refresh::{BackgroundRefresh, RefreshMode};
pub use sw_updates::{UpdateController, UpdateFlowEvent, UpdateFlowSnapshot, UpdateFlowState};
pub use view_bootstrap::{BootOutcome, ViewBootstrap};
pub use view_loader::{CachedViewLoader, ViewFetcher, ViewLoader};
pub use view_paths::{StaticViewPaths, ViewPathResolver};

/// Browser surfaces the shell runs against.
#[derive(Clone)]
pub struct ShellHost {
    pub document: Arc<dyn DocumentHost>,
    pub network: Arc<dyn NetworkHints>,
    pub page: Arc<dyn PageHost>,
    pub service_workers: Arc<dyn ServiceWorkerContainer>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellStartup {
    pub boot: BootOutcome,
    pub update_flow: UpdateFlowSnapshot,
    pub sync_status: String,
}

/// Owns the shell components. Built once at startup; consumers receive `Arc`s.
pub struct ShellApp {
    loader: Arc<CachedViewLoader>,
    bootstrap: ViewBootstrap,
    capabilities: Arc<CapabilityRegistry>,
    updates: Arc<UpdateController>,
}

impl ShellApp {
    pub fn new(
        host: ShellHost,
        fetcher: Arc<dyn ViewFetcher>,
        onboarding: Arc<dyn OnboardingCheck>,
        capabilities: Arc<CapabilityRegistry>,
    ) -> Arc<Self> {
        let loader = Arc::new(CachedViewLoader::new(fetcher));
        let bootstrap = ViewBootstrap::new(
            Arc::clone(&host.document),
            Arc::clone(&host.network),
            loader.clone(),
            Arc::new(StaticViewPaths),
            onboarding,
        );
        let refresh = BackgroundRefresh::new(
            Arc::clone(&host.network),
            Arc::clone(&host.page),
            Arc::clone(&capabilities),
        );
        let updates = UpdateController::new(
            host.service_workers,
            host.page,
            Arc::clone(&capabilities),
            refresh,
        );
        Arc::new(Self {
            loader,
            bootstrap,
            capabilities,
            updates,
        })
    }

    pub fn loader(&self) -> &Arc<CachedViewLoader> {
        &self.loader
    }

    pub fn bootstrap(&self) -> &ViewBootstrap {
        &self.bootstrap
    }

    pub fn capabilities(&self) -> &Arc<CapabilityRegistry> {
        &self.capabilities
    }

    pub fn updates(&self) -> &Arc<UpdateController> {
        &self.updates
    }

    /// Boots the view layer, then wires the update flow.
    pub async fn start<F>(&self, get_current_view_id: F) -> ShellStartup
    where
        F: Fn() -> Option<String> + Send + Sync,
    {
        let boot = self.bootstrap.boot(get_current_view_id).await;
        let registration = self.updates.init().await;
        let startup = ShellStartup {
            boot,
            update_flow: self.updates.snapshot(),
            sync_status: self.updates.refresh().sync_status(),
        };
        info!(
            "shell: started view={} update={:?} registration={}",
            startup.boot.initial_view,
            startup.update_flow.state,
            registration.is_some()
        );
        startup
    }
}
