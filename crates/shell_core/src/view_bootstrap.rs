use std::{collections::BTreeSet, sync::Arc};

use shared::domain::{is_view_id, ViewId, ViewPath};
use tracing::{debug, info};

use crate::{
    host::{DocumentHost, NetworkHints},
    onboarding::OnboardingCheck,
    view_loader::ViewLoader,
    view_paths::ViewPathResolver,
};

/// Markup of the initial view that shipped inline with the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineInitialView {
    pub view_id: ViewId,
    pub html: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeededView {
    pub view_id: ViewId,
    pub path: ViewPath,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarmSkip {
    SaveData,
    InvalidViewId,
    SeededInline,
    AlreadyCached,
    UnresolvablePath,
}

/// What a warm pass did. Prefetches are only started, never awaited.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WarmReport {
    pub prefetched: Vec<ViewPath>,
    pub skipped: Vec<(String, WarmSkip)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootOutcome {
    pub seeded: Option<SeededView>,
    pub warm: WarmReport,
    pub initial_view: ViewId,
}

/// `#view-coach` -> `view-coach`; anything else yields `None`.
pub fn current_view_id_from_hash(hash: &str) -> Option<String> {
    let id = hash.strip_prefix('#')?;
    is_view_id(id).then(|| id.to_string())
}

pub struct ViewBootstrap {
    document: Arc<dyn DocumentHost>,
    network: Arc<dyn NetworkHints>,
    loader: Arc<dyn ViewLoader>,
    paths: Arc<dyn ViewPathResolver>,
    onboarding: Arc<dyn OnboardingCheck>,
}

impl ViewBootstrap {
    pub fn new(
        document: Arc<dyn DocumentHost>,
        network: Arc<dyn NetworkHints>,
        loader: Arc<dyn ViewLoader>,
        paths: Arc<dyn ViewPathResolver>,
        onboarding: Arc<dyn OnboardingCheck>,
    ) -> Self {
        Self {
            document,
            network,
            loader,
            paths,
            onboarding,
        }
    }

    /// Reads the inline initial view, if the container still matches what it
    /// declares.
    pub fn inline_initial_view(&self) -> Option<InlineInitialView> {
        let container = self.document.view_container()?;
        let declared = container.declared_view_id?;
        let inline_root = container.inline_root_id?;
        if declared != inline_root {
            debug!("views: inline root mismatch declared={declared} inline={inline_root}");
            return None;
        }
        let view_id = ViewId::parse(&declared).ok()?;
        Some(InlineInitialView {
            view_id,
            html: container.inner_html,
        })
    }

    pub fn seed_inline_initial_view_cache(&self) -> Option<SeededView> {
        let inline = self.inline_initial_view()?;
        let path = match self.paths.view_path(inline.view_id.as_str()) {
            Ok(path) => path,
            Err(err) => {
                debug!("views: inline seed skipped view={} error={err}", inline.view_id);
                return None;
            }
        };
        self.loader.seed(&path, &inline.html);
        debug!("views: seeded inline view={} path={path}", inline.view_id);
        Some(SeededView {
            view_id: inline.view_id,
            path,
        })
    }

    pub fn warm_initial_views<F>(&self, get_current_view_id: F) -> WarmReport
    where
        F: Fn() -> Option<String>,
    {
        let mut report = WarmReport::default();
        let current = get_current_view_id();

        if self.network.save_data() {
            if let Some(current) = current {
                report.skipped.push((current, WarmSkip::SaveData));
            }
            return report;
        }

        let mut candidates = BTreeSet::new();
        if let Some(current) = current {
            if is_view_id(&current) {
                candidates.insert(current);
            } else {
                report.skipped.push((current, WarmSkip::InvalidViewId));
            }
        }

        let inline_view_id = self.inline_initial_view().map(|inline| inline.view_id);
        for view_id in candidates {
            if inline_view_id.as_ref().is_some_and(|inline| inline.as_str() == view_id) {
                report.skipped.push((view_id, WarmSkip::SeededInline));
                continue;
            }
            let path = match self.paths.view_path(&view_id) {
                Ok(path) => path,
                Err(err) => {
                    debug!("views: warm skipped view={view_id} error={err}");
                    report.skipped.push((view_id, WarmSkip::UnresolvablePath));
                    continue;
                }
            };
            if self.loader.has(&path) {
                report.skipped.push((view_id, WarmSkip::AlreadyCached));
                continue;
            }
            self.loader.prefetch(&path);
            report.prefetched.push(path);
        }
        report
    }

    pub async fn resolve_initial_view<F>(&self, get_current_view_id: F) -> ViewId
    where
        F: Fn() -> Option<String> + Send + Sync,
    {
        let has_explicit_hash = self.document.location_hash().starts_with("#view-");
        let initial = get_current_view_id()
            .filter(|id| !id.is_empty())
            .and_then(|id| ViewId::parse(&id).ok())
            .unwrap_or_else(ViewId::home);

        if has_explicit_hash || !initial.is_home() {
            return initial;
        }

        match self.onboarding.should_show_onboarding().await {
            Ok(true) => ViewId::onboarding(),
            Ok(false) => initial,
            Err(err) => {
                debug!("views: onboarding check failed, using home error={err:#}");
                initial
            }
        }
    }

    /// Seeds, then warms, then resolves. Warming must observe the seeded entry.
    pub async fn boot<F>(&self, get_current_view_id: F) -> BootOutcome
    where
        F: Fn() -> Option<String> + Send + Sync,
    {
        let seeded = self.seed_inline_initial_view_cache();
        let warm = self.warm_initial_views(&get_current_view_id);
        let initial_view = self.resolve_initial_view(&get_current_view_id).await;
        info!(
            "views: boot initial={} seeded={} prefetched={}",
            initial_view,
            seeded
                .as_ref()
                .map(|seeded| seeded.view_id.as_str())
                .unwrap_or("none"),
            warm.prefetched.len()
        );
        BootOutcome {
            seeded,
            warm,
            initial_view,
        }
    }
}

#[cfg(test)]
#[path = "tests/view_bootstrap_tests.rs"]
mod tests;
