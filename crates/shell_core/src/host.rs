//! Browser surfaces consumed by the shell, expressed as traits so a web binding,
//! the command-line host and the tests can each provide their own.

use std::{sync::Arc, time::Duration};

use anyhow::Result;
use async_trait::async_trait;
use shared::{
    domain::{RegistrationId, WorkerState},
    protocol::ServiceWorkerMessage,
};
use tokio::sync::{broadcast, watch};

/// Snapshot of the main content container as the document currently has it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewContainer {
    /// Value of the container's `data-initial-view-id`.
    pub declared_view_id: Option<String>,
    /// Id of the first element in the container's markup.
    pub inline_root_id: Option<String>,
    pub inner_html: String,
}

impl ViewContainer {
    pub fn from_markup(declared_view_id: Option<String>, inner_html: impl Into<String>) -> Self {
        let inner_html = inner_html.into();
        Self {
            declared_view_id,
            inline_root_id: root_element_id(&inner_html),
            inner_html,
        }
    }
}

/// Returns the `id` attribute of the first element in `html`, skipping
/// comments, doctypes and processing instructions.
pub fn root_element_id(html: &str) -> Option<String> {
    let mut rest = html;
    loop {
        let start = rest.find('<')?;
        rest = &rest[start + 1..];
        match rest.chars().next()? {
            '!' | '?' | '/' => {
                let end = rest.find('>')?;
                rest = &rest[end + 1..];
            }
            _ => break,
        }
    }

    let end = tag_end(rest)?;
    let tag = rest[..end].trim_end_matches('/');
    let attrs = tag.split_once(char::is_whitespace)?.1;
    attribute_value(attrs, "id")
}

/// Offset of the `>` closing a start tag, ignoring any inside quoted values.
fn tag_end(tag: &str) -> Option<usize> {
    let mut quote = None;
    for (i, c) in tag.char_indices() {
        match (quote, c) {
            (None, '"' | '\'') => quote = Some(c),
            (None, '>') => return Some(i),
            (Some(open), _) if c == open => quote = None,
            _ => {}
        }
    }
    None
}

fn attribute_value(mut attrs: &str, wanted: &str) -> Option<String> {
    loop {
        attrs = attrs.trim_start();
        if attrs.is_empty() {
            return None;
        }

        let name_end = attrs
            .find(|c: char| c == '=' || c.is_whitespace())
            .unwrap_or(attrs.len());
        let name = &attrs[..name_end];
        attrs = attrs[name_end..].trim_start();

        let value = if let Some(after_eq) = attrs.strip_prefix('=') {
            let after_eq = after_eq.trim_start();
            let quote = after_eq.chars().next()?;
            if quote == '"' || quote == '\'' {
                let body = &after_eq[1..];
                let close = body.find(quote)?;
                attrs = &body[close + 1..];
                Some(&body[..close])
            } else {
                let stop = after_eq.find(char::is_whitespace).unwrap_or(after_eq.len());
                attrs = &after_eq[stop..];
                Some(&after_eq[..stop])
            }
        } else {
            None
        };

        if name.eq_ignore_ascii_case(wanted) {
            return value.map(str::to_string);
        }
    }
}

pub trait DocumentHost: Send + Sync {
    fn view_container(&self) -> Option<ViewContainer>;
    /// Location hash including the leading `#`, or empty.
    fn location_hash(&self) -> String;
}

pub trait NetworkHints: Send + Sync {
    /// The network-information "save data" preference.
    fn save_data(&self) -> bool;
    fn is_online(&self) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageLifecycleEvent {
    Visible,
    Hidden,
    Online,
    Offline,
    Focus,
}

pub trait PageHost: Send + Sync {
    fn reload(&self);
    fn subscribe_lifecycle(&self) -> broadcast::Receiver<PageLifecycleEvent>;
}

pub trait ServiceWorker: Send + Sync {
    fn state(&self) -> WorkerState;
    fn subscribe_state(&self) -> watch::Receiver<WorkerState>;
}

#[async_trait]
pub trait SyncRegistrar: Send + Sync {
    async fn register(&self, tag: &str, min_interval: Option<Duration>) -> Result<()>;
}

#[async_trait]
pub trait ServiceWorkerRegistration: Send + Sync {
    fn id(&self) -> RegistrationId;
    fn has_waiting(&self) -> bool;
    fn has_active(&self) -> bool;
    fn installing(&self) -> Option<Arc<dyn ServiceWorker>>;
    fn subscribe_update_found(&self) -> broadcast::Receiver<()>;
    async fn update(&self) -> Result<()>;
    /// Returns `Ok(false)` when there is no waiting worker to receive it.
    fn post_to_waiting(&self, message: ServiceWorkerMessage) -> Result<bool>;
    /// Returns `Ok(false)` when there is no active worker to receive it.
    fn post_to_active(&self, message: ServiceWorkerMessage) -> Result<bool>;
    fn periodic_sync(&self) -> Option<Arc<dyn SyncRegistrar>>;
    fn sync(&self) -> Option<Arc<dyn SyncRegistrar>>;
}

#[async_trait]
pub trait ServiceWorkerContainer: Send + Sync {
    /// Whether an already-active worker controls this page.
    fn has_controller(&self) -> bool;
    async fn get_registration(&self) -> Result<Option<Arc<dyn ServiceWorkerRegistration>>>;
    fn subscribe_controller_change(&self) -> broadcast::Receiver<()>;
}

#[derive(Debug, Clone, Default)]
pub struct StaticDocument {
    pub container: Option<ViewContainer>,
    pub hash: String,
}

impl DocumentHost for StaticDocument {
    fn view_container(&self) -> Option<ViewContainer> {
        self.container.clone()
    }

    fn location_hash(&self) -> String {
        self.hash.clone()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct StaticNetwork {
    pub save_data: bool,
    pub online: bool,
}

impl Default for StaticNetwork {
    fn default() -> Self {
        Self {
            save_data: false,
            online: true,
        }
    }
}

impl NetworkHints for StaticNetwork {
    fn save_data(&self) -> bool {
        self.save_data
    }

    fn is_online(&self) -> bool {
        self.online
    }
}

/// Container for hosts without service workers: never controlled, never
/// registered.
pub struct MissingServiceWorkerContainer {
    controller_change: broadcast::Sender<()>,
}

impl Default for MissingServiceWorkerContainer {
    fn default() -> Self {
        let (controller_change, _) = broadcast::channel(1);
        Self { controller_change }
    }
}

#[async_trait]
impl ServiceWorkerContainer for MissingServiceWorkerContainer {
    fn has_controller(&self) -> bool {
        false
    }

    async fn get_registration(&self) -> Result<Option<Arc<dyn ServiceWorkerRegistration>>> {
        Ok(None)
    }

    fn subscribe_controller_change(&self) -> broadcast::Receiver<()> {
        self.controller_change.subscribe()
    }
}

/// Page without a display. Reload requests are counted and logged.
pub struct HeadlessPage {
    reloads: std::sync::atomic::AtomicUsize,
    lifecycle: broadcast::Sender<PageLifecycleEvent>,
}

impl Default for HeadlessPage {
    fn default() -> Self {
        let (lifecycle, _) = broadcast::channel(16);
        Self {
            reloads: std::sync::atomic::AtomicUsize::new(0),
            lifecycle,
        }
    }
}

impl HeadlessPage {
    pub fn reload_count(&self) -> usize {
        self.reloads.load(std::sync::atomic::Ordering::SeqCst)
    }

    pub fn emit(&self, event: PageLifecycleEvent) {
        let _ = self.lifecycle.send(event);
    }
}

impl PageHost for HeadlessPage {
    fn reload(&self) {
        self.reloads
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        tracing::info!("page: reload requested");
    }

    fn subscribe_lifecycle(&self) -> broadcast::Receiver<PageLifecycleEvent> {
        self.lifecycle.subscribe()
    }
}

#[cfg(test)]
#[path = "tests/host_tests.rs"]
mod tests;
