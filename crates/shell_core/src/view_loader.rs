use std::{
    collections::HashMap,
    path::{Component, Path, PathBuf},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::{
    future::{BoxFuture, Shared},
    FutureExt,
};
use reqwest::Client;
use shared::domain::ViewPath;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ViewLoadError {
    #[error("Failed to load view: HTTP {0}")]
    Status(u16),
    #[error("view not found: {0}")]
    NotFound(String),
    #[error("invalid view path: {0}")]
    InvalidPath(String),
    #[error("network error loading {path}: {message}")]
    Network { path: String, message: String },
    #[error("failed to read {path}: {message}")]
    Io { path: String, message: String },
    #[error("view fetcher is unavailable")]
    Unavailable,
}

/// Retrieves the markup of a view fragment.
#[async_trait]
pub trait ViewFetcher: Send + Sync {
    async fn fetch(&self, path: &ViewPath) -> Result<String, ViewLoadError>;
}

/// Cache of view fragments keyed by path.
pub trait ViewLoader: Send + Sync {
    fn has(&self, path: &ViewPath) -> bool;
    /// Registers markup for `path`; an existing entry is kept.
    fn seed(&self, path: &ViewPath, html: &str);
    /// Starts a background load and returns immediately. Failures are dropped.
    fn prefetch(&self, path: &ViewPath);
}

pub struct MissingViewFetcher;

#[async_trait]
impl ViewFetcher for MissingViewFetcher {
    async fn fetch(&self, _path: &ViewPath) -> Result<String, ViewLoadError> {
        Err(ViewLoadError::Unavailable)
    }
}

pub struct HttpViewFetcher {
    http: Client,
    base: Url,
}

impl HttpViewFetcher {
    pub fn new(base_url: &str) -> Result<Self> {
        let mut base =
            Url::parse(base_url).with_context(|| format!("invalid views base url: {base_url}"))?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Ok(Self {
            http: Client::new(),
            base,
        })
    }
}

#[async_trait]
impl ViewFetcher for HttpViewFetcher {
    async fn fetch(&self, path: &ViewPath) -> Result<String, ViewLoadError> {
        let url = self
            .base
            .join(path.as_str())
            .map_err(|_| ViewLoadError::InvalidPath(path.to_string()))?;
        let network = |err: reqwest::Error| ViewLoadError::Network {
            path: path.to_string(),
            message: err.to_string(),
        };

        let res = self.http.get(url).send().await.map_err(network)?;
        if !res.status().is_success() {
            return Err(ViewLoadError::Status(res.status().as_u16()));
        }
        res.text().await.map_err(network)
    }
}

/// Serves view fragments from a directory laid out like the app root.
pub struct DirectoryViewFetcher {
    root: PathBuf,
}

impl DirectoryViewFetcher {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl ViewFetcher for DirectoryViewFetcher {
    async fn fetch(&self, path: &ViewPath) -> Result<String, ViewLoadError> {
        let relative = Path::new(path.as_str());
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
        {
            return Err(ViewLoadError::InvalidPath(path.to_string()));
        }

        match tokio::fs::read_to_string(self.root.join(relative)).await {
            Ok(html) => Ok(html),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                Err(ViewLoadError::NotFound(path.to_string()))
            }
            Err(err) => Err(ViewLoadError::Io {
                path: path.to_string(),
                message: err.to_string(),
            }),
        }
    }
}

type SharedLoad = Shared<BoxFuture<'static, Result<String, ViewLoadError>>>;

#[derive(Default)]
struct LoaderState {
    cache: HashMap<ViewPath, String>,
    inflight: HashMap<ViewPath, SharedLoad>,
}

/// View loader that keeps every successfully loaded fragment and shares one
/// fetch between concurrent loads of the same path.
#[derive(Clone)]
pub struct CachedViewLoader {
    fetcher: Arc<dyn ViewFetcher>,
    state: Arc<Mutex<LoaderState>>,
}

impl CachedViewLoader {
    pub fn new(fetcher: Arc<dyn ViewFetcher>) -> Self {
        Self {
            fetcher,
            state: Arc::new(Mutex::new(LoaderState::default())),
        }
    }

    fn state(&self) -> MutexGuard<'_, LoaderState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn cached(&self, path: &ViewPath) -> Option<String> {
        self.state().cache.get(path).cloned()
    }

    pub async fn load(&self, path: &ViewPath) -> Result<String, ViewLoadError> {
        let pending = {
            let mut state = self.state();
            if let Some(html) = state.cache.get(path) {
                return Ok(html.clone());
            }
            match state.inflight.get(path) {
                Some(pending) => pending.clone(),
                None => {
                    let fetcher = Arc::clone(&self.fetcher);
                    let owned = path.clone();
                    let pending = async move { fetcher.fetch(&owned).await }
                        .boxed()
                        .shared();
                    state.inflight.insert(path.clone(), pending.clone());
                    pending
                }
            }
        };

        let result = pending.clone().await;

        let mut state = self.state();
        if state
            .inflight
            .get(path)
            .is_some_and(|current| current.ptr_eq(&pending))
        {
            state.inflight.remove(path);
        }
        if let Ok(html) = &result {
            state
                .cache
                .entry(path.clone())
                .or_insert_with(|| html.clone());
        }
        result
    }

    /// Awaitable prefetch: loads `path` and reports whether it is now cached.
    pub async fn warm(&self, path: &ViewPath) -> bool {
        match self.load(path).await {
            Ok(_) => true,
            Err(err) => {
                debug!("views: prefetch failed path={path} error={err}");
                false
            }
        }
    }
}

impl ViewLoader for CachedViewLoader {
    fn has(&self, path: &ViewPath) -> bool {
        self.state().cache.contains_key(path)
    }

    fn seed(&self, path: &ViewPath, html: &str) {
        self.state()
            .cache
            .entry(path.clone())
            .or_insert_with(|| html.to_string());
    }

    fn prefetch(&self, path: &ViewPath) {
        if self.has(path) {
            return;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("views: prefetch skipped without async runtime path={path}");
            return;
        };
        let loader = self.clone();
        let path = path.clone();
        runtime.spawn(async move {
            loader.warm(&path).await;
        });
    }
}

#[cfg(test)]
#[path = "tests/view_loader_tests.rs"]
mod tests;
