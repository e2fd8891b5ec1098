use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use shared::protocol::{PracticeEvent, Recommendations, SongEvent, WorkerRequest, WorkerResponse};
use tokio::sync::Mutex;
use tracing::debug;

use crate::{
    recommendations::{cache_fresh, RECOMMENDATIONS_TTL},
    runtime::WorkerHandle,
};

/// Page-side access to the recommendation worker. The last successful
/// result is served without a new request while it is fresh.
pub struct RecommendationClient {
    worker: WorkerHandle,
    ttl: Duration,
    timeout: Option<Duration>,
    cached: Mutex<Option<Recommendations>>,
}

impl RecommendationClient {
    pub fn new(worker: WorkerHandle) -> Self {
        Self {
            worker,
            ttl: RECOMMENDATIONS_TTL,
            timeout: None,
            cached: Mutex::new(None),
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub async fn cached(&self) -> Option<Recommendations> {
        self.cached.lock().await.clone()
    }

    pub async fn invalidate(&self) {
        self.cached.lock().await.take();
    }

    pub async fn recommendations(
        &self,
        adaptive_log: Vec<PracticeEvent>,
        song_events: Vec<SongEvent>,
    ) -> Result<Recommendations> {
        let mut cached = self.cached.lock().await;
        if let Some(current) = cached.as_ref() {
            if cache_fresh(Some(current.computed_at), self.ttl, Utc::now()) {
                debug!("recommendations: serving cached result");
                return Ok(current.clone());
            }
        }

        let request = WorkerRequest::compute_recommendations(adaptive_log, song_events);
        let response = match self.timeout {
            Some(timeout) => self.worker.request_with_timeout(request, timeout).await,
            None => self.worker.request(request).await,
        }
        .context("recommendation worker request failed")?;

        match response {
            WorkerResponse::RecommendationsResult {
                ok: true,
                recommendations: Some(recommendations),
                ..
            } => {
                *cached = Some(recommendations.clone());
                Ok(recommendations)
            }
            other => Err(anyhow!(
                "recommendation worker failed: {}",
                other.error().unwrap_or("no recommendations returned")
            )),
        }
    }
}

#[cfg(test)]
#[path = "tests/client_tests.rs"]
mod tests;
