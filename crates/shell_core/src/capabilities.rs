use std::collections::HashMap;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use shared::domain::{Capability, PlatformFeature};
use tokio::sync::Mutex;
use tracing::debug;

#[async_trait]
pub trait CapabilityProbe: Send + Sync {
    /// `Ok(true)` supported, `Ok(false)` unsupported, `Err` when the probe
    /// itself could not decide (for example a GPU adapter request failing).
    async fn probe(&self, feature: PlatformFeature) -> Result<bool>;
}

/// Fixed answers; features not listed probe as undecidable.
#[derive(Debug, Clone, Default)]
pub struct StaticCapabilities {
    answers: HashMap<PlatformFeature, bool>,
}

impl StaticCapabilities {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, feature: PlatformFeature, supported: bool) -> Self {
        self.answers.insert(feature, supported);
        self
    }
}

#[async_trait]
impl CapabilityProbe for StaticCapabilities {
    async fn probe(&self, feature: PlatformFeature) -> Result<bool> {
        self.answers
            .get(&feature)
            .copied()
            .ok_or_else(|| anyhow!("no probe answer for {feature:?}"))
    }
}

/// Probes each feature at most once and remembers the answer.
pub struct CapabilityRegistry {
    probe: Box<dyn CapabilityProbe>,
    resolved: Mutex<HashMap<PlatformFeature, Capability>>,
}

impl CapabilityRegistry {
    pub fn new(probe: impl CapabilityProbe + 'static) -> Self {
        Self {
            probe: Box::new(probe),
            resolved: Mutex::new(HashMap::new()),
        }
    }

    pub async fn get(&self, feature: PlatformFeature) -> Capability {
        let mut resolved = self.resolved.lock().await;
        if let Some(capability) = resolved.get(&feature) {
            return *capability;
        }

        let capability = match self.probe.probe(feature).await {
            Ok(true) => Capability::Supported,
            Ok(false) => Capability::Unsupported,
            Err(err) => {
                debug!("capabilities: probe undecided feature={feature:?} error={err:#}");
                Capability::Unknown
            }
        };
        resolved.insert(feature, capability);
        capability
    }

    pub async fn is_supported(&self, feature: PlatformFeature) -> bool {
        self.get(feature).await.is_supported()
    }

    /// Answers resolved so far, without probing.
    pub async fn snapshot(&self) -> HashMap<PlatformFeature, Capability> {
        self.resolved.lock().await.clone()
    }
}
