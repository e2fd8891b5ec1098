use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde_json::Value;

pub const ONBOARDING_COMPLETE_KEY: &str = "onboarding-complete";

#[async_trait]
pub trait OnboardingCheck: Send + Sync {
    async fn should_show_onboarding(&self) -> Result<bool>;
}

pub struct MissingOnboardingCheck;

#[async_trait]
impl OnboardingCheck for MissingOnboardingCheck {
    async fn should_show_onboarding(&self) -> Result<bool> {
        Err(anyhow!("onboarding check is unavailable"))
    }
}

/// Reads the persisted preferences object; onboarding runs until
/// `onboarding-complete` is recorded as true.
pub struct PreferencesOnboardingCheck {
    path: PathBuf,
}

impl PreferencesOnboardingCheck {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl OnboardingCheck for PreferencesOnboardingCheck {
    async fn should_show_onboarding(&self) -> Result<bool> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(true),
            Err(err) => {
                return Err(err).with_context(|| {
                    format!("failed to read preferences '{}'", self.path.display())
                })
            }
        };
        let prefs: Value = serde_json::from_str(&raw)
            .with_context(|| format!("invalid preferences '{}'", self.path.display()))?;

        let complete = match prefs.get(ONBOARDING_COMPLETE_KEY) {
            Some(Value::Bool(flag)) => *flag,
            Some(Value::String(flag)) => flag == "true",
            _ => false,
        };
        Ok(!complete)
    }
}
