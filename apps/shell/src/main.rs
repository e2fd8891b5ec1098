mod config;

use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::json;
use shared::{
    domain::PlatformFeature,
    protocol::{PracticeEvent, SongEvent, WorkerRequest},
};
use shell_core::{
    host::{HeadlessPage, MissingServiceWorkerContainer, StaticDocument, StaticNetwork, ViewContainer},
    view_bootstrap::current_view_id_from_hash,
    view_loader::{DirectoryViewFetcher, HttpViewFetcher},
    CapabilityRegistry, PreferencesOnboardingCheck, ShellApp, ShellHost, StaticCapabilities,
    ViewFetcher,
};
use tracing::info;
use tracing_subscriber::EnvFilter;
use workers::{RecommendationClient, RecommendationTask, StorageSelfTest, WorkerHandle};

use crate::config::{ensure_parent_dir_exists, load_settings, Settings, DEFAULT_CONFIG_PATH};

const SELF_TEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Parser, Debug)]
#[command(about = "Practice app shell: view bootstrap, update flow and workers")]
struct Args {
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,
    #[arg(long)]
    views_root: Option<PathBuf>,
    #[arg(long)]
    views_base_url: Option<String>,
    #[arg(long)]
    preferences: Option<PathBuf>,
    #[arg(long)]
    storage_root: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Seed, warm and resolve the initial view, then wire the update flow.
    Boot {
        /// HTML shipped inline in the main view container.
        #[arg(long)]
        document: Option<PathBuf>,
        /// The container's declared initial view id.
        #[arg(long)]
        declared_view: Option<String>,
        #[arg(long, default_value = "")]
        hash: String,
        #[arg(long)]
        save_data: bool,
        #[arg(long)]
        offline: bool,
    },
    /// Run the private-storage write/read/verify/delete probe.
    SelfTest {
        #[arg(long)]
        bytes: Option<usize>,
    },
    /// Compute practice recommendations from JSON event logs.
    Recommend {
        #[arg(long)]
        log: PathBuf,
        #[arg(long)]
        songs: Option<PathBuf>,
        /// Also write the result to this file.
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Print the effective settings.
    Config,
}

impl Args {
    fn settings(&self) -> Settings {
        let mut settings = load_settings(&self.config);
        if let Some(v) = &self.views_root {
            settings.views_root = v.clone();
        }
        if let Some(v) = &self.views_base_url {
            settings.views_base_url = Some(v.clone());
        }
        if let Some(v) = &self.preferences {
            settings.preferences_path = v.clone();
        }
        if let Some(v) = &self.storage_root {
            settings.storage_root = v.clone();
        }
        settings
    }
}

fn host_capabilities() -> Arc<CapabilityRegistry> {
    Arc::new(CapabilityRegistry::new(
        StaticCapabilities::new()
            .with(PlatformFeature::ServiceWorker, false)
            .with(PlatformFeature::OriginPrivateFileSystem, true)
            .with(PlatformFeature::PeriodicBackgroundSync, false)
            .with(PlatformFeature::BackgroundSync, false),
    ))
}

fn view_fetcher(settings: &Settings) -> Result<Arc<dyn ViewFetcher>> {
    let fetcher: Arc<dyn ViewFetcher> = match &settings.views_base_url {
        Some(base_url) => Arc::new(HttpViewFetcher::new(base_url)?),
        None => Arc::new(DirectoryViewFetcher::new(&settings.views_root)),
    };
    Ok(fetcher)
}

async fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read '{}'", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("invalid JSON in '{}'", path.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let settings = args.settings();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&settings.log_filter)),
        )
        .init();

    match args.command {
        Command::Boot {
            document,
            declared_view,
            hash,
            save_data,
            offline,
        } => {
            let container = match document {
                Some(path) => {
                    let html = tokio::fs::read_to_string(&path)
                        .await
                        .with_context(|| format!("failed to read '{}'", path.display()))?;
                    Some(ViewContainer::from_markup(declared_view, html))
                }
                None => None,
            };
            let host = ShellHost {
                document: Arc::new(StaticDocument {
                    container,
                    hash: hash.clone(),
                }),
                network: Arc::new(StaticNetwork {
                    save_data,
                    online: !offline,
                }),
                page: Arc::new(HeadlessPage::default()),
                service_workers: Arc::new(MissingServiceWorkerContainer::default()),
            };
            let app = ShellApp::new(
                host,
                view_fetcher(&settings)?,
                Arc::new(PreferencesOnboardingCheck::new(&settings.preferences_path)),
                host_capabilities(),
            );

            let startup = app.start(|| current_view_id_from_hash(&hash)).await;

            let mut warmed = Vec::new();
            for path in &startup.boot.warm.prefetched {
                warmed.push(json!({
                    "path": path.as_str(),
                    "cached": app.loader().warm(path).await,
                }));
            }
            let mut capabilities = serde_json::Map::new();
            for feature in PlatformFeature::ALL {
                let capability = app.capabilities().get(feature).await;
                capabilities.insert(
                    serde_json::to_value(feature)?
                        .as_str()
                        .unwrap_or_default()
                        .to_string(),
                    serde_json::to_value(capability)?,
                );
            }
            let report = json!({
                "initial_view": startup.boot.initial_view.as_str(),
                "seeded": startup.boot.seeded.as_ref().map(|seeded| seeded.path.as_str()),
                "prefetched": warmed,
                "update_status": startup.update_flow.message,
                "show_apply": startup.update_flow.show_apply,
                "sync_status": startup.sync_status,
                "capabilities": capabilities,
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::SelfTest { bytes } => {
            let worker =
                WorkerHandle::spawn(StorageSelfTest::new(&settings.storage_root, host_capabilities()));
            let response = worker
                .request_with_timeout(WorkerRequest::storage_self_test(bytes), SELF_TEST_TIMEOUT)
                .await
                .context("storage self-test did not complete")?;
            info!("shell: self-test finished ok={}", response.is_ok());
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        Command::Recommend { log, songs, out } => {
            let adaptive_log: Vec<PracticeEvent> = read_json(&log).await?;
            let song_events: Vec<SongEvent> = match songs {
                Some(path) => read_json(&path).await?,
                None => Vec::new(),
            };
            let client = RecommendationClient::new(WorkerHandle::spawn(RecommendationTask));
            let recommendations = client.recommendations(adaptive_log, song_events).await?;
            let rendered = serde_json::to_string_pretty(&recommendations)?;
            if let Some(out) = out {
                ensure_parent_dir_exists(&out)?;
                tokio::fs::write(&out, &rendered)
                    .await
                    .with_context(|| format!("failed to write '{}'", out.display()))?;
            }
            println!("{rendered}");
        }
        Command::Config => {
            print!("{}", toml::to_string(&settings)?);
        }
    }

    Ok(())
}
