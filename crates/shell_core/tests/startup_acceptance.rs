use std::sync::Arc;

use shared::domain::{PlatformFeature, ViewPath};
use shell_core::{
    host::{
        HeadlessPage, MissingServiceWorkerContainer, StaticDocument, StaticNetwork,
        ViewContainer,
    },
    view_bootstrap::current_view_id_from_hash,
    view_loader::DirectoryViewFetcher,
    CapabilityRegistry, PreferencesOnboardingCheck, ShellApp, ShellHost, StaticCapabilities,
    UpdateFlowState, ViewLoader,
};

fn host(container: Option<ViewContainer>, hash: &str) -> ShellHost {
    ShellHost {
        document: Arc::new(StaticDocument {
            container,
            hash: hash.to_string(),
        }),
        network: Arc::new(StaticNetwork::default()),
        page: Arc::new(HeadlessPage::default()),
        service_workers: Arc::new(MissingServiceWorkerContainer::default()),
    }
}

#[tokio::test]
async fn first_run_with_inline_home_lands_on_onboarding() {
    let dir = tempfile::tempdir().expect("tempdir");
    let container = ViewContainer::from_markup(
        Some("view-home".into()),
        "<div id=\"view-home\" class=\"view\">Home</div>",
    );
    let app = ShellApp::new(
        host(Some(container), ""),
        Arc::new(DirectoryViewFetcher::new(dir.path())),
        Arc::new(PreferencesOnboardingCheck::new(dir.path().join("prefs.json"))),
        Arc::new(CapabilityRegistry::new(
            StaticCapabilities::new().with(PlatformFeature::ServiceWorker, true),
        )),
    );

    let startup = app.start(|| Some("view-home".to_string())).await;

    assert_eq!(startup.boot.initial_view, "view-onboarding");
    assert!(startup.boot.warm.prefetched.is_empty());
    assert_eq!(
        app.loader().cached(&ViewPath::new("views/home.html")).as_deref(),
        Some("<div id=\"view-home\" class=\"view\">Home</div>")
    );
    assert_eq!(startup.update_flow.state, UpdateFlowState::NotReady);
    assert_eq!(
        startup.sync_status,
        "Background refresh will start once the app is installed."
    );
}

#[tokio::test]
async fn deep_link_prefetches_and_loads_from_disk() {
    let dir = tempfile::tempdir().expect("tempdir");
    let views = dir.path().join("views").join("songs");
    std::fs::create_dir_all(&views).expect("views dir");
    std::fs::write(views.join("twinkle.html"), "<div id=\"view-song-twinkle\"></div>")
        .expect("write view");
    std::fs::write(
        dir.path().join("prefs.json"),
        r#"{"onboarding-complete": true}"#,
    )
    .expect("write prefs");

    let hash = "#view-song-twinkle";
    let app = ShellApp::new(
        host(None, hash),
        Arc::new(DirectoryViewFetcher::new(dir.path())),
        Arc::new(PreferencesOnboardingCheck::new(dir.path().join("prefs.json"))),
        Arc::new(CapabilityRegistry::new(StaticCapabilities::new())),
    );

    let startup = app.start(|| current_view_id_from_hash(hash)).await;
    let path = ViewPath::new("views/songs/twinkle.html");

    assert_eq!(startup.boot.initial_view, "view-song-twinkle");
    assert_eq!(startup.boot.warm.prefetched, vec![path.clone()]);
    assert_eq!(
        app.loader().load(&path).await.expect("load"),
        "<div id=\"view-song-twinkle\"></div>"
    );
    assert!(app.loader().has(&path));

    assert_eq!(startup.update_flow.state, UpdateFlowState::Unsupported);
    assert_eq!(
        startup.sync_status,
        "Background refresh unavailable on this browser."
    );
}
