use super::*;
use std::{
    sync::atomic::{AtomicUsize, Ordering},
    time::Duration,
};

use axum::{http::StatusCode, routing::get, Router};
use tokio::net::TcpListener;

struct CountingFetcher {
    html: Result<String, ViewLoadError>,
    delay: Duration,
    calls: AtomicUsize,
}

impl CountingFetcher {
    fn ok(html: &str) -> Arc<Self> {
        Arc::new(Self {
            html: Ok(html.to_string()),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        })
    }

    fn slow(html: &str, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            html: Ok(html.to_string()),
            delay,
            calls: AtomicUsize::new(0),
        })
    }

    fn failing(err: ViewLoadError) -> Arc<Self> {
        Arc::new(Self {
            html: Err(err),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ViewFetcher for CountingFetcher {
    async fn fetch(&self, _path: &ViewPath) -> Result<String, ViewLoadError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.html.clone()
    }
}

#[tokio::test]
async fn caches_loaded_views() {
    let fetcher = CountingFetcher::ok("<div>Cached</div>");
    let loader = CachedViewLoader::new(fetcher.clone());
    let path = ViewPath::new("views/tune.html");

    assert_eq!(loader.load(&path).await.expect("first"), "<div>Cached</div>");
    assert_eq!(loader.load(&path).await.expect("second"), "<div>Cached</div>");
    assert_eq!(fetcher.calls(), 1);
    assert!(loader.has(&path));
}

#[tokio::test]
async fn concurrent_loads_share_one_fetch() {
    let fetcher = CountingFetcher::slow("<div>Slow</div>", Duration::from_millis(50));
    let loader = CachedViewLoader::new(fetcher.clone());
    let path = ViewPath::new("views/slow.html");

    let (first, second) = tokio::join!(loader.load(&path), loader.load(&path));

    assert_eq!(first.expect("first"), "<div>Slow</div>");
    assert_eq!(second.expect("second"), "<div>Slow</div>");
    assert_eq!(fetcher.calls(), 1);
}

#[tokio::test]
async fn failed_loads_are_not_cached() {
    let fetcher = CountingFetcher::failing(ViewLoadError::Status(404));
    let loader = CachedViewLoader::new(fetcher.clone());
    let path = ViewPath::new("views/missing.html");

    let err = loader.load(&path).await.expect_err("should fail");
    assert_eq!(err.to_string(), "Failed to load view: HTTP 404");
    assert!(!loader.has(&path));

    loader.load(&path).await.expect_err("fails again");
    assert_eq!(fetcher.calls(), 2);
}

#[tokio::test]
async fn warm_fills_the_cache_and_swallows_failures() {
    let loader = CachedViewLoader::new(CountingFetcher::ok("<div>Prefetched</div>"));
    let path = ViewPath::new("views/prefetch.html");
    assert!(loader.warm(&path).await);
    assert_eq!(loader.cached(&path).as_deref(), Some("<div>Prefetched</div>"));

    let broken = CachedViewLoader::new(CountingFetcher::failing(ViewLoadError::Status(500)));
    assert!(!broken.warm(&ViewPath::new("views/broken.html")).await);
}

#[tokio::test]
async fn prefetch_runs_in_the_background() {
    let fetcher = CountingFetcher::ok("<div>Bg</div>");
    let loader = CachedViewLoader::new(fetcher.clone());
    let path = ViewPath::new("views/bg.html");

    loader.prefetch(&path);

    tokio::time::timeout(Duration::from_secs(2), async {
        while !loader.has(&path) {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("prefetch completes");
    assert_eq!(fetcher.calls(), 1);
}

#[test]
fn prefetch_without_runtime_is_skipped() {
    let fetcher = CountingFetcher::ok("<div>Never</div>");
    let loader = CachedViewLoader::new(fetcher.clone());
    loader.prefetch(&ViewPath::new("views/never.html"));
    assert_eq!(fetcher.calls(), 0);
}

#[tokio::test]
async fn seed_does_not_overwrite_existing_entries() {
    let fetcher = CountingFetcher::ok("<div>Fetched</div>");
    let loader = CachedViewLoader::new(fetcher.clone());
    let path = ViewPath::new("views/coach.html");

    assert!(!loader.has(&path));
    loader.seed(&path, "<section id=\"coach-a\">Coach A</section>");
    loader.seed(&path, "<section id=\"coach-b\">Coach B</section>");

    let html = loader.load(&path).await.expect("cached");
    assert!(html.contains("coach-a"));
    assert!(!html.contains("coach-b"));
    assert_eq!(fetcher.calls(), 0);
}

#[tokio::test]
async fn missing_fetcher_reports_unavailable() {
    let loader = CachedViewLoader::new(Arc::new(MissingViewFetcher));
    let err = loader
        .load(&ViewPath::new("views/home.html"))
        .await
        .expect_err("unavailable");
    assert_eq!(err, ViewLoadError::Unavailable);
}

#[tokio::test]
async fn directory_fetcher_reads_relative_paths() {
    let root = tempfile::tempdir().expect("tempdir");
    std::fs::create_dir_all(root.path().join("views/songs")).expect("mkdir");
    std::fs::write(root.path().join("views/songs/twinkle.html"), "<div>Twinkle</div>")
        .expect("write");

    let fetcher = DirectoryViewFetcher::new(root.path());
    let html = fetcher
        .fetch(&ViewPath::new("views/songs/twinkle.html"))
        .await
        .expect("read");
    assert_eq!(html, "<div>Twinkle</div>");

    assert_eq!(
        fetcher.fetch(&ViewPath::new("views/nope.html")).await,
        Err(ViewLoadError::NotFound("views/nope.html".into()))
    );
    assert_eq!(
        fetcher.fetch(&ViewPath::new("../secret.html")).await,
        Err(ViewLoadError::InvalidPath("../secret.html".into()))
    );
}

async fn spawn_view_server() -> String {
    let app = Router::new()
        .route("/app/views/home.html", get(|| async { "<div id=\"view-home\">Home</div>" }))
        .route(
            "/app/views/broken.html",
            get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
        );
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve");
    });
    format!("http://{addr}/app")
}

#[tokio::test]
async fn http_fetcher_joins_base_url_and_maps_status() {
    let base = spawn_view_server().await;
    let fetcher = HttpViewFetcher::new(&base).expect("fetcher");

    let html = fetcher
        .fetch(&ViewPath::new("views/home.html"))
        .await
        .expect("home");
    assert_eq!(html, "<div id=\"view-home\">Home</div>");

    let err = fetcher
        .fetch(&ViewPath::new("views/broken.html"))
        .await
        .expect_err("broken");
    assert_eq!(err, ViewLoadError::Status(500));

    let err = fetcher
        .fetch(&ViewPath::new("views/absent.html"))
        .await
        .expect_err("absent");
    assert_eq!(err.to_string(), "Failed to load view: HTTP 404");
}

#[test]
fn http_fetcher_rejects_invalid_base_url() {
    assert!(HttpViewFetcher::new("not a url").is_err());
}
