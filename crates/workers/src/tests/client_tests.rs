use super::*;
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use async_trait::async_trait;
use shared::error::{ErrorCode, TaskException};

use crate::{recommendations::RecommendationTask, runtime::WorkerTask};

struct CountingTask {
    calls: Arc<AtomicUsize>,
    fail: bool,
}

#[async_trait]
impl WorkerTask for CountingTask {
    fn name(&self) -> &'static str {
        "counting"
    }

    async fn handle(&self, request: &WorkerRequest) -> Result<WorkerResponse, TaskException> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(TaskException::new(ErrorCode::Internal, "model not loaded"));
        }
        RecommendationTask.handle(request).await
    }
}

fn client(fail: bool) -> (RecommendationClient, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let worker = WorkerHandle::spawn(CountingTask {
        calls: calls.clone(),
        fail,
    });
    (RecommendationClient::new(worker), calls)
}

fn log() -> Vec<PracticeEvent> {
    vec![PracticeEvent {
        id: "note-memory".into(),
        accuracy: Some(30.0),
        score: None,
        timestamp: None,
    }]
}

#[tokio::test]
async fn fresh_result_is_served_from_cache() {
    let (client, calls) = client(false);

    let first = client
        .recommendations(log(), Vec::new())
        .await
        .expect("first");
    let second = client
        .recommendations(Vec::new(), Vec::new())
        .await
        .expect("second");

    assert_eq!(first, second);
    assert_eq!(first.weakest_skill, "reading");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn expired_or_invalidated_cache_asks_the_worker_again() {
    let (client, calls) = client(false);
    let client = client.with_ttl(Duration::ZERO);

    client.recommendations(log(), Vec::new()).await.expect("first");
    client.recommendations(log(), Vec::new()).await.expect("second");
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    let (client, calls) = self::client(false);
    client.recommendations(log(), Vec::new()).await.expect("first");
    client.invalidate().await;
    assert!(client.cached().await.is_none());
    client.recommendations(log(), Vec::new()).await.expect("second");
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn worker_failure_is_an_error_and_not_cached() {
    let (client, calls) = client(true);

    let err = client
        .recommendations(log(), Vec::new())
        .await
        .expect_err("failure");

    assert!(err.to_string().contains("model not loaded"));
    assert!(client.cached().await.is_none());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}
