use super::*;

struct EchoTask;

#[async_trait]
impl WorkerTask for EchoTask {
    fn name(&self) -> &'static str {
        "echo"
    }

    async fn handle(&self, request: &WorkerRequest) -> Result<WorkerResponse, TaskException> {
        match request {
            WorkerRequest::OpfsSyncTest {
                request_id,
                payload_bytes,
            } => match payload_bytes {
                Some(0) => Err(TaskException::new(ErrorCode::Validation, "empty payload")),
                Some(1) => panic!("probe exploded"),
                Some(2) => {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                    Ok(ok_reply(*request_id, 2))
                }
                Some(3) => Ok(ok_reply(RequestId::new(), 3)),
                other => Ok(ok_reply(*request_id, other.unwrap_or(8) as u64)),
            },
            other => Err(unsupported_request(self.name(), other)),
        }
    }
}

fn ok_reply(request_id: RequestId, bytes: u64) -> WorkerResponse {
    WorkerResponse::OpfsSyncTestResult {
        request_id,
        ok: true,
        bytes: Some(bytes),
        ms: Some(0.0),
        error: None,
        error_code: None,
    }
}

#[tokio::test]
async fn replies_with_the_request_id() {
    let worker = WorkerHandle::spawn(EchoTask);
    let request = WorkerRequest::storage_self_test(Some(16));
    let expected = request.request_id();

    let response = worker.request(request).await.expect("response");

    assert_eq!(response.request_id(), expected);
    assert!(response.is_ok());
    assert_eq!(worker.name(), "echo");
}

#[tokio::test]
async fn task_errors_become_failure_replies() {
    let worker = WorkerHandle::spawn(EchoTask);

    let response = worker
        .request(WorkerRequest::storage_self_test(Some(0)))
        .await
        .expect("response");

    assert!(!response.is_ok());
    assert_eq!(response.error(), Some("empty payload"));
}

#[tokio::test]
async fn panics_are_reported_and_the_worker_keeps_serving() {
    let worker = WorkerHandle::spawn(EchoTask);

    let response = worker
        .request(WorkerRequest::storage_self_test(Some(1)))
        .await
        .expect("response");
    assert!(!response.is_ok());
    assert_eq!(response.error(), Some("probe exploded"));

    let response = worker
        .request(WorkerRequest::storage_self_test(None))
        .await
        .expect("response after panic");
    assert!(response.is_ok());
}

#[tokio::test]
async fn other_request_kinds_are_rejected() {
    let worker = WorkerHandle::spawn(EchoTask);

    let response = worker
        .request(WorkerRequest::compute_recommendations(Vec::new(), Vec::new()))
        .await
        .expect("response");

    assert!(matches!(
        response,
        WorkerResponse::RecommendationsResult {
            ok: false,
            error_code: Some(ErrorCode::Validation),
            ..
        }
    ));
    assert_eq!(
        response.error(),
        Some("echo cannot handle COMPUTE_RECOMMENDATIONS")
    );
}

#[tokio::test]
async fn mismatched_reply_is_an_error() {
    let worker = WorkerHandle::spawn(EchoTask);
    let request = WorkerRequest::storage_self_test(Some(3));
    let expected = request.request_id();

    let err = worker.request(request).await.expect_err("mismatch");

    assert!(matches!(err, WorkerError::Mismatched { expected: e, .. } if e == expected));
}

#[tokio::test(start_paused = true)]
async fn slow_task_times_out() {
    let worker = WorkerHandle::spawn(EchoTask);

    let err = worker
        .request_with_timeout(
            WorkerRequest::storage_self_test(Some(2)),
            Duration::from_secs(5),
        )
        .await
        .expect_err("timeout");

    assert_eq!(err, WorkerError::Timeout(Duration::from_secs(5)));
}
