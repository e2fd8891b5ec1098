use std::{any::Any, panic::AssertUnwindSafe, sync::Arc, time::Duration};

use async_trait::async_trait;
use futures::FutureExt;
use shared::{
    domain::RequestId,
    error::{ErrorCode, TaskException},
    protocol::{WorkerRequest, WorkerResponse},
};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

const INBOX_CAPACITY: usize = 32;

/// Work executed off the page's main flow. One request, one response.
#[async_trait]
pub trait WorkerTask: Send + Sync + 'static {
    fn name(&self) -> &'static str;
    async fn handle(&self, request: &WorkerRequest) -> Result<WorkerResponse, TaskException>;
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WorkerError {
    #[error("worker is not running")]
    Closed,
    #[error("worker dropped request {0} without replying")]
    Dropped(RequestId),
    #[error("worker replied to {received} while {expected} was pending")]
    Mismatched {
        expected: RequestId,
        received: RequestId,
    },
    #[error("worker did not reply within {0:?}")]
    Timeout(Duration),
}

struct Envelope {
    request: WorkerRequest,
    reply: oneshot::Sender<WorkerResponse>,
}

/// Sending side of a spawned worker. Cheap to clone.
#[derive(Clone)]
pub struct WorkerHandle {
    name: &'static str,
    inbox: mpsc::Sender<Envelope>,
}

impl WorkerHandle {
    /// Spawns `task` on the current runtime. The worker stops once every
    /// handle is dropped.
    pub fn spawn(task: impl WorkerTask) -> Self {
        let task: Arc<dyn WorkerTask> = Arc::new(task);
        let name = task.name();
        let (inbox, mut requests) = mpsc::channel::<Envelope>(INBOX_CAPACITY);

        tokio::spawn(async move {
            while let Some(Envelope { request, reply }) = requests.recv().await {
                let response = run_task(task.as_ref(), &request).await;
                if reply.send(response).is_err() {
                    debug!(
                        "worker: requester went away worker={name} request_id={}",
                        request.request_id()
                    );
                }
            }
            debug!("worker: stopped worker={name}");
        });

        Self { name, inbox }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub async fn request(&self, request: WorkerRequest) -> Result<WorkerResponse, WorkerError> {
        let expected = request.request_id();
        let (reply, response) = oneshot::channel();
        self.inbox
            .send(Envelope { request, reply })
            .await
            .map_err(|_| WorkerError::Closed)?;

        let response = response.await.map_err(|_| WorkerError::Dropped(expected))?;
        let received = response.request_id();
        if received != expected {
            return Err(WorkerError::Mismatched { expected, received });
        }
        Ok(response)
    }

    pub async fn request_with_timeout(
        &self,
        request: WorkerRequest,
        timeout: Duration,
    ) -> Result<WorkerResponse, WorkerError> {
        tokio::time::timeout(timeout, self.request(request))
            .await
            .map_err(|_| WorkerError::Timeout(timeout))?
    }
}

async fn run_task(task: &dyn WorkerTask, request: &WorkerRequest) -> WorkerResponse {
    match AssertUnwindSafe(task.handle(request)).catch_unwind().await {
        Ok(Ok(response)) => response,
        Ok(Err(err)) => {
            debug!(
                "worker: task failed worker={} kind={} error={err}",
                task.name(),
                request.kind()
            );
            request.failure(&err)
        }
        Err(panic) => {
            let message = panic_message(panic.as_ref());
            warn!(
                "worker: task panicked worker={} kind={} message={message}",
                task.name(),
                request.kind()
            );
            request.failure(&TaskException::new(ErrorCode::Internal, message))
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "worker task panicked".to_string()
    }
}

/// Failure for a request kind this task does not serve.
pub fn unsupported_request(task: &str, request: &WorkerRequest) -> TaskException {
    TaskException::new(
        ErrorCode::Validation,
        format!("{task} cannot handle {}", request.kind()),
    )
}

#[cfg(test)]
#[path = "tests/runtime_tests.rs"]
mod tests;
