pub mod client;
pub mod recommendations;
pub mod runtime;

pub use client::RecommendationClient;
pub use recommendations::RecommendationTask;
pub use runtime::{WorkerError, WorkerHandle, WorkerTask};
pub use storage_self_test::{SelfTestReport, StorageSelfTest};
