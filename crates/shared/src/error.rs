use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    Unsupported,
    NotFound,
    Validation,
    Integrity,
    Io,
    Internal,
}

#[derive(Debug, Error)]
#[error("{message}")]
pub struct TaskException {
    pub code: ErrorCode,
    pub message: String,
}

impl TaskException {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Unsupported, message)
    }

    pub fn io(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Io, message)
    }
}

impl From<std::io::Error> for TaskException {
    fn from(value: std::io::Error) -> Self {
        Self::io(value.to_string())
    }
}
