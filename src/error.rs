//! Error types for taskflow
//!
//! Exit codes:
//! - 0: Success
//! - 2: User error (bad args, unknown task, invalid config)
//! - 4: Operation failed (backend error, IO, serialization)

use std::path::PathBuf;
use thiserror::Error;

use crate::task::TaskId;

/// Exit codes for the taskflow CLI
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const USER_ERROR: i32 = 2;
    pub const OPERATION_FAILED: i32 = 4;
}

/// Main error type for taskflow operations
#[derive(Error, Debug)]
pub enum Error {
    // User errors (exit code 2)
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Task not found: {0}")]
    TaskNotFound(TaskId),

    // Operation failures (exit code 4)
    #[error("Backend error ({status}): {message}")]
    Backend { status: u16, message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("Lock acquisition failed: {0}")]
    LockFailed(PathBuf),

    #[error("Operation failed: {0}")]
    OperationFailed(String),
}

impl Error {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::InvalidConfig(_) | Error::InvalidArgument(_) | Error::TaskNotFound(_) => {
                exit_codes::USER_ERROR
            }

            Error::Backend { .. }
            | Error::Http(_)
            | Error::Io(_)
            | Error::Json(_)
            | Error::TomlParse(_)
            | Error::LockFailed(_)
            | Error::OperationFailed(_) => exit_codes::OPERATION_FAILED,
        }
    }

    /// Stable class name for JSON error output.
    pub fn kind(&self) -> &'static str {
        match self.exit_code() {
            exit_codes::USER_ERROR => "user_error",
            _ => "operation_failed",
        }
    }

    /// Structured details for JSON error output.
    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            Error::InvalidConfig(message)
            | Error::InvalidArgument(message)
            | Error::OperationFailed(message) => {
                Some(serde_json::json!({ "message": message }))
            }
            Error::TaskNotFound(id) => Some(serde_json::json!({ "id": id })),
            Error::Backend { status, message } => Some(serde_json::json!({
                "status": status,
                "message": message,
            })),
            Error::LockFailed(path) => Some(serde_json::json!({ "path": path })),
            _ => None,
        }
    }
}

/// Result type alias for taskflow operations
pub type Result<T> = std::result::Result<T, Error>;

/// Wrapper for displaying errors in JSON format
#[derive(serde::Serialize)]
pub struct JsonError {
    pub message: String,
    pub code: i32,
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl From<&Error> for JsonError {
    fn from(err: &Error) -> Self {
        JsonError {
            message: err.to_string(),
            code: err.exit_code(),
            kind: err.kind(),
            details: err.details(),
        }
    }
}
