//! Error types for Billbook
//!
//! All errors use thiserror for structured error handling.
//! These errors can be serialized to a presentation layer as plain messages.

use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    /// Missing required field, non-positive amount, empty line items.
    /// The triggering operation is aborted and no state is mutated.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The operation needs an explicit override from the user.
    #[error("Confirmation required: {0}")]
    ConfirmationRequired(String),

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("Parse error: {0}")]
    Parse(String),

    /// Local durable write failed. The in-memory change is kept.
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Sync error: {0}")]
    Sync(#[from] SyncError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Generic(String),
}

impl AppError {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        AppError::NotFound {
            kind,
            id: id.into(),
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        AppError::Validation(msg.into())
    }
}

/// Failures talking to the remote file store
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Invalid access token")]
    BadCredential,

    #[error("Insufficient permission: {0}")]
    PermissionDenied(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Remote file changed since last sync")]
    Conflict,

    #[error("Remote file kept changing, gave up after retry")]
    ConflictExhausted,

    #[error("Remote store did not answer within {0:?}")]
    Timeout(Duration),

    #[error("Not connected to a remote store")]
    NotConnected,

    #[error("Could not decode remote content: {0}")]
    Decode(String),

    #[error("Remote store returned status {status}: {message}")]
    UnexpectedStatus { status: u16, message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl serde::Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
