//! Sync error types.

use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur while resolving and running sync jobs.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("store {store_id} is not in the allow-list")]
    JobRejected { store_id: String },

    #[error("object listing failed: {0}")]
    Enumeration(String),

    #[error("failed to create directory {path}: {reason}")]
    DirectoryCreation { path: String, reason: String },

    #[error("failed to read object {key}: {reason}")]
    SourceRead { key: String, reason: String },

    #[error("failed to write {path}: {reason}")]
    DestinationWrite { path: String, reason: String },

    #[error("message queue error: {0}")]
    Queue(String),

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("access token expired or invalid")]
    CredentialExpired,

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
