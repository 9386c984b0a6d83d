//! Seams to the external collaborators: message queue, object store, FTP.
//!
//! The orchestrator only talks to these traits, so tests swap in fakes and
//! production wires in `PubSubClient`, `S3ObjectSource` and `FtpDestination`.

use crate::error::SyncResult;
use crate::types::ReceivedMessage;
use async_trait::async_trait;
use std::pin::Pin;
use tokio::io::AsyncRead;

/// Byte stream of one source object.
pub type ObjectReader = Pin<Box<dyn AsyncRead + Send>>;

/// Source of sync requests.
#[async_trait]
pub trait MessageSource: Send + Sync {
    /// Pulls at most one message. `Ok(None)` means nothing is pending.
    async fn pull(&self) -> SyncResult<Option<ReceivedMessage>>;

    async fn acknowledge(&self, ack_id: &str) -> SyncResult<()>;
}

/// Read side: the object store.
#[async_trait]
pub trait ObjectSource: Send + Sync {
    /// Lists every key starting with `prefix`, directory markers included.
    async fn list(&self, prefix: &str) -> SyncResult<Vec<String>>;

    async fn open_read(&self, key: &str) -> SyncResult<ObjectReader>;
}

/// Write side: the file-transfer endpoint.
#[async_trait]
pub trait Destination: Send + Sync {
    /// Creates `path` if missing. Already-existing directories are not an error.
    async fn ensure_directory(&self, path: &str) -> SyncResult<()>;

    /// Writes all bytes of `reader` to `path`, overwriting any existing file.
    /// Returns the number of bytes stored.
    async fn store(&self, path: &str, reader: ObjectReader) -> SyncResult<u64>;
}
