//! Shared types for sync jobs.

use std::fmt;
use uuid::Uuid;

/// Separator used both in object keys and FTP paths.
pub const PATH_SEPARATOR: char = '/';

/// Key suffix the object store uses for empty "folder" placeholders.
pub const DIRECTORY_MARKER_SUFFIX: &str = "/";

/// Addressing attributes carried by one sync message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SyncRequest {
    pub store_id: String,
    pub order_id: String,
}

impl SyncRequest {
    pub fn new(store_id: impl Into<String>, order_id: impl Into<String>) -> Self {
        Self {
            store_id: store_id.into(),
            order_id: order_id.into(),
        }
    }
}

/// A message pulled from the queue, not yet acknowledged.
#[derive(Clone, Debug)]
pub struct ReceivedMessage {
    pub ack_id: String,
    pub message_id: String,
    pub request: SyncRequest,
}

/// One accepted sync request, alive from resolution until the pool drains.
#[derive(Clone, Debug)]
pub struct SyncJob {
    /// Correlates log lines of one job.
    pub job_id: Uuid,
    pub store_id: String,
    pub order_id: String,
    /// `{store_id}/order/{order_id}`, the key prefix enumerating this job's objects.
    pub source_prefix: String,
    /// `{root}/{order_id}/`, the FTP namespace for this job.
    pub dest_root: String,
}

impl SyncJob {
    pub fn new(store_id: &str, order_id: &str, destination_root: &str) -> Self {
        Self {
            job_id: Uuid::now_v7(),
            store_id: store_id.to_string(),
            order_id: order_id.to_string(),
            source_prefix: format!("{store_id}/order/{order_id}"),
            dest_root: format!(
                "{}{PATH_SEPARATOR}{order_id}{PATH_SEPARATOR}",
                destination_root.trim_end_matches(PATH_SEPARATOR)
            ),
        }
    }

    /// The prefix that every key of this job starts with, separator included.
    pub fn scope_prefix(&self) -> String {
        format!("{}{PATH_SEPARATOR}", self.source_prefix)
    }

    /// True when `key` lives under this job's prefix.
    ///
    /// A bare prefix match is not enough: listing `S1/order/O1` also returns
    /// keys of order `O10`.
    pub fn in_scope(&self, key: &str) -> bool {
        key.starts_with(&self.scope_prefix())
    }
}

/// An FTP path as an ordered list of segments; the last one is the file name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DestinationPath(Vec<String>);

impl DestinationPath {
    /// Splits on the separator without normalizing empty segments.
    pub fn parse(path: &str) -> Self {
        Self(path.split(PATH_SEPARATOR).map(str::to_string).collect())
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Every directory level above the leaf, parent first, each with a
    /// trailing separator.
    ///
    /// `/ftp/O1/sub/b.txt` yields `/`, `/ftp/`, `/ftp/O1/`, `/ftp/O1/sub/`.
    pub fn directories(&self) -> Vec<String> {
        let mut dirs = Vec::with_capacity(self.0.len().saturating_sub(1));
        let mut current = String::new();
        for segment in self.0.iter().take(self.0.len().saturating_sub(1)) {
            current.push_str(segment);
            current.push(PATH_SEPARATOR);
            dirs.push(current.clone());
        }
        dirs
    }
}

impl fmt::Display for DestinationPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let separator = PATH_SEPARATOR.to_string();
        f.write_str(&self.0.join(separator.as_str()))
    }
}

/// Outcome counts of one transfer pool run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TransferReport {
    pub stored: usize,
    pub failed: usize,
    pub bytes: u64,
}

impl TransferReport {
    pub fn total(&self) -> usize {
        self.stored + self.failed
    }
}

/// Orchestrator control-loop state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OrchestratorState {
    Idle,
    Resolving,
    Enumerating,
    Planning,
    Transferring,
}
