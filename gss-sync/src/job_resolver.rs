//! Turns a sync request into a job, gated by the store allow-list.

use crate::error::{SyncError, SyncResult};
use crate::types::SyncJob;
use std::collections::HashSet;

/// Validates store IDs and derives each job's addressing context.
#[derive(Clone, Debug)]
pub struct JobResolver {
    allowed_stores: HashSet<String>,
    destination_root: String,
}

impl JobResolver {
    pub fn new<I, S>(allowed_stores: I, destination_root: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allowed_stores: allowed_stores.into_iter().map(Into::into).collect(),
            destination_root: destination_root.into(),
        }
    }

    /// Resolves `(store_id, order_id)` into a job.
    ///
    /// The store must match an allow-list entry exactly (case-sensitive).
    /// Identifiers are otherwise opaque and not validated.
    pub fn resolve(&self, store_id: &str, order_id: &str) -> SyncResult<SyncJob> {
        if !self.allowed_stores.contains(store_id) {
            return Err(SyncError::JobRejected {
                store_id: store_id.to_string(),
            });
        }
        Ok(SyncJob::new(store_id, order_id, &self.destination_root))
    }
}
