//! Bounded-concurrency transfer of a job's objects.
//!
//! One worker task is spawned per object up front. Each worker waits for a
//! transfer slot before touching the source or the FTP endpoint, so no more
//! than `max_concurrent` transfers run at once. `run` returns only after
//! every worker has finished and released its slot.

use crate::path_mapper::map_path;
use crate::transport::{Destination, ObjectSource};
use crate::types::{SyncJob, TransferReport};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// Per-object transfer executor with a fixed concurrency ceiling.
///
/// Slots belong to the pool instance; separate pools never throttle each other.
pub struct TransferPool {
    slots: Arc<Semaphore>,
    max_concurrent: usize,
}

enum Outcome {
    Stored(u64),
    Failed,
}

impl TransferPool {
    /// Creates a pool; a ceiling of zero is raised to one.
    pub fn new(max_concurrent: usize) -> Self {
        let max_concurrent = max_concurrent.max(1);
        Self {
            slots: Arc::new(Semaphore::new(max_concurrent)),
            max_concurrent,
        }
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Transfers currently holding a slot.
    pub fn in_flight(&self) -> usize {
        self.max_concurrent - self.slots.available_permits()
    }

    /// Transfers every object of `job` and waits for all of them.
    ///
    /// Failures are logged per object and never affect sibling transfers.
    pub async fn run(
        &self,
        job: &SyncJob,
        objects: &[String],
        source: Arc<dyn ObjectSource>,
        destination: Arc<dyn Destination>,
    ) -> TransferReport {
        let mut workers = JoinSet::new();

        for key in objects {
            let path = map_path(job, key).to_string();
            let key = key.clone();
            let slots = Arc::clone(&self.slots);
            let source = Arc::clone(&source);
            let destination = Arc::clone(&destination);

            workers.spawn(async move {
                // Held until the worker returns, released on every exit path.
                let _slot = match slots.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => {
                        error!("transfer slots closed, skipping {path}");
                        return Outcome::Failed;
                    }
                };
                transfer_object(source.as_ref(), destination.as_ref(), &key, &path).await
            });
        }

        let mut report = TransferReport::default();
        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok(Outcome::Stored(bytes)) => {
                    report.stored += 1;
                    report.bytes += bytes;
                }
                Ok(Outcome::Failed) => report.failed += 1,
                Err(e) => {
                    error!("transfer worker for job {} aborted: {e}", job.job_id);
                    report.failed += 1;
                }
            }
            debug!(
                "job {}: {}/{} transfers finished, {} in flight",
                job.job_id,
                report.total(),
                objects.len(),
                self.in_flight()
            );
        }

        report
    }
}

async fn transfer_object(
    source: &dyn ObjectSource,
    destination: &dyn Destination,
    key: &str,
    path: &str,
) -> Outcome {
    let reader = match source.open_read(key).await {
        Ok(reader) => reader,
        Err(e) => {
            warn!("{path}: cannot open source object: {e}");
            return Outcome::Failed;
        }
    };

    match destination.store(path, reader).await {
        Ok(bytes) => {
            info!("{path} stored to FTP ({bytes} bytes)");
            Outcome::Stored(bytes)
        }
        Err(e) => {
            warn!("{path}: store to FTP failed: {e}");
            Outcome::Failed
        }
    }
}
