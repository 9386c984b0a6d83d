//! Sync orchestrator.
//!
//! Single control loop that pulls one sync request at a time and drives it
//! through resolution, enumeration, directory planning and the transfer pool.
//! The next message is not pulled until the current job's pool has drained.
//!
//! State cycle: `Idle -> Resolving -> Enumerating -> Planning -> Transferring -> Idle`.
//! A rejected request goes straight from `Resolving` back to `Idle`.

use crate::config::SyncConfig;
use crate::directory_planner::{create_directories, plan_directories};
use crate::error::{SyncError, SyncResult};
use crate::job_resolver::JobResolver;
use crate::transfer_pool::TransferPool;
use crate::transport::{Destination, MessageSource, ObjectSource};
use crate::types::*;

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Commands accepted by a running orchestrator.
#[derive(Debug)]
pub enum SyncCommand {
    /// Run a job for this request without a queue message behind it.
    Sync(SyncRequest),
    /// Exit the loop once the current job (if any) has drained.
    Stop,
}

/// Handle for sending commands to the orchestrator.
#[derive(Clone)]
pub struct SyncHandle {
    command_tx: mpsc::Sender<SyncCommand>,
}

impl SyncHandle {
    pub async fn stop(&self) -> SyncResult<()> {
        self.command_tx
            .send(SyncCommand::Stop)
            .await
            .map_err(|_| SyncError::Queue("sync orchestrator not running".to_string()))
    }

    /// Queues a manual sync for `store_id`/`order_id`.
    pub async fn sync(
        &self,
        store_id: impl Into<String>,
        order_id: impl Into<String>,
    ) -> SyncResult<()> {
        self.command_tx
            .send(SyncCommand::Sync(SyncRequest::new(store_id, order_id)))
            .await
            .map_err(|_| SyncError::Queue("sync orchestrator not running".to_string()))
    }
}

/// The sync orchestrator. Owns its collaborators for its whole lifetime.
pub struct SyncOrchestrator {
    queue: Arc<dyn MessageSource>,
    source: Arc<dyn ObjectSource>,
    destination: Arc<dyn Destination>,
    resolver: JobResolver,
    pool: TransferPool,
    poll_interval: Duration,
    command_rx: mpsc::Receiver<SyncCommand>,
    state: OrchestratorState,
}

/// Creates an orchestrator and its command handle.
pub fn create_sync_orchestrator(
    queue: Arc<dyn MessageSource>,
    source: Arc<dyn ObjectSource>,
    destination: Arc<dyn Destination>,
    config: &SyncConfig,
) -> (SyncHandle, SyncOrchestrator) {
    let (command_tx, command_rx) = mpsc::channel(64);

    let orchestrator = SyncOrchestrator {
        queue,
        source,
        destination,
        resolver: JobResolver::new(config.allow_stores.iter().cloned(), config.ftp_root.clone()),
        pool: TransferPool::new(config.max_concurrent_transfers),
        poll_interval: config.poll_interval(),
        command_rx,
        state: OrchestratorState::Idle,
    };

    (SyncHandle { command_tx }, orchestrator)
}

enum Next {
    Command(Option<SyncCommand>),
    Pulled(SyncResult<Option<ReceivedMessage>>),
}

impl SyncOrchestrator {
    pub fn state(&self) -> OrchestratorState {
        self.state
    }

    /// Runs the control loop until stopped via the handle.
    pub async fn run(&mut self) {
        info!(
            "sync orchestrator started ({} concurrent transfers)",
            self.pool.max_concurrent()
        );

        loop {
            let next = tokio::select! {
                cmd = self.command_rx.recv() => Next::Command(cmd),
                pulled = self.queue.pull() => Next::Pulled(pulled),
            };

            let keep_running = match next {
                Next::Command(cmd) => self.handle_command(cmd).await,
                Next::Pulled(Ok(Some(message))) => {
                    self.handle_message(message).await;
                    true
                }
                Next::Pulled(Ok(None)) => self.pause().await,
                Next::Pulled(Err(e)) => {
                    warn!("pull failed: {e}");
                    self.pause().await
                }
            };

            if !keep_running {
                break;
            }
        }

        info!("sync orchestrator stopped");
    }

    /// Resolves, enumerates, plans and transfers one request.
    ///
    /// Returns `None` when the request was rejected. Every other failure is
    /// contained to the affected object or directory and only logged.
    pub async fn process(&mut self, request: SyncRequest) -> Option<TransferReport> {
        self.transition(OrchestratorState::Resolving);
        let job = match self.resolver.resolve(&request.store_id, &request.order_id) {
            Ok(job) => job,
            Err(e) => {
                warn!("sync request for order {} discarded: {e}", request.order_id);
                self.transition(OrchestratorState::Idle);
                return None;
            }
        };
        info!(
            "job {} started: store {} order {} -> {}",
            job.job_id, job.store_id, job.order_id, job.dest_root
        );

        self.transition(OrchestratorState::Enumerating);
        let objects = self.enumerate(&job).await;

        self.transition(OrchestratorState::Planning);
        let plan = plan_directories(&job, &objects);
        let failed_dirs = create_directories(self.destination.as_ref(), &plan).await;

        self.transition(OrchestratorState::Transferring);
        let report = self
            .pool
            .run(
                &job,
                &objects,
                Arc::clone(&self.source),
                Arc::clone(&self.destination),
            )
            .await;

        info!(
            "job {} finished: {} stored, {} failed, {} bytes, {failed_dirs} directory failures",
            job.job_id, report.stored, report.failed, report.bytes
        );
        self.transition(OrchestratorState::Idle);
        Some(report)
    }

    async fn handle_message(&mut self, message: ReceivedMessage) {
        self.transition(OrchestratorState::Resolving);
        // At-most-once: acknowledged before any work, whatever the outcome.
        if let Err(e) = self.queue.acknowledge(&message.ack_id).await {
            warn!("acknowledging message {} failed: {e}", message.message_id);
        }
        self.process(message.request).await;
    }

    /// Returns false when the loop should exit.
    async fn handle_command(&mut self, cmd: Option<SyncCommand>) -> bool {
        match cmd {
            Some(SyncCommand::Sync(request)) => {
                debug!(
                    "manual sync requested for store {} order {}",
                    request.store_id, request.order_id
                );
                self.process(request).await;
                true
            }
            Some(SyncCommand::Stop) => {
                info!("sync orchestrator stopping");
                false
            }
            None => {
                info!("command channel closed, stopping sync orchestrator");
                false
            }
        }
    }

    /// Waits one poll interval, still answering commands.
    async fn pause(&mut self) -> bool {
        let cmd = tokio::select! {
            _ = tokio::time::sleep(self.poll_interval) => return true,
            cmd = self.command_rx.recv() => cmd,
        };
        self.handle_command(cmd).await
    }

    /// Lists the job's objects, dropping directory markers and keys that only
    /// share the prefix textually. A listing failure yields no objects.
    async fn enumerate(&self, job: &SyncJob) -> Vec<String> {
        let keys = match self.source.list(&job.source_prefix).await {
            Ok(keys) => keys,
            Err(e) => {
                error!(
                    "listing {} failed, job {} continues with no objects: {e}",
                    job.source_prefix, job.job_id
                );
                return Vec::new();
            }
        };

        keys.into_iter()
            .filter(|key| {
                if key.ends_with(DIRECTORY_MARKER_SUFFIX) {
                    return false;
                }
                if !job.in_scope(key) {
                    debug!("skipping {key}: outside {}", job.scope_prefix());
                    return false;
                }
                true
            })
            .collect()
    }

    fn transition(&mut self, next: OrchestratorState) {
        if self.state != next {
            debug!("orchestrator {:?} -> {:?}", self.state, next);
            self.state = next;
        }
    }
}
