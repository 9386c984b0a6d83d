//! Shared fakes for the collaborator traits.
#![allow(dead_code)]

pub mod ftp_stub;

use async_trait::async_trait;
use gss_sync::transport::{Destination, MessageSource, ObjectReader, ObjectSource};
use gss_sync::{ReceivedMessage, SyncConfig, SyncError, SyncRequest, SyncResult};
use std::collections::{HashMap, HashSet, VecDeque};
use std::io::Cursor;
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::io::AsyncReadExt;

/// Config pointing nowhere, with the given allow-list and `/ftp/` root.
pub fn test_config(allow_stores: &[&str], max_concurrent_transfers: usize) -> SyncConfig {
    SyncConfig {
        gs_project_id: "test-project".into(),
        gs_bucket: "test-bucket".into(),
        ftp_addr: "127.0.0.1:21".into(),
        ftp_user: "user".into(),
        ftp_password: "secret".into(),
        ftp_root: "/ftp/".into(),
        allow_stores: allow_stores.iter().map(|s| s.to_string()).collect(),
        max_concurrent_transfers,
        poll_interval_secs: 0,
        ..SyncConfig::default()
    }
}

/// One observed collaborator call, in arrival order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Op {
    Ack(String),
    List(String),
    EnsureDir(String),
    StoreStarted(String),
    StoreFinished(String),
}

/// Call log that several fakes can append to.
pub type OpLog = Arc<Mutex<Vec<Op>>>;

// ── Queue ───────────────────────────────────────────────────────

pub struct FakeQueue {
    pending: Mutex<VecDeque<ReceivedMessage>>,
    acked: Mutex<Vec<String>>,
    pulls: AtomicUsize,
    fail_ack: bool,
    log: OpLog,
}

impl FakeQueue {
    pub fn new(requests: Vec<SyncRequest>) -> Self {
        let pending = requests
            .into_iter()
            .enumerate()
            .map(|(i, request)| ReceivedMessage {
                ack_id: format!("ack-{i}"),
                message_id: format!("msg-{i}"),
                request,
            })
            .collect();
        Self {
            pending: Mutex::new(pending),
            acked: Mutex::new(Vec::new()),
            pulls: AtomicUsize::new(0),
            fail_ack: false,
            log: OpLog::default(),
        }
    }

    pub fn with_log(mut self, log: OpLog) -> Self {
        self.log = log;
        self
    }

    /// Every acknowledge call fails after being recorded.
    pub fn failing_acknowledge(mut self) -> Self {
        self.fail_ack = true;
        self
    }

    pub fn acked(&self) -> Vec<String> {
        self.acked.lock().unwrap().clone()
    }

    pub fn is_drained(&self) -> bool {
        self.pending.lock().unwrap().is_empty()
    }
}

#[async_trait]
impl MessageSource for FakeQueue {
    async fn pull(&self) -> SyncResult<Option<ReceivedMessage>> {
        self.pulls.fetch_add(1, Ordering::SeqCst);
        let next = self.pending.lock().unwrap().pop_front();
        if next.is_none() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        Ok(next)
    }

    async fn acknowledge(&self, ack_id: &str) -> SyncResult<()> {
        self.log.lock().unwrap().push(Op::Ack(ack_id.to_string()));
        if self.fail_ack {
            return Err(SyncError::Queue("acknowledge returned 400: ack deadline expired".into()));
        }
        self.acked.lock().unwrap().push(ack_id.to_string());
        Ok(())
    }
}

// ── Object store ────────────────────────────────────────────────

#[derive(Default)]
pub struct FakeSource {
    objects: HashMap<String, Vec<u8>>,
    extra_keys: Vec<String>,
    unreadable: HashSet<String>,
    fail_listing: bool,
    list_calls: Mutex<Vec<String>>,
    log: OpLog,
}

impl FakeSource {
    pub fn with_objects(objects: &[(&str, &str)]) -> Self {
        Self {
            objects: objects
                .iter()
                .map(|(k, v)| (k.to_string(), v.as_bytes().to_vec()))
                .collect(),
            ..Self::default()
        }
    }

    /// Keys returned by listing that have no body (directory markers).
    pub fn with_listed_only(mut self, keys: &[&str]) -> Self {
        self.extra_keys.extend(keys.iter().map(|k| k.to_string()));
        self
    }

    pub fn with_unreadable(mut self, key: &str) -> Self {
        self.unreadable.insert(key.to_string());
        self
    }

    pub fn with_log(mut self, log: OpLog) -> Self {
        self.log = log;
        self
    }

    pub fn failing_listing(mut self) -> Self {
        self.fail_listing = true;
        self
    }

    pub fn list_calls(&self) -> Vec<String> {
        self.list_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ObjectSource for FakeSource {
    async fn list(&self, prefix: &str) -> SyncResult<Vec<String>> {
        self.list_calls.lock().unwrap().push(prefix.to_string());
        self.log.lock().unwrap().push(Op::List(prefix.to_string()));
        if self.fail_listing {
            return Err(SyncError::Enumeration("bucket unavailable".into()));
        }
        let mut keys: Vec<String> = self
            .objects
            .keys()
            .chain(self.extra_keys.iter())
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect();
        keys.sort();
        Ok(keys)
    }

    async fn open_read(&self, key: &str) -> SyncResult<ObjectReader> {
        if self.unreadable.contains(key) {
            return Err(SyncError::SourceRead {
                key: key.to_string(),
                reason: "permission denied".into(),
            });
        }
        let body = self.objects.get(key).cloned().ok_or_else(|| SyncError::SourceRead {
            key: key.to_string(),
            reason: "no such object".into(),
        })?;
        Ok(Box::pin(Cursor::new(body)))
    }
}

// ── Destination ─────────────────────────────────────────────────

#[derive(Default)]
pub struct FakeDestination {
    ops: OpLog,
    files: Mutex<HashMap<String, Vec<u8>>>,
    failing_paths: HashSet<String>,
    failing_dirs: HashSet<String>,
    delay: Duration,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl FakeDestination {
    pub fn new() -> Self {
        Self::default()
    }

    /// Each store holds its slot for `delay`, so transfers overlap.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_log(mut self, log: OpLog) -> Self {
        self.ops = log;
        self
    }

    pub fn failing_store(mut self, path: &str) -> Self {
        self.failing_paths.insert(path.to_string());
        self
    }

    pub fn failing_dir(mut self, path: &str) -> Self {
        self.failing_dirs.insert(path.to_string());
        self
    }

    pub fn ops(&self) -> Vec<Op> {
        self.ops.lock().unwrap().clone()
    }

    pub fn file(&self, path: &str) -> Option<Vec<u8>> {
        self.files.lock().unwrap().get(path).cloned()
    }

    pub fn stored_paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.files.lock().unwrap().keys().cloned().collect();
        paths.sort();
        paths
    }

    pub fn created_dirs(&self) -> Vec<String> {
        self.ops()
            .into_iter()
            .filter_map(|op| match op {
                Op::EnsureDir(d) => Some(d),
                _ => None,
            })
            .collect()
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Destination for FakeDestination {
    async fn ensure_directory(&self, path: &str) -> SyncResult<()> {
        self.ops.lock().unwrap().push(Op::EnsureDir(path.to_string()));
        if self.failing_dirs.contains(path) {
            return Err(SyncError::DirectoryCreation {
                path: path.to_string(),
                reason: "permission denied".into(),
            });
        }
        Ok(())
    }

    async fn store(&self, path: &str, mut reader: ObjectReader) -> SyncResult<u64> {
        self.ops.lock().unwrap().push(Op::StoreStarted(path.to_string()));
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let mut body = Vec::new();
        let read = reader.read_to_end(&mut body).await;
        let result = if self.failing_paths.contains(path) {
            Err(SyncError::DestinationWrite {
                path: path.to_string(),
                reason: "550 disk full".into(),
            })
        } else {
            read.map_err(SyncError::from).map(|n| {
                self.files.lock().unwrap().insert(path.to_string(), body);
                n as u64
            })
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.ops.lock().unwrap().push(Op::StoreFinished(path.to_string()));
        result
    }
}
