//! FTP destination with a small pool of reusable connections.
//!
//! suppaftp is blocking, so every FTP exchange runs on the blocking thread
//! pool. Connections are checked out per operation, so up to
//! `max_concurrent_transfers` stores proceed in parallel on separate control
//! connections. A connection that hit an error is dropped instead of reused,
//! and an idle one is probed with NOOP before it is handed out again.

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::transport::{Destination, ObjectReader};
use async_trait::async_trait;
use std::sync::Mutex;
use suppaftp::types::FileType;
use suppaftp::{FtpError, FtpStream};
use tokio_util::io::SyncIoBridge;
use tracing::{debug, warn};

/// Login parameters for the FTP endpoint.
#[derive(Clone)]
struct FtpLogin {
    addr: String,
    user: String,
    password: String,
}

impl FtpLogin {
    /// Dials, logs in and switches to binary mode. Blocking.
    fn dial(&self) -> Result<FtpStream, FtpError> {
        let mut stream = FtpStream::connect(self.addr.as_str())?;
        stream.login(self.user.as_str(), self.password.as_str())?;
        stream.transfer_type(FileType::Binary)?;
        Ok(stream)
    }
}

/// Result of a MKD exchange that did not break the session.
enum MkdirOutcome {
    Created,
    Existing,
    Refused(String),
}

/// Creates `dir`, telling an existing directory apart from a refusal by
/// changing into it and back. Blocking.
fn make_directory(stream: &mut FtpStream, dir: &str) -> Result<MkdirOutcome, FtpError> {
    let refusal = match stream.mkdir(dir) {
        Ok(()) => return Ok(MkdirOutcome::Created),
        Err(e @ FtpError::UnexpectedResponse(_)) => e.to_string(),
        Err(e) => return Err(e),
    };

    let previous = stream.pwd()?;
    match stream.cwd(dir) {
        Ok(()) => {
            stream.cwd(previous.as_str())?;
            Ok(MkdirOutcome::Existing)
        }
        Err(FtpError::UnexpectedResponse(_)) => Ok(MkdirOutcome::Refused(refusal)),
        Err(e) => Err(e),
    }
}

/// `Destination` backed by an FTP server.
pub struct FtpDestination {
    login: FtpLogin,
    idle: Mutex<Vec<FtpStream>>,
    max_idle: usize,
}

impl FtpDestination {
    pub fn new(config: &SyncConfig) -> Self {
        Self {
            login: FtpLogin {
                addr: config.ftp_addr.clone(),
                user: config.ftp_user.clone(),
                password: config.ftp_password.clone(),
            },
            idle: Mutex::new(Vec::new()),
            max_idle: config.ftp_max_idle_connections,
        }
    }

    /// Dials once and keeps the connection for later use.
    pub async fn check_connection(&self) -> SyncResult<()> {
        let stream = self.checkout().await?;
        debug!("connected to FTP endpoint {}", self.login.addr);
        self.checkin(stream);
        Ok(())
    }

    /// Hands out a live connection, dialing when no idle one answers NOOP.
    async fn checkout(&self) -> SyncResult<FtpStream> {
        while let Some(mut stream) = self.pop_idle() {
            let probe = tokio::task::spawn_blocking(move || {
                let alive = stream.noop().is_ok();
                (stream, alive)
            })
            .await;
            match probe {
                Ok((stream, true)) => return Ok(stream),
                Ok((_, false)) => debug!("dropping stale FTP connection to {}", self.login.addr),
                Err(e) => warn!("FTP liveness check task failed: {e}"),
            }
        }

        let login = self.login.clone();
        tokio::task::spawn_blocking(move || login.dial())
            .await
            .map_err(|e| SyncError::Io(std::io::Error::other(e)))?
            .map_err(|e| {
                SyncError::Io(std::io::Error::other(format!(
                    "FTP connect to {} failed: {e}",
                    self.login.addr
                )))
            })
    }

    fn pop_idle(&self) -> Option<FtpStream> {
        self.idle
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .pop()
    }

    fn checkin(&self, stream: FtpStream) {
        let mut idle = self.idle.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if idle.len() < self.max_idle {
            idle.push(stream);
        }
    }
}

#[async_trait]
impl Destination for FtpDestination {
    async fn ensure_directory(&self, path: &str) -> SyncResult<()> {
        let mut stream = self.checkout().await.map_err(|e| SyncError::DirectoryCreation {
            path: path.to_string(),
            reason: e.to_string(),
        })?;

        let dir = path.to_string();
        let (stream, result) = tokio::task::spawn_blocking(move || {
            let result = make_directory(&mut stream, dir.as_str());
            (stream, result)
        })
        .await
        .map_err(|e| SyncError::DirectoryCreation {
            path: path.to_string(),
            reason: format!("mkdir task failed: {e}"),
        })?;

        match result {
            Ok(MkdirOutcome::Created) => {
                self.checkin(stream);
                Ok(())
            }
            Ok(MkdirOutcome::Existing) => {
                debug!("{path} already exists");
                self.checkin(stream);
                Ok(())
            }
            Ok(MkdirOutcome::Refused(reason)) => {
                self.checkin(stream);
                Err(SyncError::DirectoryCreation {
                    path: path.to_string(),
                    reason,
                })
            }
            Err(e) => Err(SyncError::DirectoryCreation {
                path: path.to_string(),
                reason: e.to_string(),
            }),
        }
    }

    async fn store(&self, path: &str, reader: ObjectReader) -> SyncResult<u64> {
        let mut stream = self.checkout().await.map_err(|e| SyncError::DestinationWrite {
            path: path.to_string(),
            reason: e.to_string(),
        })?;

        let target = path.to_string();
        let mut bridge = SyncIoBridge::new(reader);
        let (stream, result) = tokio::task::spawn_blocking(move || {
            let result = stream.put_file(target.as_str(), &mut bridge);
            (stream, result)
        })
        .await
        .map_err(|e| SyncError::DestinationWrite {
            path: path.to_string(),
            reason: format!("store task failed: {e}"),
        })?;

        match result {
            Ok(bytes) => {
                self.checkin(stream);
                Ok(bytes)
            }
            Err(e) => Err(SyncError::DestinationWrite {
                path: path.to_string(),
                reason: e.to_string(),
            }),
        }
    }
}
