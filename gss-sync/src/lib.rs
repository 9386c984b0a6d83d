//! Object store to FTP sync engine.
//!
//! Pulls sync requests from Pub/Sub and copies every object under an order's
//! key prefix to an FTP endpoint:
//! - Allow-list validation of the requesting store
//! - Deterministic key to FTP path mapping
//! - Parent-before-child directory creation ahead of any transfer
//! - Bounded-concurrency transfer pool with a full drain barrier
//! - One job in flight at a time, at-most-once message handling

pub mod config;
pub mod credential_manager;
pub mod directory_planner;
pub mod error;
pub mod ftp_destination;
pub mod job_resolver;
pub mod orchestrator;
pub mod path_mapper;
pub mod pubsub_client;
pub mod s3_source;
pub mod transfer_pool;
pub mod transport;
pub mod types;

pub use config::SyncConfig;
pub use error::{SyncError, SyncResult};
pub use types::*;
