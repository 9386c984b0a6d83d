//! Sync service configuration.

use crate::error::{SyncError, SyncResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Environment variable naming the JSON configuration file.
pub const CONFIG_PATH_ENV: &str = "GSS_CONFIG";

/// Configuration file used when `GSS_CONFIG` is unset.
pub const DEFAULT_CONFIG_PATH: &str = "config.json";

/// Configuration for the sync service.
///
/// Field names follow the deployed `config.json` format, so existing files
/// load unchanged. Everything after `allow_stores` is optional.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// GCP project owning the Pub/Sub subscription.
    pub gs_project_id: String,

    /// Bucket holding the order objects.
    pub gs_bucket: String,

    /// FTP endpoint as `host:port`.
    pub ftp_addr: String,

    pub ftp_user: String,

    #[serde(rename = "ftp_passwd")]
    pub ftp_password: String,

    /// Root directory on the FTP server; each order lands in `{ftp_root}/{order_id}/`.
    pub ftp_root: String,

    /// Store IDs allowed to trigger a sync (exact, case-sensitive match).
    pub allow_stores: Vec<String>,

    /// Pub/Sub subscription to pull sync requests from.
    pub subscription: String,

    /// Ceiling on simultaneous transfers against the FTP endpoint.
    pub max_concurrent_transfers: usize,

    /// Wait between pulls when the subscription is empty or a pull fails (seconds).
    pub poll_interval_secs: u64,

    /// S3-compatible endpoint of the object store.
    pub storage_endpoint: String,

    pub storage_region: String,

    pub pubsub_base_url: String,

    /// Instance metadata server used to mint access tokens.
    pub metadata_base_url: String,

    /// Refresh access tokens this many seconds before they expire.
    pub token_refresh_margin_secs: i64,

    /// Idle FTP connections kept for reuse between transfers.
    pub ftp_max_idle_connections: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            gs_project_id: String::new(),
            gs_bucket: String::new(),
            ftp_addr: String::new(),
            ftp_user: String::new(),
            ftp_password: String::new(),
            ftp_root: String::new(),
            allow_stores: Vec::new(),
            subscription: "syncToFtp".to_string(),
            max_concurrent_transfers: 2,
            poll_interval_secs: 5,
            storage_endpoint: "https://storage.googleapis.com".to_string(),
            storage_region: "auto".to_string(),
            pubsub_base_url: "https://pubsub.googleapis.com".to_string(),
            metadata_base_url: "http://metadata.google.internal".to_string(),
            token_refresh_margin_secs: 60,
            ftp_max_idle_connections: 10,
        }
    }
}

impl SyncConfig {
    /// Loads the file named by `GSS_CONFIG`, falling back to `config.json`.
    pub fn load() -> SyncResult<Self> {
        let path = std::env::var(CONFIG_PATH_ENV)
            .ok()
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
        Self::from_path(path)
    }

    /// Loads and validates a JSON configuration file.
    pub fn from_path(path: impl AsRef<Path>) -> SyncResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| SyncError::Config(format!("cannot read {}: {e}", path.display())))?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> SyncResult<()> {
        if self.gs_project_id.is_empty() {
            return Err(SyncError::Config("missing gs_project_id".to_string()));
        }
        if self.gs_bucket.is_empty() {
            return Err(SyncError::Config("missing gs_bucket".to_string()));
        }
        if self.ftp_addr.is_empty() {
            return Err(SyncError::Config("missing ftp_addr".to_string()));
        }
        if self.max_concurrent_transfers == 0 {
            return Err(SyncError::Config(
                "max_concurrent_transfers must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// Full resource name of the subscription, e.g. `projects/p/subscriptions/s`.
    pub fn subscription_path(&self) -> String {
        format!(
            "projects/{}/subscriptions/{}",
            self.gs_project_id, self.subscription
        )
    }
}
