//! Service credentials and OAuth access-token lifecycle.
//!
//! The credentials file carries the object store's HMAC keys and, optionally,
//! a static bearer token. Without a static token, access tokens are minted by
//! the instance metadata server and refreshed before they expire.

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Environment variable naming the credentials file.
pub const CREDENTIALS_PATH_ENV: &str = "GSS_CREDENTIALS";

/// Contents of the credentials file.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServiceCredentials {
    /// HMAC access key for the object store's S3 interoperability API.
    pub access_key_id: String,
    pub secret_access_key: String,
    /// Static OAuth token for Pub/Sub; disables metadata-server refresh.
    #[serde(default)]
    pub access_token: Option<String>,
}

impl ServiceCredentials {
    /// Loads the file named by `GSS_CREDENTIALS`. The variable is mandatory.
    pub fn load() -> SyncResult<Self> {
        let path = std::env::var(CREDENTIALS_PATH_ENV)
            .ok()
            .filter(|p| !p.is_empty())
            .ok_or_else(|| {
                SyncError::Config(format!(
                    "environment variable {CREDENTIALS_PATH_ENV} is not set"
                ))
            })?;
        Self::from_path(path)
    }

    pub fn from_path(path: impl AsRef<Path>) -> SyncResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| SyncError::Config(format!("cannot read {}: {e}", path.display())))?;
        Ok(serde_json::from_str(&raw)?)
    }
}

/// A bearer token and its expiry.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AccessToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl AccessToken {
    /// Returns true if the token will expire within the given seconds.
    pub fn expires_within_secs(&self, secs: i64) -> bool {
        Utc::now() + chrono::Duration::seconds(secs) >= self.expires_at
    }
}

#[derive(Deserialize)]
struct MetadataTokenResponse {
    access_token: String,
    expires_in: i64,
}

/// Caches an access token and refreshes it ahead of expiry.
pub struct TokenManager {
    client: Client,
    metadata_base_url: String,
    static_token: Option<String>,
    token: Arc<RwLock<Option<AccessToken>>>,
    refresh_margin_secs: i64,
}

impl TokenManager {
    pub fn new(config: &SyncConfig, static_token: Option<String>) -> SyncResult<Self> {
        let client = Client::builder().timeout(Duration::from_secs(10)).build()?;
        Ok(Self {
            client,
            metadata_base_url: config.metadata_base_url.trim_end_matches('/').to_string(),
            static_token,
            token: Arc::new(RwLock::new(None)),
            refresh_margin_secs: config.token_refresh_margin_secs,
        })
    }

    /// Gets a valid token, refreshing if needed.
    pub async fn get_token(&self) -> SyncResult<String> {
        if let Some(ref token) = self.static_token {
            return Ok(token.clone());
        }

        {
            let cached = self.token.read().await;
            if let Some(ref t) = *cached {
                if !t.expires_within_secs(self.refresh_margin_secs) {
                    return Ok(t.token.clone());
                }
                debug!("access token expiring within {}s, refreshing", self.refresh_margin_secs);
            }
        }

        self.refresh().await.map(|t| t.token)
    }

    /// Forces a refresh from the metadata server.
    pub async fn refresh(&self) -> SyncResult<AccessToken> {
        if self.static_token.is_some() {
            return Err(SyncError::Auth(
                "static access token was rejected and cannot be refreshed".to_string(),
            ));
        }

        let url = format!(
            "{}/computeMetadata/v1/instance/service-accounts/default/token",
            self.metadata_base_url
        );
        let resp = self
            .client
            .get(&url)
            .header("Metadata-Flavor", "Google")
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            warn!("access token refresh failed: {status}");
            return Err(SyncError::Auth(format!("metadata server returned {status}")));
        }

        let body: MetadataTokenResponse = resp.json().await?;
        let fresh = AccessToken {
            token: body.access_token,
            expires_at: Utc::now() + chrono::Duration::seconds(body.expires_in),
        };
        debug!("refreshed access token, expires at {}", fresh.expires_at);

        let mut cached = self.token.write().await;
        *cached = Some(fresh.clone());
        Ok(fresh)
    }
}
