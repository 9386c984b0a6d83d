//! Object listing and reads over the S3-compatible storage API.
//!
//! The client is built once from the service's HMAC keys and reused for the
//! orchestrator's lifetime.

use crate::config::SyncConfig;
use crate::credential_manager::ServiceCredentials;
use crate::error::{SyncError, SyncResult};
use crate::transport::{ObjectReader, ObjectSource};
use async_trait::async_trait;
use aws_sdk_s3::Client as S3Client;
use tracing::debug;

/// Read-only access to one bucket.
pub struct S3ObjectSource {
    client: S3Client,
    bucket: String,
}

impl S3ObjectSource {
    pub fn new(config: &SyncConfig, creds: &ServiceCredentials) -> Self {
        let credentials = aws_credential_types::Credentials::new(
            &creds.access_key_id,
            &creds.secret_access_key,
            None,
            None,
            "gss-hmac",
        );

        let s3_config = aws_sdk_s3::Config::builder()
            .region(aws_types::region::Region::new(config.storage_region.clone()))
            .credentials_provider(credentials)
            .endpoint_url(&config.storage_endpoint)
            .force_path_style(true)
            .behavior_version_latest()
            .build();

        Self {
            client: S3Client::from_conf(s3_config),
            bucket: config.gs_bucket.clone(),
        }
    }
}

#[async_trait]
impl ObjectSource for S3ObjectSource {
    /// Lists every key under `prefix`, following continuation tokens.
    async fn list(&self, prefix: &str) -> SyncResult<Vec<String>> {
        let mut keys = Vec::new();
        let mut continuation: Option<String> = None;

        loop {
            let resp = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(prefix)
                .set_continuation_token(continuation.take())
                .send()
                .await
                .map_err(|e| SyncError::Enumeration(format!("list failed for prefix {prefix}: {e}")))?;

            keys.extend(
                resp.contents()
                    .iter()
                    .filter_map(|obj| obj.key().map(|k| k.to_string())),
            );

            match resp.next_continuation_token() {
                Some(token) if resp.is_truncated().unwrap_or(false) => {
                    continuation = Some(token.to_string());
                }
                _ => break,
            }
        }

        debug!("listed {} keys under s3://{}/{prefix}", keys.len(), self.bucket);
        Ok(keys)
    }

    async fn open_read(&self, key: &str) -> SyncResult<ObjectReader> {
        let resp = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| SyncError::SourceRead {
                key: key.to_string(),
                reason: e.to_string(),
            })?;

        Ok(Box::pin(resp.body.into_async_read()))
    }
}
