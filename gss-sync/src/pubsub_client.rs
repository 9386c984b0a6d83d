//! Pub/Sub REST client for sync request messages.
//!
//! Pulls one message at a time from the configured subscription and
//! acknowledges by ack ID. A 401 triggers one token refresh and one retry.

use crate::config::SyncConfig;
use crate::credential_manager::TokenManager;
use crate::error::{SyncError, SyncResult};
use crate::transport::MessageSource;
use crate::types::{ReceivedMessage, SyncRequest};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Message attribute carrying the store ID.
pub const STORE_ID_ATTRIBUTE: &str = "storeID";
/// Message attribute carrying the order ID.
pub const ORDER_ID_ATTRIBUTE: &str = "orderID";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PullRequest {
    max_messages: u32,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AcknowledgeRequest<'a> {
    ack_ids: Vec<&'a str>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PullResponse {
    #[serde(default)]
    received_messages: Vec<WireReceivedMessage>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireReceivedMessage {
    ack_id: String,
    message: WireMessage,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireMessage {
    #[serde(default)]
    attributes: HashMap<String, String>,
    #[serde(default)]
    message_id: String,
}

impl From<WireReceivedMessage> for ReceivedMessage {
    fn from(wire: WireReceivedMessage) -> Self {
        let mut attributes = wire.message.attributes;
        Self {
            ack_id: wire.ack_id,
            message_id: wire.message.message_id,
            request: SyncRequest {
                store_id: attributes.remove(STORE_ID_ATTRIBUTE).unwrap_or_default(),
                order_id: attributes.remove(ORDER_ID_ATTRIBUTE).unwrap_or_default(),
            },
        }
    }
}

/// Pull/acknowledge client bound to one subscription.
pub struct PubSubClient {
    client: Client,
    base_url: String,
    subscription: String,
    tokens: Arc<TokenManager>,
}

impl PubSubClient {
    pub fn new(config: &SyncConfig, tokens: Arc<TokenManager>) -> SyncResult<Self> {
        let client = Client::builder().timeout(Duration::from_secs(90)).build()?;
        Ok(Self {
            client,
            base_url: config.pubsub_base_url.trim_end_matches('/').to_string(),
            subscription: config.subscription_path(),
            tokens,
        })
    }

    /// Makes an authenticated POST to `{subscription}:{action}`, retrying once on 401.
    async fn post_action(
        &self,
        action: &str,
        body: &impl Serialize,
    ) -> SyncResult<reqwest::Response> {
        let url = format!("{}/v1/{}:{action}", self.base_url, self.subscription);
        let token = self.tokens.get_token().await?;

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&token)
            .json(body)
            .send()
            .await?;

        let resp = if resp.status() == reqwest::StatusCode::UNAUTHORIZED {
            debug!("401 on {action}, refreshing access token");
            let fresh = self.tokens.refresh().await?;
            self.client
                .post(&url)
                .bearer_auth(&fresh.token)
                .json(body)
                .send()
                .await?
        } else {
            resp
        };

        if resp.status() == reqwest::StatusCode::UNAUTHORIZED {
            return Err(SyncError::CredentialExpired);
        }
        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(SyncError::Queue(format!("{action} returned {status}: {text}")));
        }
        Ok(resp)
    }
}

#[async_trait]
impl MessageSource for PubSubClient {
    async fn pull(&self) -> SyncResult<Option<ReceivedMessage>> {
        let resp: PullResponse = self
            .post_action("pull", &PullRequest { max_messages: 1 })
            .await?
            .json()
            .await?;

        let message = resp.received_messages.into_iter().next().map(ReceivedMessage::from);
        if let Some(ref m) = message {
            debug!(
                "pulled message {} (store {}, order {})",
                m.message_id, m.request.store_id, m.request.order_id
            );
        }
        Ok(message)
    }

    async fn acknowledge(&self, ack_id: &str) -> SyncResult<()> {
        self.post_action(
            "acknowledge",
            &AcknowledgeRequest {
                ack_ids: vec![ack_id],
            },
        )
        .await?;
        Ok(())
    }
}
