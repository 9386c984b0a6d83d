//! gss: pulls order sync requests from Pub/Sub and copies the order's
//! objects from the storage bucket to FTP.
//!
//! Environment:
//! - `GSS_CONFIG`: configuration file (default `config.json`)
//! - `GSS_CREDENTIALS`: credentials file (required)
//! - `RUST_LOG`: log filter (default `info`)

use anyhow::Context;
use gss_sync::credential_manager::{ServiceCredentials, TokenManager};
use gss_sync::ftp_destination::FtpDestination;
use gss_sync::orchestrator::create_sync_orchestrator;
use gss_sync::pubsub_client::PubSubClient;
use gss_sync::s3_source::S3ObjectSource;
use gss_sync::SyncConfig;
use std::sync::Arc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = SyncConfig::load().context("loading configuration")?;
    let credentials = ServiceCredentials::load().context("loading credentials")?;

    let tokens = Arc::new(
        TokenManager::new(&config, credentials.access_token.clone())
            .context("building token manager")?,
    );
    let queue = Arc::new(PubSubClient::new(&config, tokens).context("building Pub/Sub client")?);
    let source = Arc::new(S3ObjectSource::new(&config, &credentials));
    let destination = Arc::new(FtpDestination::new(&config));
    destination
        .check_connection()
        .await
        .with_context(|| format!("connecting to FTP endpoint {}", config.ftp_addr))?;

    info!(
        "gss initialized: bucket {}, subscription {}, {} allowed stores",
        config.gs_bucket,
        config.subscription_path(),
        config.allow_stores.len()
    );

    let (handle, mut orchestrator) = create_sync_orchestrator(queue, source, destination, &config);

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("received Ctrl-C, stopping after the current job");
            if let Err(e) = handle.stop().await {
                warn!("failed to stop orchestrator: {e}");
            }
        }
    });

    orchestrator.run().await;
    Ok(())
}
