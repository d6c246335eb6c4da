//! kip agent
//!
//! Replaces the ephemeral external IP of cluster nodes with reserved static
//! addresses. Replacement requests arrive as JSON lines on stdin:
//!
//! ```text
//! {"project_id": "my-project", "zone": "us-central1-a", "instance_name": "gke-node-1"}
//! ```
//!
//! Each request is handled to completion before the next one is read.

use std::sync::Arc;

use anyhow::{Context, Result};
use kip_agent::intake::read_requests;
use kip_agent::{Config, IpReplacer, Worker};
use kip_compute::{GceClient, MetadataClient, MetadataTokenSource, StaticToken, TokenSource};
use tokio::io::BufReader;
use tokio::sync::{mpsc, watch};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    // Initialize tracing (prefer RUST_LOG, fallback to KIP_LOG_LEVEL)
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| config.log_level.clone().into()))
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("Starting kip agent");

    let metadata =
        MetadataClient::with_base_url(&config.metadata_url).context("Failed to build metadata client")?;

    let project_id = match config.project_id.clone() {
        Some(project_id) => project_id,
        None => metadata
            .project_id()
            .await
            .context("Failed to resolve project id from metadata server")?,
    };

    let tokens: Arc<dyn TokenSource> = match config.access_token.as_deref() {
        Some(token) => Arc::new(StaticToken::new(token)),
        None => Arc::new(MetadataTokenSource::new(metadata.clone())),
    };
    // No provider access means nothing can be done; fail startup.
    tokens
        .token()
        .await
        .context("Could not get authenticated client")?;

    let client = Arc::new(
        GceClient::with_endpoints(tokens, &config.compute_url, &config.container_url)
            .context("Could not initialize compute client")?,
    );

    info!(
        project_id = %project_id,
        filter = %config.filter(),
        poll_interval_ms = config.poll_interval.as_millis() as u64,
        operation_timeout_secs = config.operation_timeout.map(|d| d.as_secs()),
        "Configuration loaded"
    );

    let cluster_name = match config.cluster_name.clone() {
        Some(name) => Some(name),
        None => match metadata.cluster_name().await {
            Ok(name) => Some(name),
            Err(e) => {
                warn!(error = %e, "Could not resolve cluster name");
                None
            }
        },
    };
    if let Some(cluster_name) = cluster_name {
        match client.list_cluster_locations(&project_id, &cluster_name).await {
            Ok(zones) => info!(cluster = %cluster_name, zones = ?zones, "Serving cluster"),
            Err(e) => warn!(cluster = %cluster_name, error = %e, "Failed to list cluster zones"),
        }
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let (request_tx, request_rx) = mpsc::channel(config.queue_capacity);

    let intake_handle = tokio::spawn({
        let project_id = project_id.clone();
        async move {
            read_requests(BufReader::new(tokio::io::stdin()), &project_id, request_tx).await
        }
    });

    let replacer = IpReplacer::from_api(client, config.waiter_config(), shutdown_rx.clone());
    let worker = Worker::new(replacer, shutdown_rx);
    let filter = config.filter();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received shutdown signal");
            let _ = shutdown_tx.send(true);
        }
    });

    let stats = worker.run(request_rx, &filter).await;

    intake_handle.abort();
    if let Ok(Err(e)) = intake_handle.await {
        error!(error = %e, "Intake failed");
    }

    info!(
        processed = stats.processed,
        replaced = stats.replaced,
        failed = stats.failed,
        "kip agent shutdown complete"
    );

    Ok(())
}
