pub mod config;
pub mod logging;
pub mod server;

use anyhow::{Context, Result};
use billing_core::{CostExplorerClient, CredentialChain, CredentialProvider};
use billing_metrics::{BillingCollector, MetricSource};
use std::sync::Arc;
use tracing::{info, warn};

pub use config::{Cli, Config, LogFormat};
pub use server::{router, static_registry, AppState};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Wires the collector to Cost Explorer and serves until Ctrl-C.
pub async fn run(config: Config) -> Result<()> {
    info!("Starting aws_billing_exporter {}", VERSION);

    let credentials =
        CredentialChain::from_env().context("failed to build AWS credential chain")?;
    match credentials.credentials().await {
        Ok(resolved) => info!("Using AWS access key {}", resolved.access_key_id),
        Err(e) => warn!(error = %e, "AWS credentials not available yet, scrapes will report down"),
    }
    let client = CostExplorerClient::new(config.cost_explorer.clone(), credentials)
        .context("failed to build Cost Explorer client")?;
    info!(
        "Using Cost Explorer endpoint {} (region {})",
        client.endpoint(),
        client.region()
    );

    let collector = BillingCollector::new(config.selection.clone(), Arc::new(client))
        .context("failed to build billing collector")?;
    info!(
        "Enabled billing metrics: {} ({} descriptors)",
        collector.selection(),
        collector.describe().len()
    );

    let registry = static_registry(VERSION).context("failed to build static registry")?;
    let state = AppState::new(Arc::new(collector), registry, &config.telemetry_path)?;
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(config.listen_address)
        .await
        .with_context(|| format!("failed to listen on {}", config.listen_address))?;
    info!("Listening on {}", config.listen_address);
    info!("Endpoints:");
    info!("  GET  /                - Landing page");
    info!("  GET  {:<16} - Billing metrics", config.telemetry_path);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
