//! FlightSurety oracle server
//!
//! Registers the oracle pool against the configured network, then answers
//! flight status requests until Ctrl-C.

use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use flightsurety_oracles::config::ServerConfig;
use flightsurety_oracles::gateway::{JsonRpcGateway, SharedGateway};
use flightsurety_oracles::oracle_server::OracleServer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = ServerConfig::from_env().context("invalid oracle server configuration")?;
    let network = config
        .network_config()
        .with_context(|| format!("failed to load network `{}`", config.network))?;

    info!(
        network = %config.network,
        rpc_url = %network.url,
        app = %network.app_address,
        oracles = config.oracle_count,
        "starting FlightSurety oracle server"
    );

    let gateway: SharedGateway = Arc::new(
        JsonRpcGateway::new(&network.url, network.app_address)
            .context("failed to set up the JSON-RPC provider")?
            .with_poll_interval(config.poll_interval)
            .with_receipt_timeout(config.receipt_timeout),
    );

    let shutdown = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "failed to listen for Ctrl-C; running until the stream ends");
            std::future::pending::<()>().await;
        }
    };

    OracleServer::new(gateway, config.oracle_settings())
        .run(shutdown)
        .await
        .context("oracle server stopped")?;

    Ok(())
}
