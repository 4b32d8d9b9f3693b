//! # Ledger Node
//!
//! Entry point of a ledger node: loads the configuration, starts the
//! runtime and waits for Ctrl+C.
//!
//! ```text
//! LN_CONFIG=/etc/ledger-node.toml LN_LOG_LEVEL=debug ledger-node
//! ```

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::FmtSubscriber;

use node_runtime::{NodeConfig, NodeRuntime};

#[tokio::main]
async fn main() -> Result<()> {
    let config = NodeConfig::load().context("Failed to load configuration")?;

    let subscriber = FmtSubscriber::builder()
        .with_max_level(config.logging.max_level()?)
        .with_target(true)
        .with_thread_ids(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let runtime = NodeRuntime::start(config).await?;

    info!("Node is running. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c().await?;

    runtime.shutdown().await;

    Ok(())
}
