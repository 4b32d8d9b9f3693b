//! # Node Runtime
//!
//! Starts the long-running tasks of a node around one [`NodeContext`] and
//! stops them together.
//!
//! ## Startup Sequence
//!
//! 1. Open the context (PoW buffer, ledger, mempool, peers)
//! 2. Bind the inbound server when `runtime.listen` is set
//! 3. Spawn the maintenance loop
//!
//! ## Shutdown Sequence
//!
//! 1. Signal every task through the shutdown channel
//! 2. Wait for the tasks to return
//! 3. Flush the ledger one last time

use std::net::SocketAddr;

use anyhow::{Context, Result};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::config::NodeConfig;
use crate::context::NodeContext;
use crate::maintenance::Maintenance;
use crate::server::InboundServer;

pub struct NodeRuntime {
    ctx: NodeContext,
    listening_on: Option<SocketAddr>,
    shutdown_tx: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl NodeRuntime {
    /// Open the node described by `config` and start its tasks.
    pub async fn start(config: NodeConfig) -> Result<Self> {
        // The PoW buffer may have to be generated first.
        let ctx = tokio::task::spawn_blocking(move || NodeContext::open(config))
            .await
            .context("Node startup task failed")??;
        Self::start_with(ctx).await
    }

    /// Start the tasks of an already opened context.
    pub async fn start_with(ctx: NodeContext) -> Result<Self> {
        info!("===========================================");
        info!("  Ledger Node v{}", env!("CARGO_PKG_VERSION"));
        info!("  Protocol: {}", ctx.config.peers.version);
        info!("===========================================");

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut tasks = Vec::new();

        let mut listening_on = None;
        if ctx.config.runtime.listen {
            let server = InboundServer::bind(ctx.clone()).await?;
            listening_on = Some(server.local_addr()?);
            tasks.push(tokio::spawn(server.run(shutdown_rx.clone())));
        }
        tasks.push(tokio::spawn(Maintenance::new(ctx.clone()).run(shutdown_rx)));

        info!("[runtime] Chain height {}", ctx.local_height());
        Ok(Self {
            ctx,
            listening_on,
            shutdown_tx,
            tasks,
        })
    }

    pub fn context(&self) -> &NodeContext {
        &self.ctx
    }

    pub fn listening_on(&self) -> Option<SocketAddr> {
        self.listening_on
    }

    pub async fn shutdown(self) {
        info!("Initiating graceful shutdown...");
        if let Err(e) = self.shutdown_tx.send(true) {
            error!("Failed to send shutdown signal: {}", e);
        }
        for task in self.tasks {
            if let Err(e) = task.await {
                error!("[runtime] Task ended abnormally: {}", e);
            }
        }

        let ctx = self.ctx;
        let flushed = tokio::task::spawn_blocking(move || {
            let _digesting = ctx.digestion.lock();
            ctx.ledger.flush()
        })
        .await;
        match flushed {
            Ok(Ok(report)) => info!("[runtime] Final flush up to block {}", report.watermark),
            Ok(Err(e)) => error!("[runtime] Final flush failed: {}", e),
            Err(e) => error!("[runtime] Final flush task failed: {}", e),
        }
        info!("Shutdown complete");
    }
}
