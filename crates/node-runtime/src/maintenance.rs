//! # Maintenance Loop
//!
//! Every `runtime.maintenance_interval_secs` the node:
//!
//! 1. runs the peer maintenance tick (sessions, peer files, ban resets)
//! 2. purges expired mempool transactions
//! 3. flushes the ledger's hyper and RAM tiers into the durable store
//! 4. compresses hyper-tier blocks that fell out of the recent window

use ln_02_ledger_store::FlushReport;
use shared_types::BlockHeight;
use ln_03_peer_consensus::TickReport;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::context::NodeContext;

/// What one pass did; `None` where a step failed and was logged.
#[derive(Debug, Clone, Default)]
pub struct MaintenanceReport {
    pub peers: TickReport,
    pub purged: Option<usize>,
    pub flush: Option<FlushReport>,
    /// New compressed height of the hyper tier, when it moved.
    pub compressed: Option<BlockHeight>,
}

pub struct Maintenance {
    ctx: NodeContext,
}

impl Maintenance {
    pub fn new(ctx: NodeContext) -> Self {
        Self { ctx }
    }

    pub async fn tick(&self) -> MaintenanceReport {
        let peers = self.ctx.peers.maintenance_tick().await;

        let purged = match self.ctx.mempool.purge_expired() {
            Ok(purged) => Some(purged),
            Err(e) => {
                warn!("[runtime] Mempool purge failed: {}", e);
                None
            }
        };

        let ctx = self.ctx.clone();
        let stored = tokio::task::spawn_blocking(move || {
            let _digesting = ctx.digestion.lock();
            let flush = ctx.ledger.flush()?;
            let compressed = match ctx.ledger.compress_hyper() {
                Ok(compressed) => compressed,
                Err(e) => {
                    warn!("[runtime] Hyper compression failed: {}", e);
                    None
                }
            };
            Ok::<_, ln_02_ledger_store::StorageError>((flush, compressed))
        })
        .await;
        let (flush, compressed) = match stored {
            Ok(Ok((report, compressed))) => (Some(report), compressed),
            Ok(Err(e)) => {
                error!("[runtime] Ledger flush failed: {}", e);
                (None, None)
            }
            Err(e) => {
                error!("[runtime] Ledger flush task failed: {}", e);
                (None, None)
            }
        };

        debug!(
            "[runtime] Maintenance: {} session(s) started, {} known peer(s), {:?} expired",
            peers.dispatched, peers.known, purged
        );
        MaintenanceReport {
            peers,
            purged,
            flush,
            compressed,
        }
    }

    /// Tick until `shutdown` flips. The first tick runs immediately.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(self.ctx.config.runtime.maintenance_interval());
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.tick().await;
                }
                _ = shutdown.changed() => {
                    info!("[runtime] Maintenance stopping");
                    break;
                }
            }
        }
    }
}
