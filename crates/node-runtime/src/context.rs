//! # Node Context
//!
//! Every component of one node, opened in dependency order and shared
//! through `Arc`s. Nothing here is global: tests open as many isolated
//! contexts as they need, each under its own data directory.
//!
//! ```text
//!   ProofOfWorkGate      LedgerStore ◄──── LedgerAdapter ────┐
//!         │                   ▲                 │            │
//!         │                   │          LedgerView     ChainHeight
//!         ▼                   │                 ▼            ▼
//!   BlockDigester ────────────┴────────────► Mempool   PeerConsensus
//!         └──────────── digestion lock ─────────┘
//! ```

use std::sync::Arc;

use anyhow::{Context, Result};
use ln_01_proof_of_work::ProofOfWorkGate;
use ln_02_ledger_store::LedgerStore;
use ln_03_peer_consensus::{ChainHeight, PeerConnector, PeerConsensus, TcpPeerConnector};
use ln_04_mempool::{DigestionLock, Mempool};
use parking_lot::Mutex;
use shared_types::{BlockHeight, SystemTimeSource, TimeSource};
use tracing::info;

use crate::adapters::LedgerAdapter;
use crate::config::NodeConfig;
use crate::digester::BlockDigester;

/// Shared handles of one running node.
#[derive(Clone)]
pub struct NodeContext {
    pub config: Arc<NodeConfig>,
    pub clock: Arc<dyn TimeSource>,
    pub pow: Arc<ProofOfWorkGate>,
    pub ledger: Arc<LedgerStore>,
    pub mempool: Arc<Mempool>,
    pub peers: Arc<PeerConsensus>,
    /// Held while a block is digested or rolled back; mempool merges take it too.
    pub digestion: DigestionLock,
}

impl NodeContext {
    /// Open a node with the system clock, the on-disk PoW buffer and TCP peers.
    pub fn open(config: NodeConfig) -> Result<Self> {
        create_dirs(&config)?;
        let pow = ProofOfWorkGate::open(config.pow.clone()).with_context(|| {
            format!("Failed to load PoW buffer {}", config.pow.buffer_path.display())
        })?;
        let ledger = open_ledger(&config)?;
        let connector = TcpPeerConnector::new(
            &config.peers,
            config.wire.clone(),
            Arc::new(LedgerAdapter::new(Arc::clone(&ledger))),
        );
        Self::assemble(config, Arc::new(SystemTimeSource), pow, ledger, Arc::new(connector))
    }

    /// Open a node around an existing gate, clock and peer connector.
    pub fn with_parts(
        config: NodeConfig,
        clock: Arc<dyn TimeSource>,
        pow: ProofOfWorkGate,
        connector: Arc<dyn PeerConnector>,
    ) -> Result<Self> {
        create_dirs(&config)?;
        let ledger = open_ledger(&config)?;
        Self::assemble(config, clock, pow, ledger, connector)
    }

    fn assemble(
        config: NodeConfig,
        clock: Arc<dyn TimeSource>,
        pow: ProofOfWorkGate,
        ledger: Arc<LedgerStore>,
        connector: Arc<dyn PeerConnector>,
    ) -> Result<Self> {
        let digestion: DigestionLock = Arc::new(Mutex::new(()));
        let mempool = Mempool::open(
            config.mempool.clone(),
            Arc::new(LedgerAdapter::new(Arc::clone(&ledger))),
            Arc::clone(&clock),
            Arc::clone(&digestion),
        )
        .context("Failed to open mempool")?;
        let peers = PeerConsensus::new(config.peers.clone(), connector, Arc::clone(&clock));

        info!(
            "[runtime] Node context ready: ledger in {}, port {}",
            config.ledger.data_dir.display(),
            config.peers.port
        );
        Ok(Self {
            config: Arc::new(config),
            clock,
            pow: Arc::new(pow),
            ledger,
            mempool: Arc::new(mempool),
            peers: Arc::new(peers),
            digestion,
        })
    }

    pub fn digester(&self) -> BlockDigester {
        BlockDigester::new(self.clone())
    }

    /// Height we report to peers.
    pub fn local_height(&self) -> BlockHeight {
        LedgerAdapter::new(Arc::clone(&self.ledger)).last_block_height()
    }
}

fn open_ledger(config: &NodeConfig) -> Result<Arc<LedgerStore>> {
    let ledger = LedgerStore::open(config.ledger.clone()).with_context(|| {
        format!("Failed to open ledger in {}", config.ledger.data_dir.display())
    })?;
    Ok(Arc::new(ledger))
}

fn create_dirs(config: &NodeConfig) -> Result<()> {
    let mut dirs = vec![config.ledger.data_dir.clone(), config.peers.peers_dir.clone()];
    if let Some(parent) = config.pow.buffer_path.parent() {
        dirs.push(parent.to_path_buf());
    }
    if !config.mempool.ram {
        if let Some(parent) = config.mempool.path.parent() {
            dirs.push(parent.to_path_buf());
        }
    }
    for dir in dirs.into_iter().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create directory {}", dir.display()))?;
    }
    Ok(())
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use ln_01_proof_of_work::RandomBuffer;
    use shared_types::ManualTimeSource;
    use tempfile::TempDir;

    #[test]
    fn test_contexts_are_isolated() {
        let a = TempDir::new().unwrap();
        let b = TempDir::new().unwrap();
        let (first, _) = context(a.path());
        let (second, _) = context(b.path());

        assert_eq!(first.local_height(), 0);
        assert!(!Arc::ptr_eq(&first.mempool, &second.mempool));
        assert!(!Arc::ptr_eq(&first.digestion, &second.digestion));
    }

    #[test]
    fn test_same_data_dir_cannot_be_opened_twice() {
        let dir = TempDir::new().unwrap();
        let (_first, _) = context(dir.path());
        let buffer = RandomBuffer::generate(1024).unwrap();
        let config = NodeConfig::for_testing(dir.path());
        let pow = ProofOfWorkGate::new(Arc::new(buffer), config.pow.clone());
        let second = NodeContext::with_parts(
            config,
            Arc::new(ManualTimeSource::new(NOW)),
            pow,
            Arc::new(Offline),
        );
        assert!(second.is_err());
    }
}
