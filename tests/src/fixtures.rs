//! Nodes, keys and blocks shared by the scenarios and benchmarks.

use std::sync::Arc;

use async_trait::async_trait;
use ln_01_proof_of_work::{ProofOfWorkGate, RandomBuffer, INITIAL_DIFFICULTY};
use ln_03_peer_consensus::domain::Result as PeerResult;
use ln_03_peer_consensus::{PeerConnector, PeerConsensus, PeerError};
use ln_04_mempool::SUCCESS;
use node_runtime::{Block, NodeConfig, NodeContext};
use shared_crypto::Ed25519KeyPair;
use shared_types::{Amount, ManualTimeSource, Timestamp, Transaction};
use tempfile::TempDir;

pub const NOW: Timestamp = 1_700_000_000.0;

/// Small enough to generate per test.
pub const TEST_BUFFER_SIZE: usize = 64 * 1024;

/// Connector that never reaches anyone.
pub struct Offline;

#[async_trait]
impl PeerConnector for Offline {
    async fn probe(&self, host: &str, _port: u16, _strict: bool) -> PeerResult<()> {
        Err(PeerError::Timeout(host.to_string()))
    }

    async fn run_session(&self, host: &str, _port: u16, _peers: Arc<PeerConsensus>) -> PeerResult<()> {
        Err(PeerError::Timeout(host.to_string()))
    }
}

/// One isolated node under a temporary directory.
pub struct TestNode {
    pub ctx: NodeContext,
    pub clock: Arc<ManualTimeSource>,
    _dir: TempDir,
}

impl TestNode {
    pub fn open() -> Self {
        Self::open_with(|_| {})
    }

    /// Open with `adjust` applied to the test configuration.
    pub fn open_with(adjust: impl FnOnce(&mut NodeConfig)) -> Self {
        let dir = TempDir::new().unwrap();
        let mut config = NodeConfig::for_testing(dir.path());
        config.peers.port = 0;
        adjust(&mut config);
        let clock = Arc::new(ManualTimeSource::new(NOW));
        let buffer = RandomBuffer::generate(TEST_BUFFER_SIZE).unwrap();
        let pow = ProofOfWorkGate::new(Arc::new(buffer), config.pow.clone());
        let ctx = NodeContext::with_parts(config, clock.clone(), pow, Arc::new(Offline)).unwrap();
        Self {
            ctx,
            clock,
            _dir: dir,
        }
    }

    /// Close every component and open the same data directory again.
    pub fn reopen(self) -> Self {
        let Self { ctx, clock, _dir } = self;
        let config = (*ctx.config).clone();
        drop(ctx);
        let buffer = RandomBuffer::generate(TEST_BUFFER_SIZE).unwrap();
        let pow = ProofOfWorkGate::new(Arc::new(buffer), config.pow.clone());
        let ctx = NodeContext::with_parts(config, clock.clone(), pow, Arc::new(Offline)).unwrap();
        Self { ctx, clock, _dir }
    }

    /// Mine and digest a block of `txs` at `timestamp`.
    pub fn mine(&self, miner: &Ed25519KeyPair, txs: Vec<Transaction>, timestamp: Timestamp) -> Block {
        let block = mine_block(&self.ctx, miner, txs, timestamp);
        self.ctx.digester().digest(&block).unwrap();
        block
    }

    pub fn balance(&self, address: &str) -> String {
        self.ctx.ledger.balance(address).unwrap().to_string()
    }
}

pub fn keypair(seed: u8) -> Ed25519KeyPair {
    Ed25519KeyPair::from_seed([seed; 32])
}

pub fn signed(
    keypair: &Ed25519KeyPair,
    timestamp: Timestamp,
    recipient: &str,
    amount: Amount,
    openfield: &str,
) -> Transaction {
    let tx = Transaction {
        timestamp,
        address: keypair.address(),
        recipient: recipient.to_string(),
        amount,
        signature: String::new(),
        public_key: keypair.public_key().to_base64(),
        operation: "0".into(),
        openfield: openfield.to_string(),
    };
    let signature = keypair.sign(tx.signing_payload().as_bytes()).to_base64();
    Transaction { signature, ..tx }
}

/// `txs` closed by a coinbase from `miner` meeting the chain's current difficulty.
pub fn mine_block(
    ctx: &NodeContext,
    miner: &Ed25519KeyPair,
    mut txs: Vec<Transaction>,
    timestamp: Timestamp,
) -> Block {
    let prev_hash = ctx
        .ledger
        .last_block()
        .unwrap()
        .map_or_else(|| ctx.config.chain.genesis_hash.clone(), |last| last.hash);
    let required = ctx
        .ledger
        .last_difficulty()
        .unwrap()
        .map_or(INITIAL_DIFFICULTY, |d| d.difficulty);
    let nonce = ctx
        .pow
        .mine(&miner.address(), &prev_hash, required as u32, 1_000_000)
        .unwrap();
    txs.push(signed(miner, timestamp, &miner.address(), Amount::ZERO, &nonce));
    Block::new(txs)
}

pub fn succeeded(outcomes: &[String]) -> bool {
    outcomes.last().map(String::as_str) == Some(SUCCESS)
}

pub fn address(fill: char) -> String {
    fill.to_string().repeat(56)
}
