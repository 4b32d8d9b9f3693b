//! # Mempool Service
//!
//! Admission runs in this order for every candidate of a batch, the first
//! failure moving on to the next candidate:
//!
//! ```text
//! triage ──→ stateless checks ──→ pool / ledger lookups ──→ balance ──→ insert
//! ```
//!
//! A batch is merged while holding the digestion lock, so no block can be
//! digested halfway through it. Relayed batches are dropped when a
//! digestion is running; local submissions wait for it.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, MutexGuard};
use serde_json::{json, Value};
use shared_types::{wire_fields, Amount, FeeSchedule, TimeSource, Timestamp, Transaction};
use tracing::{debug, info, warn};

use crate::adapters::PendingStore;
use crate::config::MempoolConfig;
use crate::domain::{
    check_candidate, AdmitOptions, CheckContext, MempoolStatus, Rejection, Result, SyncBook, Triage,
};
use crate::ports::LedgerView;

/// Appended once to the outcomes of a batch that admitted anything.
/// Peers match on it literally.
pub const SUCCESS: &str = "Success";

const BYTES_PER_MB: f64 = 1_000_000.0;

type Verdict = std::result::Result<Transaction, Rejection>;

/// Coarse lock shared with block digestion.
pub type DigestionLock = Arc<Mutex<()>>;

/// The pending transaction pool.
pub struct Mempool {
    config: MempoolConfig,
    triage: Triage,
    fees: FeeSchedule,
    store: PendingStore,
    ledger: Arc<dyn LedgerView>,
    clock: Arc<dyn TimeSource>,
    digestion: DigestionLock,
    merge_lock: Mutex<()>,
    peers: Mutex<SyncBook>,
}

impl Mempool {
    pub fn open(
        config: MempoolConfig,
        ledger: Arc<dyn LedgerView>,
        clock: Arc<dyn TimeSource>,
        digestion: DigestionLock,
    ) -> Result<Self> {
        let store = PendingStore::open(&config)?;
        if config.ram {
            info!("[ln-04] Mempool kept in memory");
        } else {
            info!("[ln-04] Mempool stored in {}", config.path.display());
        }
        Ok(Self {
            triage: Triage::from_config(&config),
            fees: FeeSchedule::default(),
            store,
            ledger,
            clock,
            digestion,
            merge_lock: Mutex::new(()),
            peers: Mutex::new(SyncBook::new()),
            config,
        })
    }

    pub fn config(&self) -> &MempoolConfig {
        &self.config
    }

    fn max_age(&self) -> f64 {
        self.config.max_age_secs as f64
    }

    fn is_local(&self, peer: &str) -> bool {
        peer == self.config.local_peer
    }

    // =========================================================================
    // ADMISSION
    // =========================================================================

    /// Merge a batch received from `peer` and report one outcome per step.
    ///
    /// `candidates` is either one wire transaction or an array of them.
    /// Nothing a peer sends makes this fail: storage trouble is logged and
    /// reported in the outcomes, and whatever was admitted before it stays.
    pub fn admit(&self, peer: &str, candidates: &Value, options: AdmitOptions) -> Vec<String> {
        let now = self.clock.now();
        if is_empty(candidates) {
            return vec![format!("Mempool from {} was empty", peer)];
        }
        if !self.is_local(peer) && self.peers.lock().is_frozen(peer, now) {
            warn!("[ln-04] Mempool ignoring merge from frozen {}", peer);
            return vec![format!("Mempool ignoring merge from frozen {}", peer)];
        }
        let Some(batch) = batch_of(candidates) else {
            if !self.is_local(peer) {
                warn!("[ln-04] Freezing mempool from {} - Bad TX format", peer);
                self.freeze_until(peer, now + self.config.bad_format_freeze_secs as f64);
            }
            return vec!["Bad TX Format".to_string()];
        };

        let _digestion = match self.acquire_digestion(options.wait_for_lock) {
            Some(guard) => guard,
            None => return vec!["Locked ledger, dropping txs".to_string()],
        };
        self.merge(peer, &batch, options.size_bypass, now)
    }

    /// Put back transactions undone by a rollback.
    ///
    /// Called by the digester while it holds the digestion lock, so the
    /// lock is not taken again; triage is skipped.
    pub fn readmit(&self, txs: &[Transaction]) -> Vec<String> {
        if txs.is_empty() {
            return Vec::new();
        }
        let wire: Vec<Value> = txs.iter().map(Transaction::to_wire).collect();
        let batch: Vec<&[Value]> = wire.iter().filter_map(|tx| wire_fields(tx).ok()).collect();
        let local = self.config.local_peer.clone();
        self.merge(&local, &batch, true, self.clock.now())
    }

    fn acquire_digestion(&self, wait: bool) -> Option<MutexGuard<'_, ()>> {
        if let Some(guard) = self.digestion.try_lock() {
            return Some(guard);
        }
        if !wait {
            return None;
        }
        warn!("[ln-04] Waiting for block digestion to finish before merging mempool");
        Some(self.digestion.lock())
    }

    fn merge(&self, peer: &str, batch: &[&[Value]], size_bypass: bool, now: Timestamp) -> Vec<String> {
        let _merge = self.merge_lock.lock();
        let mut outcomes = vec![format!("Mempool merging started from {}", peer)];
        let mut admitted = 0usize;

        if let Err(e) = self.merge_locked(peer, batch, size_bypass, now, &mut outcomes, &mut admitted) {
            warn!("[ln-04] Mempool: Error processing batch from {}: {}", peer, e);
            outcomes.push(format!("Mempool: Error processing: {}", e));
        }
        if admitted > 0 {
            debug!("[ln-04] Merged {} transaction(s) from {}", admitted, peer);
            outcomes.push(SUCCESS.to_string());
        }
        outcomes
    }

    fn merge_locked(
        &self,
        peer: &str,
        batch: &[&[Value]],
        size_bypass: bool,
        now: Timestamp,
        outcomes: &mut Vec<String>,
        admitted: &mut usize,
    ) -> Result<()> {
        let mut size = self.size_mb_at(now)?;
        let ctx = CheckContext {
            now,
            max_age: self.max_age(),
            mandatory_message: &self.config.mandatory_message,
        };
        let mut balances: HashMap<String, Amount> = HashMap::new();

        for fields in batch {
            if !size_bypass && !self.triage.admits(size, fields) {
                outcomes.push(Rejection::NoSpaceLeft.to_string());
                continue;
            }
            match self.merge_one(peer, fields, &ctx, &mut balances, outcomes)? {
                Ok(tx) => {
                    *admitted += 1;
                    size += tx.estimated_size() as f64 / BYTES_PER_MB;
                }
                Err(rejection) => outcomes.push(rejection.to_string()),
            }
        }
        Ok(())
    }

    fn merge_one(
        &self,
        peer: &str,
        fields: &[Value],
        ctx: &CheckContext<'_>,
        balances: &mut HashMap<String, Amount>,
        outcomes: &mut Vec<String>,
    ) -> Result<Verdict> {
        let tx = match check_candidate(fields, ctx) {
            Ok(tx) => tx,
            Err(rejection) => return Ok(Err(rejection)),
        };

        let in_mempool = self.store.contains(&tx.signature)?;
        if let Some(mined_at) = self.ledger.ledgered_at(&tx.signature)? {
            if in_mempool {
                self.store.delete(&tx.signature)?;
                return Ok(Err(Rejection::DeletedFromMempool));
            }
            // a peer one block behind may still relay it
            if !self.is_local(peer) && mined_at < ctx.now - self.config.ledger_grace_secs as f64 {
                warn!(
                    "[ln-04] Freezing mempool from {} for {} min.",
                    peer,
                    self.config.freeze_secs / 60
                );
                self.freeze_until(peer, ctx.now + self.config.freeze_secs as f64);
            }
            return Ok(Err(Rejection::AlreadyInLedger));
        }
        if in_mempool {
            return Ok(Err(Rejection::AlreadyInMempool));
        }

        outcomes.push(format!("Mempool: Received address: {}", tx.address));
        let balance = match balances.get(&tx.address) {
            Some(balance) => *balance,
            None => {
                let balance = self.ledger.balance(&tx.address)?;
                balances.insert(tx.address.clone(), balance);
                balance
            }
        };
        let pending = self
            .store
            .pending_debits(&tx.address, ctx.now - ctx.max_age, &self.fees)?;
        let spendable = balance - pending;
        let fee = self.fees.fee(&tx.openfield, &tx.operation);

        if tx.amount > spendable {
            return Ok(Err(Rejection::SendingMoreThanOwned));
        }
        if (spendable - tx.amount - fee).is_negative() {
            return Ok(Err(Rejection::CannotAffordFees));
        }

        self.store.insert(&tx, ctx.now)?;
        outcomes.push(format!("Mempool updated with a received transaction from {}", peer));
        Ok(Ok(tx))
    }

    // =========================================================================
    // RELAY
    // =========================================================================

    /// Transactions to offer `peer`.
    ///
    /// Everything for a peer never served; otherwise what was merged since
    /// its last send (less a small margin). Signatures the peer already
    /// holds are left out.
    pub fn tx_to_send(&self, peer: &str, peer_signatures: &[String]) -> Result<Vec<Transaction>> {
        let mark = self.peers.lock().mark(peer);
        let raw = self
            .store
            .select_for_relay(mark.map(|m| m - self.config.send_margin_secs as f64))?;
        if peer_signatures.is_empty() {
            return Ok(raw);
        }
        let known: HashSet<&str> = peer_signatures.iter().map(String::as_str).collect();
        Ok(raw
            .into_iter()
            .filter(|tx| !known.contains(tx.signature.as_str()))
            .collect())
    }

    /// True if `peer` was never served or was served more than the send interval ago.
    pub fn sendable(&self, peer: &str) -> bool {
        self.peers.lock().sendable(
            peer,
            self.clock.now(),
            self.config.send_interval_secs as f64,
        )
    }

    /// Record a send to `peer`.
    pub fn sent(&self, peer: &str) {
        self.peers.lock().sent(peer, self.clock.now());
    }

    /// Refuse `peer`'s mempool (and stop sending to it) for `duration`.
    pub fn freeze(&self, peer: &str, duration: Duration) {
        warn!("[ln-04] Freezing mempool from {} for {:?}", peer, duration);
        self.freeze_until(peer, self.clock.now() + duration.as_secs_f64());
    }

    pub fn is_frozen(&self, peer: &str) -> bool {
        self.peers.lock().is_frozen(peer, self.clock.now())
    }

    fn freeze_until(&self, peer: &str, until: Timestamp) {
        self.peers.lock().freeze(peer, until);
    }

    // =========================================================================
    // MAINTENANCE
    // =========================================================================

    /// Drop transactions older than the acceptance window.
    pub fn purge_expired(&self) -> Result<usize> {
        let _merge = self.merge_lock.lock();
        let removed = self.store.purge(self.clock.now() - self.max_age())?;
        if removed > 0 {
            info!("[ln-04] Purged {} expired transaction(s)", removed);
        }
        Ok(removed)
    }

    /// Remove transactions that were just mined.
    pub fn delete_transactions(&self, signatures: &[String]) -> Result<usize> {
        let _merge = self.merge_lock.lock();
        let mut removed = 0;
        for signature in signatures {
            removed += self.store.delete(signature)?;
        }
        if removed > 0 {
            debug!("[ln-04] Removed {} mined transaction(s)", removed);
        }
        Ok(removed)
    }

    pub fn clear(&self) -> Result<usize> {
        let _merge = self.merge_lock.lock();
        let removed = self.store.clear()?;
        info!("[ln-04] Mempool cleared ({} transactions)", removed);
        Ok(removed)
    }

    // =========================================================================
    // QUERIES
    // =========================================================================

    pub fn transaction_count(&self) -> Result<usize> {
        self.store.count()
    }

    /// Every pending transaction, largest amount first.
    pub fn fetch_all(&self) -> Result<Vec<Transaction>> {
        self.store.select_for_relay(None)
    }

    /// Estimated size of the still-valid pending transactions, in MB.
    pub fn size_mb(&self) -> Result<f64> {
        self.size_mb_at(self.clock.now())
    }

    fn size_mb_at(&self, now: Timestamp) -> Result<f64> {
        let bytes: usize = self
            .store
            .younger_than(now - self.max_age())?
            .iter()
            .map(Transaction::estimated_size)
            .sum();
        Ok(bytes as f64 / BYTES_PER_MB)
    }

    /// Counters, size and frozen peers. Forgets peers not served for a while.
    pub fn status(&self) -> Result<MempoolStatus> {
        let now = self.clock.now();
        let frozen_peers = {
            let mut peers = self.peers.lock();
            let frozen = peers.frozen(now);
            peers.forget_before(now - self.config.peer_forget_secs as f64);
            frozen
        };
        let stats = self.store.stats()?;
        let status = MempoolStatus {
            transactions: stats.transactions,
            openfield_bytes: stats.openfield_bytes,
            senders: stats.senders,
            recipients: stats.recipients,
            size_mb: self.size_mb_at(now)?,
            frozen_peers,
        };
        debug!(
            "[ln-04] Status: MEMPOOL {} Txs from {} senders to {} distinct recipients. Openfield len {}",
            status.transactions, status.senders, status.recipients, status.openfield_bytes
        );
        Ok(status)
    }
}

/// Wire array of transactions, as sent to a peer.
pub fn wire_batch(txs: &[Transaction]) -> Value {
    json!(txs.iter().map(Transaction::to_wire).collect::<Vec<_>>())
}

fn is_empty(candidates: &Value) -> bool {
    match candidates {
        Value::Null => true,
        Value::Array(items) => items.is_empty(),
        Value::String(s) => s.is_empty(),
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

/// Split a payload into candidates of eight fields each, or `None` if any
/// part of it is not shaped like a transaction.
fn batch_of(candidates: &Value) -> Option<Vec<&[Value]>> {
    let items = candidates.as_array()?;
    if !items.first()?.is_array() {
        return wire_fields(candidates).ok().map(|fields| vec![fields]);
    }
    items.iter().map(|item| wire_fields(item).ok()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::MockLedger;
    use shared_crypto::Ed25519KeyPair;
    use shared_types::ManualTimeSource;

    const NOW: Timestamp = 1_700_000_000.0;
    const PEER: &str = "10.0.0.7";

    struct Fixture {
        mempool: Mempool,
        ledger: Arc<MockLedger>,
        clock: Arc<ManualTimeSource>,
        digestion: DigestionLock,
        alice: Ed25519KeyPair,
    }

    fn fixture() -> Fixture {
        fixture_with(MempoolConfig::for_testing())
    }

    fn fixture_with(config: MempoolConfig) -> Fixture {
        let alice = Ed25519KeyPair::from_seed([1u8; 32]);
        let ledger = Arc::new(MockLedger::new().with_balance(&alice.address(), Amount::from_coins(100)));
        let clock = Arc::new(ManualTimeSource::new(NOW));
        let digestion: DigestionLock = Arc::new(Mutex::new(()));
        let mempool = Mempool::open(config, ledger.clone(), clock.clone(), digestion.clone()).unwrap();
        Fixture {
            mempool,
            ledger,
            clock,
            digestion,
            alice,
        }
    }

    fn recipient() -> String {
        "b".repeat(56)
    }

    fn signed(keypair: &Ed25519KeyPair, timestamp: Timestamp, amount: &str, openfield: &str) -> Value {
        let amount: Amount = amount.parse().unwrap();
        let tx = Transaction {
            timestamp,
            address: keypair.address(),
            recipient: recipient(),
            amount,
            signature: String::new(),
            public_key: keypair.public_key().to_base64(),
            operation: "0".into(),
            openfield: openfield.into(),
        };
        let signature = keypair.sign(tx.signing_payload().as_bytes()).to_base64();
        Transaction { signature, ..tx }.to_wire()
    }

    fn signature_of(wire: &Value) -> String {
        wire[4].as_str().unwrap().to_string()
    }

    fn succeeded(outcomes: &[String]) -> bool {
        outcomes.last().map(String::as_str) == Some(SUCCESS)
    }

    // =========================================================================
    // ADMISSION
    // =========================================================================

    #[test]
    fn test_valid_transaction_is_admitted_and_relayed() {
        let f = fixture();
        let wire = signed(&f.alice, NOW - 5.0, "10", "");

        let outcomes = f.mempool.admit(PEER, &wire, AdmitOptions::RELAY);
        assert!(succeeded(&outcomes), "{:?}", outcomes);
        assert_eq!(outcomes[0], format!("Mempool merging started from {}", PEER));
        assert!(outcomes.contains(&format!("Mempool: Received address: {}", f.alice.address())));

        let relay = f.mempool.tx_to_send("10.0.0.8", &[]).unwrap();
        assert_eq!(relay.len(), 1);
        assert_eq!(relay[0].signature, signature_of(&wire));
    }

    #[test]
    fn test_success_is_reported_once_per_batch() {
        let f = fixture();
        let batch = json!([
            signed(&f.alice, NOW - 5.0, "1", ""),
            signed(&f.alice, NOW - 4.0, "2", ""),
        ]);
        let outcomes = f.mempool.admit(PEER, &batch, AdmitOptions::RELAY);
        assert_eq!(outcomes.iter().filter(|o| *o == SUCCESS).count(), 1);
        assert_eq!(f.mempool.transaction_count().unwrap(), 2);
    }

    #[test]
    fn test_duplicate_is_reported_and_not_stored_twice() {
        let f = fixture();
        let wire = signed(&f.alice, NOW - 5.0, "1", "");
        f.mempool.admit(PEER, &wire, AdmitOptions::RELAY);

        let outcomes = f.mempool.admit(PEER, &wire, AdmitOptions::RELAY);
        assert!(outcomes.contains(&"That transaction is already in our mempool".to_string()));
        assert!(!succeeded(&outcomes));
        assert_eq!(f.mempool.transaction_count().unwrap(), 1);
    }

    #[test]
    fn test_acceptance_window() {
        let f = fixture();
        let old = f.mempool.admit(PEER, &signed(&f.alice, NOW - 8000.0, "1", ""), AdmitOptions::RELAY);
        assert!(old.contains(&"Mempool: Too old a transaction".to_string()));

        let future = f.mempool.admit(PEER, &signed(&f.alice, NOW + 10.0, "1", ""), AdmitOptions::RELAY);
        assert!(future.iter().any(|o| o.starts_with("Mempool: Future transaction rejected")));
        assert_eq!(f.mempool.transaction_count().unwrap(), 0);
    }

    #[test]
    fn test_pending_debits_count_against_balance() {
        let f = fixture();
        let first = f.mempool.admit(PEER, &signed(&f.alice, NOW - 9.0, "40", ""), AdmitOptions::RELAY);
        assert!(succeeded(&first));

        let too_much = f.mempool.admit(PEER, &signed(&f.alice, NOW - 8.0, "61", ""), AdmitOptions::RELAY);
        assert!(too_much.contains(&"Mempool: Sending more than owned".to_string()));

        let fits = f.mempool.admit(PEER, &signed(&f.alice, NOW - 7.0, "59", ""), AdmitOptions::RELAY);
        assert!(succeeded(&fits), "{:?}", fits);
    }

    #[test]
    fn test_fee_must_fit_after_amount() {
        let f = fixture();
        let outcomes = f.mempool.admit(PEER, &signed(&f.alice, NOW - 1.0, "99.995", ""), AdmitOptions::RELAY);
        assert!(outcomes.contains(&"Mempool: Cannot afford to pay fees".to_string()));
    }

    #[test]
    fn test_mined_and_pending_transaction_is_evicted() {
        let f = fixture();
        let wire = signed(&f.alice, NOW - 5.0, "1", "");
        f.mempool.admit(PEER, &wire, AdmitOptions::RELAY);
        f.ledger.mine(&signature_of(&wire), NOW - 5.0);

        let outcomes = f.mempool.admit(PEER, &wire, AdmitOptions::RELAY);
        assert!(outcomes.contains(&"Mempool: Transaction deleted from our mempool".to_string()));
        assert_eq!(f.mempool.transaction_count().unwrap(), 0);
        assert!(!f.mempool.is_frozen(PEER));
    }

    #[test]
    fn test_relaying_old_ledgered_transaction_freezes_peer() {
        let f = fixture();
        let wire = signed(&f.alice, NOW - 3600.0, "1", "");
        f.ledger.mine(&signature_of(&wire), NOW - 3600.0);

        let outcomes = f.mempool.admit(PEER, &wire, AdmitOptions::RELAY);
        assert!(outcomes.contains(&"That transaction is already in our ledger".to_string()));
        assert!(f.mempool.is_frozen(PEER));

        let refused = f.mempool.admit(PEER, &signed(&f.alice, NOW, "1", ""), AdmitOptions::RELAY);
        assert_eq!(refused, vec![format!("Mempool ignoring merge from frozen {}", PEER)]);

        f.clock.advance(301.0);
        assert!(!f.mempool.is_frozen(PEER));
    }

    #[test]
    fn test_recently_ledgered_transaction_does_not_freeze() {
        let f = fixture();
        let wire = signed(&f.alice, NOW - 60.0, "1", "");
        f.ledger.mine(&signature_of(&wire), NOW - 60.0);

        f.mempool.admit(PEER, &wire, AdmitOptions::RELAY);
        assert!(!f.mempool.is_frozen(PEER));
    }

    // =========================================================================
    // BATCH HANDLING
    // =========================================================================

    #[test]
    fn test_empty_batch() {
        let f = fixture();
        assert_eq!(
            f.mempool.admit(PEER, &json!([]), AdmitOptions::RELAY),
            vec![format!("Mempool from {} was empty", PEER)]
        );
    }

    #[test]
    fn test_bad_format_freezes_remote_peer_only() {
        let f = fixture();
        let outcomes = f.mempool.admit(PEER, &json!({"not": "a list"}), AdmitOptions::RELAY);
        assert_eq!(outcomes, vec!["Bad TX Format".to_string()]);
        assert!(f.mempool.is_frozen(PEER));
        f.clock.advance(599.0);
        assert!(f.mempool.is_frozen(PEER));

        f.mempool.admit("127.0.0.1", &json!([["too", "short"]]), AdmitOptions::RELAY);
        assert!(!f.mempool.is_frozen("127.0.0.1"));
    }

    #[test]
    fn test_digestion_lock_drops_relay_batches() {
        let f = fixture();
        let _digesting = f.digestion.lock();
        let outcomes = f.mempool.admit(PEER, &signed(&f.alice, NOW, "1", ""), AdmitOptions::RELAY);
        assert_eq!(outcomes, vec!["Locked ledger, dropping txs".to_string()]);
    }

    #[test]
    fn test_readmit_skips_lock_and_triage() {
        let f = fixture_with(MempoolConfig {
            open_below_mb: 0.0,
            data_below_mb: 0.0,
            value_below_mb: 0.0,
            allowed_below_mb: 0.0,
            ..MempoolConfig::for_testing()
        });
        let wire = signed(&f.alice, NOW - 5.0, "1", "");
        let tx = Transaction::from_wire(&wire).unwrap();

        let relayed = f.mempool.admit(PEER, &wire, AdmitOptions::RELAY);
        assert!(relayed.contains(&Rejection::NoSpaceLeft.to_string()));

        let _digesting = f.digestion.lock();
        let outcomes = f.mempool.readmit(&[tx]);
        assert!(succeeded(&outcomes), "{:?}", outcomes);
    }

    #[test]
    fn test_triage_at_mid_size() {
        let f = fixture();
        let bob = Ed25519KeyPair::from_seed([2u8; 32]);
        let filler = Transaction {
            timestamp: NOW - 30.0,
            address: bob.address(),
            recipient: recipient(),
            amount: Amount::from_coins(1),
            signature: "filler".into(),
            public_key: "pk".into(),
            operation: "0".into(),
            openfield: "x".repeat(350_000),
        };
        f.mempool.store.insert(&filler, NOW - 30.0).unwrap();
        let size = f.mempool.size_mb().unwrap();
        assert!(size > 0.35 && size < 0.4, "{}", size);

        let data = f.mempool.admit(PEER, &signed(&f.alice, NOW - 2.0, "1", &"d".repeat(250)), AdmitOptions::RELAY);
        assert!(succeeded(&data), "{:?}", data);

        let plain = f.mempool.admit(PEER, &signed(&f.alice, NOW - 1.0, "1", ""), AdmitOptions::RELAY);
        assert!(plain.contains(&Rejection::NoSpaceLeft.to_string()));
    }

    // =========================================================================
    // RELAY BOOKKEEPING
    // =========================================================================

    #[test]
    fn test_tx_to_send_after_a_send_only_offers_newer_merges() {
        let f = fixture();
        let first = signed(&f.alice, NOW - 50.0, "1", "");
        f.mempool.admit(PEER, &first, AdmitOptions::RELAY);
        f.clock.advance(10.0);
        f.mempool.sent("10.0.0.9");
        assert!(!f.mempool.sendable("10.0.0.9"));

        f.clock.advance(31.0);
        assert!(f.mempool.sendable("10.0.0.9"));
        let second = signed(&f.alice, NOW, "2", "");
        f.mempool.admit(PEER, &second, AdmitOptions::RELAY);

        let offered = f.mempool.tx_to_send("10.0.0.9", &[]).unwrap();
        assert_eq!(offered.len(), 1);
        assert_eq!(offered[0].signature, signature_of(&second));

        let known = vec![signature_of(&second)];
        assert!(f.mempool.tx_to_send("10.0.0.9", &known).unwrap().is_empty());
        assert_eq!(f.mempool.tx_to_send("10.0.0.10", &known).unwrap().len(), 1);
    }

    #[test]
    fn test_explicit_freeze() {
        let f = fixture();
        f.mempool.freeze(PEER, Duration::from_secs(60));
        assert!(f.mempool.is_frozen(PEER));
        assert!(f.mempool.tx_to_send(PEER, &[]).unwrap().is_empty());
    }

    // =========================================================================
    // MAINTENANCE
    // =========================================================================

    #[test]
    fn test_purge_delete_and_status() {
        let f = fixture();
        let a = signed(&f.alice, NOW - 7000.0, "1", "hello");
        let b = signed(&f.alice, NOW - 10.0, "2", "");
        f.mempool.admit(PEER, &json!([a, b.clone()]), AdmitOptions::RELAY);
        assert_eq!(f.mempool.transaction_count().unwrap(), 2);

        f.clock.advance(300.0);
        assert_eq!(f.mempool.purge_expired().unwrap(), 1);
        assert_eq!(f.mempool.delete_transactions(&[signature_of(&b)]).unwrap(), 1);

        f.mempool.freeze("10.9.9.9", Duration::from_secs(60));
        let status = f.mempool.status().unwrap();
        assert_eq!(status.transactions, 0);
        assert_eq!(status.frozen_peers, vec!["10.9.9.9".to_string()]);
    }

    #[test]
    fn test_wire_batch_is_an_array_of_wire_transactions() {
        let f = fixture();
        f.mempool.admit(PEER, &signed(&f.alice, NOW, "1", ""), AdmitOptions::RELAY);
        let wire = wire_batch(&f.mempool.fetch_all().unwrap());
        assert_eq!(wire.as_array().unwrap().len(), 1);
        assert_eq!(wire[0].as_array().unwrap().len(), 8);
    }
}
