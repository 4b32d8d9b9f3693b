//! # Admission Against a Real Ledger
//!
//! Mempool admission backed by a ledger that earned its balances by
//! digesting mined blocks, rather than by a mock.

#[cfg(test)]
mod tests {
    use crate::fixtures::*;
    use ln_04_mempool::{wire_batch, AdmitOptions};
    use shared_types::Amount;

    const PEER: &str = "10.0.0.7";

    /// Node whose miner holds exactly 100 coins after one block.
    fn funded() -> (TestNode, shared_crypto::Ed25519KeyPair) {
        let node = TestNode::open_with(|config| {
            config.chain.mining_reward = Amount::from_coins(100);
        });
        let miner = keypair(1);
        node.mine(&miner, Vec::new(), NOW - 600.0);
        assert_eq!(node.balance(&miner.address()), "100.00000000");
        (node, miner)
    }

    fn pay(
        miner: &shared_crypto::Ed25519KeyPair,
        timestamp: f64,
        coins: &str,
        openfield: &str,
    ) -> serde_json::Value {
        let amount: Amount = coins.parse().unwrap();
        wire_batch(&[signed(miner, timestamp, &address('b'), amount, openfield)])
    }

    // =========================================================================
    // ADMISSION AND RELAY
    // =========================================================================

    #[test]
    fn test_funded_transaction_is_admitted_and_offered() {
        let (node, miner) = funded();
        let batch = pay(&miner, NOW - 5.0, "10", "");

        let outcomes = node.ctx.mempool.admit(PEER, &batch, AdmitOptions::RELAY);
        assert!(succeeded(&outcomes), "{:?}", outcomes);

        let offered = node.ctx.mempool.tx_to_send("10.0.0.8", &[]).unwrap();
        assert_eq!(offered.len(), 1);
        assert_eq!(offered[0].address, miner.address());
    }

    #[test]
    fn test_same_signature_twice_is_reported_once_stored() {
        let (node, miner) = funded();
        let batch = pay(&miner, NOW - 5.0, "1", "");
        assert!(succeeded(&node.ctx.mempool.admit(PEER, &batch, AdmitOptions::RELAY)));

        let again = node.ctx.mempool.admit(PEER, &batch, AdmitOptions::RELAY);
        assert!(again.contains(&"That transaction is already in our mempool".to_string()));
        assert_eq!(node.ctx.mempool.transaction_count().unwrap(), 1);
    }

    #[test]
    fn test_acceptance_window() {
        let (node, miner) = funded();
        let old = node
            .ctx
            .mempool
            .admit(PEER, &pay(&miner, NOW - 8000.0, "1", ""), AdmitOptions::RELAY);
        assert!(old.contains(&"Mempool: Too old a transaction".to_string()));

        let future = node
            .ctx
            .mempool
            .admit(PEER, &pay(&miner, NOW + 10.0, "1", ""), AdmitOptions::RELAY);
        assert!(future
            .iter()
            .any(|o| o.starts_with("Mempool: Future transaction rejected")));
        assert_eq!(node.ctx.mempool.transaction_count().unwrap(), 0);
    }

    #[test]
    fn test_pending_debits_reduce_spendable_balance() {
        let (node, miner) = funded();
        let mempool = &node.ctx.mempool;
        assert!(succeeded(&mempool.admit(PEER, &pay(&miner, NOW - 9.0, "40", ""), AdmitOptions::RELAY)));

        let too_much = mempool.admit(PEER, &pay(&miner, NOW - 8.0, "61", ""), AdmitOptions::RELAY);
        assert!(too_much.contains(&"Mempool: Sending more than owned".to_string()));

        let fits = mempool.admit(PEER, &pay(&miner, NOW - 7.0, "59", ""), AdmitOptions::RELAY);
        assert!(succeeded(&fits), "{:?}", fits);
    }

    #[test]
    fn test_mid_size_pool_prefers_data_transactions() {
        let (node, miner) = funded();
        let mempool = &node.ctx.mempool;
        let filler = "f".repeat(88_000);
        for i in 0..4 {
            let outcomes = mempool.admit(
                PEER,
                &pay(&miner, NOW - 50.0 + i as f64, "0", &filler),
                AdmitOptions::RELAY,
            );
            assert!(succeeded(&outcomes), "{:?}", outcomes);
        }
        let size = mempool.size_mb().unwrap();
        assert!(size > 0.3 && size < 0.4, "{}", size);

        let data = mempool.admit(PEER, &pay(&miner, NOW - 2.0, "1", &"d".repeat(250)), AdmitOptions::RELAY);
        assert!(succeeded(&data), "{:?}", data);

        let plain = mempool.admit(PEER, &pay(&miner, NOW - 1.0, "1", ""), AdmitOptions::RELAY);
        assert!(!succeeded(&plain));
        assert!(plain
            .iter()
            .any(|o| o == "Local mempool is already full for this tx type, skipping merging"));
    }
}
