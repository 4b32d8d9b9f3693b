//! # Digestion, Flush and Rollback
//!
//! Blocks digested by one node, followed through the ledger tiers:
//!
//! ```text
//! digest ──► working tier ──flush──► ledger.db ──reopen──► same balances
//!    ▲                                   │
//!    └──── re-mine ◄── mempool ◄── rollback
//! ```

#[cfg(test)]
mod tests {
    use crate::fixtures::*;
    use shared_types::Amount;

    // =========================================================================
    // FLUSH
    // =========================================================================

    #[test]
    fn test_repeated_flushes_count_each_block_once() {
        let node = TestNode::open();
        let miner = keypair(1);
        node.mine(&miner, Vec::new(), NOW - 600.0);
        let payment = signed(&miner, NOW - 550.0, &address('b'), Amount::from_coins(5), "");
        node.mine(&miner, vec![payment], NOW - 500.0);

        for _ in 0..3 {
            let report = node.ctx.ledger.flush().unwrap();
            assert_eq!(report.rows, 0);
            assert_eq!(report.watermark, 2);
        }
        // two rewards, plus the fee back, minus 5 and the fee sent
        assert_eq!(node.balance(&miner.address()), "25.00000000");
        assert_eq!(node.balance(&address('b')), "5.00000000");

        let node = node.reopen();
        assert_eq!(node.ctx.local_height(), 2);
        assert_eq!(node.ctx.ledger.watermark(), 2);
        assert_eq!(node.balance(&miner.address()), "25.00000000");
        assert_eq!(node.balance(&address('b')), "5.00000000");
    }

    // =========================================================================
    // ROLLBACK
    // =========================================================================

    #[test]
    fn test_rollback_then_remine_matches_original_history() {
        let node = TestNode::open();
        let miner = keypair(1);
        node.mine(&miner, Vec::new(), NOW - 600.0);
        let before = (node.balance(&miner.address()), node.balance(&address('b')));

        let payment = signed(&miner, NOW - 550.0, &address('b'), Amount::from_coins(5), "hello");
        node.mine(&miner, vec![payment.clone()], NOW - 500.0);
        let after = (node.balance(&miner.address()), node.balance(&address('b')));

        let report = node.ctx.digester().rollback(2).unwrap();
        assert_eq!(report.returned, 1);
        assert_eq!(report.readmitted, 1);
        assert_eq!(node.ctx.local_height(), 1);
        assert_eq!(
            (node.balance(&miner.address()), node.balance(&address('b'))),
            before
        );
        assert!(node
            .ctx
            .ledger
            .transaction_by_signature(&payment.signature)
            .unwrap()
            .is_none());

        let pending = node.ctx.mempool.fetch_all().unwrap();
        assert_eq!(pending, vec![payment]);
        node.mine(&miner, pending, NOW - 400.0);

        assert_eq!(node.ctx.local_height(), 2);
        assert_eq!(
            (node.balance(&miner.address()), node.balance(&address('b'))),
            after
        );
        assert_eq!(node.ctx.mempool.transaction_count().unwrap(), 0);
    }

    #[test]
    fn test_replayed_block_is_refused() {
        let node = TestNode::open();
        let miner = keypair(1);
        let block = node.mine(&miner, Vec::new(), NOW - 600.0);

        assert!(node.ctx.digester().digest(&block).is_err());
        assert_eq!(node.ctx.local_height(), 1);
        assert_eq!(node.balance(&miner.address()), "15.00000000");
    }
}
