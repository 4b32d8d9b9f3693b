//! # Peer Reputation and Sessions
//!
//! Warnings and bans on one node, and a real TCP session between two
//! nodes: node A's outbound connector against node B's inbound server.

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use crate::fixtures::*;
    use ln_03_peer_consensus::{PeerConnector, TcpPeerConnector};
    use node_runtime::adapters::LedgerAdapter;
    use node_runtime::InboundServer;
    use tokio::sync::watch;

    const IP: &str = "10.20.30.40";

    // =========================================================================
    // REPUTATION
    // =========================================================================

    #[test]
    fn test_ban_lands_on_the_threshold_call() {
        let node = TestNode::open();
        let peers = &node.ctx.peers;
        let threshold = peers.config().ban_threshold;

        for _ in 1..threshold {
            assert!(!peers.warn(IP, "Bad block", 1));
            assert!(!peers.is_banned(IP));
        }
        assert!(peers.warn(IP, "Bad block", 1));
        assert!(peers.is_banned(IP));
        assert!(!peers.warn(IP, "Bad block", 1));
        assert!(peers.is_banned(IP));
    }

    #[test]
    fn test_localhost_is_never_banned() {
        let node = TestNode::open();
        let threshold = node.ctx.peers.config().ban_threshold;
        assert!(!node.ctx.peers.warn("127.0.0.1", "Bad block", threshold * 2));
        assert!(!node.ctx.peers.is_banned("127.0.0.1"));
    }

    #[test]
    fn test_runaway_height_earns_deviation_warnings() {
        let node = TestNode::open();
        let peers = &node.ctx.peers;
        for i in 0..11 {
            peers.record_opinion(&format!("10.0.1.{}", i), 100, 100);
        }
        peers.record_opinion(IP, 140, 100);

        assert_eq!(peers.consensus(), Some(100));
        assert_eq!(peers.peer_record(IP, 5658).warnings, 10);
        assert!(!peers.is_banned(IP));
    }

    // =========================================================================
    // TCP SESSIONS
    // =========================================================================

    #[tokio::test]
    async fn test_outbound_session_learns_inbound_height() {
        let b = TestNode::open();
        b.mine(&keypair(2), Vec::new(), NOW - 600.0);
        let server = InboundServer::bind(b.ctx.clone()).await.unwrap();
        let port = server.local_addr().unwrap().port();
        let (stop, stopped) = watch::channel(false);
        tokio::spawn(server.run(stopped));

        let a = TestNode::open();
        let connector = TcpPeerConnector::new(
            &a.ctx.config.peers,
            a.ctx.config.wire.clone(),
            Arc::new(LedgerAdapter::new(Arc::clone(&a.ctx.ledger))),
        );
        connector.probe("127.0.0.1", port, true).await.unwrap();

        let peers = Arc::clone(&a.ctx.peers);
        let session = tokio::spawn(async move { connector.run_session("127.0.0.1", port, peers).await });

        let mut learned = None;
        for _ in 0..50 {
            learned = a.ctx.peers.consensus();
            if learned.is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        assert_eq!(learned, Some(1));

        session.abort();
        stop.send(true).unwrap();
    }

    #[tokio::test]
    async fn test_outbound_session_outlives_the_header_timeout() {
        let b = TestNode::open();
        b.mine(&keypair(2), Vec::new(), NOW - 600.0);
        let header_timeout = b.ctx.config.wire.header_timeout();
        let server = InboundServer::bind(b.ctx.clone()).await.unwrap();
        let port = server.local_addr().unwrap().port();
        let (stop, stopped) = watch::channel(false);
        tokio::spawn(server.run(stopped));

        let a = TestNode::open();
        assert!(a.ctx.config.peers.session_interval() < header_timeout);
        let connector = TcpPeerConnector::new(
            &a.ctx.config.peers,
            a.ctx.config.wire.clone(),
            Arc::new(LedgerAdapter::new(Arc::clone(&a.ctx.ledger))),
        );
        let peers = Arc::clone(&a.ctx.peers);
        let session = tokio::spawn(async move { connector.run_session("127.0.0.1", port, peers).await });

        // several intervals and more than two header timeouts of the server
        tokio::time::sleep(header_timeout * 2 + Duration::from_millis(500)).await;

        assert!(!session.is_finished());
        assert_eq!(a.ctx.peers.consensus(), Some(1));
        assert_eq!(a.ctx.peers.active_count(), 1);

        session.abort();
        stop.send(true).unwrap();
    }
}
