//! # TCP Connector
//!
//! ## Probe
//!
//! ```text
//! connect (timeout) ──→ [strict] send "getversion" ──→ reply in version_allow?
//! ```
//!
//! ## Outbound Session
//!
//! ```text
//! send "version", <our version>  ──→  expect "ok"
//! loop:
//!     send "blockheight", <our height>  ──→  reply is the peer's height
//!     record_opinion(peer, height)
//!     sleep(session_interval)
//! ```
//!
//! The session ends on the first wire error, on a ban, or when the peer
//! closes the connection.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use ln_05_wire_codec::{decode, receive, send, Frame, WireConfig};
use serde_json::Value;
use shared_types::BlockHeight;
use tokio::net::TcpStream;
use tokio::time::{sleep, timeout};
use tracing::debug;

use crate::config::PeerConfig;
use crate::domain::{host_port, OpinionOutcome, PeerError, Result};
use crate::ports::{ChainHeight, PeerConnector};
use crate::service::PeerConsensus;

/// Reply window of a strict probe.
const VERSION_REPLY_TIMEOUT: Duration = Duration::from_secs(1);

pub struct TcpPeerConnector {
    version: String,
    version_allow: Vec<String>,
    connect_timeout: Duration,
    session_interval: Duration,
    wire: WireConfig,
    chain: Arc<dyn ChainHeight>,
}

impl TcpPeerConnector {
    pub fn new(config: &PeerConfig, wire: WireConfig, chain: Arc<dyn ChainHeight>) -> Self {
        Self {
            version: config.version.clone(),
            version_allow: config.version_allow.clone(),
            connect_timeout: config.probe_timeout(),
            session_interval: config.session_interval(),
            wire,
            chain,
        }
    }

    async fn connect(&self, host: &str, port: u16) -> Result<TcpStream> {
        let peer = host_port(host, port);
        match timeout(self.connect_timeout, TcpStream::connect((host, port))).await {
            Err(_) => Err(PeerError::Timeout(peer)),
            Ok(Err(source)) => Err(PeerError::Connect { peer, source }),
            Ok(Ok(stream)) => Ok(stream),
        }
    }

    async fn exchange_heights(
        &self,
        stream: &mut TcpStream,
        host: &str,
        peers: &PeerConsensus,
    ) -> Result<()> {
        loop {
            let ours = self.chain.last_block_height();
            send(stream, "blockheight").await?;
            send(stream, &ours).await?;
            match receive(stream, &self.wire).await? {
                Frame::Timeout => debug!("[ln-03] {} did not send its height", host),
                Frame::Payload(reply) => {
                    let height = parse_height(&reply).ok_or_else(|| PeerError::UnexpectedReply {
                        peer: host.to_string(),
                        reply: reply.to_string(),
                    })?;
                    if peers.record_opinion(host, height, ours) == OpinionOutcome::Banned {
                        return Ok(());
                    }
                }
            }
            sleep(self.session_interval).await;
        }
    }
}

fn parse_height(value: &Value) -> Option<BlockHeight> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[async_trait]
impl PeerConnector for TcpPeerConnector {
    async fn probe(&self, host: &str, port: u16, strict: bool) -> Result<()> {
        let mut stream = self.connect(host, port).await?;
        if !strict {
            return Ok(());
        }
        send(&mut stream, "getversion").await?;
        let reply = decode(&mut stream, VERSION_REPLY_TIMEOUT).await?;
        let peer = host_port(host, port);
        match reply.as_str() {
            Some(ln_05_wire_codec::TIMEOUT_SENTINEL) => Err(PeerError::Busy(peer)),
            Some(version) if self.version_allow.iter().any(|v| v == version) => {
                debug!("[ln-03] {} responding: {}", peer, version);
                Ok(())
            }
            _ => Err(PeerError::IncompatibleVersion {
                peer,
                version: reply.to_string(),
            }),
        }
    }

    async fn run_session(&self, host: &str, port: u16, peers: Arc<PeerConsensus>) -> Result<()> {
        let peer = host_port(host, port);
        let mut stream = self.connect(host, port).await?;

        send(&mut stream, "version").await?;
        send(&mut stream, &self.version).await?;
        let reply = receive(&mut stream, &self.wire).await?;
        if reply.as_str() != Some("ok") {
            return Err(PeerError::HandshakeRefused(peer));
        }

        peers.append_client(&peer);
        let outcome = self.exchange_heights(&mut stream, host, &peers).await;
        peers.remove_client(&peer);
        peers.consensus_remove(host);
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::ManualTimeSource;
    use tempfile::TempDir;
    use tokio::net::TcpListener;

    struct FixedHeight(BlockHeight);

    impl ChainHeight for FixedHeight {
        fn last_block_height(&self) -> BlockHeight {
            self.0
        }
    }

    fn connector(dir: &TempDir) -> TcpPeerConnector {
        TcpPeerConnector::new(
            &PeerConfig::for_testing(dir.path()),
            WireConfig::for_testing(),
            Arc::new(FixedHeight(42)),
        )
    }

    /// Answer one `getversion` with `version`.
    async fn version_peer(version: &'static str) -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let cfg = WireConfig::for_testing();
            let asked = receive(&mut stream, &cfg).await.unwrap();
            assert_eq!(asked.as_str(), Some("getversion"));
            send(&mut stream, version).await.unwrap();
        });
        port
    }

    // =========================================================================
    // PROBES
    // =========================================================================

    #[tokio::test]
    async fn test_strict_probe_accepts_allowed_version() {
        let dir = TempDir::new().unwrap();
        let port = version_peer("mainnet0001").await;
        connector(&dir).probe("127.0.0.1", port, true).await.unwrap();
    }

    #[tokio::test]
    async fn test_strict_probe_rejects_other_version() {
        let dir = TempDir::new().unwrap();
        let port = version_peer("testnet0001").await;
        let err = connector(&dir).probe("127.0.0.1", port, true).await.unwrap_err();
        assert!(matches!(err, PeerError::IncompatibleVersion { .. }));
    }

    #[tokio::test]
    async fn test_probe_of_closed_port_fails() {
        let dir = TempDir::new().unwrap();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let err = connector(&dir).probe("127.0.0.1", port, false).await.unwrap_err();
        assert!(matches!(err, PeerError::Connect { .. }));
    }

    // =========================================================================
    // SESSION
    // =========================================================================

    #[tokio::test]
    async fn test_session_exchanges_heights_and_cleans_up() {
        let dir = TempDir::new().unwrap();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let cfg = WireConfig::for_testing();
            let mut seen = Vec::new();
            for _ in 0..2 {
                seen.push(receive(&mut stream, &cfg).await.unwrap().into_value());
            }
            send(&mut stream, "ok").await.unwrap();
            for _ in 0..2 {
                seen.push(receive(&mut stream, &cfg).await.unwrap().into_value());
            }
            send(&mut stream, &500).await.unwrap();
            // second round proves the loop continued, then hang up
            seen.push(receive(&mut stream, &cfg).await.unwrap().into_value());
            seen
        });

        let config = PeerConfig::for_testing(dir.path());
        let tcp = Arc::new(connector(&dir));
        let peers = Arc::new(PeerConsensus::new(
            config,
            tcp.clone(),
            Arc::new(ManualTimeSource::new(1_000.0)),
        ));

        let result = tcp.run_session("127.0.0.1", port, peers.clone()).await;
        assert!(result.is_err());

        let seen = server.await.unwrap();
        assert_eq!(seen[0], "version");
        assert_eq!(seen[1], "mainnet0001");
        assert_eq!(seen[2], "blockheight");
        assert_eq!(seen[3], 42);
        assert_eq!(seen[4], "blockheight");
        assert_eq!(peers.active_count(), 0);
        assert_eq!(peers.consensus(), None);
    }

    #[tokio::test]
    async fn test_session_refused_handshake() {
        let dir = TempDir::new().unwrap();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let cfg = WireConfig::for_testing();
            receive(&mut stream, &cfg).await.unwrap();
            receive(&mut stream, &cfg).await.unwrap();
            send(&mut stream, "notok").await.unwrap();
        });

        let tcp = Arc::new(connector(&dir));
        let peers = Arc::new(PeerConsensus::new(
            PeerConfig::for_testing(dir.path()),
            tcp.clone(),
            Arc::new(ManualTimeSource::new(1_000.0)),
        ));
        let err = tcp.run_session("127.0.0.1", port, peers.clone()).await.unwrap_err();
        assert!(matches!(err, PeerError::HandshakeRefused(_)));
        assert_eq!(peers.active_count(), 0);
    }
}
