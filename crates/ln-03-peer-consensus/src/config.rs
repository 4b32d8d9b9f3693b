//! Configuration types for peer consensus

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Seed entries of the suggested-peers file, written on first start.
///
/// Addresses are placeholders from the documentation ranges; a deployed
/// network ships its own table.
pub const BOOTSTRAP_PEERS: &[(&str, u16)] = &[
    ("198.51.100.10", 5658),
    ("198.51.100.23", 5658),
    ("203.0.113.7", 5658),
    ("203.0.113.41", 5658),
];

/// Runtime configuration for peer consensus
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct PeerConfig {
    /// Our own public address; never dialled
    pub host: String,

    /// Listening port advertised to peers
    pub port: u16,

    /// Protocol version sent in handshakes
    pub version: String,

    /// Versions accepted from peers
    pub version_allow: Vec<String>,

    /// Warning marks at which a peer is banned
    pub ban_threshold: u32,

    /// Active pool size under which the ban list is reset
    pub nodes_ban_reset: usize,

    /// Peers that are never warned and skip the address-class check
    pub whitelist: Vec<String>,

    /// Permanent bans; the ban list is reset to this
    pub banlist: Vec<String>,

    /// Maximum concurrent outbound sessions
    pub thread_limit: usize,

    /// Accept peer lists pushed by other nodes
    pub accept_peers: bool,

    /// Connect timeout of a connectivity probe (seconds)
    pub probe_timeout_secs: u64,

    /// Probes running at once during maintenance
    pub probe_concurrency: usize,

    /// Pause between block height exchanges in an outbound session (ms).
    /// Must stay below the peer's header timeout or it hangs up on us.
    pub session_interval_ms: u64,

    /// Directory holding the peer files
    pub peers_dir: PathBuf,

    /// Tested peers, `{ip: port}`
    pub peer_file: String,

    /// Peers suggested by other nodes, tested without a handshake
    pub suggested_peer_file: String,
}

impl Default for PeerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 5658,
            version: "mainnet0001".into(),
            version_allow: vec!["mainnet0001".into()],
            ban_threshold: 30,
            nodes_ban_reset: 5,
            whitelist: vec!["127.0.0.1".into()],
            banlist: Vec::new(),
            thread_limit: 64,
            accept_peers: true,
            probe_timeout_secs: 5,
            probe_concurrency: 8,
            session_interval_ms: 10_000,
            peers_dir: PathBuf::from("."),
            peer_file: "peers.txt".into(),
            suggested_peer_file: "suggested_peers.txt".into(),
        }
    }
}

impl PeerConfig {
    /// Config with short timeouts and peer files under `dir`
    pub fn for_testing(dir: &Path) -> Self {
        Self {
            host: "10.255.255.1".into(),
            probe_timeout_secs: 1,
            session_interval_ms: 200,
            peers_dir: dir.to_path_buf(),
            ..Default::default()
        }
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    pub fn session_interval(&self) -> Duration {
        Duration::from_millis(self.session_interval_ms)
    }

    pub fn peer_file_path(&self) -> PathBuf {
        self.peers_dir.join(&self.peer_file)
    }

    pub fn suggested_peer_file_path(&self) -> PathBuf {
        self.peers_dir.join(&self.suggested_peer_file)
    }
}
