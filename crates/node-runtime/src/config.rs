//! # Node Configuration
//!
//! One typed configuration for every component, read from a TOML file in
//! which every table and field is optional.
//!
//! ## Load order
//!
//! 1. Defaults of each component config
//! 2. TOML file named by `LN_CONFIG` (or `ledger-node.toml` when present)
//! 3. Environment overrides: `LN_DATA_DIR`, `LN_PORT`, `LN_LOG_LEVEL`
//! 4. [`NodeConfig::validate`]
//!
//! ```toml
//! data_dir = "/var/lib/ledger-node"
//!
//! [peers]
//! port = 5658
//! whitelist = ["127.0.0.1"]
//!
//! [mempool]
//! ram = false
//!
//! [logging]
//! level = "debug"
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use ln_01_proof_of_work::PowConfig;
use ln_02_ledger_store::LedgerConfig;
use ln_03_peer_consensus::PeerConfig;
use ln_04_mempool::MempoolConfig;
use ln_05_wire_codec::WireConfig;
use serde::Deserialize;
use shared_types::Amount;
use tracing::Level;

/// File read when `LN_CONFIG` is not set, if it exists.
pub const DEFAULT_CONFIG_FILE: &str = "ledger-node.toml";

pub const ENV_CONFIG: &str = "LN_CONFIG";
pub const ENV_DATA_DIR: &str = "LN_DATA_DIR";
pub const ENV_PORT: &str = "LN_PORT";
pub const ENV_LOG_LEVEL: &str = "LN_LOG_LEVEL";

/// Complete node configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Root for every file the node writes; applied to each component.
    pub data_dir: Option<PathBuf>,
    pub ledger: LedgerConfig,
    pub mempool: MempoolConfig,
    pub peers: PeerConfig,
    pub pow: PowConfig,
    pub wire: WireConfig,
    pub chain: ChainConfig,
    pub runtime: RuntimeConfig,
    pub logging: LoggingConfig,
}

/// Block rewards and the first block.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    /// Reward credited to the miner on the coinbase row
    pub mining_reward: Amount,

    /// Recipient of the development reward row; none when empty
    pub genesis_address: String,

    /// Previous hash expected by the first block of an empty ledger
    pub genesis_hash: String,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            mining_reward: Amount::from_coins(15),
            genesis_address: String::new(),
            genesis_hash: "0".repeat(56),
        }
    }
}

/// Inbound server and maintenance schedule.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Interface the inbound server listens on
    pub bind: String,

    /// Accept inbound peer connections
    pub listen: bool,

    /// Period of the maintenance loop (seconds)
    pub maintenance_interval_secs: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".into(),
            listen: true,
            maintenance_interval_secs: 30,
        }
    }
}

impl RuntimeConfig {
    pub fn maintenance_interval(&self) -> Duration {
        Duration::from_secs(self.maintenance_interval_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `trace`, `debug`, `info`, `warn` or `error`
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

impl LoggingConfig {
    pub fn max_level(&self) -> Result<Level, ConfigError> {
        Level::from_str(&self.level).map_err(|_| ConfigError::LogLevel(self.level.clone()))
    }
}

impl NodeConfig {
    /// Read the file named by `LN_CONFIG` (or the default file), then apply
    /// environment overrides and validate.
    pub fn load() -> Result<Self, ConfigError> {
        let lookup = |name: &str| std::env::var(name).ok();
        let mut config = match lookup(ENV_CONFIG) {
            Some(path) => Self::from_file(Path::new(&path))?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => Self::default(),
        };
        config.apply_env(lookup)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;
        let mut config = Self::parse(&content)?;
        if let Some(dir) = config.data_dir.clone() {
            config.set_data_dir(&dir);
        }
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Apply `LN_*` overrides; `lookup` resolves a variable name.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        if let Some(dir) = lookup(ENV_DATA_DIR) {
            self.set_data_dir(Path::new(&dir));
        }
        if let Some(port) = lookup(ENV_PORT) {
            self.peers.port = port.parse().map_err(|_| ConfigError::InvalidEnv {
                name: ENV_PORT,
                value: port.clone(),
            })?;
        }
        if let Some(level) = lookup(ENV_LOG_LEVEL) {
            self.logging.level = level;
        }
        Ok(())
    }

    /// Put every file of the node under `dir`, keeping the file names.
    pub fn set_data_dir(&mut self, dir: &Path) {
        self.data_dir = Some(dir.to_path_buf());
        self.ledger.data_dir = dir.to_path_buf();
        self.peers.peers_dir = dir.to_path_buf();
        self.pow.buffer_path = dir.join(file_name_of(&self.pow.buffer_path, "heavy3a.bin"));
        self.mempool.path = dir.join(file_name_of(&self.mempool.path, "mempool.db"));
    }

    /// Reject settings the components cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.peers.thread_limit == 0 {
            return Err(ConfigError::ZeroThreadLimit);
        }
        if !(1..=10).contains(&self.peers.probe_timeout_secs) {
            return Err(ConfigError::ProbeTimeout(self.peers.probe_timeout_secs));
        }
        if !self.mempool.triage_is_increasing() {
            return Err(ConfigError::TriageNotIncreasing);
        }
        if self.pow.buffer_size == 0 || self.pow.buffer_size % 4 != 0 {
            return Err(ConfigError::BufferSize(self.pow.buffer_size));
        }
        if self.ledger.max_retries == Some(0) {
            return Err(ConfigError::ZeroRetries);
        }
        let header_timeout_ms = self.wire.header_timeout_secs.saturating_mul(1000);
        if self.peers.session_interval_ms == 0 || self.peers.session_interval_ms >= header_timeout_ms {
            return Err(ConfigError::SessionInterval {
                interval_ms: self.peers.session_interval_ms,
                header_timeout_secs: self.wire.header_timeout_secs,
            });
        }
        if self.runtime.maintenance_interval_secs == 0 {
            return Err(ConfigError::ZeroMaintenanceInterval);
        }
        if self.chain.mining_reward <= Amount::ZERO {
            return Err(ConfigError::MiningReward(self.chain.mining_reward));
        }
        self.logging.max_level()?;
        Ok(())
    }

    /// Everything under `dir` with test-sized buffers and timeouts.
    pub fn for_testing(dir: &Path) -> Self {
        let mut config = Self {
            ledger: LedgerConfig::for_testing(dir),
            mempool: MempoolConfig::for_testing(),
            peers: PeerConfig::for_testing(dir),
            pow: PowConfig::for_testing(dir.join("heavy3a.bin")),
            wire: WireConfig::for_testing(),
            runtime: RuntimeConfig {
                bind: "127.0.0.1".into(),
                ..RuntimeConfig::default()
            },
            ..Self::default()
        };
        config.data_dir = Some(dir.to_path_buf());
        config
    }
}

fn file_name_of(path: &Path, fallback: &str) -> PathBuf {
    path.file_name()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(fallback))
}

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Config file could not be read.
    Io { path: PathBuf, error: String },
    /// Config file is not valid TOML for [`NodeConfig`].
    Parse(String),
    /// An `LN_*` variable holds an unusable value.
    InvalidEnv { name: &'static str, value: String },
    ZeroThreadLimit,
    ProbeTimeout(u64),
    TriageNotIncreasing,
    BufferSize(usize),
    ZeroRetries,
    ZeroMaintenanceInterval,
    /// Outbound sessions must speak before the remote header timeout.
    SessionInterval {
        interval_ms: u64,
        header_timeout_secs: u64,
    },
    /// Blocks are found by their reward row, so it must be positive.
    MiningReward(Amount),
    LogLevel(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { path, error } => {
                write!(f, "Cannot read config file {}: {}", path.display(), error)
            }
            Self::Parse(e) => write!(f, "Invalid config file: {}", e),
            Self::InvalidEnv { name, value } => write!(f, "Invalid value for {}: {:?}", name, value),
            Self::ZeroThreadLimit => f.write_str("peers.thread_limit must be at least 1"),
            Self::ProbeTimeout(secs) => write!(
                f,
                "peers.probe_timeout_secs must be between 1 and 10, got {}",
                secs
            ),
            Self::TriageNotIncreasing => {
                f.write_str("mempool triage thresholds must be positive and strictly increasing")
            }
            Self::BufferSize(size) => write!(
                f,
                "pow.buffer_size must be a non-zero multiple of 4, got {}",
                size
            ),
            Self::ZeroRetries => {
                f.write_str("ledger.max_retries must be unset (unbounded) or at least 1")
            }
            Self::ZeroMaintenanceInterval => {
                f.write_str("runtime.maintenance_interval_secs must be at least 1")
            }
            Self::SessionInterval {
                interval_ms,
                header_timeout_secs,
            } => write!(
                f,
                "peers.session_interval_ms must be between 1 and wire.header_timeout_secs ({}s), got {}ms",
                header_timeout_secs, interval_ms
            ),
            Self::MiningReward(reward) => {
                write!(f, "chain.mining_reward must be positive, got {}", reward)
            }
            Self::LogLevel(level) => write!(f, "Unknown log level {:?}", level),
        }
    }
}

impl std::error::Error for ConfigError {}
