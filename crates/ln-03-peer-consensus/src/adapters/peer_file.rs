//! # Peer Files
//!
//! A peer file is a JSON object mapping host to port:
//!
//! ```json
//! {"10.0.0.5": 5658, "10.0.0.6": "5658"}
//! ```
//!
//! Ports may be numbers or numeric strings; files are always written with
//! numbers. Writes go to `<file>.tmp` first and are renamed into place.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_with::{serde_as, DisplayFromStr, PickFirst};
use tracing::{debug, warn};

use crate::domain::{PeerError, Result};

/// Host → port.
#[serde_as]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerList(#[serde_as(as = "BTreeMap<_, PickFirst<(_, DisplayFromStr)>>")] pub BTreeMap<String, u16>);

/// Parse a peer list pushed by another node.
///
/// Accepts the object itself or the object serialised into a string.
/// Trailing garbage after the first closing brace is ignored, as older
/// nodes sometimes send concatenated lists.
pub fn parse_peer_list(value: &Value) -> Result<BTreeMap<String, u16>> {
    let list: PeerList = match value {
        Value::String(raw) => serde_json::from_str(first_object(raw))?,
        other => serde_json::from_value(other.clone())?,
    };
    Ok(list.0)
}

fn first_object(raw: &str) -> &str {
    match raw.find('}') {
        Some(idx) if raw.matches('}').count() > 1 => &raw[..=idx],
        _ => raw,
    }
}

/// One peer file on disk.
#[derive(Debug, Clone)]
pub struct PeerFile {
    path: PathBuf,
}

impl PeerFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the file, creating it as `{}` when missing.
    pub fn load(&self) -> Result<BTreeMap<String, u16>> {
        if !self.path.exists() {
            fs::write(&self.path, "{}").map_err(|source| self.io_error(source))?;
            warn!("[ln-03] Peer file created in {}", self.path.display());
            return Ok(BTreeMap::new());
        }
        let raw = fs::read_to_string(&self.path).map_err(|source| self.io_error(source))?;
        let list: PeerList = serde_json::from_str(first_object(&raw))?;
        Ok(list.0)
    }

    /// Replace the file contents with `peers`.
    pub fn save(&self, peers: &BTreeMap<String, u16>) -> Result<()> {
        let tmp = self.path.with_extension("tmp");
        let json = serde_json::to_string(&PeerList(peers.clone()))?;
        fs::write(&tmp, json).map_err(|source| self.io_error(source))?;
        fs::rename(&tmp, &self.path).map_err(|source| self.io_error(source))?;
        debug!("[ln-03] {} saved ({} peers)", self.path.display(), peers.len());
        Ok(())
    }

    /// Write `table` minus `self_host` if the file does not exist yet.
    pub fn seed(&self, table: &[(&str, u16)], self_host: &str) -> Result<bool> {
        if self.path.exists() {
            return Ok(false);
        }
        let peers = table
            .iter()
            .filter(|(host, _)| *host != self_host)
            .map(|(host, port)| (host.to_string(), *port))
            .collect();
        self.save(&peers)?;
        Ok(true)
    }

    fn io_error(&self, source: std::io::Error) -> PeerError {
        PeerError::PeerFile {
            path: self.path.display().to_string(),
            source,
        }
    }
}
