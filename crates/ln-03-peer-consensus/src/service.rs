//! # Peer Consensus Service
//!
//! Shared by every connection task and the maintenance loop. Each
//! structure sits behind its own lock and no two locks are held at once.
//!
//! | Structure | Lock | Mutated by |
//! |-----------|------|------------|
//! | warnings + ban list | `reputation` | `warn`, `unban`, resets |
//! | retry book | `tried` | `add_try`, `del_try`, `reset_tried` |
//! | opinions | `opinions` | `record_opinion`, `consensus_remove` |
//! | active pool | `pool` | `append_client`, `remove_client` |
//! | known peers | `known` | maintenance, `peersync` |

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use parking_lot::Mutex;
use rand::seq::SliceRandom;
use serde_json::Value;
use shared_types::{BlockHeight, TimeSource, Timestamp};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::adapters::{parse_peer_list, PeerFile};
use crate::config::{PeerConfig, BOOTSTRAP_PEERS};
use crate::domain::{
    address_class, host_port, OpinionMap, OpinionOutcome, PeerRecord, PeerStatus, Reputation,
    RetryBook, TickReport, TOO_OLD_MARGIN,
};
use crate::ports::PeerConnector;

/// Height lead over consensus that earns deviation warnings.
pub const DEVIATION_LIMIT: BlockHeight = 30;

/// Warning weight of one deviation.
pub const DEVIATION_WEIGHT: u32 = 10;

/// Opinions needed before deviation is judged.
pub const DEVIATION_MIN_OPINIONS: usize = 10;

/// Same-class connections allowed before a host is refused.
pub const MAX_SAME_CLASS: usize = 2;

/// Minimum time between full ban and retry resets (seconds).
pub const FULL_RESET_INTERVAL_SECS: f64 = 600.0;

#[derive(Debug, Default)]
struct Opinions {
    map: OpinionMap,
    last_percentage: f64,
}

/// Peer directory, reputation and chain-height consensus.
pub struct PeerConsensus {
    config: PeerConfig,
    connector: Arc<dyn PeerConnector>,
    clock: Arc<dyn TimeSource>,
    peer_file: PeerFile,
    suggested_file: PeerFile,
    reputation: Mutex<Reputation>,
    tried: Mutex<RetryBook>,
    opinions: Mutex<Opinions>,
    pool: Mutex<Vec<String>>,
    known: Mutex<BTreeMap<String, u16>>,
    versions: Mutex<HashMap<String, String>>,
    sessions: Arc<Semaphore>,
    peersync_lock: tokio::sync::Mutex<()>,
    started_at: Timestamp,
    reset_at: Mutex<Timestamp>,
}

impl PeerConsensus {
    pub fn new(
        config: PeerConfig,
        connector: Arc<dyn PeerConnector>,
        clock: Arc<dyn TimeSource>,
    ) -> Self {
        let peer_file = PeerFile::new(config.peer_file_path());
        let suggested_file = PeerFile::new(config.suggested_peer_file_path());
        if let Err(e) = suggested_file.seed(BOOTSTRAP_PEERS, &config.host) {
            warn!("[ln-03] Could not seed {}: {}", suggested_file.path().display(), e);
        }
        let now = clock.now();
        Self {
            reputation: Mutex::new(Reputation::new(config.ban_threshold, &config.banlist)),
            tried: Mutex::new(RetryBook::default()),
            opinions: Mutex::new(Opinions::default()),
            pool: Mutex::new(Vec::new()),
            known: Mutex::new(BTreeMap::new()),
            versions: Mutex::new(HashMap::new()),
            sessions: Arc::new(Semaphore::new(config.thread_limit)),
            peersync_lock: tokio::sync::Mutex::new(()),
            started_at: now,
            reset_at: Mutex::new(now),
            peer_file,
            suggested_file,
            connector,
            clock,
            config,
        }
    }

    pub fn config(&self) -> &PeerConfig {
        &self.config
    }

    fn uptime(&self) -> f64 {
        self.clock.now() - self.started_at
    }

    // =========================================================================
    // REPUTATION
    // =========================================================================

    /// Add `weight` warnings to `ip`. Returns true only on the call that bans it.
    ///
    /// Whitelisted peers are never warned.
    pub fn warn(&self, ip: &str, reason: &str, weight: u32) -> bool {
        if self.is_whitelisted(ip) {
            debug!("[ln-03] Not warning whitelisted {}: {}", ip, reason);
            return false;
        }
        let (count, banned) = self.reputation.lock().warn(ip, weight);
        warn!(
            "[ln-03] Added {} warning(s) to {}: {} ({} / {})",
            weight, ip, reason, count, self.config.ban_threshold
        );
        if banned {
            warn!("[ln-03] {} is banned: {}", ip, reason);
        }
        banned
    }

    /// Remove one warning from `ip`.
    pub fn unban(&self, ip: &str) -> bool {
        let removed = self.reputation.lock().unban(ip);
        if removed {
            warn!("[ln-03] Removed a warning for {}", ip);
        }
        removed
    }

    pub fn is_whitelisted(&self, ip: &str) -> bool {
        ip == "127.0.0.1" || self.config.whitelist.iter().any(|w| w == ip)
    }

    pub fn is_banned(&self, ip: &str) -> bool {
        self.reputation.lock().is_banned(ip)
    }

    fn reset_banlist(&self) {
        self.reputation.lock().reset(&self.config.banlist);
    }

    // =========================================================================
    // CONSENSUS
    // =========================================================================

    /// Store the height `ip` reports and recompute consensus.
    ///
    /// A peer we hold no opinion from is ignored when it reports more than
    /// 720 blocks below `last_accepted`. A peer leading consensus by more
    /// than 30 blocks, while more than half of over 10 opinions back that
    /// consensus, receives 10 warnings at once.
    pub fn record_opinion(
        &self,
        ip: &str,
        height: BlockHeight,
        last_accepted: BlockHeight,
    ) -> OpinionOutcome {
        let (consensus, percentage, deviates) = {
            let mut opinions = self.opinions.lock();
            if !opinions.map.contains(ip) && height < last_accepted - TOO_OLD_MARGIN {
                warn!("[ln-03] {} reported block too old ({}) for consensus", ip, height);
                return OpinionOutcome::Ignored;
            }
            debug!("[ln-03] Updating {} in consensus", ip);
            opinions.map.insert(ip, height);
            let consensus = opinions.map.consensus().unwrap_or(height);
            opinions.last_percentage = opinions.map.percentage(height);
            let backing = opinions.map.percentage(consensus);
            let deviates = height > consensus + DEVIATION_LIMIT
                && backing > 50.0
                && opinions.map.len() > DEVIATION_MIN_OPINIONS;
            (consensus, opinions.last_percentage, deviates)
        };

        if deviates {
            let reason = format!("Consensus deviation too high, {} at {} vs {}", ip, height, consensus);
            if self.warn(ip, &reason, DEVIATION_WEIGHT) {
                return OpinionOutcome::Banned;
            }
        }
        OpinionOutcome::Recorded {
            consensus,
            percentage,
        }
    }

    pub fn consensus_remove(&self, ip: &str) {
        if self.opinions.lock().map.remove(ip).is_some() {
            debug!("[ln-03] Removed {} from consensus", ip);
        }
    }

    /// Most commonly reported height.
    pub fn consensus(&self) -> Option<BlockHeight> {
        self.opinions.lock().map.consensus()
    }

    /// Agreement of the last reporting peer with the others, in percent.
    pub fn consensus_percentage(&self) -> f64 {
        self.opinions.lock().last_percentage
    }

    pub fn consensus_max(&self) -> Option<BlockHeight> {
        self.opinions.lock().map.max()
    }

    pub fn consensus_size(&self) -> usize {
        self.opinions.lock().map.len()
    }

    // =========================================================================
    // CONNECTIONS
    // =========================================================================

    /// Whether an outbound connection to `host:port` may be attempted now.
    pub fn can_connect(&self, host: &str, port: u16) -> bool {
        if self.is_banned(host) {
            return false;
        }
        let key = host_port(host, port);
        if self.pool.lock().contains(&key) {
            return false;
        }
        if self.tried.lock().is_waiting(&key, self.clock.now()) {
            return false;
        }
        if self.is_whitelisted(host) {
            return true;
        }
        let class = address_class(host);
        let same_class = self
            .pool
            .lock()
            .iter()
            .filter(|client| client.starts_with(&class))
            .count();
        if same_class >= MAX_SAME_CLASS {
            warn!(
                "[ln-03] Ignoring {} since we already have {} ips of that class in our pool",
                key, same_class
            );
            return false;
        }
        true
    }

    /// Register a live connection (`"host:port"`) and clear its backoff.
    pub fn append_client(&self, client: &str) {
        {
            let mut pool = self.pool.lock();
            if !pool.iter().any(|c| c == client) {
                pool.push(client.to_string());
            }
        }
        self.tried.lock().del_try(client);
    }

    pub fn remove_client(&self, client: &str) {
        let mut pool = self.pool.lock();
        if let Some(idx) = pool.iter().position(|c| c == client) {
            debug!("[ln-03] Will remove {} from active pool", client);
            pool.remove(idx);
        }
    }

    pub fn active_count(&self) -> usize {
        self.pool.lock().len()
    }

    /// Record an attempt on `host:port`; returns the delay until the next one.
    pub fn add_try(&self, host: &str, port: u16) -> f64 {
        let key = host_port(host, port);
        let delay = self.tried.lock().add_try(&key, self.clock.now());
        debug!("[ln-03] Set timeout {}s for {}", delay, key);
        delay
    }

    pub fn del_try(&self, host: &str, port: u16) {
        self.tried.lock().del_try(&host_port(host, port));
    }

    /// Drop backoff entries that would keep a peer away for more than 12 minutes.
    pub fn reset_tried(&self) -> usize {
        self.tried.lock().reset_tried(self.clock.now())
    }

    // =========================================================================
    // VERSIONS
    // =========================================================================

    pub fn store_version(&self, ip: &str, version: &str) {
        self.versions.lock().insert(ip.to_string(), version.to_string());
    }

    pub fn forget_version(&self, ip: &str) {
        self.versions.lock().remove(ip);
    }

    /// Unknown peers are allowed; known ones must use an allowed version.
    pub fn version_allowed(&self, ip: &str) -> bool {
        match self.versions.lock().get(ip) {
            Some(version) => self.config.version_allow.iter().any(|v| v == version),
            None => true,
        }
    }

    // =========================================================================
    // PEER LISTS
    // =========================================================================

    pub fn known_peers(&self) -> BTreeMap<String, u16> {
        self.known.lock().clone()
    }

    /// Merge a peer file into the known peers.
    pub fn merge_peer_file(&self, suggested: bool) -> usize {
        let file = if suggested { &self.suggested_file } else { &self.peer_file };
        match file.load() {
            Ok(peers) => {
                let mut known = self.known.lock();
                known.extend(peers);
                known.len()
            }
            Err(e) => {
                warn!("[ln-03] Error reading {}: {}", file.path().display(), e);
                self.known.lock().len()
            }
        }
    }

    /// Take in a peer list pushed by another node.
    ///
    /// New peers are kept when they accept a connection. Returns the number
    /// added, or `None` when we do not accept peers or another sync runs.
    pub async fn peersync(&self, received: &Value) -> Option<usize> {
        if !self.config.accept_peers {
            return None;
        }
        let Ok(_guard) = self.peersync_lock.try_lock() else {
            debug!("[ln-03] Peer sync occupied");
            return None;
        };
        let received = match parse_peer_list(received) {
            Ok(list) => list,
            Err(e) => {
                warn!("[ln-03] Ignoring peer list: {}", e);
                return Some(0);
            }
        };
        debug!("[ln-03] Received {} peers", received.len());

        let fresh: Vec<(String, u16)> = {
            let known = self.known.lock();
            received
                .into_iter()
                .filter(|(ip, _)| !known.contains_key(ip))
                .collect()
        };
        let reachable = self.probe_all(fresh, false).await;

        let mut known = self.known.lock();
        let added = reachable
            .into_iter()
            .filter(|(ip, port)| known.insert(ip.clone(), *port).is_none())
            .count();
        Some(added)
    }

    async fn probe_all(&self, candidates: Vec<(String, u16)>, strict: bool) -> Vec<(String, u16)> {
        let limit = Arc::new(Semaphore::new(self.config.probe_concurrency.max(1)));
        let wait = self.config.probe_timeout();
        let mut probes = JoinSet::new();
        for (host, port) in candidates {
            let connector = Arc::clone(&self.connector);
            let limit = Arc::clone(&limit);
            probes.spawn(async move {
                let _permit = limit.acquire_owned().await.ok()?;
                match timeout(wait, connector.probe(&host, port, strict)).await {
                    Ok(Ok(())) => Some((host, port)),
                    Ok(Err(e)) => {
                        debug!("[ln-03] Peer {}:{} not connectible ({})", host, port, e);
                        None
                    }
                    Err(_) => {
                        debug!("[ln-03] Peer {}:{} probe timed out", host, port);
                        None
                    }
                }
            });
        }
        let mut good = Vec::new();
        while let Some(joined) = probes.join_next().await {
            if let Ok(Some(peer)) = joined {
                good.push(peer);
            }
        }
        good
    }

    /// Probe known peers missing from `file` and save the reachable ones.
    async fn test_peers(&self, file: &PeerFile, strict: bool) -> usize {
        let mut on_disk = match file.load() {
            Ok(peers) => peers,
            Err(e) => {
                warn!("[ln-03] Error reading {}: {}", file.path().display(), e);
                return 0;
            }
        };
        let untested: Vec<(String, u16)> = self
            .known
            .lock()
            .iter()
            .filter(|(ip, _)| !on_disk.contains_key(*ip) && **ip != self.config.host)
            .map(|(ip, port)| (ip.clone(), *port))
            .collect();
        if untested.is_empty() {
            return 0;
        }

        let good = self.probe_all(untested, strict).await;
        if good.is_empty() {
            debug!("[ln-03] {} update skipped, no changes", file.path().display());
            return 0;
        }
        let saved = good.len();
        on_disk.extend(good);
        if let Err(e) = file.save(&on_disk) {
            warn!("[ln-03] Could not save {}: {}", file.path().display(), e);
            return 0;
        }
        debug!("[ln-03] {} updated ({} total)", file.path().display(), on_disk.len());
        saved
    }

    // =========================================================================
    // MAINTENANCE
    // =========================================================================

    /// One maintenance pass, run every 30 seconds.
    pub async fn maintenance_tick(self: &Arc<Self>) -> TickReport {
        let mut report = TickReport {
            dispatched: self.dispatch_sessions(),
            ..TickReport::default()
        };

        let uptime = self.uptime();
        if self.known.lock().len() < 6 && uptime > 30.0 {
            debug!("[ln-03] Not enough peers, joining in suggested peers");
            self.merge_peer_file(true);
        }

        let active = self.active_count();
        if active < self.config.nodes_ban_reset && uptime > 15.0 {
            info!("[ln-03] Only {} connections active, resetting banlist", active);
            self.reset_banlist();
            report.banlist_reset = true;
        }

        if active < 10 {
            let dropped = self.reset_tried();
            debug!("[ln-03] Only {} connections active, dropped {} retry timeouts", active, dropped);
        }

        let banned = self.reputation.lock().banned_count();
        let now = self.clock.now();
        let due = now - *self.reset_at.lock() > FULL_RESET_INTERVAL_SECS;
        if self.config.nodes_ban_reset <= banned && active <= banned && due {
            info!(
                "[ln-03] Less active connections ({}) than banlist ({}), resetting banlist and tried list",
                active, banned
            );
            self.reset_banlist();
            self.reset_tried();
            *self.reset_at.lock() = now;
            report.banlist_reset = true;
        }

        report.known = self.merge_peer_file(false);
        report.saved = self.test_peers(&self.suggested_file, false).await
            + self.test_peers(&self.peer_file, true).await;
        report
    }

    /// Start sessions with connectable known peers, in random order, while
    /// session slots remain.
    fn dispatch_sessions(self: &Arc<Self>) -> usize {
        let mut candidates: Vec<(String, u16)> = self
            .known
            .lock()
            .iter()
            .map(|(ip, port)| (ip.clone(), *port))
            .collect();
        candidates.shuffle(&mut rand::thread_rng());

        let mut dispatched = 0;
        for (host, port) in candidates {
            if host == self.config.host {
                debug!("[ln-03] Skip connecting to {}:{}", host, port);
                continue;
            }
            if !self.can_connect(&host, port) {
                continue;
            }
            let Ok(permit) = Arc::clone(&self.sessions).try_acquire_owned() else {
                debug!("[ln-03] Session limit {} reached", self.config.thread_limit);
                break;
            };
            self.add_try(&host, port);
            let peers = Arc::clone(self);
            let connector = Arc::clone(&self.connector);
            tokio::spawn(async move {
                let _permit = permit;
                if let Err(e) = connector.run_session(&host, port, peers).await {
                    debug!("[ln-03] Session with {}:{} ended: {}", host, port, e);
                }
            });
            dispatched += 1;
        }
        dispatched
    }

    // =========================================================================
    // STATUS
    // =========================================================================

    pub fn peer_record(&self, host: &str, port: u16) -> PeerRecord {
        let tried = self.tried.lock().get(&host_port(host, port));
        let (warnings, banned) = {
            let rep = self.reputation.lock();
            (rep.warnings(host), rep.is_banned(host))
        };
        PeerRecord {
            host: host.to_string(),
            port,
            tries: tried.map(|(t, _)| t).unwrap_or(0),
            next_retry: tried.map(|(_, next)| next),
            warnings,
            banned,
            opinion: self.opinions.lock().map.get(host),
        }
    }

    pub fn status(&self) -> PeerStatus {
        let (consensus, consensus_percentage, opinions) = {
            let o = self.opinions.lock();
            (o.map.consensus(), o.last_percentage, o.map.len())
        };
        PeerStatus {
            version: self.config.version.clone(),
            known: self.known.lock().len(),
            active: self.pool.lock().clone(),
            banned: self.reputation.lock().banned(),
            tried: self.tried.lock().len(),
            consensus,
            consensus_percentage,
            opinions,
        }
    }
}
