//! # Inbound Server
//!
//! Answers the commands other nodes send, each as a framed JSON string
//! followed by its argument frame:
//!
//! | Command | Argument | Reply |
//! |---------|----------|-------|
//! | `getversion` | none | our protocol version |
//! | `version` | peer version | `"ok"` or `"notok"` |
//! | `blockheight` | peer height | our height |
//! | `mempool` | wire transactions | transactions the peer lacks |
//! | `block` | wire block | digestion outcome |
//! | `peers` | `{ip: port}` | our known peers |
//!
//! Only `getversion` and `version` are answered before a successful
//! `version` handshake. A header timeout ends the connection.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use ln_03_peer_consensus::OpinionOutcome;
use ln_04_mempool::{wire_batch, AdmitOptions};
use ln_05_wire_codec::{receive, send, Frame, WireError};
use serde_json::{json, Value};
use shared_types::BlockHeight;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{watch, Semaphore};
use tracing::{debug, info, warn};

use crate::context::NodeContext;

type Result<T> = std::result::Result<T, WireError>;

pub struct InboundServer {
    ctx: NodeContext,
    listener: TcpListener,
    connections: Arc<Semaphore>,
}

impl InboundServer {
    /// Listen on `runtime.bind` and the configured peer port.
    pub async fn bind(ctx: NodeContext) -> anyhow::Result<Self> {
        let addr = format!("{}:{}", ctx.config.runtime.bind, ctx.config.peers.port);
        let listener = TcpListener::bind(&addr)
            .await
            .with_context(|| format!("Failed to listen on {}", addr))?;
        info!("[runtime] Listening for peers on {}", addr);
        let connections = Arc::new(Semaphore::new(ctx.config.peers.thread_limit));
        Ok(Self {
            ctx,
            listener,
            connections,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept connections until `shutdown` flips.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        loop {
            tokio::select! {
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, addr)) => self.dispatch(stream, addr),
                    Err(e) => warn!("[runtime] Accept failed: {}", e),
                },
                _ = shutdown.changed() => {
                    info!("[runtime] Inbound server stopping");
                    break;
                }
            }
        }
    }

    fn dispatch(&self, stream: TcpStream, addr: SocketAddr) {
        let ip = addr.ip().to_string();
        if self.ctx.peers.is_banned(&ip) {
            debug!("[runtime] Refusing banned {}", ip);
            return;
        }
        let Ok(permit) = Arc::clone(&self.connections).try_acquire_owned() else {
            warn!("[runtime] Too many inbound connections, dropping {}", addr);
            return;
        };
        let session = Session {
            ctx: self.ctx.clone(),
            ip,
            client: addr.to_string(),
            joined: false,
        };
        tokio::spawn(async move {
            session.serve(stream).await;
            drop(permit);
        });
    }
}

/// One inbound connection.
struct Session {
    ctx: NodeContext,
    ip: String,
    client: String,
    joined: bool,
}

impl Session {
    async fn serve(mut self, mut stream: TcpStream) {
        let outcome = self.commands(&mut stream).await;
        if self.joined {
            self.ctx.peers.remove_client(&self.client);
            self.ctx.peers.consensus_remove(&self.ip);
        }
        self.ctx.peers.forget_version(&self.ip);
        if let Err(e) = outcome {
            debug!("[runtime] Connection from {} ended: {}", self.client, e);
        }
    }

    async fn commands(&mut self, stream: &mut TcpStream) -> Result<()> {
        loop {
            let command = match receive(stream, &self.ctx.config.wire).await? {
                Frame::Timeout => {
                    debug!("[runtime] {} went quiet", self.client);
                    return Ok(());
                }
                Frame::Payload(Value::String(command)) => command,
                Frame::Payload(other) => {
                    self.misbehaving(&format!("Non-string command {}", other));
                    return Ok(());
                }
            };

            match command.as_str() {
                "getversion" => send(stream, &self.ctx.config.peers.version).await?,
                "version" => {
                    if !self.handshake(stream).await? {
                        return Ok(());
                    }
                }
                _ if !self.joined => {
                    self.misbehaving(&format!("Command {} before handshake", command));
                    return Ok(());
                }
                "blockheight" => {
                    if !self.blockheight(stream).await? {
                        return Ok(());
                    }
                }
                "mempool" => self.mempool(stream).await?,
                "block" => self.block(stream).await?,
                "peers" => self.peers(stream).await?,
                other => {
                    self.misbehaving(&format!("Unknown command {}", other));
                    return Ok(());
                }
            }
        }
    }

    /// Argument frame of a command; `None` when the peer stalls.
    async fn argument(&self, stream: &mut TcpStream) -> Result<Option<Value>> {
        Ok(match receive(stream, &self.ctx.config.wire).await? {
            Frame::Payload(value) => Some(value),
            Frame::Timeout => None,
        })
    }

    fn misbehaving(&self, reason: &str) {
        self.ctx.peers.warn(&self.ip, reason, 1);
    }

    async fn handshake(&mut self, stream: &mut TcpStream) -> Result<bool> {
        let version = self
            .argument(stream)
            .await?
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_default();
        self.ctx.peers.store_version(&self.ip, &version);
        if !self.ctx.peers.version_allowed(&self.ip) {
            warn!("[runtime] Protocol version mismatch: {} from {}", version, self.client);
            send(stream, "notok").await?;
            return Ok(false);
        }
        send(stream, "ok").await?;
        self.ctx.peers.append_client(&self.client);
        self.joined = true;
        debug!("[runtime] {} joined with {}", self.client, version);
        Ok(true)
    }

    async fn blockheight(&self, stream: &mut TcpStream) -> Result<bool> {
        let Some(height) = self.argument(stream).await?.as_ref().and_then(parse_height) else {
            self.misbehaving("Unreadable block height");
            return Ok(false);
        };
        let ours = self.ctx.local_height();
        if self.ctx.peers.record_opinion(&self.ip, height, ours) == OpinionOutcome::Banned {
            return Ok(false);
        }
        send(stream, &ours).await?;
        Ok(true)
    }

    async fn mempool(&self, stream: &mut TcpStream) -> Result<()> {
        let batch = self.argument(stream).await?.unwrap_or(Value::Null);
        let ctx = self.ctx.clone();
        let ip = self.ip.clone();
        let client = self.client.clone();
        // admission may wait on the digestion lock and retry storage writes
        let reply = tokio::task::spawn_blocking(move || merge_and_select(&ctx, &ip, &client, &batch))
            .await
            .unwrap_or_else(|e| {
                warn!("[runtime] Mempool merge for {} failed: {}", self.client, e);
                json!([])
            });
        send(stream, &reply).await
    }

    async fn block(&self, stream: &mut TcpStream) -> Result<()> {
        let Some(block) = self.argument(stream).await? else {
            return Ok(());
        };
        let ctx = self.ctx.clone();
        let outcome = tokio::task::spawn_blocking(move || ctx.digester().digest_wire(&block)).await;
        let reply = match outcome {
            Ok(Ok(report)) => format!("Block {} accepted", report.height),
            Ok(Err(e)) => e.to_string(),
            Err(e) => format!("Digestion failed: {}", e),
        };
        send(stream, &reply).await
    }

    async fn peers(&self, stream: &mut TcpStream) -> Result<()> {
        if let Some(list) = self.argument(stream).await? {
            if let Some(added) = self.ctx.peers.peersync(&list).await {
                debug!("[runtime] {} new peer(s) from {}", added, self.client);
            }
        }
        send(stream, &self.ctx.peers.known_peers()).await
    }
}

/// Admit a relayed batch, then pick the transactions to send back.
fn merge_and_select(ctx: &NodeContext, ip: &str, client: &str, batch: &Value) -> Value {
    let outcomes = ctx.mempool.admit(ip, batch, AdmitOptions::RELAY);
    debug!("[runtime] Mempool from {}: {:?}", client, outcomes);

    if !ctx.mempool.sendable(ip) {
        return json!([]);
    }
    match ctx.mempool.tx_to_send(ip, &signatures_in(batch)) {
        Ok(txs) => {
            ctx.mempool.sent(ip);
            wire_batch(&txs)
        }
        Err(e) => {
            warn!("[runtime] Could not select mempool for {}: {}", client, e);
            json!([])
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

/// Signatures of a wire batch, to leave out of the reply.
fn signatures_in(batch: &Value) -> Vec<String> {
    let Some(items) = batch.as_array() else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|tx| tx.get(4).and_then(Value::as_str).map(str::to_string))
        .collect()
}
