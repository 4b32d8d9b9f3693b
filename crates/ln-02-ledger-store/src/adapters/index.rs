//! # Alias and Token Index
//!
//! Secondary lookups derived from ledger rows, kept in `index.db`. The
//! index holds nothing that cannot be rebuilt by replaying the ledger.
//!
//! | Trigger | Effect |
//! |---------|--------|
//! | openfield `alias=<name>` | registers `<name>` for the sender; first registration wins |
//! | operation `token:issue`, openfield `<name>:<total>` | creates the token, credited to the recipient; names are unique |
//! | operation `token:transfer`, openfield `<name>:<amount>` | moves tokens if the sender holds enough |

use std::path::Path;

use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use shared_types::{BlockHeight, LedgerRow, ALIAS_PREFIX, TOKEN_ISSUE_OPERATION};
use tracing::{debug, info, warn};

use crate::adapters::sqlite;
use crate::domain::{RetryPolicy, StorageError};

/// Operation tag of a token transfer.
pub const TOKEN_TRANSFER_OPERATION: &str = "token:transfer";

/// Sender recorded on issuance rows.
pub const ISSUED_MARKER: &str = "issued";

const TXID_LEN: usize = 56;

/// Schema of `index.db`.
pub const INDEX_SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS aliases (
        block_height INTEGER,
        address TEXT,
        alias TEXT
    );
    CREATE TABLE IF NOT EXISTS tokens (
        block_height INTEGER,
        timestamp NUMERIC,
        token TEXT,
        address TEXT,
        recipient TEXT,
        txid TEXT,
        amount INTEGER
    );
    CREATE INDEX IF NOT EXISTS idx_aliases_address ON aliases(address);
    CREATE INDEX IF NOT EXISTS idx_aliases_alias ON aliases(alias);
    CREATE INDEX IF NOT EXISTS idx_tokens_token ON tokens(token);
    CREATE INDEX IF NOT EXISTS idx_tokens_txid ON tokens(txid);
";

/// Counts of index entries written by one update.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexUpdate {
    pub aliases: usize,
    pub issues: usize,
    pub transfers: usize,
}

/// The alias/token index.
pub struct IndexStore {
    conn: Mutex<Connection>,
    retry: RetryPolicy,
}

impl IndexStore {
    pub fn open(path: &Path, retry: RetryPolicy) -> Result<Self, StorageError> {
        let conn = sqlite::open_file(path, INDEX_SCHEMA)?;
        Ok(Self::from_connection(conn, retry))
    }

    pub fn from_connection(conn: Connection, retry: RetryPolicy) -> Self {
        Self {
            conn: Mutex::new(conn),
            retry,
        }
    }

    /// Index the rows of newly digested blocks, in height order.
    pub fn update(&self, rows: &[LedgerRow]) -> Result<IndexUpdate, StorageError> {
        let mut update = IndexUpdate::default();
        for row in rows.iter().filter(|r| r.block_height > 0 && !r.is_reward()) {
            if let Some(alias) = row.openfield.strip_prefix(ALIAS_PREFIX) {
                if self.register_alias(row, alias)? {
                    update.aliases += 1;
                }
            }
            if row.operation == TOKEN_ISSUE_OPERATION {
                if self.issue_token(row)? {
                    update.issues += 1;
                }
            } else if row.operation == TOKEN_TRANSFER_OPERATION && self.transfer_token(row)? {
                update.transfers += 1;
            }
        }
        if update != IndexUpdate::default() {
            debug!("[ln-02] Index updated: {:?}", update);
        }
        Ok(update)
    }

    /// Drop everything and replay `rows`.
    pub fn rebuild(&self, rows: &[LedgerRow]) -> Result<IndexUpdate, StorageError> {
        self.retry.run("index_clear", || {
            let conn = self.conn.lock();
            conn.execute_batch("DELETE FROM aliases; DELETE FROM tokens;")?;
            Ok(())
        })?;
        info!("[ln-02] Rebuilding index from {} ledger rows", rows.len());
        self.update(rows)
    }

    /// Remove index entries at or above `height`.
    pub fn rollback(&self, height: BlockHeight) -> Result<(), StorageError> {
        self.retry.run("index_rollback", || {
            let conn = self.conn.lock();
            conn.execute("DELETE FROM aliases WHERE block_height >= ?1", [height])?;
            conn.execute("DELETE FROM tokens WHERE block_height >= ?1", [height])?;
            Ok(())
        })?;
        warn!("[ln-02] Rolled back the alias and token index below {}", height);
        Ok(())
    }

    fn register_alias(&self, row: &LedgerRow, alias: &str) -> Result<bool, StorageError> {
        let alias = alias.trim();
        if alias.is_empty() {
            return Ok(false);
        }
        self.retry.run("alias_register", || {
            let conn = self.conn.lock();
            let taken: Option<i64> = conn
                .query_row("SELECT 1 FROM aliases WHERE alias = ?1 LIMIT 1", [alias], |r| r.get(0))
                .optional()?;
            if taken.is_some() {
                debug!("[ln-02] Alias {} already registered", alias);
                return Ok(false);
            }
            conn.execute(
                "INSERT INTO aliases (block_height, address, alias) VALUES (?1, ?2, ?3)",
                params![row.block_height, row.address, alias],
            )?;
            Ok(true)
        })
    }

    fn issue_token(&self, row: &LedgerRow) -> Result<bool, StorageError> {
        let Some((name, total)) = parse_token_field(&row.openfield) else {
            warn!("[ln-02] Unparsable token issuance {:?}", row.openfield);
            return Ok(false);
        };
        self.retry.run("token_issue", || {
            let conn = self.conn.lock();
            let exists: Option<i64> = conn
                .query_row("SELECT 1 FROM tokens WHERE token = ?1 LIMIT 1", [&name], |r| r.get(0))
                .optional()?;
            if exists.is_some() {
                debug!("[ln-02] Token issuance already processed: {}", name);
                return Ok(false);
            }
            conn.execute(
                "INSERT INTO tokens (block_height, timestamp, token, address, recipient, txid, amount)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    row.block_height,
                    row.timestamp,
                    name,
                    ISSUED_MARKER,
                    row.recipient,
                    txid(&row.signature),
                    total
                ],
            )?;
            info!("[ln-02] Token {} issued to {} ({})", name, row.recipient, total);
            Ok(true)
        })
    }

    fn transfer_token(&self, row: &LedgerRow) -> Result<bool, StorageError> {
        let Some((name, amount)) = parse_token_field(&row.openfield) else {
            return Ok(false);
        };
        let id = txid(&row.signature);
        self.retry.run("token_transfer", || {
            let conn = self.conn.lock();
            let seen: Option<i64> = conn
                .query_row("SELECT 1 FROM tokens WHERE txid = ?1 LIMIT 1", [id], |r| r.get(0))
                .optional()?;
            if seen.is_some() {
                return Ok(false);
            }
            let held = balance_of(&conn, &row.address, &name)?;
            if amount <= 0 || held < amount {
                warn!(
                    "[ln-02] Invalid token transfer by {}: holds {} {}, sends {}",
                    row.address, held, name, amount
                );
                return Ok(false);
            }
            conn.execute(
                "INSERT INTO tokens (block_height, timestamp, token, address, recipient, txid, amount)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![row.block_height, row.timestamp, name, row.address, row.recipient, id, amount],
            )?;
            Ok(true)
        })
    }

    /// First alias registered by `address`.
    pub fn alias_for(&self, address: &str) -> Result<Option<String>, StorageError> {
        self.retry.run("alias_for", || {
            let conn = self.conn.lock();
            Ok(conn
                .query_row(
                    "SELECT alias FROM aliases WHERE address = ?1 ORDER BY block_height ASC LIMIT 1",
                    [address],
                    |r| r.get(0),
                )
                .optional()?)
        })
    }

    /// Address that owns `alias`.
    pub fn address_for_alias(&self, alias: &str) -> Result<Option<String>, StorageError> {
        self.retry.run("address_for_alias", || {
            let conn = self.conn.lock();
            Ok(conn
                .query_row(
                    "SELECT address FROM aliases WHERE alias = ?1 ORDER BY block_height ASC LIMIT 1",
                    [alias],
                    |r| r.get(0),
                )
                .optional()?)
        })
    }

    /// Token units held by `address`.
    pub fn token_balance(&self, address: &str, token: &str) -> Result<i64, StorageError> {
        self.retry.run("token_balance", || {
            let conn = self.conn.lock();
            balance_of(&conn, address, token)
        })
    }

    /// Tokens `address` ever sent or received.
    pub fn tokens_for(&self, address: &str) -> Result<Vec<String>, StorageError> {
        self.retry.run("tokens_for", || {
            let conn = self.conn.lock();
            let mut stmt = conn.prepare_cached(
                "SELECT DISTINCT token FROM tokens WHERE address = ?1 OR recipient = ?1 ORDER BY token",
            )?;
            let tokens = stmt.query_map([address], |r| r.get(0))?;
            Ok(tokens.collect::<rusqlite::Result<Vec<String>>>()?)
        })
    }
}

fn balance_of(conn: &Connection, address: &str, token: &str) -> Result<i64, StorageError> {
    let credit: i64 = conn.query_row(
        "SELECT COALESCE(SUM(amount), 0) FROM tokens WHERE recipient = ?1 AND token = ?2",
        [address, token],
        |r| r.get(0),
    )?;
    let debit: i64 = conn.query_row(
        "SELECT COALESCE(SUM(amount), 0) FROM tokens WHERE address = ?1 AND token = ?2",
        [address, token],
        |r| r.get(0),
    )?;
    Ok(credit - debit)
}

/// Split `name:amount`; names are case-insensitive.
fn parse_token_field(openfield: &str) -> Option<(String, i64)> {
    let (name, amount) = openfield.split_once(':')?;
    let name = name.trim().to_lowercase();
    if name.is_empty() {
        return None;
    }
    Some((name, amount.trim().parse().ok()?))
}

fn txid(signature: &str) -> &str {
    match signature.char_indices().nth(TXID_LEN) {
        Some((idx, _)) => &signature[..idx],
        None => signature,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::Amount;

    fn store() -> IndexStore {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(INDEX_SCHEMA).unwrap();
        IndexStore::from_connection(conn, RetryPolicy::default())
    }

    fn tx(height: BlockHeight, from: &str, to: &str, op: &str, openfield: &str, sig: &str) -> LedgerRow {
        LedgerRow {
            block_height: height,
            timestamp: 1000.0 + height as f64,
            address: from.into(),
            recipient: to.into(),
            amount: Amount::ZERO,
            signature: sig.into(),
            public_key: "pk".into(),
            block_hash: format!("hash{}", height),
            fee: Amount::ZERO,
            reward: Amount::ZERO,
            operation: op.into(),
            openfield: openfield.into(),
        }
    }

    // =========================================================================
    // ALIASES
    // =========================================================================

    #[test]
    fn test_first_alias_registration_wins() {
        let index = store();
        index
            .update(&[
                tx(1, "alice", "alice", "0", "alias=boss", "s1"),
                tx(2, "bob", "bob", "0", "alias=boss", "s2"),
            ])
            .unwrap();
        assert_eq!(index.address_for_alias("boss").unwrap().as_deref(), Some("alice"));
        assert_eq!(index.alias_for("alice").unwrap().as_deref(), Some("boss"));
        assert_eq!(index.alias_for("bob").unwrap(), None);
    }

    #[test]
    fn test_alias_rollback_frees_name() {
        let index = store();
        index.update(&[tx(5, "alice", "alice", "0", "alias=boss", "s1")]).unwrap();
        index.rollback(5).unwrap();
        assert_eq!(index.address_for_alias("boss").unwrap(), None);
    }

    // =========================================================================
    // TOKENS
    // =========================================================================

    #[test]
    fn test_issue_and_transfer() {
        let index = store();
        let update = index
            .update(&[
                tx(1, "alice", "alice", "token:issue", "Gold:1000", "s1"),
                tx(2, "alice", "bob", "token:transfer", "gold:250", "s2"),
            ])
            .unwrap();
        assert_eq!(update, IndexUpdate { aliases: 0, issues: 1, transfers: 1 });
        assert_eq!(index.token_balance("alice", "gold").unwrap(), 750);
        assert_eq!(index.token_balance("bob", "gold").unwrap(), 250);
        assert_eq!(index.tokens_for("bob").unwrap(), vec!["gold".to_string()]);
    }

    #[test]
    fn test_token_name_is_unique() {
        let index = store();
        let update = index
            .update(&[
                tx(1, "alice", "alice", "token:issue", "gold:10", "s1"),
                tx(2, "bob", "bob", "token:issue", "gold:99", "s2"),
            ])
            .unwrap();
        assert_eq!(update.issues, 1);
        assert_eq!(index.token_balance("bob", "gold").unwrap(), 0);
    }

    #[test]
    fn test_overdrawn_transfer_is_ignored() {
        let index = store();
        index.update(&[tx(1, "alice", "alice", "token:issue", "gold:10", "s1")]).unwrap();
        let update = index
            .update(&[
                tx(2, "alice", "bob", "token:transfer", "gold:11", "s2"),
                tx(3, "bob", "carol", "token:transfer", "gold:1", "s3"),
                tx(4, "alice", "bob", "token:transfer", "gold:-5", "s4"),
            ])
            .unwrap();
        assert_eq!(update.transfers, 0);
        assert_eq!(index.token_balance("alice", "gold").unwrap(), 10);
    }

    #[test]
    fn test_replayed_transfer_counted_once() {
        let index = store();
        let rows = [
            tx(1, "alice", "alice", "token:issue", "gold:10", "s1"),
            tx(2, "alice", "bob", "token:transfer", "gold:4", "s2"),
        ];
        index.update(&rows).unwrap();
        index.update(&rows[1..]).unwrap();
        assert_eq!(index.token_balance("bob", "gold").unwrap(), 4);

        index.rebuild(&rows).unwrap();
        assert_eq!(index.token_balance("bob", "gold").unwrap(), 4);
    }

    #[test]
    fn test_parse_token_field() {
        assert_eq!(parse_token_field(" Gold :12"), Some(("gold".into(), 12)));
        assert_eq!(parse_token_field("gold"), None);
        assert_eq!(parse_token_field("gold:many"), None);
        assert_eq!(parse_token_field(":5"), None);
    }
}
