//! # SQLite Pending Table
//!
//! Pending transactions live in a single `transactions` table with the
//! eight wire fields plus `mergedts`, the time the row was merged. That
//! column drives relay: a peer is sent what was merged since it was last
//! served. Amounts are kept as 8-decimal text.

use std::time::Duration;

use parking_lot::Mutex;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Params, Row};
use shared_types::{Amount, FeeSchedule, Timestamp, Transaction};

use crate::config::MempoolConfig;
use crate::domain::Result;

pub const MEMPOOL_SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS transactions (
        timestamp NUMERIC,
        address TEXT,
        recipient TEXT,
        amount TEXT,
        signature TEXT,
        public_key TEXT,
        operation TEXT,
        openfield TEXT,
        mergedts REAL NOT NULL DEFAULT (strftime('%s', 'now'))
    );
    CREATE UNIQUE INDEX IF NOT EXISTS idx_pending_signature ON transactions(signature);
    CREATE INDEX IF NOT EXISTS idx_pending_signature_prefix ON transactions(substr(signature, 1, 4));
    CREATE INDEX IF NOT EXISTS idx_pending_address ON transactions(address);
    CREATE INDEX IF NOT EXISTS idx_pending_mergedts ON transactions(mergedts);
";

const TX_COLUMNS: &str =
    "timestamp, address, recipient, amount, signature, public_key, operation, openfield";

const BUSY_TIMEOUT: Duration = Duration::from_secs(1);

/// Aggregate counters over the pending table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PendingStats {
    pub transactions: usize,
    pub openfield_bytes: usize,
    pub senders: usize,
    pub recipients: usize,
}

/// The pending transaction table.
pub struct PendingStore {
    conn: Mutex<Connection>,
}

impl PendingStore {
    /// Open the in-memory or on-disk table, per `config.ram`.
    pub fn open(config: &MempoolConfig) -> Result<Self> {
        let conn = if config.ram {
            Connection::open_in_memory()?
        } else {
            let conn = Connection::open(&config.path)?;
            conn.busy_timeout(BUSY_TIMEOUT)?;
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| {
                row.get::<_, String>(0)
            })?;
            conn
        };
        conn.execute_batch(MEMPOOL_SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn contains(&self, signature: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let found = conn
            .prepare_cached(
                "SELECT 1 FROM transactions \
                 WHERE substr(signature, 1, 4) = substr(?1, 1, 4) AND signature = ?1",
            )?
            .query_row([signature], |_| Ok(()))
            .optional()?;
        Ok(found.is_some())
    }

    pub fn insert(&self, tx: &Transaction, merged_at: Timestamp) -> Result<()> {
        let conn = self.conn.lock();
        conn.prepare_cached(&format!(
            "INSERT INTO transactions ({}, mergedts) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            TX_COLUMNS
        ))?
        .execute(params![
            tx.timestamp,
            tx.address,
            tx.recipient,
            tx.amount.to_string(),
            tx.signature,
            tx.public_key,
            tx.operation,
            tx.openfield,
            merged_at,
        ])?;
        Ok(())
    }

    /// Delete by signature; returns rows removed.
    pub fn delete(&self, signature: &str) -> Result<usize> {
        let conn = self.conn.lock();
        let removed = conn
            .prepare_cached(
                "DELETE FROM transactions \
                 WHERE substr(signature, 1, 4) = substr(?1, 1, 4) AND signature = ?1",
            )?
            .execute([signature])?;
        Ok(removed)
    }

    /// Amount plus fee of every pending debit of `address` younger than `since`.
    pub fn pending_debits(&self, address: &str, since: Timestamp, fees: &FeeSchedule) -> Result<Amount> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(
            "SELECT amount, openfield, operation FROM transactions WHERE address = ?1 AND timestamp > ?2",
        )?;
        let rows = stmt.query_map(params![address, since], |row| {
            let amount = read_amount(row, 0)?;
            let openfield: String = row.get(1)?;
            let operation: String = row.get(2)?;
            Ok(amount + fees.fee(&openfield, &operation))
        })?;
        let mut total = Amount::ZERO;
        for debit in rows {
            total += debit?;
        }
        Ok(total)
    }

    /// Pending transactions, largest amount first; only those merged after
    /// `merged_after` when given.
    pub fn select_for_relay(&self, merged_after: Option<Timestamp>) -> Result<Vec<Transaction>> {
        match merged_after {
            None => self.query(
                &format!(
                    "SELECT {} FROM transactions ORDER BY CAST(amount AS REAL) DESC",
                    TX_COLUMNS
                ),
                [],
            ),
            Some(after) => self.query(
                &format!(
                    "SELECT {} FROM transactions WHERE mergedts > ?1 ORDER BY CAST(amount AS REAL) DESC",
                    TX_COLUMNS
                ),
                [after],
            ),
        }
    }

    /// Pending transactions younger than `since`, oldest first.
    pub fn younger_than(&self, since: Timestamp) -> Result<Vec<Transaction>> {
        self.query(
            &format!(
                "SELECT {} FROM transactions WHERE timestamp > ?1 ORDER BY timestamp",
                TX_COLUMNS
            ),
            [since],
        )
    }

    /// Delete transactions timestamped at or before `cutoff`.
    pub fn purge(&self, cutoff: Timestamp) -> Result<usize> {
        let conn = self.conn.lock();
        let removed = conn
            .prepare_cached("DELETE FROM transactions WHERE timestamp <= ?1")?
            .execute([cutoff])?;
        Ok(removed)
    }

    pub fn clear(&self) -> Result<usize> {
        let conn = self.conn.lock();
        Ok(conn.execute("DELETE FROM transactions", [])?)
    }

    pub fn count(&self) -> Result<usize> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM transactions", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    pub fn stats(&self) -> Result<PendingStats> {
        let conn = self.conn.lock();
        let stats = conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(LENGTH(CAST(openfield AS BLOB))), 0), \
             COUNT(DISTINCT address), COUNT(DISTINCT recipient) FROM transactions",
            [],
            |row| {
                Ok(PendingStats {
                    transactions: row.get::<_, i64>(0)? as usize,
                    openfield_bytes: row.get::<_, i64>(1)? as usize,
                    senders: row.get::<_, i64>(2)? as usize,
                    recipients: row.get::<_, i64>(3)? as usize,
                })
            },
        )?;
        Ok(stats)
    }

    fn query<P: Params>(&self, sql: &str, params: P) -> Result<Vec<Transaction>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(sql)?;
        let rows = stmt.query_map(params, read_tx)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }
}

fn read_tx(row: &Row<'_>) -> rusqlite::Result<Transaction> {
    Ok(Transaction {
        timestamp: row.get(0)?,
        address: row.get(1)?,
        recipient: row.get(2)?,
        amount: read_amount(row, 3)?,
        signature: row.get(4)?,
        public_key: row.get(5)?,
        operation: row.get(6)?,
        openfield: row.get(7)?,
    })
}

fn read_amount(row: &Row<'_>, idx: usize) -> rusqlite::Result<Amount> {
    let raw: String = row.get(idx)?;
    raw.parse::<Amount>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}
