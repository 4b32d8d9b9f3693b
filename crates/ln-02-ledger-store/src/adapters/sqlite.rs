//! # SQLite Tier Plumbing
//!
//! Schema, connection setup and row mapping shared by every ledger tier.
//! Amounts are stored as their 8-decimal text form so that no value ever
//! passes through floating point on its way in or out.

use std::path::Path;
use std::time::Duration;

use rusqlite::types::Type;
use rusqlite::{params, Connection, Params, Row};
use shared_types::{Amount, BlockHeight, LedgerRow};

use crate::domain::StorageError;

/// Schema of the ledger, hyper and RAM tiers.
pub const LEDGER_SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS transactions (
        block_height INTEGER,
        timestamp NUMERIC,
        address TEXT,
        recipient TEXT,
        amount TEXT,
        signature TEXT,
        public_key TEXT,
        block_hash TEXT,
        fee TEXT,
        reward TEXT,
        operation TEXT,
        openfield TEXT
    );
    CREATE TABLE IF NOT EXISTS misc (
        block_height INTEGER,
        difficulty REAL
    );
    CREATE INDEX IF NOT EXISTS idx_tx_timestamp ON transactions(timestamp);
    CREATE INDEX IF NOT EXISTS idx_tx_signature_prefix ON transactions(substr(signature, 1, 4));
    CREATE INDEX IF NOT EXISTS idx_tx_reward ON transactions(reward);
    CREATE INDEX IF NOT EXISTS idx_tx_recipient ON transactions(recipient);
    CREATE INDEX IF NOT EXISTS idx_tx_openfield ON transactions(openfield);
    CREATE INDEX IF NOT EXISTS idx_tx_fee ON transactions(fee);
    CREATE INDEX IF NOT EXISTS idx_tx_block_height ON transactions(block_height);
    CREATE INDEX IF NOT EXISTS idx_tx_block_hash ON transactions(block_hash);
    CREATE INDEX IF NOT EXISTS idx_tx_amount ON transactions(amount);
    CREATE INDEX IF NOT EXISTS idx_tx_address ON transactions(address);
    CREATE INDEX IF NOT EXISTS idx_tx_operation ON transactions(operation);
    CREATE INDEX IF NOT EXISTS idx_misc_block_height ON misc(block_height);
";

/// Column list in storage order.
pub const ROW_COLUMNS: &str = "block_height, timestamp, address, recipient, amount, signature, \
                               public_key, block_hash, fee, reward, operation, openfield";

const BUSY_TIMEOUT: Duration = Duration::from_secs(1);

/// Open (creating if needed) a tier stored in a file.
pub fn open_file(path: &Path, schema: &str) -> Result<Connection, StorageError> {
    let conn = Connection::open(path)?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get::<_, String>(0))?;
    prepare(&conn, schema)?;
    Ok(conn)
}

/// Open a connection to a named shared-cache in-memory database.
///
/// The database lives as long as at least one connection to `name` is open.
pub fn open_shared_memory(name: &str, schema: &str) -> Result<Connection, StorageError> {
    let uri = format!("file:{}?mode=memory&cache=shared", name);
    let conn = Connection::open(uri)?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    prepare(&conn, schema)?;
    Ok(conn)
}

fn prepare(conn: &Connection, schema: &str) -> Result<(), StorageError> {
    conn.pragma_update(None, "case_sensitive_like", true)?;
    conn.execute_batch(schema)?;
    Ok(())
}

/// Insert one ledger row.
pub fn insert_row(conn: &Connection, row: &LedgerRow) -> Result<(), StorageError> {
    conn.prepare_cached(&format!(
        "INSERT INTO transactions ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        ROW_COLUMNS
    ))?
    .execute(params![
        row.block_height,
        row.timestamp,
        row.address,
        row.recipient,
        row.amount.to_string(),
        row.signature,
        row.public_key,
        row.block_hash,
        row.fee.to_string(),
        row.reward.to_string(),
        row.operation,
        row.openfield,
    ])?;
    Ok(())
}

/// Insert one difficulty row.
pub fn insert_difficulty(
    conn: &Connection,
    block_height: BlockHeight,
    difficulty: f64,
) -> Result<(), StorageError> {
    conn.prepare_cached("INSERT INTO misc (block_height, difficulty) VALUES (?1, ?2)")?
        .execute(params![block_height, difficulty])?;
    Ok(())
}

/// Map a row selected with [`ROW_COLUMNS`].
pub fn read_row(row: &Row<'_>) -> rusqlite::Result<LedgerRow> {
    Ok(LedgerRow {
        block_height: row.get(0)?,
        timestamp: row.get(1)?,
        address: row.get(2)?,
        recipient: row.get(3)?,
        amount: read_amount(row, 4)?,
        signature: row.get(5)?,
        public_key: row.get(6)?,
        block_hash: row.get(7)?,
        fee: read_amount(row, 8)?,
        reward: read_amount(row, 9)?,
        operation: row.get(10)?,
        openfield: row.get(11)?,
    })
}

/// Read an amount column.
pub fn read_amount(row: &Row<'_>, idx: usize) -> rusqlite::Result<Amount> {
    let raw: String = row.get(idx)?;
    raw.parse::<Amount>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Run a query selecting [`ROW_COLUMNS`].
pub fn query_rows<P: Params>(
    conn: &Connection,
    sql: &str,
    params: P,
) -> Result<Vec<LedgerRow>, StorageError> {
    let mut stmt = conn.prepare_cached(sql)?;
    let rows = stmt.query_map(params, read_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

/// Sum an amount column over the rows selected by `sql`.
pub fn sum_amounts<P: Params>(conn: &Connection, sql: &str, params: P) -> Result<Amount, StorageError> {
    let mut stmt = conn.prepare_cached(sql)?;
    let rows = stmt.query_map(params, |row| Ok(read_amount(row, 0)? + read_amount(row, 1)?))?;
    let mut total = Amount::ZERO;
    for amount in rows {
        total += amount?;
    }
    Ok(total)
}
