//! # Ledger Store Service
//!
//! ## Tiers
//!
//! ```text
//!             append_block                 flush_to_disk
//! digester ───────────────→ working tier ─────────────────→ ledger.db (full)
//!                           (RAM or hyper)    └───────────→ hyper.db  (RAM mode only)
//!                                 ↑
//!                      reader connection (balances, queries)
//! ```
//!
//! All writers go through one lock over the tier connections. Readers use
//! a separate connection to the working tier so balance lookups during
//! admission do not queue behind a flush.
//!
//! ## Hyper compression
//!
//! Blocks more than `hyper_window` below the watermark are folded, in the
//! hyper tier only, into one `Hyperblock` row per address holding its
//! balance at the cutoff. Sync, signature and hash lookups that reach below
//! the cutoff are answered from `ledger.db`.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering};

use parking_lot::Mutex;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use shared_types::{Amount, BlockHeight, DifficultyRecord, LedgerRow, Transaction};
use tracing::{debug, info, warn};

use crate::adapters::sqlite::{self, LEDGER_SCHEMA, ROW_COLUMNS};
use crate::adapters::IndexStore;
use crate::config::LedgerConfig;
use crate::domain::{
    BalanceBatch, FlushReport, LastBlock, RetryPolicy, StorageError, Tier, TxFilter,
};

type Result<T> = std::result::Result<T, StorageError>;

/// Counterparty of the balance rows written by hyper compression.
pub const HYPERBLOCK_ADDRESS: &str = "Hyperblock";

struct Tiers {
    ledger: Connection,
    hyper: Connection,
    ram: Option<Connection>,
}

impl Tiers {
    fn working(&self) -> &Connection {
        self.ram.as_ref().unwrap_or(&self.hyper)
    }

    /// Tiers that receive flushed rows.
    fn flush_targets(&self) -> Vec<&Connection> {
        match self.ram {
            Some(_) => vec![&self.ledger, &self.hyper],
            None => vec![&self.ledger],
        }
    }

    fn all(&self) -> Vec<&Connection> {
        let mut all = vec![&self.ledger, &self.hyper];
        all.extend(self.ram.as_ref());
        all
    }
}

/// Durable, tiered ledger storage.
pub struct LedgerStore {
    config: LedgerConfig,
    retry: RetryPolicy,
    tiers: Mutex<Tiers>,
    reader: Mutex<Connection>,
    index: IndexStore,
    watermark: AtomicI64,
    compressed: AtomicI64,
    #[cfg(feature = "locking")]
    _lock: crate::adapters::DataDirLock,
}

impl LedgerStore {
    /// Open every tier under `config.data_dir`, creating missing files.
    ///
    /// With `ram` enabled the working tier is a fresh in-memory database
    /// loaded from `hyper.db`.
    pub fn open(config: LedgerConfig) -> Result<Self> {
        std::fs::create_dir_all(&config.data_dir).map_err(|e| StorageError::Io {
            path: config.data_dir.display().to_string(),
            message: e.to_string(),
        })?;
        #[cfg(feature = "locking")]
        let lock = crate::adapters::DataDirLock::acquire(&config.data_dir)?;

        let retry = config.retry_policy();
        let ledger = sqlite::open_file(&config.ledger_path(), LEDGER_SCHEMA)?;
        let hyper = sqlite::open_file(&config.hyper_path(), LEDGER_SCHEMA)?;

        let (ram, reader) = if config.ram {
            let name = format!("ledger-ram-{}", uuid::Uuid::new_v4());
            let ram = sqlite::open_shared_memory(&name, LEDGER_SCHEMA)?;
            load_from(&ram, &config.hyper_path().display().to_string())?;
            let reader = sqlite::open_shared_memory(&name, LEDGER_SCHEMA)?;
            reader.pragma_update(None, "read_uncommitted", true)?;
            (Some(ram), reader)
        } else {
            (None, sqlite::open_file(&config.hyper_path(), LEDGER_SCHEMA)?)
        };

        let index = IndexStore::open(&config.index_path(), retry)?;
        let watermark = max_height(&ledger)?.unwrap_or(0);
        let compressed = compressed_height(&hyper)?;

        info!(
            "[ln-02] Ledger opened at {} (ram: {}, flushed up to {}, compressed up to {})",
            config.data_dir.display(),
            config.ram,
            watermark,
            compressed
        );

        Ok(Self {
            config,
            retry,
            tiers: Mutex::new(Tiers { ledger, hyper, ram }),
            reader: Mutex::new(reader),
            index,
            watermark: AtomicI64::new(watermark),
            compressed: AtomicI64::new(compressed),
            #[cfg(feature = "locking")]
            _lock: lock,
        })
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Alias/token index.
    pub fn index(&self) -> &IndexStore {
        &self.index
    }

    /// Highest block height already flushed to durable storage.
    pub fn watermark(&self) -> BlockHeight {
        self.watermark.load(Ordering::SeqCst)
    }

    /// Highest block folded into hyper balance rows, 0 when none.
    pub fn compressed_height(&self) -> BlockHeight {
        self.compressed.load(Ordering::SeqCst)
    }

    // =========================================================================
    // WRITES
    // =========================================================================

    /// Write one difficulty row and the rows of block `height`.
    ///
    /// Rows with a negative height (synthetic rewards) are stored at
    /// `-height`, all others at `height`. Unless `atomic_blocks` is set,
    /// every row is its own commit, so a crash can leave a partial block
    /// behind; recovery is `rollback_under(height)`.
    pub fn append_block(
        &self,
        height: BlockHeight,
        difficulty: f64,
        rows: &[LedgerRow],
    ) -> Result<()> {
        let tagged: Vec<LedgerRow> = rows
            .iter()
            .map(|row| LedgerRow {
                block_height: if row.block_height < 0 { -height } else { height },
                ..row.clone()
            })
            .collect();

        if self.config.atomic_blocks {
            return self.retry.run("append_block", || {
                let tiers = self.tiers.lock();
                let tx = tiers.working().unchecked_transaction()?;
                sqlite::insert_difficulty(&tx, height, difficulty)?;
                for row in &tagged {
                    sqlite::insert_row(&tx, row)?;
                }
                tx.commit()?;
                Ok(())
            });
        }

        self.retry.run("append_difficulty", || {
            sqlite::insert_difficulty(self.tiers.lock().working(), height, difficulty)
        })?;
        for row in &tagged {
            self.retry
                .run("append_row", || sqlite::insert_row(self.tiers.lock().working(), row))?;
        }
        Ok(())
    }

    /// Copy rows above the current watermark to durable storage.
    pub fn flush(&self) -> Result<FlushReport> {
        self.flush_to_disk(self.watermark())
    }

    /// Copy rows with `block_height > from OR block_height < -from` (and
    /// difficulty rows above `from`) from the working tier to durable
    /// storage, then advance the watermark to the last working block.
    ///
    /// The destination range is cleared inside the same transaction, so
    /// running it again from an unchanged watermark cannot duplicate rows.
    pub fn flush_to_disk(&self, from: BlockHeight) -> Result<FlushReport> {
        let tiers = self.tiers.lock();
        let working = tiers.working();

        let rows = self.retry.run("flush_select", || {
            sqlite::query_rows(
                working,
                &format!(
                    "SELECT {} FROM transactions WHERE block_height > ?1 OR block_height < ?2 \
                     ORDER BY block_height ASC",
                    ROW_COLUMNS
                ),
                params![from, -from],
            )
        })?;
        let misc = self.retry.run("flush_select_misc", || read_difficulties(working, from))?;

        for target in tiers.flush_targets() {
            self.retry.run("flush_write", || {
                let tx = target.unchecked_transaction()?;
                tx.execute(
                    "DELETE FROM transactions WHERE block_height > ?1 OR block_height < ?2",
                    params![from, -from],
                )?;
                tx.execute("DELETE FROM misc WHERE block_height > ?1", [from])?;
                for row in &rows {
                    sqlite::insert_row(&tx, row)?;
                }
                for record in &misc {
                    sqlite::insert_difficulty(&tx, record.block_height, record.difficulty)?;
                }
                tx.commit()?;
                Ok(())
            })?;
        }

        let watermark = self
            .retry
            .run("flush_watermark", || max_height(working))?
            .unwrap_or(from)
            .max(from);
        self.watermark.store(watermark, Ordering::SeqCst);

        let report = FlushReport {
            rows: rows.len(),
            misc: misc.len(),
            watermark,
        };
        info!(
            "[ln-02] Flushed {} txs and {} difficulty rows to disk, {} to {}",
            report.rows,
            report.misc,
            from + 1,
            watermark
        );
        Ok(report)
    }

    /// Delete every row at or above `height` (and reward rows at or below
    /// `-height`) from all tiers, with their difficulty rows and index
    /// entries.
    pub fn rollback_under(&self, height: BlockHeight) -> Result<()> {
        require_positive("rollback_under", height)?;
        self.require_uncompressed("rollback_under", height)?;
        {
            let tiers = self.tiers.lock();
            for conn in tiers.all() {
                self.retry.run("rollback_under", || delete_from(conn, height))?;
            }
        }
        self.index.rollback(height)?;
        self.watermark.fetch_min(height - 1, Ordering::SeqCst);
        warn!("[ln-02] Rolled back ledger below block {}", height);
        Ok(())
    }

    /// Remove and return the working-tier rows of blocks at or above `height`.
    ///
    /// Used to hand user transactions back to the mempool after a reorg.
    pub fn backup_higher(&self, height: BlockHeight) -> Result<Vec<LedgerRow>> {
        require_positive("backup_higher", height)?;
        self.require_uncompressed("backup_higher", height)?;
        let tiers = self.tiers.lock();
        let working = tiers.working();
        let rows = self.retry.run("backup_higher", || {
            sqlite::query_rows(
                working,
                &format!(
                    "SELECT {} FROM transactions WHERE block_height >= ?1 ORDER BY block_height ASC",
                    ROW_COLUMNS
                ),
                [height],
            )
        })?;
        self.retry.run("backup_higher_delete", || delete_from(working, height))?;
        info!("[ln-02] Backed up {} rows at or above block {}", rows.len(), height);
        Ok(rows)
    }

    /// Fold hyper-tier blocks more than `hyper_window` below the watermark
    /// into balance rows, returning the new compressed height.
    ///
    /// Balances read from the hyper tier are unchanged. The folded blocks
    /// stay in `ledger.db`.
    pub fn compress_hyper(&self) -> Result<Option<BlockHeight>> {
        let window = self.config.hyper_window;
        if window == 0 {
            return Ok(None);
        }
        let tiers = self.tiers.lock();
        let cutoff = self
            .watermark()
            .saturating_sub(i64::try_from(window).unwrap_or(i64::MAX));
        let compressed = self.compressed_height();
        if cutoff <= compressed {
            debug!(
                "[ln-02] Hyper tier already compressed up to {} (cutoff {})",
                compressed, cutoff
            );
            return Ok(None);
        }

        let folded = self
            .retry
            .run("compress_hyper", || fold_into_balances(&tiers.hyper, cutoff))?;
        self.compressed.store(cutoff, Ordering::SeqCst);
        info!(
            "[ln-02] Compressed hyper tier up to block {}: {} rows into {} balances",
            cutoff, folded.0, folded.1
        );
        Ok(Some(cutoff))
    }

    fn require_uncompressed(&self, operation: &'static str, height: BlockHeight) -> Result<()> {
        let compressed = self.compressed_height();
        if height <= compressed {
            return Err(StorageError::BelowCompression {
                operation,
                height,
                compressed,
            });
        }
        Ok(())
    }

    /// Replay the full ledger tier into the index.
    pub fn rebuild_index(&self) -> Result<()> {
        let rows = {
            let tiers = self.tiers.lock();
            self.retry.run("rebuild_index", || {
                sqlite::query_rows(
                    &tiers.ledger,
                    &format!(
                        "SELECT {} FROM transactions WHERE block_height > 0 ORDER BY block_height ASC",
                        ROW_COLUMNS
                    ),
                    [],
                )
            })?
        };
        self.index.rebuild(&rows)?;
        Ok(())
    }

    // =========================================================================
    // READS
    // =========================================================================

    fn read<T>(
        &self,
        operation: &'static str,
        query: impl Fn(&Connection) -> Result<T>,
    ) -> Result<T> {
        self.retry.run(operation, || query(&self.reader.lock()))
    }

    /// `read`, falling back to `ledger.db` when the working tier has no
    /// match and part of its history is compressed.
    fn read_through<T>(
        &self,
        operation: &'static str,
        query: impl Fn(&Connection) -> Result<Option<T>>,
    ) -> Result<Option<T>> {
        if let Some(found) = self.read(operation, &query)? {
            return Ok(Some(found));
        }
        if self.compressed_height() == 0 {
            return Ok(None);
        }
        self.retry.run(operation, || query(&self.tiers.lock().ledger))
    }

    /// Credits (amount + reward received) minus debits (amount + fee sent).
    pub fn balance(&self, address: &str) -> Result<Amount> {
        self.read("balance", |conn| {
            let credit = sqlite::sum_amounts(
                conn,
                "SELECT amount, reward FROM transactions WHERE recipient = ?1",
                [address],
            )?;
            let debit = sqlite::sum_amounts(
                conn,
                "SELECT amount, fee FROM transactions WHERE address = ?1",
                [address],
            )?;
            Ok(credit - debit)
        })
    }

    /// `balance`, memoised in `batch`.
    pub fn balance_cached(&self, batch: &mut BalanceBatch, address: &str) -> Result<Amount> {
        batch.get_or_load(address, |a| self.balance(a))
    }

    /// Height, hash and timestamp of the last mined block.
    pub fn last_block(&self) -> Result<Option<LastBlock>> {
        self.read("last_block", |conn| {
            Ok(conn
                .query_row(
                    "SELECT block_height, block_hash, timestamp FROM transactions \
                     WHERE CAST(reward AS REAL) != 0 ORDER BY block_height DESC LIMIT 1",
                    [],
                    |r| {
                        Ok(LastBlock {
                            height: r.get(0)?,
                            hash: r.get(1)?,
                            timestamp: r.get(2)?,
                        })
                    },
                )
                .optional()?)
        })
    }

    /// Most recent difficulty record.
    pub fn last_difficulty(&self) -> Result<Option<DifficultyRecord>> {
        self.read("last_difficulty", |conn| {
            Ok(conn
                .query_row(
                    "SELECT block_height, difficulty FROM misc ORDER BY block_height DESC LIMIT 1",
                    [],
                    |r| {
                        Ok(DifficultyRecord {
                            block_height: r.get(0)?,
                            difficulty: r.get(1)?,
                        })
                    },
                )
                .optional()?)
        })
    }

    /// Highest block height stored in `tier`.
    pub fn block_height_max(&self, tier: Tier) -> Result<Option<BlockHeight>> {
        match tier {
            Tier::Working => self.read("block_height_max", max_height),
            Tier::Ledger | Tier::Hyper => self.retry.run("block_height_max", || {
                let tiers = self.tiers.lock();
                match tier {
                    Tier::Ledger => max_height(&tiers.ledger),
                    _ => max_height(&tiers.hyper),
                }
            }),
        }
    }

    pub fn block_height_from_hash(&self, block_hash: &str) -> Result<Option<BlockHeight>> {
        self.read_through("block_height_from_hash", |conn| {
            Ok(conn
                .query_row(
                    "SELECT block_height FROM transactions WHERE block_hash = ?1 LIMIT 1",
                    [block_hash],
                    |r| r.get(0),
                )
                .optional()?)
        })
    }

    /// Look a transaction up through the signature prefix index.
    pub fn transaction_by_signature(&self, signature: &str) -> Result<Option<LedgerRow>> {
        self.read_through("transaction_by_signature", |conn| {
            let prefix = shared_types::signature_prefix(signature);
            Ok(sqlite::query_rows(
                conn,
                &format!(
                    "SELECT {} FROM transactions \
                     WHERE substr(signature, 1, 4) = ?1 AND signature = ?2 LIMIT 1",
                    ROW_COLUMNS
                ),
                [prefix, signature],
            )?
            .pop())
        })
    }

    /// Public key `address` signed with, if it ever sent a transaction.
    pub fn public_key_for(&self, address: &str) -> Result<Option<String>> {
        self.read_through("public_key_for", |conn| {
            Ok(conn
                .query_row(
                    "SELECT public_key FROM transactions \
                     WHERE address = ?1 AND CAST(reward AS REAL) = 0 LIMIT 1",
                    [address],
                    |r| r.get(0),
                )
                .optional()?)
        })
    }

    /// Newest-first search of the working tier. An empty filter returns
    /// nothing; compressed blocks only show up as `Hyperblock` rows.
    pub fn tx_search(&self, filter: &TxFilter) -> Result<Vec<LedgerRow>> {
        if filter.is_empty() {
            return Ok(Vec::new());
        }
        let mut clauses = Vec::new();
        let mut values: Vec<Value> = Vec::new();
        for (column, value) in [
            ("address", &filter.address),
            ("recipient", &filter.recipient),
            ("operation", &filter.operation),
            ("openfield", &filter.openfield),
        ] {
            if let Some(v) = value {
                values.push(Value::Text(v.clone()));
                clauses.push(format!("{} = ?{}", column, values.len()));
            }
        }
        if let Some(h) = filter.min_height {
            values.push(Value::Integer(h));
            clauses.push(format!("block_height >= ?{}", values.len()));
        }
        values.push(Value::Integer(i64::from(filter.limit)));
        values.push(Value::Integer(i64::from(filter.offset)));
        let sql = format!(
            "SELECT {} FROM transactions WHERE {} ORDER BY block_height DESC LIMIT ?{} OFFSET ?{}",
            ROW_COLUMNS,
            clauses.join(" AND "),
            values.len() - 1,
            values.len()
        );
        self.read("tx_search", |conn| {
            sqlite::query_rows(conn, &sql, params_from_iter(values.iter()))
        })
    }

    /// Consecutive blocks after `height` for a syncing peer, up to `sync_max_bytes`.
    pub fn blocks_after(&self, height: BlockHeight) -> Result<Vec<Vec<Transaction>>> {
        let mut blocks = Vec::new();
        let mut size = 0usize;
        let mut next = height + 1;
        while size < self.config.sync_max_bytes {
            let rows = if next <= self.compressed_height() {
                self.retry
                    .run("blocks_after", || block_rows(&self.tiers.lock().ledger, next))?
            } else {
                self.read("blocks_after", |conn| block_rows(conn, next))?
            };
            if rows.is_empty() {
                break;
            }
            let block: Vec<Transaction> = rows.iter().map(LedgerRow::to_transaction).collect();
            size += block.iter().map(Transaction::estimated_size).sum::<usize>();
            blocks.push(block);
            next += 1;
        }
        Ok(blocks)
    }
}

fn load_from(ram: &Connection, hyper_path: &str) -> Result<()> {
    ram.execute("ATTACH DATABASE ?1 AS hyper_src", [hyper_path])?;
    let loaded = ram.execute_batch(
        "INSERT INTO transactions SELECT * FROM hyper_src.transactions;
         INSERT INTO misc SELECT * FROM hyper_src.misc;",
    );
    ram.execute_batch("DETACH DATABASE hyper_src")?;
    loaded?;
    Ok(())
}

fn max_height(conn: &Connection) -> Result<Option<BlockHeight>> {
    Ok(conn.query_row("SELECT MAX(block_height) FROM transactions", [], |r| r.get(0))?)
}

fn block_rows(conn: &Connection, height: BlockHeight) -> Result<Vec<LedgerRow>> {
    sqlite::query_rows(
        conn,
        &format!("SELECT {} FROM transactions WHERE block_height = ?1", ROW_COLUMNS),
        [height],
    )
}

fn compressed_height(hyper: &Connection) -> Result<BlockHeight> {
    let height: Option<BlockHeight> = hyper.query_row(
        "SELECT MAX(block_height) FROM transactions WHERE address = ?1 AND recipient = ?1",
        [HYPERBLOCK_ADDRESS],
        |r| r.get(0),
    )?;
    Ok(height.unwrap_or(0))
}

/// Replace rows of blocks `1..=cutoff` (and their reward rows) with one
/// balance row per address plus a `Hyperblock` marker row. Returns the
/// number of rows folded and of balances written.
fn fold_into_balances(conn: &Connection, cutoff: BlockHeight) -> Result<(usize, usize)> {
    let tx = conn.unchecked_transaction()?;
    let rows = sqlite::query_rows(
        &tx,
        &format!(
            "SELECT {} FROM transactions WHERE block_height BETWEEN ?1 AND ?2",
            ROW_COLUMNS
        ),
        params![-cutoff, cutoff],
    )?;

    let mut balances: BTreeMap<&str, Amount> = BTreeMap::new();
    let mut stamp = (0.0, String::from("0"));
    for row in &rows {
        *balances.entry(&row.recipient).or_insert(Amount::ZERO) += row.amount + row.reward;
        *balances.entry(&row.address).or_insert(Amount::ZERO) -= row.amount + row.fee;
        if row.block_height == cutoff && row.reward != Amount::ZERO {
            stamp = (row.timestamp, row.block_hash.clone());
        }
    }
    balances.remove(HYPERBLOCK_ADDRESS);
    balances.retain(|_, balance| *balance != Amount::ZERO);

    tx.execute(
        "DELETE FROM transactions WHERE block_height BETWEEN ?1 AND ?2",
        params![-cutoff, cutoff],
    )?;
    tx.execute("DELETE FROM misc WHERE block_height < ?1", [cutoff])?;

    let summary = |address: &str, recipient: &str, amount: Amount| LedgerRow {
        block_height: cutoff,
        timestamp: stamp.0,
        address: address.to_string(),
        recipient: recipient.to_string(),
        amount,
        signature: format!("{}-{}-{}-{}", HYPERBLOCK_ADDRESS, cutoff, address, recipient),
        public_key: HYPERBLOCK_ADDRESS.to_string(),
        block_hash: stamp.1.clone(),
        fee: Amount::ZERO,
        reward: Amount::ZERO,
        operation: "0".to_string(),
        openfield: "0".to_string(),
    };
    sqlite::insert_row(&tx, &summary(HYPERBLOCK_ADDRESS, HYPERBLOCK_ADDRESS, Amount::ZERO))?;
    for (&address, &balance) in &balances {
        // sources such as reward pools go negative; they stay the sender
        let row = if balance.is_negative() {
            summary(address, HYPERBLOCK_ADDRESS, -balance)
        } else {
            summary(HYPERBLOCK_ADDRESS, address, balance)
        };
        sqlite::insert_row(&tx, &row)?;
    }
    tx.commit()?;
    Ok((rows.len(), balances.len()))
}

fn read_difficulties(conn: &Connection, above: BlockHeight) -> Result<Vec<DifficultyRecord>> {
    let mut stmt = conn.prepare_cached(
        "SELECT block_height, difficulty FROM misc WHERE block_height > ?1 ORDER BY block_height ASC",
    )?;
    let records = stmt.query_map([above], |r| {
        Ok(DifficultyRecord {
            block_height: r.get(0)?,
            difficulty: r.get(1)?,
        })
    })?;
    Ok(records.collect::<rusqlite::Result<Vec<_>>>()?)
}

fn delete_from(conn: &Connection, height: BlockHeight) -> Result<()> {
    conn.execute(
        "DELETE FROM transactions WHERE block_height >= ?1 OR block_height <= ?2",
        params![height, -height],
    )?;
    conn.execute("DELETE FROM misc WHERE block_height >= ?1", [height])?;
    Ok(())
}

fn require_positive(operation: &'static str, height: BlockHeight) -> Result<()> {
    if height < 1 {
        return Err(StorageError::InvalidHeight { operation, height });
    }
    Ok(())
}
