//! # Ledger-Node Test Suite
//!
//! Cross-component scenarios run against real nodes: SQLite tiers in
//! temporary directories, an in-memory annealing buffer and a manual clock.
//!
//! ## Structure
//!
//! ```text
//! tests/
//! ├── src/
//! │   ├── fixtures.rs       # TestNode, keys, signed txs, mined blocks
//! │   └── integration/
//! │       ├── admission.rs  # mempool against a mined ledger
//! │       ├── ledger.rs     # digest, flush, reopen, rollback
//! │       ├── peers.rs      # warnings, bans, TCP sessions
//! │       ├── pow.rs        # buffer agreement and block verification
//! │       └── wire.rs       # split frames over sockets
//! └── benches/
//!     └── ledger_benchmarks.rs
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p ln-tests
//! cargo bench -p ln-tests
//! ```

pub mod fixtures;
pub mod integration;
