//! SQLite adapters: tier connections, the alias/token index and the data
//! directory lock.

pub mod index;
#[cfg(feature = "locking")]
pub mod lock;
pub mod sqlite;

pub use index::{IndexStore, IndexUpdate};
#[cfg(feature = "locking")]
pub use lock::DataDirLock;
