//! # Domain Layer - Peer Consensus
//!
//! Plain data structures behind the service: the warning tally, the
//! retry book and the opinion map. No I/O and no locking here.

pub mod backoff;
pub mod entities;
pub mod errors;
pub mod opinions;
pub mod reputation;

pub use backoff::{retry_delay, RetryBook};
pub use entities::*;
pub use errors::{PeerError, Result};
pub use opinions::{OpinionMap, TOO_OLD_MARGIN};
pub use reputation::Reputation;
