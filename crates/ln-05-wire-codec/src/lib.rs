//! # Wire Codec
//!
//! **Component:** ln-05
//!
//! Every message between nodes is a 10-digit, zero-padded ASCII length
//! header followed by that many bytes of UTF-8 JSON.
//!
//! ```text
//! ┌────────────┬──────────────────────────────┐
//! │ 0000000007 │ "hello"                      │
//! │ 10 digits  │ payload (JSON, UTF-8)        │
//! └────────────┴──────────────────────────────┘
//! ```
//!
//! ## Timeouts
//!
//! `decode` waits for the header for at most `header_timeout`. An idle
//! connection is not an error: it yields [`Frame::Timeout`], which renders
//! as the single-character sentinel `*` and can never collide with a real
//! payload because every payload is a JSON document. Once a header has
//! arrived, the payload must follow within `payload_timeout`, across as
//! many reads as the network needs.
//!
//! ## Module Structure
//!
//! | Module | Contents |
//! |--------|----------|
//! | `codec` | `encode`, `decode`, `send`, `receive`, `Frame` |
//! | `config` | `WireConfig` |
//! | `error` | `WireError` |

pub mod codec;
pub mod config;
pub mod error;

pub use codec::{decode, encode, receive, send, Frame, TIMEOUT_SENTINEL};
pub use config::WireConfig;
pub use error::{Result, WireError};

/// Length of the ASCII length header.
pub const HEADER_LEN: usize = 10;
