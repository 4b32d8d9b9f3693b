//! # Domain Layer - Proof-of-Work Gate
//!
//! Pure logic: buffer generation, annealing, difficulty measurement and
//! stall relaxation. No filesystem access.

pub mod buffer;
pub mod difficulty;
pub mod entities;

pub use buffer::*;
pub use difficulty::*;
pub use entities::*;
