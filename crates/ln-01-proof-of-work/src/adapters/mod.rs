//! Filesystem adapters for the proof-of-work gate.

pub mod buffer_file;

pub use buffer_file::BufferFile;
