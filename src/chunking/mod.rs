//! Text chunking
//!
//! Splits normalized source text into ordered, overlapping windows sized for
//! embedding and retrieval.

pub mod splitter;

pub use splitter::{ChunkerConfig, RecursiveChunker, DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE};
