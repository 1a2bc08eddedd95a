//! RagBuddy - retrieval-augmented answers over your own sources
//!
//! Files, pasted text and web pages are normalized to plain text, split into
//! overlapping chunks and stored in a vector index. Questions are answered by
//! a local model from the most similar chunks only.
//!
//! # Architecture
//!
//! - **Ingestion**: format detection, decoding, article extraction, chunking
//! - **Index**: nearest-neighbour store behind the `IndexClient` trait
//! - **Answering**: context assembly, retrying model calls, streaming output

pub mod chunking;
pub mod cli;
pub mod config;
pub mod errors;
pub mod index;
pub mod ingest;
pub mod rag;
pub mod streaming;
pub mod telemetry;
pub mod types;

// Re-export commonly used types
pub use errors::{ErrorKind, ErrorReport, RagError, Result};
