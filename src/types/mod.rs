//! Type definitions module
//!
//! Source descriptors, ingestion inputs and the chunk records that flow
//! between the chunker, the index and the context assembler.

pub mod chunk;
pub mod source;

// Re-export commonly used types
pub use chunk::{Chunk, RetrievedChunk};
pub use source::{IngestInput, SourceDescriptor, SourceKind, DIRECT_TEXT_ORIGIN};
