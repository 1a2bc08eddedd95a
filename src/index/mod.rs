//! Nearest-neighbour index over chunk records
//!
//! The pipeline only needs two capabilities from a vector store: accept
//! chunks, and return the top-k chunks for a query string in similarity
//! order. Backends own their resilience; failures surface as
//! `IndexUnavailable` and are not retried here.

pub mod embedding;
pub mod lazy;
pub mod memory;
pub mod qdrant;

use async_trait::async_trait;

use crate::errors::Result;
use crate::types::{Chunk, RetrievedChunk};

pub use embedding::{Embedder, OllamaEmbedder, DEFAULT_EMBEDDING_MODEL};
pub use lazy::LazyIndex;
pub use memory::InMemoryIndex;
pub use qdrant::QdrantIndex;

/// Storage and similarity search for chunk records
#[async_trait]
pub trait IndexClient: Send + Sync {
    /// Take ownership of a batch of chunks
    async fn store(&self, chunks: Vec<Chunk>) -> Result<()>;

    /// Top `k` chunks most similar to `text`, best first
    ///
    /// An index with nothing in it yields an empty list, never an error.
    async fn query(&self, text: &str, k: usize) -> Result<Vec<RetrievedChunk>>;
}
