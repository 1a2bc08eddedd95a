//! Process-local index
//!
//! Ranks by how many query terms a chunk contains. Good enough for tests and
//! offline experiments; it keeps nothing across restarts.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::{PoisonError, RwLock};

use super::IndexClient;
use crate::errors::{RagError, Result};
use crate::types::{Chunk, RetrievedChunk};

#[derive(Debug, Default)]
pub struct InMemoryIndex {
    chunks: RwLock<Vec<Chunk>>,
}

impl InMemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored chunks, counted even after a writer panicked
    pub fn len(&self) -> usize {
        self.chunks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn terms(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|term| !term.is_empty())
        .map(str::to_lowercase)
}

fn poisoned<T>(_: T) -> RagError {
    RagError::IndexUnavailable("in-memory index lock poisoned".to_string())
}

#[async_trait]
impl IndexClient for InMemoryIndex {
    async fn store(&self, chunks: Vec<Chunk>) -> Result<()> {
        self.chunks.write().map_err(poisoned)?.extend(chunks);
        Ok(())
    }

    async fn query(&self, text: &str, k: usize) -> Result<Vec<RetrievedChunk>> {
        let wanted: HashSet<String> = terms(text).collect();
        let chunks = self.chunks.read().map_err(poisoned)?;

        let mut scored: Vec<(usize, &Chunk)> = chunks
            .iter()
            .map(|chunk| {
                let hits = terms(&chunk.content).filter(|t| wanted.contains(t)).count();
                (hits, chunk)
            })
            .collect();

        // Stable sort: ties keep insertion order
        scored.sort_by(|a, b| b.0.cmp(&a.0));

        Ok(scored
            .into_iter()
            .take(k)
            .enumerate()
            .map(|(rank, (_, chunk))| RetrievedChunk {
                chunk: chunk.clone(),
                rank,
            })
            .collect())
    }
}
