//! Normalize, split, store

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument};

use super::normalizer::Normalizer;
use crate::chunking::RecursiveChunker;
use crate::errors::Result;
use crate::index::IndexClient;
use crate::types::{Chunk, IngestInput, SourceKind};

/// Outcome of one successful ingestion
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestReport {
    pub chunk_count: usize,
    pub origin_id: String,
    pub kind: SourceKind,
    pub ingested_at: DateTime<Utc>,
}

pub struct IngestPipeline {
    normalizer: Normalizer,
    chunker: RecursiveChunker,
    index: Arc<dyn IndexClient>,
}

impl IngestPipeline {
    pub fn new(normalizer: Normalizer, chunker: RecursiveChunker, index: Arc<dyn IndexClient>) -> Self {
        Self {
            normalizer,
            chunker,
            index,
        }
    }

    /// Ingest one source; nothing is stored unless every step succeeds
    #[instrument(name = "ingest", skip_all, fields(source = %input.label(), kind = %input.kind()))]
    pub async fn ingest(&self, input: IngestInput) -> Result<IngestReport> {
        let kind = input.kind();
        let source = self.normalizer.normalize(input).await?;

        let pieces = self.chunker.split(&source.text);
        let chunks = Chunk::from_pieces(&source.descriptor, pieces);
        let chunk_count = chunks.len();

        self.index.store(chunks).await?;

        info!(chunk_count, origin = %source.descriptor.origin_id, "source ingested");
        Ok(IngestReport {
            chunk_count,
            origin_id: source.descriptor.origin_id,
            kind,
            ingested_at: Utc::now(),
        })
    }
}
