//! Qdrant-backed index
//!
//! Chunks are embedded through an [`Embedder`] and stored as points with the
//! chunk fields in the payload. Search uses cosine distance.

use async_trait::async_trait;
use qdrant_client::qdrant::{
    value::Kind, with_payload_selector::SelectorOptions, CreateCollectionBuilder, Distance,
    PointStruct, ScoredPoint, SearchPointsBuilder, UpsertPointsBuilder, Value as QdrantValue,
    VectorParamsBuilder,
};
use qdrant_client::Qdrant;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use super::embedding::Embedder;
use super::IndexClient;
use crate::errors::{RagError, Result};
use crate::types::{Chunk, RetrievedChunk, SourceKind};

pub const DEFAULT_QDRANT_URL: &str = "http://localhost:6334";
pub const DEFAULT_COLLECTION: &str = "ragbuddy_sources";
pub const DEFAULT_EMBEDDING_DIM: u64 = 768;

const CONTENT: &str = "content";
const ORIGIN_ID: &str = "origin_id";
const SOURCE_KIND: &str = "source_kind";
const MEDIA_TYPE: &str = "media_type";
const TITLE: &str = "title";
const CHUNK_INDEX: &str = "chunk_index";
const TOTAL_IN_SOURCE: &str = "total_in_source";

pub struct QdrantIndex {
    client: Qdrant,
    collection: String,
    embedder: Arc<dyn Embedder>,
}

fn unavailable(context: &str) -> impl FnOnce(qdrant_client::QdrantError) -> RagError + '_ {
    move |e| RagError::IndexUnavailable(format!("{}: {}", context, e))
}

impl QdrantIndex {
    /// Connect and make sure the collection exists
    pub async fn connect(
        url: &str,
        collection: impl Into<String>,
        dimension: u64,
        embedder: Arc<dyn Embedder>,
    ) -> Result<Self> {
        let client = Qdrant::from_url(url)
            .build()
            .map_err(unavailable("failed to create Qdrant client"))?;

        let index = Self {
            client,
            collection: collection.into(),
            embedder,
        };
        index.ensure_collection(dimension).await?;

        info!(url, collection = %index.collection, "connected to vector index");
        Ok(index)
    }

    async fn ensure_collection(&self, dimension: u64) -> Result<()> {
        let exists = self
            .client
            .collection_exists(&self.collection)
            .await
            .map_err(unavailable("failed to list collections"))?;

        if !exists {
            self.client
                .create_collection(
                    CreateCollectionBuilder::new(&self.collection)
                        .vectors_config(VectorParamsBuilder::new(dimension, Distance::Cosine)),
                )
                .await
                .map_err(unavailable("failed to create collection"))?;
            info!(collection = %self.collection, dimension, "created collection");
        }

        Ok(())
    }

    /// Number of stored points
    pub async fn point_count(&self) -> Result<u64> {
        let info = self
            .client
            .collection_info(&self.collection)
            .await
            .map_err(unavailable("failed to read collection info"))?;

        Ok(info.result.and_then(|r| r.points_count).unwrap_or(0))
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }
}

fn chunk_payload(chunk: Chunk) -> HashMap<String, QdrantValue> {
    let mut payload = HashMap::new();
    payload.insert(CONTENT.to_string(), QdrantValue::from(chunk.content));
    payload.insert(ORIGIN_ID.to_string(), QdrantValue::from(chunk.source_origin_id));
    payload.insert(
        SOURCE_KIND.to_string(),
        QdrantValue::from(chunk.source_kind.as_str().to_string()),
    );
    payload.insert(MEDIA_TYPE.to_string(), QdrantValue::from(chunk.media_type));
    if let Some(title) = chunk.title {
        payload.insert(TITLE.to_string(), QdrantValue::from(title));
    }
    payload.insert(CHUNK_INDEX.to_string(), QdrantValue::from(chunk.index as i64));
    payload.insert(
        TOTAL_IN_SOURCE.to_string(),
        QdrantValue::from(chunk.total_in_source as i64),
    );
    payload
}

fn payload_string(payload: &HashMap<String, QdrantValue>, key: &str) -> Option<String> {
    match payload.get(key)?.kind.as_ref()? {
        Kind::StringValue(s) => Some(s.clone()),
        _ => None,
    }
}

fn payload_usize(payload: &HashMap<String, QdrantValue>, key: &str) -> Option<usize> {
    match payload.get(key)?.kind.as_ref()? {
        Kind::IntegerValue(i) => usize::try_from(*i).ok(),
        _ => None,
    }
}

/// Rebuild a chunk from a search hit; points without content are skipped
fn chunk_from_point(point: &ScoredPoint) -> Option<Chunk> {
    let payload = &point.payload;
    Some(Chunk {
        content: payload_string(payload, CONTENT)?,
        source_origin_id: payload_string(payload, ORIGIN_ID).unwrap_or_default(),
        source_kind: payload_string(payload, SOURCE_KIND)
            .and_then(|kind| SourceKind::parse(&kind))
            .unwrap_or(SourceKind::File),
        media_type: payload_string(payload, MEDIA_TYPE).unwrap_or_default(),
        title: payload_string(payload, TITLE),
        index: payload_usize(payload, CHUNK_INDEX).unwrap_or(0),
        total_in_source: payload_usize(payload, TOTAL_IN_SOURCE).unwrap_or(0),
    })
}

#[async_trait]
impl IndexClient for QdrantIndex {
    async fn store(&self, chunks: Vec<Chunk>) -> Result<()> {
        if chunks.is_empty() {
            return Ok(());
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let vectors = self.embedder.embed(&texts).await?;

        let points: Vec<PointStruct> = chunks
            .into_iter()
            .zip(vectors)
            .map(|(chunk, vector)| {
                PointStruct::new(Uuid::new_v4().to_string(), vector, chunk_payload(chunk))
            })
            .collect();
        let count = points.len();

        self.client
            .upsert_points(UpsertPointsBuilder::new(&self.collection, points).wait(true))
            .await
            .map_err(unavailable("failed to upsert points"))?;

        debug!(count, collection = %self.collection, "stored chunks");
        Ok(())
    }

    async fn query(&self, text: &str, k: usize) -> Result<Vec<RetrievedChunk>> {
        if k == 0 {
            return Ok(Vec::new());
        }

        let vector = self
            .embedder
            .embed(&[text.to_string()])
            .await?
            .pop()
            .ok_or_else(|| RagError::IndexUnavailable("embedder returned no vector".to_string()))?;

        let response = self
            .client
            .search_points(
                SearchPointsBuilder::new(&self.collection, vector, k as u64)
                    .with_payload(SelectorOptions::Enable(true)),
            )
            .await
            .map_err(unavailable("search failed"))?;

        Ok(response
            .result
            .iter()
            .filter_map(chunk_from_point)
            .enumerate()
            .map(|(rank, chunk)| RetrievedChunk { chunk, rank })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_chunk() -> Chunk {
        Chunk {
            content: "Qdrant stores vectors.".to_string(),
            source_origin_id: "https://example.com/qdrant".to_string(),
            source_kind: SourceKind::Url,
            media_type: "text/html".to_string(),
            title: Some("Vector stores".to_string()),
            index: 3,
            total_in_source: 7,
        }
    }

    #[test]
    fn test_payload_survives_point_round_trip() {
        let chunk = sample_chunk();
        let point = ScoredPoint {
            payload: chunk_payload(chunk.clone()),
            ..Default::default()
        };

        assert_eq!(chunk_from_point(&point), Some(chunk));
    }

    #[test]
    fn test_point_without_content_is_skipped() {
        let mut payload = chunk_payload(sample_chunk());
        payload.remove(CONTENT);
        let point = ScoredPoint {
            payload,
            ..Default::default()
        };

        assert!(chunk_from_point(&point).is_none());
    }

    #[test]
    fn test_untitled_chunk_has_no_title_key() {
        let mut chunk = sample_chunk();
        chunk.title = None;
        let payload = chunk_payload(chunk);
        assert!(!payload.contains_key(TITLE));
        assert_eq!(payload_usize(&payload, CHUNK_INDEX), Some(3));
    }

    #[tokio::test]
    #[ignore] // Requires running Qdrant and Ollama instances
    async fn test_store_and_query_live() {
        use crate::index::{OllamaEmbedder, DEFAULT_EMBEDDING_MODEL};

        let embedder = Arc::new(
            OllamaEmbedder::new("http://127.0.0.1:11434", DEFAULT_EMBEDDING_MODEL).unwrap(),
        );
        let index = QdrantIndex::connect(
            DEFAULT_QDRANT_URL,
            "ragbuddy_test",
            DEFAULT_EMBEDDING_DIM,
            embedder,
        )
        .await
        .unwrap();

        index.store(vec![sample_chunk()]).await.unwrap();
        let results = index.query("vector storage", 1).await.unwrap();
        assert_eq!(results.len(), 1);
    }
}
