//! Chunk records
//!
//! A chunk is immutable once built. `index` is its 0-based position among
//! the chunks of one source and `total_in_source` the count produced by the
//! same ingestion call.

use serde::{Deserialize, Serialize};

use super::source::{SourceDescriptor, SourceKind};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub content: String,
    pub source_origin_id: String,
    pub source_kind: SourceKind,
    pub media_type: String,
    pub title: Option<String>,
    pub index: usize,
    pub total_in_source: usize,
}

impl Chunk {
    /// Stamp split text with provenance, numbering in generation order
    pub fn from_pieces(descriptor: &SourceDescriptor, pieces: Vec<String>) -> Vec<Chunk> {
        let total = pieces.len();
        pieces
            .into_iter()
            .enumerate()
            .map(|(index, content)| Chunk {
                content,
                source_origin_id: descriptor.origin_id.clone(),
                source_kind: descriptor.kind,
                media_type: descriptor.media_type.clone(),
                title: descriptor.title.clone(),
                index,
                total_in_source: total,
            })
            .collect()
    }

    /// Label used when attributing this chunk in a prompt
    pub fn attribution(&self) -> &str {
        if self.source_origin_id.is_empty() {
            self.title.as_deref().unwrap_or("unknown source")
        } else {
            &self.source_origin_id
        }
    }
}

/// Chunk returned by a query, with its position in the result list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrievedChunk {
    pub chunk: Chunk,
    /// 0-based rank; backends' raw scores are not comparable, so only order is kept
    pub rank: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_pieces_numbers_contiguously() {
        let descriptor = SourceDescriptor::new("report.pdf", SourceKind::File, "application/pdf");
        let pieces = vec!["a".to_string(), "b".to_string(), "c".to_string()];

        let chunks = Chunk::from_pieces(&descriptor, pieces);

        assert_eq!(chunks.len(), 3);
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.index, i);
            assert_eq!(chunk.total_in_source, 3);
            assert_eq!(chunk.source_origin_id, "report.pdf");
            assert_eq!(chunk.media_type, "application/pdf");
        }
        assert_eq!(chunks[2].content, "c");
    }

    #[test]
    fn test_attribution_falls_back_to_title() {
        let descriptor = SourceDescriptor::new("", SourceKind::Url, "text/html").with_title("Rust Book");
        let chunks = Chunk::from_pieces(&descriptor, vec!["x".to_string()]);
        assert_eq!(chunks[0].attribution(), "Rust Book");
    }
}
