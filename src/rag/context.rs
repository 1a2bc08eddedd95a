//! Context assembly for RAG prompts
//!
//! Renders retrieved chunks as numbered, attributed blocks in the order the
//! index returned them. No re-ranking happens here.

use serde::{Deserialize, Serialize};

use super::prompts::{answer_prompt, summary_prompt, EMPTY_CONTEXT_MARKER};
use crate::types::RetrievedChunk;

/// Line placed between rendered blocks
pub const BLOCK_SEPARATOR: &str = "\n---\n";

/// Default bound on rendered context, in characters
pub const DEFAULT_MAX_CONTEXT_CHARS: usize = 16_000;

/// Assembled context for prompt augmentation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssembledContext {
    pub text: String,
    /// Blocks rendered into `text`
    pub source_count: usize,
    /// Retrieved chunks left out by the size bound
    pub dropped: usize,
}

impl AssembledContext {
    pub fn is_empty(&self) -> bool {
        self.source_count == 0
    }
}

#[derive(Debug, Clone)]
pub struct ContextAssembler {
    max_context_chars: usize,
}

impl Default for ContextAssembler {
    fn default() -> Self {
        Self::new()
    }
}

impl ContextAssembler {
    pub fn new() -> Self {
        Self::with_limit(DEFAULT_MAX_CONTEXT_CHARS)
    }

    pub fn with_limit(max_context_chars: usize) -> Self {
        Self { max_context_chars }
    }

    /// `Source {n} ({media type}: {origin or title}):\n{content}\n`
    pub fn render_block(number: usize, retrieved: &RetrievedChunk) -> String {
        let chunk = &retrieved.chunk;
        format!(
            "Source {} ({}: {}):\n{}\n",
            number,
            chunk.media_type,
            chunk.attribution(),
            chunk.content
        )
    }

    /// Render chunks in rank order until the size bound is reached
    ///
    /// The first block is always kept so a non-empty retrieval never renders
    /// as the empty-context marker.
    pub fn build(&self, chunks: &[RetrievedChunk]) -> AssembledContext {
        if chunks.is_empty() {
            return AssembledContext {
                text: EMPTY_CONTEXT_MARKER.to_string(),
                source_count: 0,
                dropped: 0,
            };
        }

        let mut blocks: Vec<String> = Vec::new();
        let mut total_chars = 0;

        for (i, retrieved) in chunks.iter().enumerate() {
            let block = Self::render_block(i + 1, retrieved);
            let block_chars = block.chars().count();
            let separator_chars = if blocks.is_empty() {
                0
            } else {
                BLOCK_SEPARATOR.len()
            };

            if !blocks.is_empty()
                && total_chars + separator_chars + block_chars > self.max_context_chars
            {
                break;
            }

            total_chars += separator_chars + block_chars;
            blocks.push(block);
        }

        AssembledContext {
            source_count: blocks.len(),
            dropped: chunks.len() - blocks.len(),
            text: blocks.join(BLOCK_SEPARATOR),
        }
    }

    /// Final question-answering prompt
    pub fn assemble(&self, chunks: &[RetrievedChunk], question: &str) -> String {
        let context = self.build(chunks);
        answer_prompt(&context.text, question, context.is_empty())
    }

    /// Final summary prompt
    pub fn assemble_summary(&self, chunks: &[RetrievedChunk]) -> String {
        summary_prompt(&self.build(chunks).text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rag::prompts::NO_ANSWER;
    use crate::types::{Chunk, SourceDescriptor, SourceKind};

    fn retrieved(
        origin: &str,
        media_type: &str,
        title: Option<&str>,
        content: &str,
        rank: usize,
    ) -> RetrievedChunk {
        let mut descriptor = SourceDescriptor::new(origin, SourceKind::File, media_type);
        if let Some(title) = title {
            descriptor = descriptor.with_title(title);
        }
        let chunk = Chunk::from_pieces(&descriptor, vec![content.to_string()]).remove(0);
        RetrievedChunk { chunk, rank }
    }

    #[test]
    fn test_blocks_in_rank_order() {
        let chunks = vec![
            retrieved("b.txt", "text/plain", None, "second file", 0),
            retrieved("a.pdf", "application/pdf", None, "first file", 1),
        ];

        let context = ContextAssembler::new().build(&chunks);

        assert_eq!(
            context.text,
            "Source 1 (text/plain: b.txt):\nsecond file\n\n---\nSource 2 (application/pdf: a.pdf):\nfirst file\n"
        );
        assert_eq!(context.source_count, 2);
        assert_eq!(context.dropped, 0);
    }

    #[test]
    fn test_title_used_without_origin() {
        let chunks = vec![retrieved("", "text/html", Some("A Page"), "body", 0)];
        let context = ContextAssembler::new().build(&chunks);
        assert!(context.text.starts_with("Source 1 (text/html: A Page):\n"));
    }

    #[test]
    fn test_empty_retrieval_renders_marker() {
        let assembler = ContextAssembler::new();
        let context = assembler.build(&[]);
        assert!(context.is_empty());
        assert_eq!(context.text, EMPTY_CONTEXT_MARKER);

        let prompt = assembler.assemble(&[], "Who is Alice?");
        assert!(prompt.contains(EMPTY_CONTEXT_MARKER));
        assert!(prompt.contains(&format!("respond exactly with \"{}\"", NO_ANSWER)));
    }

    #[test]
    fn test_size_bound_drops_tail_but_keeps_first() {
        let long = "x".repeat(100);
        let chunks = vec![
            retrieved("one", "text/plain", None, &long, 0),
            retrieved("two", "text/plain", None, &long, 1),
        ];

        let context = ContextAssembler::with_limit(50).build(&chunks);

        assert_eq!(context.source_count, 1);
        assert_eq!(context.dropped, 1);
        assert!(context.text.contains("(text/plain: one)"));
    }

    #[test]
    fn test_assemble_includes_question() {
        let chunks = vec![retrieved("people.csv", "text/csv", None, "name: Alice, age: 30", 0)];
        let prompt = ContextAssembler::new().assemble(&chunks, "How old is Alice?");

        assert!(prompt.contains("Source 1 (text/csv: people.csv):\nname: Alice, age: 30\n"));
        assert!(prompt.contains("Question: How old is Alice?"));
        assert!(!prompt.contains(EMPTY_CONTEXT_MARKER));
    }
}
