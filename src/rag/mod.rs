//! Retrieval-augmented generation
//!
//! Components:
//! - Context assembler: numbered, attributed context blocks and final prompts
//! - Prompts: answer and summary templates
//! - Retry: bounded retry of transient model failures
//! - Pipeline: one-shot, streaming and summary operations

pub mod context;
pub mod pipeline;
pub mod prompts;
pub mod retry;

pub use context::{AssembledContext, ContextAssembler, BLOCK_SEPARATOR};
pub use pipeline::{AnswerPhase, AnswerPipeline, AnswerStream, NO_SOURCES_MESSAGE, SUMMARY_QUERY};
pub use prompts::{EMPTY_CONTEXT_MARKER, NO_ANSWER};
pub use retry::RetryPolicy;
