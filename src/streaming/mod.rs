//! Completion service: one-shot and streamed generation
//!
//! Provides the Ollama client and the incremental JSON parser it reads
//! streamed replies with.

pub mod client;
pub mod parser;

use async_trait::async_trait;
use futures_util::Stream;
use std::pin::Pin;
use tokio_util::sync::CancellationToken;

use crate::errors::Result;

pub use client::{
    OllamaClient, DEFAULT_MODEL, DEFAULT_OLLAMA_URL, DEFAULT_REQUEST_TIMEOUT, DEFAULT_TEMPERATURE,
};
pub use parser::{GenerateChunk, JsonParser, MAX_BUFFER_SIZE};

/// Text deltas in generation order; an `Err` item ends the stream
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// A language model that turns a prompt into text
#[async_trait]
pub trait CompletionService: Send + Sync {
    /// Whole reply at once
    async fn complete(&self, prompt: &str) -> Result<String>;

    /// Reply as deltas
    ///
    /// Establishing the stream is the fallible step that callers retry.
    /// Once `cancel` fires the stream ends without an error and the
    /// underlying request is abandoned.
    async fn stream(&self, prompt: &str, cancel: CancellationToken) -> Result<TextStream>;
}
