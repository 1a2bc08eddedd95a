//! Retrieval-augmented answering
//!
//! Every call walks the same phases:
//!
//! ```text
//! BuildingContext -> CallingModel -> { Streaming -> Complete | Complete | Failed }
//! ```
//!
//! `BuildingContext` queries the index and renders the prompt;
//! `CallingModel` issues the completion request under the retry policy.
//! Only establishing the request is retried. Once deltas have reached the
//! caller a failure ends the stream instead of replaying the prompt.

use futures_util::{stream, Stream};
use serde::Serialize;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::context::ContextAssembler;
use super::retry::RetryPolicy;
use crate::config::RetrievalConfig;
use crate::errors::{RagError, Result};
use crate::index::IndexClient;
use crate::streaming::{CompletionService, TextStream};

/// Topic-agnostic query used to sample the whole index for a summary
pub const SUMMARY_QUERY: &str = "summary main topics content";

/// Returned by `summarize` when nothing has been ingested
pub const NO_SOURCES_MESSAGE: &str =
    "No sources have been uploaded yet. Please upload some documents first.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum AnswerPhase {
    BuildingContext,
    CallingModel,
    Streaming,
    Complete,
    Failed,
}

impl AnswerPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, AnswerPhase::Complete | AnswerPhase::Failed)
    }

    /// Valid edges of the per-call state machine
    ///
    /// `BuildingContext -> Complete` is the empty-index summary short-circuit.
    pub fn can_advance_to(&self, next: AnswerPhase) -> bool {
        use AnswerPhase::*;

        matches!(
            (self, next),
            (BuildingContext, CallingModel)
                | (BuildingContext, Complete)
                | (BuildingContext, Failed)
                | (CallingModel, Streaming)
                | (CallingModel, Complete)
                | (CallingModel, Failed)
                | (Streaming, Complete)
                | (Streaming, Failed)
        )
    }
}

/// Logs each phase change of one call
#[derive(Debug)]
struct PhaseTracker {
    operation: &'static str,
    phase: AnswerPhase,
}

impl PhaseTracker {
    fn start(operation: &'static str) -> Self {
        debug!(operation, phase = ?AnswerPhase::BuildingContext, "answer phase");
        Self {
            operation,
            phase: AnswerPhase::BuildingContext,
        }
    }

    fn advance(&mut self, next: AnswerPhase) {
        debug_assert!(
            self.phase.can_advance_to(next),
            "invalid answer phase change {:?} -> {:?}",
            self.phase,
            next
        );
        debug!(operation = self.operation, from = ?self.phase, to = ?next, "answer phase");
        self.phase = next;
    }

    fn fail(&mut self, error: &RagError) {
        warn!(
            operation = self.operation,
            phase = ?self.phase,
            kind = ?error.kind(),
            error = %error,
            "answer failed"
        );
        self.advance(AnswerPhase::Failed);
    }
}

/// Live answer deltas
///
/// Consumed once. Dropping it, or calling [`AnswerStream::cancel`], abandons
/// the model request.
pub struct AnswerStream {
    inner: TextStream,
    cancel: CancellationToken,
    phase: PhaseTracker,
}

impl AnswerStream {
    fn new(inner: TextStream, cancel: CancellationToken, phase: PhaseTracker) -> Self {
        Self {
            inner,
            cancel,
            phase,
        }
    }

    /// Stop generation
    ///
    /// The model's stream is dropped here, so its request is abandoned
    /// without another poll. Polling afterwards yields `None`.
    pub fn cancel(&mut self) {
        self.cancel.cancel();
        self.inner = Box::pin(stream::empty());
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn phase(&self) -> AnswerPhase {
        self.phase.phase
    }
}

impl Stream for AnswerStream {
    type Item = Result<String>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.phase.phase.is_terminal() {
            return Poll::Ready(None);
        }

        match this.inner.as_mut().poll_next(cx) {
            Poll::Ready(Some(Ok(delta))) => Poll::Ready(Some(Ok(delta))),
            Poll::Ready(Some(Err(e))) => {
                this.phase.fail(&e);
                Poll::Ready(Some(Err(e)))
            }
            Poll::Ready(None) => {
                if this.cancel.is_cancelled() {
                    info!("answer stream cancelled");
                }
                this.phase.advance(AnswerPhase::Complete);
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl Drop for AnswerStream {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

pub struct AnswerPipeline {
    index: Arc<dyn IndexClient>,
    model: Arc<dyn CompletionService>,
    assembler: ContextAssembler,
    retry: RetryPolicy,
    retrieval: RetrievalConfig,
}

impl AnswerPipeline {
    pub fn new(index: Arc<dyn IndexClient>, model: Arc<dyn CompletionService>) -> Self {
        Self::with_config(index, model, RetrievalConfig::default(), RetryPolicy::new())
    }

    pub fn with_config(
        index: Arc<dyn IndexClient>,
        model: Arc<dyn CompletionService>,
        retrieval: RetrievalConfig,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            index,
            model,
            assembler: ContextAssembler::with_limit(retrieval.max_context_chars),
            retry,
            retrieval,
        }
    }

    /// Retrieve the top-k chunks for the raw question and render the prompt
    async fn build_prompt(&self, question: &str) -> Result<String> {
        if question.trim().is_empty() {
            return Err(RagError::InvalidInput("question must not be empty".to_string()));
        }

        let chunks = self.index.query(question, self.retrieval.answer_top_k).await?;
        debug!(retrieved = chunks.len(), "context retrieved");

        Ok(self.assembler.assemble(&chunks, question))
    }

    #[instrument(name = "answer_once", skip_all, fields(question_chars = question.chars().count()))]
    pub async fn answer_once(&self, question: &str) -> Result<String> {
        let mut phase = PhaseTracker::start("answer_once");

        let result = self.complete_answer(question, &mut phase).await;
        match &result {
            Ok(_) => phase.advance(AnswerPhase::Complete),
            Err(e) => phase.fail(e),
        }
        result
    }

    async fn complete_answer(&self, question: &str, phase: &mut PhaseTracker) -> Result<String> {
        let prompt = self.build_prompt(question).await?;
        phase.advance(AnswerPhase::CallingModel);
        self.retry.execute(|| self.model.complete(&prompt)).await
    }

    #[instrument(name = "answer_streaming", skip_all, fields(question_chars = question.chars().count()))]
    pub async fn answer_streaming(&self, question: &str) -> Result<AnswerStream> {
        let mut phase = PhaseTracker::start("answer_streaming");
        let cancel = CancellationToken::new();

        match self.open_stream(question, &cancel, &mut phase).await {
            Ok(deltas) => {
                phase.advance(AnswerPhase::Streaming);
                Ok(AnswerStream::new(deltas, cancel, phase))
            }
            Err(e) => {
                phase.fail(&e);
                Err(e)
            }
        }
    }

    async fn open_stream(
        &self,
        question: &str,
        cancel: &CancellationToken,
        phase: &mut PhaseTracker,
    ) -> Result<TextStream> {
        let prompt = self.build_prompt(question).await?;
        phase.advance(AnswerPhase::CallingModel);
        self.retry
            .execute(|| self.model.stream(&prompt, cancel.child_token()))
            .await
    }

    /// Multi-source synthesis over a broad sample of the index
    ///
    /// An empty index yields [`NO_SOURCES_MESSAGE`] without calling the model.
    #[instrument(name = "summarize", skip_all)]
    pub async fn summarize(&self) -> Result<String> {
        let mut phase = PhaseTracker::start("summarize");

        match self.summarize_sources(&mut phase).await {
            Ok(summary) => {
                phase.advance(AnswerPhase::Complete);
                Ok(summary.unwrap_or_else(|| NO_SOURCES_MESSAGE.to_string()))
            }
            Err(e) => {
                phase.fail(&e);
                Err(e)
            }
        }
    }

    /// `None` when the index holds nothing to summarize
    async fn summarize_sources(&self, phase: &mut PhaseTracker) -> Result<Option<String>> {
        let chunks = self
            .index
            .query(SUMMARY_QUERY, self.retrieval.summary_top_k)
            .await?;
        if chunks.is_empty() {
            info!("no sources indexed, skipping model call");
            return Ok(None);
        }

        let prompt = self.assembler.assemble_summary(&chunks);
        phase.advance(AnswerPhase::CallingModel);
        self.retry
            .execute(|| self.model.complete(&prompt))
            .await
            .map(Some)
    }
}
