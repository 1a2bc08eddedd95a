//! Test doubles shared by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use futures_util::stream;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use url::Url;

use ragbuddy::chunking::{ChunkerConfig, RecursiveChunker};
use ragbuddy::index::InMemoryIndex;
use ragbuddy::ingest::{FetchedPage, IngestPipeline, Normalizer, PageFetcher};
use ragbuddy::rag::{RetryPolicy, EMPTY_CONTEXT_MARKER, NO_ANSWER};
use ragbuddy::streaming::{CompletionService, TextStream};
use ragbuddy::{RagError, Result};

/// Completion stub that follows the prompt rules literally
///
/// Failures queued with [`RuleFollowingModel::fail_next`] are returned
/// first. After that it answers [`NO_ANSWER`] for an empty context and
/// otherwise echoes the first source line.
#[derive(Default)]
pub struct RuleFollowingModel {
    failures: Mutex<VecDeque<RagError>>,
    pub calls: AtomicU32,
    pub prompts: Mutex<Vec<String>>,
    pub tokens: Mutex<Vec<CancellationToken>>,
}

impl RuleFollowingModel {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_next(&self, error: RagError) {
        self.failures.lock().unwrap().push_back(error);
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_prompt(&self) -> String {
        self.prompts.lock().unwrap().last().cloned().unwrap_or_default()
    }

    fn reply(&self, prompt: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());

        if let Some(error) = self.failures.lock().unwrap().pop_front() {
            return Err(error);
        }

        if prompt.contains(EMPTY_CONTEXT_MARKER) {
            return Ok(NO_ANSWER.to_string());
        }

        let source_line = prompt
            .lines()
            .skip_while(|line| !line.starts_with("Source 1 ("))
            .nth(1)
            .unwrap_or_default();
        Ok(format!("{} [Source 1]", source_line))
    }
}

#[async_trait]
impl CompletionService for RuleFollowingModel {
    async fn complete(&self, prompt: &str) -> Result<String> {
        self.reply(prompt)
    }

    async fn stream(&self, prompt: &str, cancel: CancellationToken) -> Result<TextStream> {
        let text = self.reply(prompt)?;
        self.tokens.lock().unwrap().push(cancel);

        let deltas: Vec<Result<String>> = text
            .split_inclusive(' ')
            .map(|word| Ok(word.to_string()))
            .collect();
        Ok(Box::pin(stream::iter(deltas)))
    }
}

/// Serves fixed HTML for any URL
pub struct StaticFetcher {
    pub html: String,
}

#[async_trait]
impl PageFetcher for StaticFetcher {
    async fn fetch(&self, url: &Url) -> Result<FetchedPage> {
        Ok(FetchedPage {
            final_url: url.to_string(),
            content_type: Some("text/html; charset=utf-8".to_string()),
            body: self.html.clone(),
        })
    }
}

pub fn ingest_pipeline(index: Arc<InMemoryIndex>, html: &str) -> IngestPipeline {
    let fetcher = Arc::new(StaticFetcher {
        html: html.to_string(),
    });
    IngestPipeline::new(
        Normalizer::new(fetcher),
        RecursiveChunker::with_config(ChunkerConfig::default()).unwrap(),
        index,
    )
}

pub fn no_wait_retry() -> RetryPolicy {
    RetryPolicy::with_config(2, Duration::ZERO)
}
