//! Index handle created on first use
//!
//! Connecting to a vector store can be slow or fail outright. Wrapping the
//! backend here defers that cost to the first store or query, runs it at
//! most once when it succeeds, and lets a failed attempt be retried by the
//! next call.

use async_trait::async_trait;
use futures_util::future::BoxFuture;
use std::future::Future;
use tokio::sync::OnceCell;

use super::IndexClient;
use crate::errors::Result;
use crate::types::{Chunk, RetrievedChunk};

type Init<C> = Box<dyn Fn() -> BoxFuture<'static, Result<C>> + Send + Sync>;

pub struct LazyIndex<C> {
    cell: OnceCell<C>,
    init: Init<C>,
}

impl<C: IndexClient> LazyIndex<C> {
    pub fn new<F, Fut>(init: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<C>> + Send + 'static,
    {
        Self {
            cell: OnceCell::new(),
            init: Box::new(move || Box::pin(init())),
        }
    }

    /// Backend, connecting first if nobody has yet
    pub async fn get(&self) -> Result<&C> {
        self.cell.get_or_try_init(|| (self.init)()).await
    }

    pub fn is_initialized(&self) -> bool {
        self.cell.initialized()
    }
}

#[async_trait]
impl<C: IndexClient> IndexClient for LazyIndex<C> {
    async fn store(&self, chunks: Vec<Chunk>) -> Result<()> {
        self.get().await?.store(chunks).await
    }

    async fn query(&self, text: &str, k: usize) -> Result<Vec<RetrievedChunk>> {
        self.get().await?.query(text, k).await
    }
}
