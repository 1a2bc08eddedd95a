//! Web page retrieval

use async_trait::async_trait;
use reqwest::{header, Client};
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::errors::{RagError, Result};

pub const DEFAULT_USER_AGENT: &str = concat!("ragbuddy/", env!("CARGO_PKG_VERSION"));

/// Raw page as returned by the server
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// Final URL after redirects
    pub final_url: String,
    pub content_type: Option<String>,
    pub body: String,
}

/// Retrieves a page body
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &Url) -> Result<FetchedPage>;
}

/// Parse user input as an absolute http(s) URL
pub fn parse_page_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw.trim())
        .map_err(|e| RagError::FetchFailed(format!("invalid URL {:?}: {}", raw, e)))?;

    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(RagError::FetchFailed(format!(
            "unsupported URL scheme {:?} in {}",
            other, url
        ))),
    }
}

/// reqwest-backed fetcher
///
/// Without a timeout a stalled server holds the request indefinitely.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(timeout: Option<Duration>, user_agent: &str) -> Result<Self> {
        let mut builder = Client::builder().user_agent(user_agent);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        let client = builder
            .build()
            .map_err(|e| RagError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &Url) -> Result<FetchedPage> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| RagError::FetchFailed(format!("{}: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RagError::FetchFailed(format!(
                "{} returned HTTP {}",
                url, status
            )));
        }

        let final_url = response.url().to_string();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);

        let body = response
            .text()
            .await
            .map_err(|e| RagError::FetchFailed(format!("{}: failed to read body: {}", url, e)))?;

        debug!(%url, %final_url, bytes = body.len(), "fetched page");
        Ok(FetchedPage {
            final_url,
            content_type,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_page_url() {
        let url = parse_page_url("  https://example.com/post?id=1 ").unwrap();
        assert_eq!(url.host_str(), Some("example.com"));

        assert!(matches!(
            parse_page_url("not a url"),
            Err(RagError::FetchFailed(_))
        ));
        assert!(matches!(
            parse_page_url("ftp://example.com/file"),
            Err(RagError::FetchFailed(_))
        ));
    }

    #[tokio::test]
    async fn test_unreachable_host_is_fetch_failure() {
        let fetcher = HttpFetcher::new(Some(Duration::from_secs(2)), DEFAULT_USER_AGENT).unwrap();
        let url = parse_page_url("http://127.0.0.1:9/").unwrap();

        let err = fetcher.fetch(&url).await.unwrap_err();
        assert!(matches!(err, RagError::FetchFailed(_)));
    }
}
