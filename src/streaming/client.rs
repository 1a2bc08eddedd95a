//! Ollama completion client
//!
//! Talks to `POST /api/generate`, either as a single JSON reply or as a
//! newline-delimited stream of partial responses ending in `"done": true`.

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use reqwest::{Client, Response, StatusCode};
use serde::Serialize;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::parser::{GenerateChunk, JsonParser};
use super::{CompletionService, TextStream};
use crate::errors::{RagError, Result};

/// Default Ollama API endpoint
pub const DEFAULT_OLLAMA_URL: &str = "http://127.0.0.1:11434";

/// Default model
pub const DEFAULT_MODEL: &str = "qwen2.5:7b-instruct";

/// Low temperature keeps answers close to the sources
pub const DEFAULT_TEMPERATURE: f32 = 0.1;

/// Time allowed for a reply to start, and between stream reads
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Deltas buffered between the body reader and the consumer
const DELTA_BUFFER: usize = 32;

#[derive(Debug, Clone)]
pub struct OllamaClient {
    client: Client,
    base_url: String,
    model: String,
    temperature: f32,
    request_timeout: Duration,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    temperature: f32,
}

/// Connection-level failures are worth retrying; everything else is final
fn transport_error(e: reqwest::Error) -> RagError {
    if e.is_timeout() || e.is_connect() || e.is_request() || e.is_body() {
        RagError::ModelTransientFailure(e.to_string())
    } else {
        RagError::ModelFailure(e.to_string())
    }
}

/// Gateway statuses mean the model server is restarting or overloaded
fn status_error(status: StatusCode, body: &str) -> RagError {
    let message = format!("HTTP {}: {}", status, body.trim());
    match status {
        StatusCode::BAD_GATEWAY | StatusCode::SERVICE_UNAVAILABLE | StatusCode::GATEWAY_TIMEOUT => {
            RagError::ModelTransientFailure(message)
        }
        _ => RagError::ModelFailure(message),
    }
}

impl OllamaClient {
    /// Create new Ollama client with default settings
    pub fn new() -> Result<Self> {
        Self::with_config(DEFAULT_OLLAMA_URL, DEFAULT_MODEL)
    }

    pub fn with_config(base_url: &str, model: &str) -> Result<Self> {
        // No overall timeout: streams legitimately run for minutes
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| RagError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        })
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    fn timed_out(&self) -> RagError {
        RagError::ModelTransientFailure(format!(
            "no reply from {} within {}s",
            self.base_url,
            self.request_timeout.as_secs_f32()
        ))
    }

    async fn send(&self, prompt: &str, stream: bool) -> Result<Response> {
        let url = format!("{}/api/generate", self.base_url);
        let request = GenerateRequest {
            model: &self.model,
            prompt,
            stream,
            options: GenerateOptions {
                temperature: self.temperature,
            },
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, &body));
        }

        Ok(response)
    }

    /// Check if Ollama is available
    pub async fn health_check(&self) -> Result<bool> {
        let url = format!("{}/api/version", self.base_url);

        match self.client.get(&url).send().await {
            Ok(response) => Ok(response.status().is_success()),
            Err(_) => Ok(false),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl CompletionService for OllamaClient {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let call = async {
            let response = self.send(prompt, false).await?;
            let body = response.text().await.map_err(transport_error)?;
            let reply = GenerateChunk::parse(&body)?;
            match reply.error {
                Some(error) => Err(RagError::ModelFailure(error)),
                None => Ok(reply.response),
            }
        };

        tokio::time::timeout(self.request_timeout, call)
            .await
            .map_err(|_| self.timed_out())?
    }

    async fn stream(&self, prompt: &str, cancel: CancellationToken) -> Result<TextStream> {
        let response = tokio::time::timeout(self.request_timeout, self.send(prompt, true))
            .await
            .map_err(|_| self.timed_out())??;

        // The body is owned by the reader task, so cancelling drops the
        // connection even if nobody polls the returned stream again
        let (tx, mut rx) = mpsc::channel(DELTA_BUFFER);
        tokio::spawn(forward_deltas(
            response.bytes_stream(),
            tx,
            cancel,
            self.request_timeout,
        ));

        let stream = async_stream::stream! {
            while let Some(delta) = rx.recv().await {
                yield delta;
            }
        };

        Ok(Box::pin(stream))
    }
}

/// Read NDJSON off `body` and hand each delta to `tx`
///
/// Returns when the reply ends or fails, or once nobody wants it any more.
/// The response is dropped before any final error is delivered.
async fn forward_deltas<S>(
    body: S,
    tx: mpsc::Sender<Result<String>>,
    cancel: CancellationToken,
    idle: Duration,
) where
    S: Stream<Item = reqwest::Result<Bytes>> + Send + 'static,
{
    let mut body = Box::pin(body);
    let outcome = read_deltas(&mut body, &tx, &cancel, idle).await;
    drop(body);

    if let Err(e) = outcome {
        if !cancel.is_cancelled() {
            let _ = tx.send(Err(e)).await;
        }
    }
}

async fn read_deltas<S>(
    body: &mut S,
    tx: &mpsc::Sender<Result<String>>,
    cancel: &CancellationToken,
    idle: Duration,
) -> Result<()>
where
    S: Stream<Item = reqwest::Result<Bytes>> + Unpin,
{
    let mut parser = JsonParser::new();

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("generation cancelled by caller");
                return Ok(());
            }
            _ = tx.closed() => {
                debug!("stream consumer went away");
                return Ok(());
            }
            next = tokio::time::timeout(idle, body.next()) => next,
        };

        let next = next.map_err(|_| {
            RagError::ModelTransientFailure(format!("stream stalled for {}s", idle.as_secs_f32()))
        })?;

        let Some(bytes) = next else {
            return Err(RagError::ModelTransientFailure(
                "stream closed before completion marker".to_string(),
            ));
        };
        let bytes = bytes.map_err(transport_error)?;

        for object in parser.push(&bytes)? {
            let chunk = GenerateChunk::parse(&object)?;
            if let Some(error) = chunk.error {
                return Err(RagError::ModelFailure(error));
            }
            if !chunk.response.is_empty() {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Ok(()),
                    sent = tx.send(Ok(chunk.response)) => {
                        if sent.is_err() {
                            return Ok(());
                        }
                    }
                }
            }
            if chunk.done {
                return Ok(());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::TryStreamExt;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};
    use tokio::sync::oneshot;

    /// Read one HTTP request, headers and body
    async fn read_request(socket: &mut TcpStream) {
        let mut request = Vec::new();
        let mut buf = [0u8; 4096];
        loop {
            let n = socket.read(&mut buf).await.unwrap();
            request.extend_from_slice(&buf[..n]);
            let text = String::from_utf8_lossy(&request).to_string();
            if let Some(end) = text.find("\r\n\r\n") {
                let length = text
                    .lines()
                    .find_map(|l| {
                        l.to_ascii_lowercase()
                            .strip_prefix("content-length:")
                            .map(|v| v.trim().parse::<usize>().unwrap())
                    })
                    .unwrap_or(0);
                if request.len() >= end + 4 + length {
                    break;
                }
            }
            if n == 0 {
                break;
            }
        }
    }

    /// Serve one canned HTTP response on a local port
    async fn serve_once(status: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            read_request(&mut socket).await;

            let response = format!(
                "HTTP/1.1 {}\r\nContent-Type: application/x-ndjson\r\nConnection: close\r\n\r\n{}",
                status, body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
        });

        format!("http://{}", addr)
    }

    /// Send one delta, then hold the connection open until the client closes it
    async fn serve_then_stall(first: &'static str) -> (String, oneshot::Receiver<()>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (closed_tx, closed_rx) = oneshot::channel();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            read_request(&mut socket).await;

            let head = "HTTP/1.1 200 OK\r\nContent-Type: application/x-ndjson\r\nConnection: close\r\n\r\n";
            socket.write_all(head.as_bytes()).await.unwrap();
            socket.write_all(first.as_bytes()).await.unwrap();
            socket.flush().await.unwrap();

            let mut buf = [0u8; 1024];
            loop {
                match socket.read(&mut buf).await {
                    Ok(0) | Err(_) => break,
                    Ok(_) => continue,
                }
            }
            let _ = closed_tx.send(());
        });

        (format!("http://{}", addr), closed_rx)
    }

    #[test]
    fn test_client_creation() {
        let client = OllamaClient::new().unwrap();
        assert_eq!(client.model(), DEFAULT_MODEL);
        assert_eq!(client.base_url(), DEFAULT_OLLAMA_URL);

        let client = OllamaClient::with_config("http://localhost:11434/", "llama2:7b").unwrap();
        assert_eq!(client.base_url(), "http://localhost:11434");
    }

    #[test]
    fn test_request_shape() {
        let request = GenerateRequest {
            model: "m",
            prompt: "p",
            stream: true,
            options: GenerateOptions { temperature: 0.1 },
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["stream"], true);
        assert!((json["options"]["temperature"].as_f64().unwrap() - 0.1).abs() < 1e-6);
    }

    #[test]
    fn test_status_classification() {
        assert!(status_error(StatusCode::SERVICE_UNAVAILABLE, "").is_transient());
        assert!(status_error(StatusCode::BAD_GATEWAY, "").is_transient());
        assert!(!status_error(StatusCode::UNAUTHORIZED, "").is_transient());
        assert!(!status_error(StatusCode::NOT_FOUND, "model missing").is_transient());
    }

    #[tokio::test]
    async fn test_complete_single_reply() {
        let url = serve_once("200 OK", r#"{"response":"Paris","done":true}"#).await;
        let client = OllamaClient::with_config(&url, "m").unwrap();

        assert_eq!(client.complete("capital?").await.unwrap(), "Paris");
    }

    #[tokio::test]
    async fn test_complete_unavailable_is_transient() {
        let url = serve_once("503 Service Unavailable", "loading").await;
        let client = OllamaClient::with_config(&url, "m").unwrap();

        let err = client.complete("q").await.unwrap_err();
        assert!(matches!(err, RagError::ModelTransientFailure(_)));
    }

    #[tokio::test]
    async fn test_complete_not_found_is_final() {
        let url = serve_once("404 Not Found", r#"{"error":"model 'm' not found"}"#).await;
        let client = OllamaClient::with_config(&url, "m").unwrap();

        let err = client.complete("q").await.unwrap_err();
        assert!(matches!(err, RagError::ModelFailure(_)));
    }

    #[tokio::test]
    async fn test_connection_refused_is_transient() {
        let client = OllamaClient::with_config("http://127.0.0.1:9", "m").unwrap();
        let err = client.complete("q").await.unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_stream_yields_deltas_until_done() {
        let url = serve_once(
            "200 OK",
            "{\"response\":\"Hel\",\"done\":false}\n{\"response\":\"lo\",\"done\":false}\n{\"response\":\"\",\"done\":true}\n",
        )
        .await;
        let client = OllamaClient::with_config(&url, "m").unwrap();

        let stream = client.stream("q", CancellationToken::new()).await.unwrap();
        let deltas: Vec<String> = stream.try_collect().await.unwrap();

        assert_eq!(deltas, vec!["Hel", "lo"]);
    }

    #[tokio::test]
    async fn test_stream_without_done_fails() {
        let url = serve_once("200 OK", "{\"response\":\"Hel\",\"done\":false}\n").await;
        let client = OllamaClient::with_config(&url, "m").unwrap();

        let items: Vec<Result<String>> = client
            .stream("q", CancellationToken::new())
            .await
            .unwrap()
            .collect()
            .await;

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_ref().unwrap(), "Hel");
        assert!(matches!(items[1], Err(RagError::ModelTransientFailure(_))));
    }

    #[tokio::test]
    async fn test_stream_error_object_fails() {
        let url = serve_once("200 OK", "{\"error\":\"out of memory\"}\n").await;
        let client = OllamaClient::with_config(&url, "m").unwrap();

        let result: Result<Vec<String>> = client
            .stream("q", CancellationToken::new())
            .await
            .unwrap()
            .try_collect()
            .await;

        assert!(matches!(result, Err(RagError::ModelFailure(ref m)) if m == "out of memory"));
    }

    #[tokio::test]
    async fn test_cancelled_stream_ends_quietly() {
        let url = serve_once("200 OK", "{\"response\":\"a\",\"done\":false}\n").await;
        let client = OllamaClient::with_config(&url, "m").unwrap();

        let cancel = CancellationToken::new();
        cancel.cancel();
        let items: Vec<Result<String>> = client
            .stream("q", cancel)
            .await
            .unwrap()
            .collect()
            .await;

        assert!(items.is_empty());
    }

    #[tokio::test]
    async fn test_cancel_releases_connection_without_polling() {
        let (url, closed) = serve_then_stall("{\"response\":\"Hello \",\"done\":false}\n").await;
        let client = OllamaClient::with_config(&url, "m").unwrap();

        let cancel = CancellationToken::new();
        let mut stream = client.stream("q", cancel.clone()).await.unwrap();
        assert_eq!(stream.next().await.unwrap().unwrap(), "Hello ");

        cancel.cancel();

        // Still holding the stream, never polled again
        let released = tokio::time::timeout(Duration::from_secs(5), closed).await;
        assert!(released.is_ok(), "connection still open after cancel");
        drop(stream);
    }

    #[tokio::test]
    async fn test_dropped_stream_releases_connection() {
        let (url, closed) = serve_then_stall("{\"response\":\"Hello \",\"done\":false}\n").await;
        let client = OllamaClient::with_config(&url, "m").unwrap();

        let mut stream = client.stream("q", CancellationToken::new()).await.unwrap();
        assert_eq!(stream.next().await.unwrap().unwrap(), "Hello ");
        drop(stream);

        let released = tokio::time::timeout(Duration::from_secs(5), closed).await;
        assert!(released.is_ok(), "connection still open after drop");
    }

    #[tokio::test]
    #[ignore] // Requires a running Ollama instance
    async fn test_health_check_live() {
        let client = OllamaClient::new().unwrap();
        assert!(client.health_check().await.unwrap());
    }
}
