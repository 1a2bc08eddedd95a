//! Configuration management for RagBuddy
//!
//! TOML file with built-in defaults for every key; a partial file only
//! overrides what it names.
//! Location: ~/.ragbuddy/config.toml

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::chunking::ChunkerConfig;
use crate::errors::{RagError, Result};
use crate::index::qdrant::{DEFAULT_COLLECTION, DEFAULT_EMBEDDING_DIM, DEFAULT_QDRANT_URL};
use crate::index::DEFAULT_EMBEDDING_MODEL;
use crate::ingest::DEFAULT_USER_AGENT;
use crate::streaming::{DEFAULT_MODEL, DEFAULT_REQUEST_TIMEOUT, DEFAULT_TEMPERATURE};
use crate::telemetry::DEFAULT_LOG_FILTER;

/// Complete configuration for RagBuddy
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub ollama: OllamaConfig,
    pub index: IndexConfig,
    pub chunking: ChunkerConfig,
    pub retrieval: RetrievalConfig,
    pub retry: RetryConfig,
    pub fetch: FetchConfig,
    pub logging: LoggingConfig,
}

/// Completion and embedding server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OllamaConfig {
    pub host: String,
    pub port: u16,
    pub model: String,
    pub embedding_model: String,
    pub temperature: f32,
    pub request_timeout_secs: u64,
}

/// Vector store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    pub qdrant_url: String,
    pub collection: String,
    pub embedding_dim: u64,
}

/// How many chunks feed each kind of prompt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub answer_top_k: usize,
    pub summary_top_k: usize,
    /// Upper bound on rendered context; the first block is always kept
    pub max_context_chars: usize,
}

/// Retries of transient model failures
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Extra attempts after the first
    pub max_retries: u32,
    pub backoff_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Unset means no timeout
    pub timeout_secs: Option<u64>,
    pub user_agent: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directives; `RUST_LOG` wins when set
    pub filter: String,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 11434,
            model: DEFAULT_MODEL.to_string(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT.as_secs(),
        }
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            qdrant_url: DEFAULT_QDRANT_URL.to_string(),
            collection: DEFAULT_COLLECTION.to_string(),
            embedding_dim: DEFAULT_EMBEDDING_DIM,
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            answer_top_k: 5,
            summary_top_k: 10,
            max_context_chars: 16_000,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            backoff_secs: 2,
        }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

impl Config {
    /// Load configuration from file or use defaults
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        if let Some(config_path) = path {
            Self::load_from_file(&config_path)
        } else {
            Self::load_default()
        }
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| RagError::Config(format!("Failed to read config {}: {}", path.display(), e)))?;

        let config: Config = toml::from_str(&contents)
            .map_err(|e| RagError::Config(format!("Failed to parse config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Load from the standard location, falling back to built-in defaults
    pub fn load_default() -> Result<Self> {
        if let Some(config_path) = Self::default_path() {
            if config_path.exists() {
                return Self::load_from_file(&config_path);
            }
        }

        Ok(Config::default())
    }

    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".ragbuddy").join("config.toml"))
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.ollama.port == 0 {
            return Err(RagError::Config("ollama.port must be non-zero".to_string()));
        }

        if !(0.0..=2.0).contains(&self.ollama.temperature) {
            return Err(RagError::Config(
                "ollama.temperature must be between 0.0 and 2.0".to_string(),
            ));
        }

        if self.ollama.request_timeout_secs == 0 {
            return Err(RagError::Config(
                "ollama.request_timeout_secs must be greater than 0".to_string(),
            ));
        }

        url::Url::parse(&self.index.qdrant_url)
            .map_err(|e| RagError::Config(format!("index.qdrant_url is invalid: {}", e)))?;

        if self.index.collection.trim().is_empty() {
            return Err(RagError::Config("index.collection must not be empty".to_string()));
        }

        if self.index.embedding_dim == 0 {
            return Err(RagError::Config(
                "index.embedding_dim must be greater than 0".to_string(),
            ));
        }

        self.chunking.validate()?;

        if self.retrieval.answer_top_k == 0 || self.retrieval.summary_top_k == 0 {
            return Err(RagError::Config(
                "retrieval top_k values must be greater than 0".to_string(),
            ));
        }

        if self.fetch.timeout_secs == Some(0) {
            return Err(RagError::Config(
                "fetch.timeout_secs must be greater than 0 when set".to_string(),
            ));
        }

        Ok(())
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = self.to_toml()?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| RagError::Config(format!("Failed to create config dir: {}", e)))?;
        }

        std::fs::write(path, contents)
            .map_err(|e| RagError::Config(format!("Failed to write config: {}", e)))?;

        Ok(())
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| RagError::Config(format!("Failed to serialize config: {}", e)))
    }

    /// Get Ollama base URL
    pub fn ollama_url(&self) -> String {
        format!("http://{}:{}", self.ollama.host, self.ollama.port)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.ollama.request_timeout_secs)
    }

    pub fn fetch_timeout(&self) -> Option<Duration> {
        self.fetch.timeout_secs.map(Duration::from_secs)
    }
}
