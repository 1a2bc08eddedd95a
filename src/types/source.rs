//! Source identity for one ingestion call

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Origin id given to pasted text, which has no identity of its own
pub const DIRECT_TEXT_ORIGIN: &str = "direct_text";

/// How a source reached the system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    File,
    Text,
    Url,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::File => "file",
            SourceKind::Text => "text",
            SourceKind::Url => "url",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "file" => Some(SourceKind::File),
            "text" => Some(SourceKind::Text),
            "url" => Some(SourceKind::Url),
            _ => None,
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Provenance stamped onto every chunk derived from one source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDescriptor {
    pub origin_id: String,
    pub kind: SourceKind,
    pub media_type: String,
    pub title: Option<String>,
}

impl SourceDescriptor {
    pub fn new(origin_id: impl Into<String>, kind: SourceKind, media_type: impl Into<String>) -> Self {
        Self {
            origin_id: origin_id.into(),
            kind,
            media_type: media_type.into(),
            title: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

/// One unit of work for the ingestion entrypoint
#[derive(Debug, Clone)]
pub enum IngestInput {
    /// Uploaded file: raw bytes plus whatever type hint the caller has
    File {
        file_name: String,
        media_type: Option<String>,
        data: Bytes,
    },
    /// Pasted text
    Text(String),
    /// Web page to fetch
    Url(String),
}

impl IngestInput {
    pub fn kind(&self) -> SourceKind {
        match self {
            IngestInput::File { .. } => SourceKind::File,
            IngestInput::Text(_) => SourceKind::Text,
            IngestInput::Url(_) => SourceKind::Url,
        }
    }

    /// Short human label for logs
    pub fn label(&self) -> &str {
        match self {
            IngestInput::File { file_name, .. } => file_name,
            IngestInput::Text(_) => DIRECT_TEXT_ORIGIN,
            IngestInput::Url(url) => url,
        }
    }
}
