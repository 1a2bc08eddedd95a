//! File format detection and decoding to plain text

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

use crate::errors::{RagError, Result};

/// Formats an uploaded file may be decoded from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentFormat {
    Pdf,
    Csv,
    PlainText,
    Markdown,
}

impl DocumentFormat {
    /// Pick a decoder from the declared media type, then the file extension
    pub fn detect(media_type: Option<&str>, file_name: &str) -> Result<Self> {
        let declared = media_type.map(essence).unwrap_or_default();

        let by_type = match declared.as_str() {
            "application/pdf" => Some(DocumentFormat::Pdf),
            "text/csv" | "application/csv" => Some(DocumentFormat::Csv),
            "text/plain" => Some(DocumentFormat::PlainText),
            "text/markdown" | "text/x-markdown" => Some(DocumentFormat::Markdown),
            _ => None,
        };
        if let Some(format) = by_type {
            return Ok(format);
        }

        let extension = Path::new(file_name)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);

        match extension.as_deref() {
            Some("pdf") => Ok(DocumentFormat::Pdf),
            Some("csv") => Ok(DocumentFormat::Csv),
            Some("txt") => Ok(DocumentFormat::PlainText),
            Some("md") | Some("markdown") => Ok(DocumentFormat::Markdown),
            _ => {
                let shown = if declared.is_empty() {
                    file_name.to_string()
                } else {
                    format!("{} ({})", file_name, declared)
                };
                Err(RagError::UnsupportedFormat(shown))
            }
        }
    }

    /// Canonical media type recorded on chunks
    pub fn media_type(&self) -> &'static str {
        match self {
            DocumentFormat::Pdf => "application/pdf",
            DocumentFormat::Csv => "text/csv",
            DocumentFormat::PlainText => "text/plain",
            DocumentFormat::Markdown => "text/markdown",
        }
    }

    /// Decode raw bytes; PDF parsing runs on the blocking pool
    pub async fn decode(&self, data: Bytes) -> Result<String> {
        let text = match self {
            DocumentFormat::Pdf => tokio::task::spawn_blocking(move || decode_pdf(&data))
                .await
                .map_err(|e| {
                    RagError::ExtractionFailed(format!("PDF parser aborted: {}", e))
                })??,
            DocumentFormat::Csv => decode_csv(&data)?,
            DocumentFormat::PlainText | DocumentFormat::Markdown => decode_text(&data),
        };

        debug!(format = ?self, chars = text.chars().count(), "decoded document");
        Ok(text)
    }
}

/// `text/csv; charset=utf-8` -> `text/csv`
fn essence(media_type: &str) -> String {
    media_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// Page text in reading order; no OCR
pub fn decode_pdf(data: &[u8]) -> Result<String> {
    pdf_extract::extract_text_from_mem(data)
        .map_err(|e| RagError::ExtractionFailed(format!("unreadable PDF: {}", e)))
}

/// Flatten rows to `header: value` pairs
///
/// Each row becomes one line of `key: value` pairs joined by `", "`. The
/// result loses quoting, so a value containing `", "` cannot be told apart
/// from a field boundary.
pub fn decode_csv(data: &[u8]) -> Result<String> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(data);

    let headers = reader
        .headers()
        .map_err(|e| RagError::ExtractionFailed(format!("invalid CSV header: {}", e)))?
        .clone();

    let mut lines = Vec::new();
    for record in reader.records() {
        let record =
            record.map_err(|e| RagError::ExtractionFailed(format!("invalid CSV row: {}", e)))?;

        let line = record
            .iter()
            .enumerate()
            .map(|(i, value)| match headers.get(i) {
                Some(key) => format!("{}: {}", key, value),
                None => format!("field_{}: {}", i + 1, value),
            })
            .collect::<Vec<_>>()
            .join(", ");
        lines.push(line);
    }

    Ok(lines.join("\n"))
}

/// UTF-8, with invalid sequences replaced
pub fn decode_text(data: &[u8]) -> String {
    String::from_utf8_lossy(data).into_owned()
}
