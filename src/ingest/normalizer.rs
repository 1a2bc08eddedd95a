//! Turns any ingestion input into plain text plus provenance

use bytes::Bytes;
use std::sync::Arc;
use tracing::debug;

use super::article::{extract_article, UNTITLED_PAGE};
use super::fetch::{parse_page_url, PageFetcher};
use super::format::DocumentFormat;
use crate::errors::{RagError, Result};
use crate::types::{IngestInput, SourceDescriptor, SourceKind, DIRECT_TEXT_ORIGIN};

/// Plain text ready for chunking; never blank
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedSource {
    pub text: String,
    pub descriptor: SourceDescriptor,
}

pub struct Normalizer {
    fetcher: Arc<dyn PageFetcher>,
}

impl Normalizer {
    pub fn new(fetcher: Arc<dyn PageFetcher>) -> Self {
        Self { fetcher }
    }

    pub async fn normalize(&self, input: IngestInput) -> Result<NormalizedSource> {
        let (text, descriptor) = match input {
            IngestInput::File {
                file_name,
                media_type,
                data,
            } => self.normalize_file(file_name, media_type.as_deref(), data).await?,
            IngestInput::Text(text) => (
                text,
                SourceDescriptor::new(DIRECT_TEXT_ORIGIN, SourceKind::Text, "text/plain"),
            ),
            IngestInput::Url(raw) => self.normalize_url(raw).await?,
        };

        if text.trim().is_empty() {
            return Err(RagError::EmptyContent(descriptor.origin_id));
        }

        debug!(
            origin = %descriptor.origin_id,
            media_type = %descriptor.media_type,
            chars = text.chars().count(),
            "normalized source"
        );
        Ok(NormalizedSource { text, descriptor })
    }

    async fn normalize_file(
        &self,
        file_name: String,
        media_type: Option<&str>,
        data: Bytes,
    ) -> Result<(String, SourceDescriptor)> {
        let format = DocumentFormat::detect(media_type, &file_name)?;
        let text = format.decode(data).await?;
        let descriptor = SourceDescriptor::new(file_name, SourceKind::File, format.media_type());
        Ok((text, descriptor))
    }

    async fn normalize_url(&self, raw: String) -> Result<(String, SourceDescriptor)> {
        let url = parse_page_url(&raw)?;
        let page = self.fetcher.fetch(&url).await?;
        if page.final_url != url.as_str() {
            debug!(requested = %url, final_url = %page.final_url, "page redirected");
        }
        if !is_html(page.content_type.as_deref()) {
            return Err(RagError::ExtractionFailed(format!(
                "{} is not an HTML page ({})",
                url,
                page.content_type.as_deref().unwrap_or_default()
            )));
        }
        let article = extract_article(&page.body)?;

        let title = article.title.unwrap_or_else(|| UNTITLED_PAGE.to_string());
        let descriptor =
            SourceDescriptor::new(raw.trim(), SourceKind::Url, "text/html").with_title(title);
        Ok((article.text, descriptor))
    }
}

/// Pages that omit a content type are given the benefit of the doubt
fn is_html(content_type: Option<&str>) -> bool {
    let Some(content_type) = content_type else {
        return true;
    };
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    matches!(essence.as_str(), "text/html" | "application/xhtml+xml")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::fetch::FetchedPage;
    use async_trait::async_trait;
    use url::Url;

    struct StaticPage {
        body: &'static str,
        content_type: Option<&'static str>,
    }

    #[async_trait]
    impl PageFetcher for StaticPage {
        async fn fetch(&self, url: &Url) -> Result<FetchedPage> {
            Ok(FetchedPage {
                final_url: url.to_string(),
                content_type: self.content_type.map(str::to_string),
                body: self.body.to_string(),
            })
        }
    }

    fn normalizer(page: &'static str) -> Normalizer {
        typed_normalizer(page, Some("text/html"))
    }

    fn typed_normalizer(body: &'static str, content_type: Option<&'static str>) -> Normalizer {
        Normalizer::new(Arc::new(StaticPage { body, content_type }))
    }

    #[tokio::test]
    async fn test_text_input() {
        let source = normalizer("")
            .normalize(IngestInput::Text("Pasted notes".to_string()))
            .await
            .unwrap();

        assert_eq!(source.text, "Pasted notes");
        assert_eq!(source.descriptor.origin_id, DIRECT_TEXT_ORIGIN);
        assert_eq!(source.descriptor.kind, SourceKind::Text);
        assert_eq!(source.descriptor.media_type, "text/plain");
    }

    #[tokio::test]
    async fn test_blank_text_is_empty_content() {
        let err = normalizer("")
            .normalize(IngestInput::Text(" \n\t ".to_string()))
            .await
            .unwrap_err();
        assert!(matches!(err, RagError::EmptyContent(ref origin) if origin == DIRECT_TEXT_ORIGIN));
    }

    #[tokio::test]
    async fn test_csv_file_input() {
        let source = normalizer("")
            .normalize(IngestInput::File {
                file_name: "people.csv".to_string(),
                media_type: Some("text/csv".to_string()),
                data: Bytes::from_static(b"name,age\nAlice,30\n"),
            })
            .await
            .unwrap();

        assert_eq!(source.text, "name: Alice, age: 30");
        assert_eq!(source.descriptor.origin_id, "people.csv");
        assert_eq!(source.descriptor.kind, SourceKind::File);
    }

    #[tokio::test]
    async fn test_unsupported_file() {
        let err = normalizer("")
            .normalize(IngestInput::File {
                file_name: "photo.png".to_string(),
                media_type: Some("image/png".to_string()),
                data: Bytes::from_static(b"\x89PNG"),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, RagError::UnsupportedFormat(_)));
    }

    #[tokio::test]
    async fn test_url_input_carries_title() {
        let source = normalizer("<html><head><title>Guide</title></head><body><p>Hello web</p></body></html>")
            .normalize(IngestInput::Url("https://example.com/guide".to_string()))
            .await
            .unwrap();

        assert_eq!(source.text, "Hello web");
        assert_eq!(source.descriptor.origin_id, "https://example.com/guide");
        assert_eq!(source.descriptor.media_type, "text/html");
        assert_eq!(source.descriptor.title.as_deref(), Some("Guide"));
    }

    #[tokio::test]
    async fn test_untitled_page() {
        let source = normalizer("<html><body><p>No title here</p></body></html>")
            .normalize(IngestInput::Url("https://example.com/".to_string()))
            .await
            .unwrap();
        assert_eq!(source.descriptor.title.as_deref(), Some(UNTITLED_PAGE));
    }

    #[tokio::test]
    async fn test_non_html_page_rejected() {
        let err = typed_normalizer("%PDF-1.7", Some("application/pdf"))
            .normalize(IngestInput::Url("https://example.com/paper.pdf".to_string()))
            .await
            .unwrap_err();
        assert!(matches!(err, RagError::ExtractionFailed(ref m) if m.contains("application/pdf")));
    }

    #[tokio::test]
    async fn test_html_content_type_variants_accepted() {
        for content_type in [Some("text/html; charset=UTF-8"), Some("application/xhtml+xml"), None] {
            let source = typed_normalizer("<html><body><p>Readable</p></body></html>", content_type)
                .normalize(IngestInput::Url("https://example.com/".to_string()))
                .await
                .unwrap();
            assert_eq!(source.text, "Readable");
        }
    }
}
