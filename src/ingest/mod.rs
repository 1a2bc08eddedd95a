//! Source ingestion: decode or fetch, normalize to text, chunk, index

pub mod article;
pub mod fetch;
pub mod format;
pub mod normalizer;
pub mod pipeline;

pub use article::{extract_article, Article, UNTITLED_PAGE};
pub use fetch::{parse_page_url, FetchedPage, HttpFetcher, PageFetcher, DEFAULT_USER_AGENT};
pub use format::{decode_csv, decode_pdf, decode_text, DocumentFormat};
pub use normalizer::{NormalizedSource, Normalizer};
pub use pipeline::{IngestPipeline, IngestReport};
