//! Document sources and memoized text extraction
//!
//! A [`Source`] is whatever the user hands over: PDF bytes, a URL, or plain text.
//! [`TextExtractor`] turns it into an immutable [`Document`], caching the result
//! per distinct input so re-submitting the same source skips the work.

use crate::config::FetchConfig;
use crate::error::Result;
use crate::text::html::{HtmlTextExtractor, WebFetcher};
use crate::text::pdf::PdfProcessor;
use crate::utils::sha256_hex;
use lru::LruCache;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::NonZeroUsize;
use std::path::Path;
use std::sync::Arc;

/// Content-derived identity of a document (hex SHA-256 of its text)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentId(String);

impl DocumentId {
    pub fn of_text(text: &str) -> Self {
        Self(sha256_hex(text.as_bytes()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0[..12.min(self.0.len())])
    }
}

/// Extracted plain text plus where it came from
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: DocumentId,
    pub source: String,
    pub text: String,
}

impl Document {
    pub fn new(source: impl Into<String>, text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            id: DocumentId::of_text(&text),
            source: source.into(),
            text,
        }
    }

    /// True when there is nothing worth indexing
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// A user-supplied document
#[derive(Debug, Clone)]
pub enum Source {
    /// PDF bytes with a display name
    Pdf { name: String, bytes: Vec<u8> },
    /// Web page to fetch
    Url(String),
    /// Already-plain text with a display name
    Text { name: String, text: String },
}

impl Source {
    /// Read a PDF from disk
    pub fn pdf_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        Ok(Source::Pdf {
            name: path.display().to_string(),
            bytes: std::fs::read(path)?,
        })
    }

    /// Read a UTF-8 text file from disk
    pub fn text_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        Ok(Source::Text {
            name: path.display().to_string(),
            text: std::fs::read_to_string(path)?,
        })
    }

    /// Read a file, choosing PDF or text by extension
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        if crate::utils::is_pdf(&path) {
            Self::pdf_file(path)
        } else {
            Self::text_file(path)
        }
    }

    /// Filename or URL shown to the user
    pub fn label(&self) -> &str {
        match self {
            Source::Pdf { name, .. } | Source::Text { name, .. } => name,
            Source::Url(url) => url,
        }
    }

    fn cache_key(&self) -> ExtractionKey {
        match self {
            Source::Pdf { bytes, .. } => ExtractionKey::Pdf(sha256_hex(bytes)),
            Source::Url(url) => ExtractionKey::Url(url.trim().to_string()),
            Source::Text { text, .. } => ExtractionKey::Text(sha256_hex(text.as_bytes())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum ExtractionKey {
    Pdf(String),
    Url(String),
    Text(String),
}

/// Normalizes sources into documents, memoizing successful extractions
pub struct TextExtractor {
    fetcher: WebFetcher,
    html: HtmlTextExtractor,
    cache: LruCache<ExtractionKey, Arc<Document>>,
}

impl TextExtractor {
    pub fn new(fetch: FetchConfig, capacity: usize) -> Result<Self> {
        Ok(Self {
            fetcher: WebFetcher::new(fetch)?,
            html: HtmlTextExtractor::new()?,
            cache: LruCache::new(NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN)),
        })
    }

    /// Extract `source`, or return the cached document for an identical input
    pub async fn extract(&mut self, source: &Source) -> Result<Arc<Document>> {
        let key = source.cache_key();
        if let Some(document) = self.cache.get(&key) {
            log::debug!("Extraction cache hit for {}", source.label());
            return Ok(Arc::clone(document));
        }

        let text = match source {
            Source::Pdf { bytes, .. } => PdfProcessor::extract_text(bytes)?,
            Source::Url(url) => {
                let body = self.fetcher.fetch(url).await?;
                self.html.extract(&body)
            }
            Source::Text { text, .. } => text.clone(),
        };

        let document = Arc::new(Document::new(source.label(), text));
        log::info!(
            "Extracted document {} from {} ({} characters)",
            document.id,
            source.label(),
            document.text.chars().count()
        );
        self.cache.put(key, Arc::clone(&document));
        Ok(document)
    }

    pub fn cached_documents(&self) -> usize {
        self.cache.len()
    }
}

/// Concatenate the default corpus files found in `dir`.
///
/// Each file is followed by `\n`. Missing files are skipped silently, unreadable
/// ones with a warning. Returns `None` when nothing usable was found.
pub fn load_default_corpus<S: AsRef<str>>(dir: &Path, files: &[S]) -> Option<Document> {
    let mut combined = String::new();
    let mut loaded = Vec::new();

    for name in files {
        let path = dir.join(name.as_ref());
        if !path.exists() {
            log::debug!("Default corpus file {} not present", path.display());
            continue;
        }
        match std::fs::read_to_string(&path) {
            Ok(content) => {
                combined.push_str(&content);
                combined.push('\n');
                loaded.push(name.as_ref().to_string());
            }
            Err(e) => log::warn!("Skipping default corpus file {}: {}", path.display(), e),
        }
    }

    let document = Document::new(format!("default corpus ({})", loaded.join(", ")), combined);
    if document.is_blank() {
        return None;
    }

    log::info!("Loaded default corpus from {}: {}", dir.display(), loaded.join(", "));
    Some(document)
}
