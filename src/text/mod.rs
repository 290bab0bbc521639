//! Text extraction and chunking for policy-rag-rs
//!
//! This module turns PDFs, web pages and plain text into documents and splits
//! them into retrieval chunks.

pub mod chunking;
pub mod extract;
pub mod html;
pub mod pdf;

// Re-export main types and functions
pub use chunking::{Chunk, TextChunker};
pub use extract::{Document, DocumentId, Source, TextExtractor, load_default_corpus};
pub use html::{HtmlTextExtractor, WebFetcher, parse_http_url};
pub use pdf::PdfProcessor;
