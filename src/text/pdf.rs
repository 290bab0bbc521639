//! PDF text extraction
//!
//! `pdf-extract` handles the whole document in one pass. When it fails (or
//! panics, which it does on some malformed fonts) extraction falls back to
//! `lopdf`, page by page, skipping pages that cannot be decoded.
//!
//! A panic inside `pdf-extract` is part of the normal fallback path, so it is
//! logged as a warning instead of going through the panic hook.

use crate::error::{RagError, Result};
use std::any::Any;
use std::cell::Cell;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Once;

thread_local! {
    static SILENCED: Cell<bool> = const { Cell::new(false) };
}

static QUIET_HOOK: Once = Once::new();

/// Run `f`, catching a panic without the panic hook reporting it
///
/// Only panics on the calling thread while `f` runs are silenced; every other
/// panic still reaches the previously installed hook.
fn catch_silently<T>(f: impl FnOnce() -> T) -> std::thread::Result<T> {
    QUIET_HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            if !SILENCED.with(Cell::get) {
                previous(info);
            }
        }));
    });

    let was_silenced = SILENCED.with(|s| s.replace(true));
    let result = panic::catch_unwind(AssertUnwindSafe(f));
    SILENCED.with(|s| s.set(was_silenced));
    result
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "unknown panic"
    }
}

/// Extracts plain text from PDF bytes
pub struct PdfProcessor;

impl PdfProcessor {
    /// Extract the document text: every page with text, trimmed, followed by `\n`
    pub fn extract_text(bytes: &[u8]) -> Result<String> {
        let pages = Self::extract_pages(bytes)?;
        let text = join_pages(&pages);
        log::info!(
            "Extracted {} characters from {} PDF pages",
            text.chars().count(),
            pages.len()
        );
        Ok(text)
    }

    /// Raw per-page text, including pages that yielded nothing
    pub fn extract_pages(bytes: &[u8]) -> Result<Vec<String>> {
        match catch_silently(|| pdf_extract::extract_text_from_mem_by_pages(bytes)) {
            Ok(Ok(pages)) => return Ok(pages),
            Ok(Err(e)) => log::warn!("pdf-extract failed ({:?}), retrying page by page", e),
            Err(payload) => log::warn!(
                "pdf-extract panicked ({}), retrying page by page",
                panic_message(payload.as_ref())
            ),
        }
        Self::extract_pages_individually(bytes)
    }

    fn extract_pages_individually(bytes: &[u8]) -> Result<Vec<String>> {
        let document = lopdf::Document::load_mem(bytes)
            .map_err(|e| RagError::Extraction(format!("Failed to parse PDF: {}", e)))?;

        let mut pages = Vec::new();
        for &page_number in document.get_pages().keys() {
            match document.extract_text(&[page_number]) {
                Ok(text) => pages.push(text),
                Err(e) => log::warn!("Skipping PDF page {}: {}", page_number, e),
            }
        }
        Ok(pages)
    }
}

/// Join page texts; pages without text contribute nothing, not even a blank line
pub fn join_pages<S: AsRef<str>>(pages: &[S]) -> String {
    let mut text = String::new();
    for page in pages {
        let page = page.as_ref().trim();
        if page.is_empty() {
            continue;
        }
        text.push_str(page);
        text.push('\n');
    }
    text
}
