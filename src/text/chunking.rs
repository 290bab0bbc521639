//! Recursive boundary-preferring text chunking
//!
//! Splits a document into overlapping chunks of bounded length. Each chunk is the
//! longest run of the remaining text, at most `chunk_size` characters, that ends on
//! the most preferred boundary available: a paragraph break, then a sentence end,
//! then a word break, and only as a last resort a raw character cut.
//!
//! With `overlap > 0` every chunk starts with the last `overlap` characters of the
//! previous one, so the chunks tile the (trimmed) document without gaps. With
//! `overlap == 0` the whitespace separating two chunks belongs to neither.

use crate::config::ChunkingConfig;
use crate::error::{RagError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// A chunk of a source document
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    /// Position in the chunk sequence (document order)
    pub id: usize,

    /// The actual text content
    pub text: String,

    /// Original document source
    pub source: Option<String>,

    /// Byte offset in the original document
    pub offset: usize,

    /// Length of the chunk in bytes
    pub length: usize,
}

impl Chunk {
    /// Byte range of this chunk within the source document
    pub fn range(&self) -> Range<usize> {
        self.offset..self.offset + self.length
    }

    /// Length in characters
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// Split points, most preferred first
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Boundary {
    Paragraph,
    Sentence,
    Word,
}

const BOUNDARIES: [Boundary; 3] = [Boundary::Paragraph, Boundary::Sentence, Boundary::Word];

/// Text chunker for processing documents into retrieval units
#[derive(Debug, Clone)]
pub struct TextChunker {
    config: ChunkingConfig,
    paragraph_regex: Regex,
    sentence_regex: Regex,
    word_regex: Regex,
}

impl TextChunker {
    /// Create a new text chunker with the given configuration.
    ///
    /// The caller must guarantee `config.overlap < config.chunk_size`
    /// (see [`ChunkingConfig::validate`]); this is not re-checked here.
    pub fn new(config: ChunkingConfig) -> Result<Self> {
        let paragraph_regex = Regex::new(r"\n\s*\n")
            .map_err(|e| RagError::TextProcessing(format!("Failed to compile paragraph regex: {}", e)))?;

        let sentence_regex = Regex::new(r"[.!?]+(\s+)")
            .map_err(|e| RagError::TextProcessing(format!("Failed to compile sentence regex: {}", e)))?;

        let word_regex = Regex::new(r"\s+")
            .map_err(|e| RagError::TextProcessing(format!("Failed to compile word regex: {}", e)))?;

        Ok(Self {
            config,
            paragraph_regex,
            sentence_regex,
            word_regex,
        })
    }

    /// Create a chunker with the default 1000/200 configuration
    pub fn with_default_config() -> Result<Self> {
        Self::new(ChunkingConfig::default())
    }

    pub fn config(&self) -> &ChunkingConfig {
        &self.config
    }

    /// Split `text` into chunks. Deterministic: equal inputs give equal outputs.
    pub fn chunk_text(&self, text: &str, source: Option<&str>) -> Vec<Chunk> {
        let chunk_size = self.config.chunk_size;
        let overlap = self.config.overlap;
        debug_assert!(overlap < chunk_size, "overlap must be smaller than chunk_size");

        let mut chunks = Vec::new();
        let mut pos = skip_whitespace(text, 0);

        while pos < text.len() {
            let rest_end = pos + text[pos..].trim_end().len();
            if rest_end == pos {
                break;
            }

            let limit = advance_chars(text, pos, chunk_size);
            if limit >= rest_end {
                chunks.push(make_chunk(chunks.len(), text, pos, rest_end, source));
                break;
            }

            // A chunk must be longer than the overlap it hands on
            let min_end = advance_chars(text, pos, overlap + 1);

            let end = BOUNDARIES
                .iter()
                .find_map(|&boundary| {
                    let cut = self.last_cut(text, pos, limit, boundary)?;
                    let end = pos + text[pos..cut].trim_end().len();
                    (end >= min_end).then_some(end)
                })
                .unwrap_or(limit);

            chunks.push(make_chunk(chunks.len(), text, pos, end, source));

            let next = if overlap > 0 {
                retreat_chars(text, end, overlap)
            } else {
                skip_whitespace(text, end)
            };
            // Only reachable when the overlap precondition is violated
            pos = if next > pos { next } else { end };
        }

        log::debug!(
            "Chunked {} bytes into {} chunks (size {}, overlap {})",
            text.len(),
            chunks.len(),
            chunk_size,
            overlap
        );
        chunks
    }

    /// Last cut position for `boundary` in `(pos, limit]`, as a byte offset
    fn last_cut(&self, text: &str, pos: usize, limit: usize, boundary: Boundary) -> Option<usize> {
        let haystack = &text[pos..];
        let max_rel = limit - pos;

        match boundary {
            Boundary::Paragraph => last_match_start(&self.paragraph_regex, haystack, max_rel),
            Boundary::Word => last_match_start(&self.word_regex, haystack, max_rel),
            Boundary::Sentence => self
                .sentence_regex
                .captures_iter(haystack)
                .filter_map(|caps| caps.get(1).map(|ws| ws.start()))
                .take_while(|&cut| cut <= max_rel)
                .filter(|&cut| cut > 0)
                .last(),
        }
        .map(|rel| pos + rel)
    }
}

fn last_match_start(regex: &Regex, haystack: &str, max_rel: usize) -> Option<usize> {
    regex
        .find_iter(haystack)
        .map(|m| m.start())
        .take_while(|&start| start <= max_rel)
        .filter(|&start| start > 0)
        .last()
}

fn make_chunk(id: usize, text: &str, start: usize, end: usize, source: Option<&str>) -> Chunk {
    Chunk {
        id,
        text: text[start..end].to_string(),
        source: source.map(str::to_string),
        offset: start,
        length: end - start,
    }
}

/// Byte offset `chars` characters after `from`, clamped to the end of `text`
fn advance_chars(text: &str, from: usize, chars: usize) -> usize {
    text[from..]
        .char_indices()
        .nth(chars)
        .map(|(i, _)| from + i)
        .unwrap_or(text.len())
}

/// Byte offset `chars` characters before `from`, clamped to the start of `text`
fn retreat_chars(text: &str, from: usize, chars: usize) -> usize {
    if chars == 0 {
        return from;
    }
    text[..from]
        .char_indices()
        .rev()
        .nth(chars - 1)
        .map(|(i, _)| i)
        .unwrap_or(0)
}

fn skip_whitespace(text: &str, from: usize) -> usize {
    text.len() - text[from..].trim_start().len()
}
