//! Memoized ingestion: extract, chunk, index
//!
//! Each stage caches its output in an LRU keyed by content, so feeding the same
//! PDF, URL or text again reuses the earlier work. Only successful results are
//! cached.

use crate::config::{ChunkingConfig, Config};
use crate::error::Result;
use crate::ml::{Embedder, IndexKey, SearchConfig, VectorIndex};
use crate::text::{Chunk, Document, DocumentId, Source, TextChunker, TextExtractor};
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Arc;

/// Result of ingesting one document
#[derive(Clone)]
pub enum Ingested {
    /// The document produced chunks and an index
    Indexed {
        document: Arc<Document>,
        index: Arc<VectorIndex>,
    },
    /// The document had no text to index
    Empty { document: Arc<Document> },
}

/// Extraction, chunking and indexing with per-stage caches
pub struct IngestPipeline {
    extractor: TextExtractor,
    chunker: TextChunker,
    embedder: Arc<dyn Embedder>,
    search: SearchConfig,
    chunk_cache: LruCache<(DocumentId, ChunkingConfig), Arc<Vec<Chunk>>>,
    index_cache: LruCache<IndexKey, Arc<VectorIndex>>,
}

fn capacity(entries: usize) -> NonZeroUsize {
    NonZeroUsize::new(entries).unwrap_or(NonZeroUsize::MIN)
}

impl IngestPipeline {
    pub fn new(config: &Config, embedder: Arc<dyn Embedder>) -> Result<Self> {
        let cache = &config.cache;

        Ok(Self {
            extractor: TextExtractor::new(config.fetch.clone(), cache.extraction_entries)?,
            chunker: TextChunker::new(config.chunking)?,
            embedder,
            search: config.search.clone(),
            chunk_cache: LruCache::new(capacity(cache.chunk_entries)),
            index_cache: LruCache::new(capacity(cache.index_entries)),
        })
    }

    /// Extract `source`, chunk it, and build (or reuse) its index
    pub async fn ingest(&mut self, source: &Source) -> Result<Ingested> {
        let document = self.extractor.extract(source).await?;
        self.ingest_document(document)
    }

    /// Chunk and index an already extracted document
    pub fn ingest_document(&mut self, document: Arc<Document>) -> Result<Ingested> {
        if document.is_blank() {
            return Ok(Ingested::Empty { document });
        }
        match self.index(&document)? {
            Some(index) => Ok(Ingested::Indexed { document, index }),
            None => Ok(Ingested::Empty { document }),
        }
    }

    /// Chunks of `document` under the configured chunking parameters
    pub fn chunk(&mut self, document: &Document) -> Arc<Vec<Chunk>> {
        let key = (document.id.clone(), *self.chunker.config());
        if let Some(chunks) = self.chunk_cache.get(&key) {
            log::debug!("Chunk cache hit for document {}", document.id);
            return Arc::clone(chunks);
        }

        let chunks = Arc::new(self.chunker.chunk_text(&document.text, Some(&document.source)));
        log::info!("Split document {} into {} chunks", document.id, chunks.len());
        self.chunk_cache.put(key, Arc::clone(&chunks));
        chunks
    }

    /// Index of `document`, or `None` when it yields no chunks
    pub fn index(&mut self, document: &Document) -> Result<Option<Arc<VectorIndex>>> {
        let key = IndexKey::new(&document.id, *self.chunker.config());
        if let Some(index) = self.index_cache.get(&key) {
            log::debug!("Index cache hit for document {}", document.id);
            return Ok(Some(Arc::clone(index)));
        }

        let chunks = self.chunk(document);
        if chunks.is_empty() {
            return Ok(None);
        }

        let index = Arc::new(VectorIndex::build(
            chunks.as_ref().clone(),
            Arc::clone(&self.embedder),
            &self.search,
        )?);
        self.index_cache.put(key, Arc::clone(&index));
        Ok(Some(index))
    }

    pub fn embedder(&self) -> &Arc<dyn Embedder> {
        &self.embedder
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::HashingEmbedder;

    fn pipeline() -> IngestPipeline {
        IngestPipeline::new(&Config::default(), Arc::new(HashingEmbedder::new(64))).unwrap()
    }

    #[tokio::test]
    async fn test_ingest_text_source() {
        let mut pipeline = pipeline();
        let source = Source::Text {
            name: "leave.txt".to_string(),
            text: "Employees receive 25 days of annual leave.".to_string(),
        };

        match pipeline.ingest(&source).await.unwrap() {
            Ingested::Indexed { document, index } => {
                assert_eq!(document.source, "leave.txt");
                assert_eq!(index.len(), 1);
                assert_eq!(index.chunks()[0].source.as_deref(), Some("leave.txt"));
            }
            Ingested::Empty { .. } => panic!("expected an index"),
        }
    }

    #[tokio::test]
    async fn test_blank_text_is_empty() {
        let mut pipeline = pipeline();
        let source = Source::Text {
            name: "blank.txt".to_string(),
            text: "  \n\n ".to_string(),
        };
        assert!(matches!(pipeline.ingest(&source).await.unwrap(), Ingested::Empty { .. }));

        // Blank documents never reach the chunk cache
        let blank = Arc::new(Document::new("blank.txt", "\t \n"));
        assert!(matches!(pipeline.ingest_document(blank), Ok(Ingested::Empty { .. })));
        assert_eq!(pipeline.chunk_cache.len(), 0);
    }

    #[test]
    fn test_index_is_memoized_by_content() {
        let mut pipeline = pipeline();
        let first = pipeline.index(&Document::new("a.txt", "Same content.")).unwrap().unwrap();
        let second = pipeline.index(&Document::new("b.txt", "Same content.")).unwrap().unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        let chunks_a = pipeline.chunk(&Document::new("a.txt", "Same content."));
        let chunks_b = pipeline.chunk(&Document::new("a.txt", "Same content."));
        assert!(Arc::ptr_eq(&chunks_a, &chunks_b));
    }
}
