//! Question-answering session
//!
//! A [`Session`] is `Empty` until a document has been indexed, then `Indexed`
//! with exactly one index. Ingesting another document replaces that index
//! wholesale. When no document is supplied, the bundled sample policies are
//! indexed instead, at most once per session.
//!
//! Every answered question is appended to the history; nothing is ever removed.

use crate::api::pipeline::{IngestPipeline, Ingested};
use crate::api::synthesizer::AnswerSynthesizer;
use crate::config::{Config, SessionConfig};
use crate::error::{RagError, Result};
use crate::ml::{self, EmbeddingBackend, Embedder, Generator, ScoredChunk, VectorIndex};
use crate::text::{Document, Source, load_default_corpus};
use crate::utils::{excerpt, truncate_chars};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Shown after a user document has been indexed
pub const INDEXED_MESSAGE: &str = "Document indexed successfully. You can now ask questions.";
/// Shown after the default corpus has been indexed
pub const DEFAULT_CORPUS_MESSAGE: &str = "Using default sample policy documents for Q&A.";
/// Shown when a question arrives before anything was indexed
pub const NO_DATA_MESSAGE: &str = "No data available.";

/// Where the session stands
#[derive(Clone, Default)]
pub enum SessionState {
    #[default]
    Empty,
    Indexed {
        document: Arc<Document>,
        index: Arc<VectorIndex>,
    },
}

/// What an ingestion request did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    /// A new index replaced the previous state
    Indexed {
        source: String,
        chunks: usize,
        default_corpus: bool,
    },
    /// The document had no extractable text; state unchanged
    NoText { source: String },
    /// Nothing to do; state unchanged
    Unchanged,
}

impl IngestOutcome {
    /// User-facing status line, if any
    pub fn message(&self) -> Option<String> {
        match self {
            IngestOutcome::Indexed {
                default_corpus: false,
                ..
            } => Some(INDEXED_MESSAGE.to_string()),
            IngestOutcome::Indexed {
                default_corpus: true,
                ..
            } => Some(DEFAULT_CORPUS_MESSAGE.to_string()),
            IngestOutcome::NoText { source } => Some(format!("No text could be extracted from {}.", source)),
            IngestOutcome::Unchanged => None,
        }
    }
}

/// One answered question
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QaPair {
    pub question: String,
    pub answer: String,
    /// Full text of every retrieved chunk, in retrieval order
    pub sources: Vec<String>,
    pub asked_at: DateTime<Utc>,
}

/// An answer together with what it was grounded on
#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub question: String,
    pub answer: String,
    pub sources: Vec<ScoredChunk>,
    /// One display excerpt per source, ending in `...`
    pub excerpts: Vec<String>,
}

/// Reply to a question
#[derive(Debug, Clone)]
pub enum Reply {
    /// Nothing has been indexed yet
    NoData,
    Answered(Answer),
}

/// A history entry as displayed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryView {
    pub question: String,
    pub answer_preview: String,
}

pub struct Session {
    settings: SessionConfig,
    top_k: usize,
    pipeline: IngestPipeline,
    synthesizer: AnswerSynthesizer,
    state: SessionState,
    history: Vec<QaPair>,
    default_corpus_attempted: bool,
}

impl Session {
    /// Build a session around explicit models
    pub fn new(config: Config, embedder: Arc<dyn Embedder>, generator: Arc<dyn Generator>) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            pipeline: IngestPipeline::new(&config, embedder)?,
            synthesizer: AnswerSynthesizer::new(generator, config.generation.max_prompt_chars),
            top_k: config.search.top_k,
            settings: config.session,
            state: SessionState::Empty,
            history: Vec::new(),
            default_corpus_attempted: false,
        })
    }

    /// Build a session around the process-wide models
    ///
    /// `offline` swaps in feature-hashing embeddings and context-only answers.
    pub async fn from_config(mut config: Config, offline: bool) -> Result<Self> {
        if offline {
            config.embedding.backend = EmbeddingBackend::Hashing;
        }
        let embedder = ml::shared_embedder(&config.embedding).await?;
        let generator = ml::shared_generator(&config.generation, offline).await?;
        Self::new(config, embedder, generator)
    }

    /// Index `source`, or fall back to the default corpus when `None`
    ///
    /// Errors leave the state (and any previous index) untouched.
    pub async fn ingest(&mut self, source: Option<&Source>) -> Result<IngestOutcome> {
        match source {
            Some(source) => {
                log::info!("Ingesting {}", source.label());
                let ingested = self.pipeline.ingest(source).await?;
                Ok(self.apply(ingested, false))
            }
            None => self.ingest_default_corpus(),
        }
    }

    fn ingest_default_corpus(&mut self) -> Result<IngestOutcome> {
        if self.is_indexed() || self.default_corpus_attempted {
            return Ok(IngestOutcome::Unchanged);
        }
        self.default_corpus_attempted = true;

        let Some(document) = load_default_corpus(&self.settings.corpus_dir, &self.settings.corpus_files) else {
            log::info!("No default corpus found in {}", self.settings.corpus_dir.display());
            return Ok(IngestOutcome::Unchanged);
        };

        match self.pipeline.ingest_document(Arc::new(document))? {
            ingested @ Ingested::Indexed { .. } => Ok(self.apply(ingested, true)),
            Ingested::Empty { .. } => Ok(IngestOutcome::Unchanged),
        }
    }

    fn apply(&mut self, ingested: Ingested, default_corpus: bool) -> IngestOutcome {
        match ingested {
            Ingested::Indexed { document, index } => {
                let outcome = IngestOutcome::Indexed {
                    source: document.source.clone(),
                    chunks: index.len(),
                    default_corpus,
                };
                log::info!("Session now answers from {} ({} chunks)", document.source, index.len());
                self.state = SessionState::Indexed { document, index };
                outcome
            }
            Ingested::Empty { document } => {
                log::warn!("No text extracted from {}", document.source);
                IngestOutcome::NoText {
                    source: document.source.clone(),
                }
            }
        }
    }

    /// Answer `question` from the current index
    ///
    /// One retrieval and one generation call; the pair is recorded only when
    /// both succeed.
    pub async fn ask(&mut self, question: &str) -> Result<Reply> {
        if question.trim().is_empty() {
            return Err(RagError::TextProcessing("Question is empty".to_string()));
        }

        let SessionState::Indexed { index, .. } = &self.state else {
            log::warn!("Question received before any document was indexed");
            return Ok(Reply::NoData);
        };

        let sources = index.search(question, self.top_k)?;
        let answer = self.synthesizer.synthesize(question, &sources).await?;

        self.history.push(QaPair {
            question: question.to_string(),
            answer: answer.clone(),
            sources: sources.iter().map(|scored| scored.chunk.text.clone()).collect(),
            asked_at: Utc::now(),
        });

        let excerpts = sources
            .iter()
            .map(|scored| format!("{}...", excerpt(&scored.chunk.text, self.settings.excerpt_chars)))
            .collect();

        Ok(Reply::Answered(Answer {
            question: question.to_string(),
            answer,
            sources,
            excerpts,
        }))
    }

    /// Every recorded pair, oldest first
    pub fn history(&self) -> &[QaPair] {
        &self.history
    }

    /// The most recent pairs, newest first, with shortened answers
    pub fn recent_history(&self) -> Vec<HistoryView> {
        self.history
            .iter()
            .rev()
            .take(self.settings.history_display)
            .map(|pair| HistoryView {
                question: pair.question.clone(),
                answer_preview: format!(
                    "{}...",
                    truncate_chars(&pair.answer, self.settings.answer_preview_chars)
                ),
            })
            .collect()
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn is_indexed(&self) -> bool {
        matches!(self.state, SessionState::Indexed { .. })
    }

    /// Source label of the indexed document
    pub fn current_source(&self) -> Option<&str> {
        match &self.state {
            SessionState::Indexed { document, .. } => Some(&document.source),
            SessionState::Empty => None,
        }
    }

    pub fn generator_name(&self) -> &str {
        self.synthesizer.generator_name()
    }

    pub fn embedder_name(&self) -> &str {
        self.pipeline.embedder().name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::{ContextOnlyGenerator, HashingEmbedder};
    use tempfile::TempDir;

    fn session_in(dir: &TempDir) -> Session {
        let mut config = Config::default();
        config.session.corpus_dir = dir.path().to_path_buf();
        Session::new(config, Arc::new(HashingEmbedder::new(64)), Arc::new(ContextOnlyGenerator)).unwrap()
    }

    #[test]
    fn test_outcome_messages() {
        let indexed = IngestOutcome::Indexed {
            source: "a.pdf".to_string(),
            chunks: 2,
            default_corpus: false,
        };
        assert_eq!(indexed.message().as_deref(), Some(INDEXED_MESSAGE));
        assert_eq!(IngestOutcome::Unchanged.message(), None);
    }

    #[tokio::test]
    async fn test_empty_question_rejected() {
        let dir = TempDir::new().unwrap();
        let mut session = session_in(&dir);
        assert!(matches!(session.ask("   ").await, Err(RagError::TextProcessing(_))));
    }

    #[tokio::test]
    async fn test_history_keeps_question_as_asked() {
        let dir = TempDir::new().unwrap();
        let mut session = session_in(&dir);
        let source = Source::Text {
            name: "policy.txt".to_string(),
            text: "Employees receive 25 days of annual leave each year.".to_string(),
        };
        session.ingest(Some(&source)).await.unwrap();

        let question = "  How many days of leave?\n";
        let Reply::Answered(answer) = session.ask(question).await.unwrap() else {
            panic!("expected an answer");
        };
        assert_eq!(answer.question, question);
        assert_eq!(session.history()[0].question, question);
        assert_eq!(session.recent_history()[0].question, question);
    }

    #[tokio::test]
    async fn test_recent_history_is_newest_first_and_bounded() {
        let dir = TempDir::new().unwrap();
        let mut session = session_in(&dir);
        let source = Source::Text {
            name: "policy.txt".to_string(),
            text: "Employees receive 25 days of annual leave each year.".to_string(),
        };
        session.ingest(Some(&source)).await.unwrap();

        for i in 0..12 {
            session.ask(&format!("question {}", i)).await.unwrap();
        }

        assert_eq!(session.history().len(), 12);
        let recent = session.recent_history();
        assert_eq!(recent.len(), 10);
        assert_eq!(recent[0].question, "question 11");
        assert_eq!(recent[9].question, "question 2");
        assert!(recent[0].answer_preview.ends_with("..."));
        assert!(recent[0].answer_preview.chars().count() <= 123);
    }
}
