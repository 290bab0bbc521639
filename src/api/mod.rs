//! API layer for policy-rag-rs
//!
//! Answer synthesis, memoized ingestion, the question-answering session and the
//! interactive chat front-end.

pub mod chat;
pub mod pipeline;
pub mod session;
pub mod synthesizer;

// Re-export main API types
pub use chat::{Command, parse_command, render_history, render_reply, run_repl, with_spinner};
pub use pipeline::{IngestPipeline, Ingested};
pub use session::{Answer, HistoryView, IngestOutcome, QaPair, Reply, Session, SessionState};
pub use synthesizer::AnswerSynthesizer;
