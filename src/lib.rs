//! # policy-rag-rs
//!
//! Retrieval-augmented question answering over a single document: an uploaded
//! PDF, a fetched web page, or plain text. The document is split into
//! overlapping chunks, the chunks are embedded and indexed, and each question is
//! answered by a text-generation model from the most similar chunks.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use policy_rag::{Config, Reply, Session, Source};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Offline mode: feature-hashing embeddings and context-only answers
//!     let mut session = Session::from_config(Config::default(), true).await?;
//!
//!     let source = Source::pdf_file("handbook.pdf")?;
//!     session.ingest(Some(&source)).await?;
//!
//!     if let Reply::Answered(answer) = session.ask("How many days of annual leave?").await? {
//!         println!("{}", answer.answer);
//!         for excerpt in &answer.excerpts {
//!             println!("  - {}", excerpt);
//!         }
//!     }
//!
//!     Ok(())
//! }
//! ```

// Core modules
pub mod api;
pub mod config;
pub mod error;
pub mod ml;
pub mod text;
pub mod utils;

// Re-export main API types
pub use api::{Answer, IngestOutcome, QaPair, Reply, Session, SessionState};
pub use config::Config;
pub use error::{RagError, Result};

// Re-export commonly used types
pub use ml::{Embedder, Generator, ScoredChunk, VectorIndex};
pub use text::{Chunk, Document, Source};
