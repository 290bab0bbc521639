//! policy-rag CLI application
//!
//! Command-line interface for the policy-rag-rs library.

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use policy_rag::api::{self, Reply, Session};
use policy_rag::config::Config;
use policy_rag::text::{Source, TextChunker, TextExtractor};
use policy_rag::utils::{excerpt, is_supported_document};
use std::io;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "policy-rag")]
#[command(about = "Ask questions about company policies in PDFs, web pages and text files")]
#[command(version)]
struct Cli {
    /// JSON configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Use offline feature-hashing embeddings and context-only answers
    #[arg(long, global = true)]
    offline: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug, Default)]
struct SourceArgs {
    /// PDF file to index
    #[arg(long)]
    pdf: Option<PathBuf>,

    /// Web page to fetch and index
    #[arg(long)]
    url: Option<String>,

    /// Plain-text file to index
    #[arg(long)]
    text: Option<PathBuf>,
}

impl SourceArgs {
    /// The document to index; a PDF takes precedence over a URL, a URL over text
    fn source(&self) -> anyhow::Result<Option<Source>> {
        if self.pdf.is_some() && (self.url.is_some() || self.text.is_some()) {
            log::warn!("Several sources given, using the PDF");
        } else if self.url.is_some() && self.text.is_some() {
            log::warn!("Several sources given, using the URL");
        }

        if let Some(path) = &self.pdf {
            let source = Source::pdf_file(path).with_context(|| format!("Failed to read {}", path.display()))?;
            return Ok(Some(source));
        }
        if let Some(url) = &self.url {
            return Ok(Some(Source::Url(url.clone())));
        }
        if let Some(path) = &self.text {
            let source = Source::text_file(path).with_context(|| format!("Failed to read {}", path.display()))?;
            return Ok(Some(source));
        }
        Ok(None)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive question answering
    Chat {
        #[command(flatten)]
        source: SourceArgs,
    },

    /// Answer a single question and exit
    Ask {
        /// The question to ask
        question: String,

        #[command(flatten)]
        source: SourceArgs,

        /// Print the answer as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the chunks a document is split into
    Chunk {
        /// PDF or text file
        file: PathBuf,

        /// Chunk size in characters
        #[arg(long)]
        chunk_size: Option<usize>,

        /// Overlap between chunks in characters
        #[arg(long)]
        overlap: Option<usize>,
    },
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<Config> {
    let mut config = match path {
        Some(path) => Config::from_file(path).with_context(|| format!("Failed to load {}", path.display()))?,
        None => Config::default(),
    };
    config.apply_env_overrides();
    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    env_logger::init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref())?;

    match cli.command {
        Commands::Chat { source } => chat_command(config, cli.offline, source).await,
        Commands::Ask { question, source, json } => ask_command(config, cli.offline, source, question, json).await,
        Commands::Chunk {
            file,
            chunk_size,
            overlap,
        } => chunk_command(config, file, chunk_size, overlap).await,
    }
}

/// Build the session and index the requested source (or the default corpus)
async fn open_session(config: Config, offline: bool, source: &SourceArgs) -> anyhow::Result<Session> {
    let source = source.source()?;
    let mut session = api::with_spinner("Loading models...", Session::from_config(config, offline)).await?;

    let result = match &source {
        Some(source) => {
            let message = format!("Processing {}...", source.label());
            api::with_spinner(&message, session.ingest(Some(source))).await
        }
        None => session.ingest(None).await,
    };
    api::chat::report_ingest(&mut io::stderr(), result)?;
    Ok(session)
}

async fn chat_command(config: Config, offline: bool, source: SourceArgs) -> anyhow::Result<()> {
    let mut session = open_session(config, offline, &source).await?;
    let stdin = io::stdin();
    api::run_repl(&mut session, stdin.lock(), io::stdout()).await?;
    Ok(())
}

async fn ask_command(
    config: Config,
    offline: bool,
    source: SourceArgs,
    question: String,
    json: bool,
) -> anyhow::Result<()> {
    let mut session = open_session(config, offline, &source).await?;
    let reply = api::with_spinner("Thinking...", session.ask(&question)).await?;

    if json {
        let value = match &reply {
            Reply::NoData => serde_json::json!({ "warning": api::session::NO_DATA_MESSAGE }),
            Reply::Answered(answer) => serde_json::to_value(answer)?,
        };
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        println!("{}", api::render_reply(&reply));
    }
    Ok(())
}

async fn chunk_command(
    mut config: Config,
    file: PathBuf,
    chunk_size: Option<usize>,
    overlap: Option<usize>,
) -> anyhow::Result<()> {
    if let Some(chunk_size) = chunk_size {
        config.chunking.chunk_size = chunk_size;
    }
    if let Some(overlap) = overlap {
        config.chunking.overlap = overlap;
    }
    config.chunking.validate()?;

    if !is_supported_document(&file) {
        log::warn!("{} is not a recognised document type, reading it as text", file.display());
    }
    let source = Source::from_path(&file).with_context(|| format!("Failed to read {}", file.display()))?;
    let mut extractor = TextExtractor::new(config.fetch.clone(), 1)?;
    let document = extractor.extract(&source).await?;
    let chunks = TextChunker::new(config.chunking)?.chunk_text(&document.text, Some(&document.source));

    println!(
        "📄 {}: {} characters, {} chunks (size {}, overlap {})",
        document.source,
        document.text.chars().count(),
        chunks.len(),
        config.chunking.chunk_size,
        config.chunking.overlap
    );
    for chunk in &chunks {
        println!(
            "\n#{} bytes {}..{} ({} chars)\n   {}",
            chunk.id,
            chunk.offset,
            chunk.offset + chunk.length,
            chunk.char_len(),
            excerpt(&chunk.text, 100)
        );
    }
    Ok(())
}
