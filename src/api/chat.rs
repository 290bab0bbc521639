//! Interactive chat front-end
//!
//! A line-oriented REPL over a [`Session`]. Lines starting with `/` are
//! commands; anything else is a question.

use crate::api::session::{HistoryView, IngestOutcome, NO_DATA_MESSAGE, Reply, Session};
use crate::error::Result;
use crate::text::Source;
use indicatif::{ProgressBar, ProgressStyle};
use std::future::Future;
use std::io::{BufRead, Write};
use std::time::{Duration, Instant};

const HELP: &str = "Commands:
  /pdf <path>    Index a PDF file
  /url <url>     Fetch and index a web page
  /text <path>   Index a plain-text file
  /history       Show recent questions and answers
  /help          Show this help
  /quit          End the session
Anything else is asked as a question.";

/// A parsed input line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Ask(String),
    Pdf(String),
    Url(String),
    Text(String),
    History,
    Help,
    Quit,
    Empty,
    Unknown(String),
}

/// Parse one REPL line
pub fn parse_command(line: &str) -> Command {
    let line = line.trim();
    if line.is_empty() {
        return Command::Empty;
    }
    if !line.starts_with('/') {
        return Command::Ask(line.to_string());
    }

    let (name, arg) = match line.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (line, ""),
    };

    match (name.to_lowercase().as_str(), arg.is_empty()) {
        ("/pdf", false) => Command::Pdf(arg.to_string()),
        ("/url", false) => Command::Url(arg.to_string()),
        ("/text", false) => Command::Text(arg.to_string()),
        ("/history", _) => Command::History,
        ("/help", _) => Command::Help,
        ("/quit" | "/exit" | "/q", _) => Command::Quit,
        _ => Command::Unknown(line.to_string()),
    }
}

/// Format a reply for the terminal
pub fn render_reply(reply: &Reply) -> String {
    match reply {
        Reply::NoData => format!("⚠️  {}", NO_DATA_MESSAGE),
        Reply::Answered(answer) => {
            let mut out = format!("Assistant: {}\n", answer.answer);
            if !answer.excerpts.is_empty() {
                out.push_str("\nSource References:\n");
                for (i, excerpt) in answer.excerpts.iter().enumerate() {
                    out.push_str(&format!("  Source {}: {}\n", i + 1, excerpt));
                }
            }
            out
        }
    }
}

/// Format the history view
pub fn render_history(history: &[HistoryView]) -> String {
    if history.is_empty() {
        return "No questions asked yet.".to_string();
    }

    let mut out = String::from("Conversation History:\n");
    for entry in history {
        out.push_str(&format!("  Q: {}\n  A: {}\n", entry.question, entry.answer_preview));
    }
    out
}

/// Run `task` behind a terminal spinner
pub async fn with_spinner<T, F>(message: &str, task: F) -> T
where
    F: Future<Output = T>,
{
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(Duration::from_millis(100));

    let result = task.await;
    spinner.finish_and_clear();
    result
}

/// Print the outcome of an ingestion attempt
pub fn report_ingest<W: Write>(output: &mut W, result: Result<IngestOutcome>) -> Result<()> {
    match result {
        Ok(outcome) => {
            if let Some(message) = outcome.message() {
                writeln!(output, "{}", message)?;
            }
        }
        Err(e) => writeln!(output, "❌ {}", e)?,
    }
    Ok(())
}

async fn ingest_command<W: Write>(session: &mut Session, output: &mut W, source: Result<Source>) -> Result<()> {
    let result = match source {
        Ok(source) => {
            let message = format!("Processing {}...", source.label());
            with_spinner(&message, session.ingest(Some(&source))).await
        }
        Err(e) => Err(e),
    };
    report_ingest(output, result)
}

/// Drive `session` from `input` until end of input or `/quit`
pub async fn run_repl<R: BufRead, W: Write>(session: &mut Session, mut input: R, mut output: W) -> Result<()> {
    writeln!(output, "💬 Policy Q&A")?;
    match session.current_source() {
        Some(source) => writeln!(output, "   Answering from: {}", source)?,
        None => writeln!(output, "   No document loaded yet, use /pdf, /url or /text")?,
    }
    writeln!(output, "   LLM: {}", session.generator_name())?;
    writeln!(output, "   Type /help for commands, /quit to exit")?;
    writeln!(output, "{}", "-".repeat(50))?;

    loop {
        write!(output, "\nYou: ")?;
        output.flush()?;

        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            break;
        }

        match parse_command(&line) {
            Command::Empty => continue,
            Command::Quit => break,
            Command::Help => writeln!(output, "{}", HELP)?,
            Command::History => writeln!(output, "{}", render_history(&session.recent_history()))?,
            Command::Unknown(line) => writeln!(output, "Unknown command: {} (try /help)", line)?,
            Command::Pdf(path) => ingest_command(session, &mut output, Source::pdf_file(&path)).await?,
            Command::Text(path) => ingest_command(session, &mut output, Source::text_file(&path)).await?,
            Command::Url(url) => ingest_command(session, &mut output, Ok(Source::Url(url))).await?,
            Command::Ask(question) => {
                let start = Instant::now();
                match with_spinner("Thinking...", session.ask(&question)).await {
                    Ok(reply) => {
                        writeln!(output, "\n{}", render_reply(&reply))?;
                        if matches!(reply, Reply::Answered(_)) {
                            writeln!(output, "[{:.1}s]", start.elapsed().as_secs_f64())?;
                        }
                    }
                    Err(e) => writeln!(output, "❌ {}", e)?,
                }
            }
        }
    }

    writeln!(output, "Goodbye!")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::ml::{ContextOnlyGenerator, HashingEmbedder};
    use std::io::Cursor;
    use std::sync::Arc;

    #[test]
    fn test_parse_command() {
        assert_eq!(parse_command("  "), Command::Empty);
        assert_eq!(parse_command("How many days?"), Command::Ask("How many days?".to_string()));
        assert_eq!(parse_command("/pdf  policy.pdf "), Command::Pdf("policy.pdf".to_string()));
        assert_eq!(
            parse_command("/url https://example.com"),
            Command::Url("https://example.com".to_string())
        );
        assert_eq!(parse_command("/HISTORY"), Command::History);
        assert_eq!(parse_command("/exit"), Command::Quit);
        assert_eq!(parse_command("/pdf"), Command::Unknown("/pdf".to_string()));
        assert_eq!(parse_command("/bogus"), Command::Unknown("/bogus".to_string()));
    }

    #[test]
    fn test_render_empty_history() {
        assert_eq!(render_history(&[]), "No questions asked yet.");
    }

    #[tokio::test]
    async fn test_repl_session() {
        let dir = tempfile::TempDir::new().unwrap();
        let policy = dir.path().join("policy.txt");
        std::fs::write(&policy, "Employees receive 25 days of annual leave.").unwrap();

        let mut config = Config::default();
        config.session.corpus_dir = dir.path().to_path_buf();
        let mut session =
            Session::new(config, Arc::new(HashingEmbedder::new(64)), Arc::new(ContextOnlyGenerator)).unwrap();

        let script = format!(
            "How much leave?\n/text {}\nHow much leave?\n/history\n/quit\nignored\n",
            policy.display()
        );
        let mut output = Vec::new();
        run_repl(&mut session, Cursor::new(script), &mut output).await.unwrap();

        let output = String::from_utf8(output).unwrap();
        assert!(output.contains(NO_DATA_MESSAGE));
        assert!(output.contains("Document indexed successfully"));
        assert!(output.contains("Source 1: Employees receive 25 days of annual leave...."));
        assert!(output.contains("Q: How much leave?"));
        assert!(output.ends_with("Goodbye!\n"));
        assert_eq!(session.history().len(), 1);
    }
}
