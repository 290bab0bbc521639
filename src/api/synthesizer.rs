//! "Stuff" answer synthesis
//!
//! Every retrieved chunk goes into one prompt, separated by blank lines, inside
//! a fixed question-answering template. Prompts that would not fit the model's
//! context budget are rejected instead of silently truncated.

use crate::error::{RagError, Result};
use crate::ml::{Generator, Prompt, ScoredChunk};
use std::sync::Arc;

const PROMPT_PREAMBLE: &str = "Use the following pieces of context to answer the question at the end. \
If you don't know the answer, just say that you don't know, don't try to make up an answer.";

/// Builds the stuffed prompt and asks the generator for an answer
pub struct AnswerSynthesizer {
    generator: Arc<dyn Generator>,
    max_prompt_chars: usize,
}

impl AnswerSynthesizer {
    pub fn new(generator: Arc<dyn Generator>, max_prompt_chars: usize) -> Self {
        Self {
            generator,
            max_prompt_chars,
        }
    }

    /// Render the prompt for `question` over `chunks`, in retrieval order
    pub fn build_prompt(&self, question: &str, chunks: &[ScoredChunk]) -> Result<Prompt> {
        let context: Vec<String> = chunks.iter().map(|scored| scored.chunk.text.clone()).collect();
        let text = format!(
            "{}\n\n{}\n\nQuestion: {}\nHelpful Answer:",
            PROMPT_PREAMBLE,
            context.join("\n\n"),
            question
        );

        let actual = text.chars().count();
        if actual > self.max_prompt_chars {
            return Err(RagError::ContextOverflow {
                actual,
                limit: self.max_prompt_chars,
            });
        }

        Ok(Prompt {
            question: question.to_string(),
            context,
            text,
        })
    }

    /// One generation call for `question` grounded in `chunks`
    pub async fn synthesize(&self, question: &str, chunks: &[ScoredChunk]) -> Result<String> {
        let prompt = self.build_prompt(question, chunks)?;
        log::debug!(
            "Synthesizing answer with {} from {} chunks",
            self.generator.name(),
            chunks.len()
        );
        self.generator.generate(&prompt).await
    }

    pub fn generator_name(&self) -> &str {
        self.generator.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::ContextOnlyGenerator;
    use crate::text::Chunk;

    fn scored(id: usize, text: &str) -> ScoredChunk {
        ScoredChunk {
            chunk: Chunk {
                id,
                text: text.to_string(),
                source: None,
                offset: 0,
                length: text.len(),
            },
            score: 1.0,
            distance: 0.0,
        }
    }

    #[test]
    fn test_prompt_layout() {
        let synthesizer = AnswerSynthesizer::new(Arc::new(ContextOnlyGenerator), 10_000);
        let prompt = synthesizer
            .build_prompt("How much leave?", &[scored(0, "First."), scored(1, "Second.")])
            .unwrap();

        assert!(prompt.text.starts_with("Use the following pieces of context"));
        assert!(prompt.text.contains("\n\nFirst.\n\nSecond.\n\n"));
        assert!(prompt.text.ends_with("Question: How much leave?\nHelpful Answer:"));
        assert_eq!(prompt.context, vec!["First.", "Second."]);
    }

    #[test]
    fn test_context_overflow_is_rejected() {
        let synthesizer = AnswerSynthesizer::new(Arc::new(ContextOnlyGenerator), 300);
        let big = "word ".repeat(100);

        let result = synthesizer.build_prompt("q", &[scored(0, &big)]);
        match result {
            Err(RagError::ContextOverflow { actual, limit }) => {
                assert_eq!(limit, 300);
                assert!(actual > 300);
            }
            other => panic!("expected ContextOverflow, got {:?}", other.map(|p| p.text)),
        }
    }

    #[tokio::test]
    async fn test_synthesize_calls_generator() {
        let synthesizer = AnswerSynthesizer::new(Arc::new(ContextOnlyGenerator), 10_000);
        let answer = synthesizer
            .synthesize("How much leave?", &[scored(0, "Employees get 25 days.")])
            .await
            .unwrap();
        assert!(answer.contains("Employees get 25 days."));
    }
}
