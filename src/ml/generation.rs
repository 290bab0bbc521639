//! Answer generation backends
//!
//! [`OpenAiGenerator`] talks to any OpenAI-compatible chat completion endpoint
//! (OpenAI itself, or e.g. `http://localhost:11434/v1` for Ollama).
//! Without an endpoint, [`crate::ml::T5Generator`] runs a local seq2seq model.
//! [`ContextOnlyGenerator`] is the `--offline` choice: it needs no model at all
//! and answers with the retrieved context.

use crate::error::{RagError, Result};
use crate::ml::device::DeviceType;
use crate::utils::truncate_chars;
use async_openai::config::OpenAIConfig;
use async_openai::types::{
    ChatCompletionRequestMessage, ChatCompletionRequestUserMessage,
    ChatCompletionRequestUserMessageContent, CreateChatCompletionRequestArgs,
};
use async_openai::Client;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Generation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Chat model name
    pub model: String,
    /// Base URL of an OpenAI-compatible API; `None` means api.openai.com
    pub base_url: Option<String>,
    /// API key; usually supplied through the environment
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    /// Upper bound on answer length in tokens
    pub max_tokens: u32,
    pub temperature: f32,
    /// Longest prompt accepted, in characters
    pub max_prompt_chars: usize,
    /// HuggingFace id of the local model used when no endpoint is configured
    pub local_model: String,
    pub local_revision: String,
    pub device_type: DeviceType,
    /// Sampling seed; only matters when `temperature > 0`
    pub seed: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            model: "gpt-3.5-turbo".to_string(),
            base_url: None,
            api_key: None,
            max_tokens: 512,
            temperature: 0.0,
            max_prompt_chars: 12_000,
            local_model: "google/flan-t5-small".to_string(),
            local_revision: "main".to_string(),
            device_type: DeviceType::Auto,
            seed: 42,
        }
    }
}

impl GenerationConfig {
    /// True when an API endpoint can be reached: a key, or a custom base URL
    pub fn has_endpoint(&self) -> bool {
        self.api_key.as_deref().is_some_and(|key| !key.is_empty()) || self.base_url.is_some()
    }
}

/// A fully built prompt together with the pieces it was built from
#[derive(Debug, Clone, PartialEq)]
pub struct Prompt {
    pub question: String,
    pub context: Vec<String>,
    pub text: String,
}

/// Turns a prompt into an answer
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, prompt: &Prompt) -> Result<String>;

    /// Short human-readable model name
    fn name(&self) -> &str;
}

/// Chat completion client for OpenAI-compatible APIs
pub struct OpenAiGenerator {
    client: Client<OpenAIConfig>,
    config: GenerationConfig,
}

impl OpenAiGenerator {
    pub fn new(config: GenerationConfig) -> Self {
        let mut openai = OpenAIConfig::new().with_api_key(config.api_key.clone().unwrap_or_default());
        if let Some(base_url) = &config.base_url {
            openai = openai.with_api_base(base_url);
        }

        Self {
            client: Client::with_config(openai),
            config,
        }
    }
}

#[async_trait]
impl Generator for OpenAiGenerator {
    async fn generate(&self, prompt: &Prompt) -> Result<String> {
        let messages = vec![ChatCompletionRequestMessage::User(ChatCompletionRequestUserMessage {
            content: ChatCompletionRequestUserMessageContent::Text(prompt.text.clone()),
            name: None,
        })];

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.config.model)
            .messages(messages)
            .max_tokens(self.config.max_tokens)
            .temperature(self.config.temperature)
            .build()?;

        log::debug!(
            "Requesting completion from {} ({} prompt characters)",
            self.config.model,
            prompt.text.chars().count()
        );
        let response = self.client.chat().create(request).await?;

        let content = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.as_ref())
            .ok_or_else(|| {
                log::error!("No content in chat response: {:?}", response);
                RagError::Generation("No content in response".to_string())
            })?;

        Ok(content.trim().to_string())
    }

    fn name(&self) -> &str {
        &self.config.model
    }
}

/// Answers with a numbered digest of the retrieved context
#[derive(Debug, Clone, Default)]
pub struct ContextOnlyGenerator;

const CONTEXT_PREVIEW_CHARS: usize = 200;

#[async_trait]
impl Generator for ContextOnlyGenerator {
    async fn generate(&self, prompt: &Prompt) -> Result<String> {
        if prompt.context.is_empty() {
            return Ok("I couldn't find any relevant information in the document.".to_string());
        }

        let mut response = "Based on the document, here's what I found:\n\n".to_string();
        for (i, chunk) in prompt.context.iter().enumerate() {
            let chunk = chunk.trim();
            let preview = truncate_chars(chunk, CONTEXT_PREVIEW_CHARS);
            if preview.len() < chunk.len() {
                response.push_str(&format!("{}. {}...\n\n", i + 1, preview));
            } else {
                response.push_str(&format!("{}. {}\n\n", i + 1, preview));
            }
        }

        Ok(response.trim().to_string())
    }

    fn name(&self) -> &str {
        "context-only"
    }
}
