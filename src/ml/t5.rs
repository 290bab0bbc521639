//! Local text-to-text generation with a T5 model (default `google/flan-t5-small`)
//!
//! The prompt is encoded once, then the decoder runs token by token until it
//! emits end-of-sequence or `max_tokens` tokens have been produced. Decoding
//! is greedy at temperature 0.

use crate::error::{RagError, Result};
use crate::ml::device;
use crate::ml::generation::{GenerationConfig, Generator, Prompt};
use crate::ml::text::TextProcessor;
use async_trait::async_trait;
use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::generation::LogitsProcessor;
use candle_transformers::models::t5::{self, T5ForConditionalGeneration};
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Longest encoder input, in tokens
const MAX_INPUT_TOKENS: usize = 512;

/// Seq2seq generator running on candle
pub struct T5Generator {
    inner: Arc<T5Model>,
    name: String,
}

struct T5Model {
    // encode/decode keep a KV cache and need exclusive access
    model: Mutex<T5ForConditionalGeneration>,
    processor: TextProcessor,
    device: Device,
    decoder_start_token: u32,
    eos_token: u32,
    use_cache: bool,
    max_tokens: usize,
    temperature: f64,
    seed: u64,
}

impl T5Generator {
    /// Load model weights, config and tokenizer from local files
    pub fn from_files(
        config_path: &Path,
        tokenizer_path: &Path,
        weights_path: &Path,
        config: &GenerationConfig,
    ) -> Result<Self> {
        let device = device::device_for(config.device_type);
        log::info!("Loading {} on {}", config.local_model, device.name);

        let t5_config: t5::Config = serde_json::from_str(&std::fs::read_to_string(config_path)?)?;
        let vb = unsafe { VarBuilder::from_mmaped_safetensors(&[weights_path], DType::F32, &device.device)? };
        let model = T5ForConditionalGeneration::load(vb, &t5_config)?;
        let processor = TextProcessor::from_file(tokenizer_path, MAX_INPUT_TOKENS)?;

        Ok(Self::new(model, &t5_config, processor, device.device, config))
    }

    /// Wrap an already loaded model
    pub fn new(
        model: T5ForConditionalGeneration,
        t5_config: &t5::Config,
        processor: TextProcessor,
        device: Device,
        config: &GenerationConfig,
    ) -> Self {
        let decoder_start_token = t5_config.decoder_start_token_id.unwrap_or(t5_config.pad_token_id) as u32;

        Self {
            inner: Arc::new(T5Model {
                model: Mutex::new(model),
                processor,
                device,
                decoder_start_token,
                eos_token: t5_config.eos_token_id as u32,
                use_cache: t5_config.use_cache,
                max_tokens: config.max_tokens as usize,
                temperature: f64::from(config.temperature),
                seed: config.seed,
            }),
            name: config.local_model.clone(),
        }
    }
}

impl T5Model {
    fn generate(&self, text: &str) -> Result<String> {
        let tokens = self.processor.tokenize(text)?;
        if tokens.is_empty() {
            return Err(RagError::Generation("Prompt produced no tokens".to_string()));
        }
        log::debug!(
            "Encoding {} prompt tokens (limit {})",
            tokens.len(),
            self.processor.max_length()
        );

        let mut model = self
            .model
            .lock()
            .map_err(|_| RagError::Generation("T5 model lock poisoned".to_string()))?;
        model.clear_kv_cache();

        let input_ids = Tensor::new(tokens.input_ids.as_slice(), &self.device)?.unsqueeze(0)?;
        let encoder_output = model.encode(&input_ids)?;

        let temperature = (self.temperature > 0.0).then_some(self.temperature);
        let mut sampler = LogitsProcessor::new(self.seed, temperature, None);
        let mut output = vec![self.decoder_start_token];

        // output[0] is the start token, so this caps generated tokens at max_tokens
        while output.len() <= self.max_tokens {
            let step = if output.len() == 1 || !self.use_cache {
                &output[..]
            } else {
                &output[output.len() - 1..]
            };
            let decoder_input = Tensor::new(step, &self.device)?.unsqueeze(0)?;
            let logits = model.decode(&decoder_input, &encoder_output)?.squeeze(0)?;
            let next = sampler.sample(&logits)?;
            if next == self.eos_token {
                break;
            }
            output.push(next);
        }
        model.clear_kv_cache();

        log::debug!("Generated {} tokens", output.len() - 1);
        self.processor.decode(&output[1..])
    }
}

#[async_trait]
impl Generator for T5Generator {
    async fn generate(&self, prompt: &Prompt) -> Result<String> {
        let model = Arc::clone(&self.inner);
        let text = prompt.text.clone();

        tokio::task::spawn_blocking(move || model.generate(&text))
            .await
            .map_err(|e| RagError::Generation(format!("Generation task failed: {}", e)))?
            .map_err(|e| match e {
                RagError::Candle(e) => RagError::Generation(format!("{} failed: {}", self.name, e)),
                other => other,
            })
    }

    fn name(&self) -> &str {
        &self.name
    }
}
