//! LLM client abstraction for sqleval
//!
//! Loads a text-generation model once and produces completions for prompts.
//! Two providers are supported:
//!
//! - `local`: quantized GGUF weights from the Hugging Face Hub, run with candle
//! - `openai`: any OpenAI-compatible chat completions endpoint

pub mod device;
pub mod error;
pub mod local;
pub mod openai;
pub mod sampling;

use serde::{Deserialize, Serialize};
use tracing::info;

pub use device::DeviceReport;
pub use error::{LlmError, Result};
pub use local::{LocalModel, Precision};
pub use openai::OpenAiBackend;
pub use sampling::GenerationParams;

/// Model configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Provider name (local, openai)
    #[serde(default = "default_provider")]
    pub provider: String,
    /// Hub repository (local) or served model name (openai)
    #[serde(default = "default_model")]
    pub model: String,
    /// Exact GGUF file inside the repository, skipping auto-selection
    pub weights_file: Option<String>,
    /// Repository holding `tokenizer.json` when it differs from `model`
    pub tokenizer: Option<String>,
    /// Prompt plus generated tokens may not exceed this
    #[serde(default = "default_max_seq_length")]
    pub max_seq_length: usize,
    /// Load 4-bit quantized weights
    #[serde(default = "default_load_in_4bit")]
    pub load_in_4bit: bool,
    /// Weight precision when not loading 4-bit (auto-detected if unset)
    pub dtype: Option<Precision>,
    /// API key (openai provider)
    pub api_key: Option<String>,
    /// Base URL override (openai provider)
    pub base_url: Option<String>,
}

fn default_provider() -> String {
    "local".to_string()
}

fn default_model() -> String {
    "eeezeecee/sqlite-expert-v1".to_string()
}

fn default_max_seq_length() -> usize {
    2048
}

fn default_load_in_4bit() -> bool {
    true
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            weights_file: None,
            tokenizer: None,
            max_seq_length: default_max_seq_length(),
            load_in_4bit: default_load_in_4bit(),
            dtype: None,
            api_key: None,
            base_url: None,
        }
    }
}

/// Anything that can turn a prompt into a completion
#[allow(async_fn_in_trait)]
pub trait TextGenerator {
    async fn generate(&mut self, prompt: &str) -> Result<String>;
}

enum Backend {
    Local(Box<LocalModel>),
    OpenAi(OpenAiBackend),
}

/// A loaded model ready to generate
pub struct LlmClient {
    config: LlmConfig,
    params: GenerationParams,
    backend: Backend,
}

impl LlmClient {
    /// Load the configured model. Blocks while weights download and load.
    pub fn load(config: LlmConfig, params: GenerationParams) -> Result<Self> {
        let backend = match config.provider.as_str() {
            "local" => Backend::Local(Box::new(LocalModel::load(&config)?)),
            "openai" => {
                info!(
                    "Using hosted model {}; max_seq_length and load_in_4bit are left to the server",
                    config.model
                );
                Backend::OpenAi(OpenAiBackend::new(&config))
            }
            provider => return Err(LlmError::UnsupportedProvider(provider.to_string())),
        };

        Ok(Self {
            config,
            params,
            backend,
        })
    }

    /// Generate a completion with the client's fixed sampling parameters
    pub async fn generate(&mut self, prompt: &str) -> Result<String> {
        match &mut self.backend {
            Backend::Local(model) => model.generate(prompt, &self.params),
            Backend::OpenAi(backend) => backend.generate(prompt, &self.params).await,
        }
    }

    /// One-line description of what was loaded
    pub fn describe(&self) -> String {
        match &self.backend {
            Backend::Local(model) => format!(
                "{} [{}, {}] on {}",
                self.config.model,
                model.weights_file(),
                model.architecture(),
                device::describe(model.device())
            ),
            Backend::OpenAi(_) => format!(
                "{} via {}",
                self.config.model,
                self.config.base_url.as_deref().unwrap_or("api.openai.com")
            ),
        }
    }

    /// Get the configured model name
    pub fn model(&self) -> &str {
        &self.config.model
    }
}

impl TextGenerator for LlmClient {
    async fn generate(&mut self, prompt: &str) -> Result<String> {
        LlmClient::generate(self, prompt).await
    }
}

/// Remove the prompt when the model echoes it back, then trim whitespace
pub fn strip_prompt_echo(output: &str, prompt: &str) -> String {
    output
        .strip_prefix(prompt)
        .unwrap_or(output)
        .trim()
        .to_string()
}
