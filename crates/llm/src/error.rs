//! Error types for model loading and generation

use thiserror::Error;

#[derive(Error, Debug)]
pub enum LlmError {
    #[error("Hugging Face Hub error: {0}")]
    Hub(#[from] hf_hub::api::sync::ApiError),

    #[error("Model runtime error: {0}")]
    Candle(#[from] candle_core::Error),

    #[error("Tokenizer error: {0}")]
    Tokenizer(String),

    #[error("OpenAI API error: {0}")]
    OpenAi(#[from] async_openai::error::OpenAIError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("No {wanted} GGUF weights found in {repo}")]
    NoWeightsFile { repo: String, wanted: String },

    #[error("Unsupported model architecture: {0}")]
    UnsupportedArchitecture(String),

    #[error("Unsupported LLM provider: {0}")]
    UnsupportedProvider(String),

    #[error("Prompt is {tokens} tokens, exceeding max_seq_length {max}")]
    PromptTooLong { tokens: usize, max: usize },
}

pub type Result<T> = std::result::Result<T, LlmError>;
