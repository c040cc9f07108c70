//! Local GGUF backend
//!
//! Downloads quantized weights and a tokenizer from the Hugging Face Hub and
//! runs the forward pass with candle.

use std::collections::HashSet;
use std::fs::File;
use std::path::PathBuf;

use candle_core::quantized::gguf_file;
use candle_core::{DType, Device, Tensor};
use candle_transformers::models::{quantized_llama, quantized_qwen2};
use hf_hub::api::sync::Api;
use serde::{Deserialize, Serialize};
use tokenizers::Tokenizer;
use tracing::{debug, info};

use crate::device;
use crate::error::{LlmError, Result};
use crate::sampling::{GenerationParams, LogitsSampler};
use crate::{strip_prompt_echo, LlmConfig};

/// Tokens treated as end-of-sequence when the tokenizer defines them
const EOS_CANDIDATES: &[&str] = &[
    "</s>",
    "<|endoftext|>",
    "<|im_end|>",
    "<|eot_id|>",
    "<|end_of_text|>",
];

/// 4-bit variants in order of preference
const FOUR_BIT_VARIANTS: &[&str] = &["q4_k_m", "q4_k_s", "q4_0", "q4"];

/// Weight precision used when 4-bit loading is off
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Precision {
    F16,
    Bf16,
    F32,
}

impl Precision {
    fn file_tags(precision: Option<Self>) -> &'static [&'static str] {
        match precision {
            Some(Precision::F16) => &["f16"],
            Some(Precision::Bf16) => &["bf16"],
            Some(Precision::F32) => &["f32"],
            None => &["f16", "bf16", "q8_0", "f32"],
        }
    }
}

/// Choose the GGUF file to load from a repository listing.
///
/// Tags are matched case-insensitively against the file name; the first tag
/// (in preference order) with a matching file wins.
pub fn select_weights_file(
    files: &[String],
    load_in_4bit: bool,
    precision: Option<Precision>,
) -> Option<String> {
    let ggufs: Vec<&String> = files
        .iter()
        .filter(|f| f.to_lowercase().ends_with(".gguf"))
        .collect();

    let tags = if load_in_4bit {
        FOUR_BIT_VARIANTS
    } else {
        Precision::file_tags(precision)
    };

    tags.iter().find_map(|tag| {
        ggufs
            .iter()
            .find(|f| file_has_tag(f, tag))
            .map(|f| (*f).clone())
    })
}

// "bf16" also contains "f16", so the tag must not be preceded by a letter
fn file_has_tag(file: &str, tag: &str) -> bool {
    let lower = file.to_lowercase();
    lower.match_indices(tag).any(|(pos, _)| {
        pos == 0
            || !lower[..pos]
                .chars()
                .next_back()
                .is_some_and(|c| c.is_ascii_alphabetic())
    })
}

/// Number of tokens that may be generated after a prompt of `prompt_len`
/// tokens without exceeding `max_seq_length`.
pub fn token_budget(prompt_len: usize, max_new_tokens: usize, max_seq_length: usize) -> Result<usize> {
    if prompt_len >= max_seq_length {
        return Err(LlmError::PromptTooLong {
            tokens: prompt_len,
            max: max_seq_length,
        });
    }
    Ok(max_new_tokens.min(max_seq_length - prompt_len))
}

// None when the decoded text does not start with the prompt
fn completion_from_full(full: &str, prompt: &str) -> Option<String> {
    full.starts_with(prompt).then(|| strip_prompt_echo(full, prompt))
}

enum Weights {
    Llama(quantized_llama::ModelWeights),
    Qwen2(quantized_qwen2::ModelWeights),
}

impl Weights {
    fn forward(&mut self, input: &Tensor, index_pos: usize) -> candle_core::Result<Tensor> {
        match self {
            Weights::Llama(m) => m.forward(input, index_pos),
            Weights::Qwen2(m) => m.forward(input, index_pos),
        }
    }
}

/// A quantized model held in memory with its tokenizer
pub struct LocalModel {
    weights: Weights,
    tokenizer: Tokenizer,
    device: Device,
    eos_tokens: HashSet<u32>,
    max_seq_length: usize,
    weights_file: String,
    architecture: String,
}

impl LocalModel {
    /// Resolve, download (first use only), and load the configured model
    pub fn load(config: &LlmConfig) -> Result<Self> {
        let api = Api::new()?;
        let repo = api.model(config.model.clone());

        let weights_file = match &config.weights_file {
            Some(file) => file.clone(),
            None => {
                let files: Vec<String> = repo
                    .info()?
                    .siblings
                    .into_iter()
                    .map(|s| s.rfilename)
                    .collect();
                debug!("{} lists {} files", config.model, files.len());
                select_weights_file(&files, config.load_in_4bit, config.dtype).ok_or_else(
                    || LlmError::NoWeightsFile {
                        repo: config.model.clone(),
                        wanted: match (config.load_in_4bit, config.dtype) {
                            (true, _) => "4-bit".to_string(),
                            (false, Some(p)) => format!("{p:?}"),
                            (false, None) => "full-precision".to_string(),
                        },
                    },
                )?
            }
        };

        info!("Fetching weights {} from {}", weights_file, config.model);
        let weights_path = repo.get(&weights_file)?;

        let tokenizer_repo = config.tokenizer.as_deref().unwrap_or(&config.model);
        info!("Fetching tokenizer from {}", tokenizer_repo);
        let tokenizer_path = api.model(tokenizer_repo.to_string()).get("tokenizer.json")?;

        let device = device::select_device()?;
        Self::from_files(weights_path, tokenizer_path, device, config.max_seq_length, weights_file)
    }

    fn from_files(
        weights_path: PathBuf,
        tokenizer_path: PathBuf,
        device: Device,
        max_seq_length: usize,
        weights_file: String,
    ) -> Result<Self> {
        let mut file = File::open(&weights_path)?;
        let content =
            gguf_file::Content::read(&mut file).map_err(|e| e.with_path(&weights_path))?;

        let architecture = content
            .metadata
            .get("general.architecture")
            .and_then(|v| v.to_string().ok())
            .cloned()
            .unwrap_or_else(|| "llama".to_string());

        let mut eos_tokens: HashSet<u32> = content
            .metadata
            .get("tokenizer.ggml.eos_token_id")
            .and_then(|v| v.to_u32().ok())
            .into_iter()
            .collect();

        let weights = match architecture.as_str() {
            "llama" | "mistral" => Weights::Llama(quantized_llama::ModelWeights::from_gguf(
                content, &mut file, &device,
            )?),
            "qwen2" => Weights::Qwen2(quantized_qwen2::ModelWeights::from_gguf(
                content, &mut file, &device,
            )?),
            other => return Err(LlmError::UnsupportedArchitecture(other.to_string())),
        };

        let tokenizer =
            Tokenizer::from_file(&tokenizer_path).map_err(|e| LlmError::Tokenizer(e.to_string()))?;
        eos_tokens.extend(EOS_CANDIDATES.iter().filter_map(|t| tokenizer.token_to_id(t)));

        info!(
            "Loaded {} ({}) on {}, {} end-of-sequence tokens",
            weights_file,
            architecture,
            device::describe(&device),
            eos_tokens.len()
        );

        Ok(Self {
            weights,
            tokenizer,
            device,
            eos_tokens,
            max_seq_length,
            weights_file,
            architecture,
        })
    }

    pub fn weights_file(&self) -> &str {
        &self.weights_file
    }

    pub fn architecture(&self) -> &str {
        &self.architecture
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    /// Generate a continuation for `prompt`, blocking until done
    pub fn generate(&mut self, prompt: &str, params: &GenerationParams) -> Result<String> {
        let encoding = self
            .tokenizer
            .encode(prompt, true)
            .map_err(|e| LlmError::Tokenizer(e.to_string()))?;
        let prompt_len = encoding.get_ids().len();
        let budget = token_budget(prompt_len, params.max_new_tokens, self.max_seq_length)?;
        let mut tokens = encoding.get_ids().to_vec();
        let mut sampler = LogitsSampler::new(params.clone());
        let mut index_pos = 0;

        for step in 0..budget {
            let pending = if step == 0 {
                &tokens[..]
            } else {
                &tokens[tokens.len() - 1..]
            };
            let input = Tensor::new(pending, &self.device)?.unsqueeze(0)?;
            let logits = self.weights.forward(&input, index_pos)?;
            index_pos += pending.len();

            let mut logits = logits.squeeze(0)?.to_dtype(DType::F32)?.to_vec1::<f32>()?;
            let next = sampler.sample(&mut logits, &tokens);
            if self.eos_tokens.contains(&next) {
                break;
            }
            tokens.push(next);
        }

        debug!("Generated {} tokens", tokens.len() - prompt_len);

        let full = self
            .tokenizer
            .decode(&tokens, true)
            .map_err(|e| LlmError::Tokenizer(e.to_string()))?;
        if let Some(completion) = completion_from_full(&full, prompt) {
            return Ok(completion);
        }

        // The tokenizer did not round-trip the prompt; decode only new tokens
        let generated = self
            .tokenizer
            .decode(&tokens[prompt_len..], true)
            .map_err(|e| LlmError::Tokenizer(e.to_string()))?;
        Ok(generated.trim().to_string())
    }
}
