//! Sampling-based decoding
//!
//! Turns a row of logits into the next token id. The chain is fixed:
//! repetition penalty, temperature, softmax, nucleus (top-p) truncation,
//! then a weighted draw.

use std::collections::HashSet;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Decoding hyperparameters shared by every backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    /// Softmax temperature; values <= 0 select the most likely token
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Cumulative probability mass kept by nucleus sampling
    #[serde(default = "default_top_p")]
    pub top_p: f32,
    /// Penalty applied to tokens that already appeared (1.0 disables it)
    #[serde(default = "default_repetition_penalty")]
    pub repetition_penalty: f32,
    /// Upper bound on generated tokens per prompt
    #[serde(default = "default_max_new_tokens")]
    pub max_new_tokens: usize,
    /// Fixed RNG seed for reproducible runs
    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_temperature() -> f32 {
    0.7
}

fn default_top_p() -> f32 {
    0.9
}

fn default_repetition_penalty() -> f32 {
    1.1
}

fn default_max_new_tokens() -> usize {
    512
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            temperature: default_temperature(),
            top_p: default_top_p(),
            repetition_penalty: default_repetition_penalty(),
            max_new_tokens: default_max_new_tokens(),
            seed: None,
        }
    }
}

/// Stateful sampler owning the RNG for one generation
pub struct LogitsSampler {
    params: GenerationParams,
    rng: StdRng,
}

impl LogitsSampler {
    pub fn new(params: GenerationParams) -> Self {
        let rng = match params.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self { params, rng }
    }

    /// Pick the next token. `context` is every token seen so far, prompt included.
    pub fn sample(&mut self, logits: &mut [f32], context: &[u32]) -> u32 {
        apply_repetition_penalty(logits, context, self.params.repetition_penalty);

        if self.params.temperature <= 0.0 {
            return argmax(logits);
        }

        for logit in logits.iter_mut() {
            *logit /= self.params.temperature;
        }

        let probs = softmax(logits);
        let draw: f32 = self.rng.gen();
        sample_top_p(&probs, self.params.top_p, draw)
    }
}

/// Penalise every token id present in `context`.
///
/// Positive logits are divided by the penalty and negative ones multiplied,
/// so a penalty above 1.0 always makes the token less likely.
pub fn apply_repetition_penalty(logits: &mut [f32], context: &[u32], penalty: f32) {
    if (penalty - 1.0).abs() < f32::EPSILON {
        return;
    }

    let seen: HashSet<u32> = context.iter().copied().collect();
    for token in seen {
        if let Some(logit) = logits.get_mut(token as usize) {
            if *logit >= 0.0 {
                *logit /= penalty;
            } else {
                *logit *= penalty;
            }
        }
    }
}

pub fn softmax(logits: &[f32]) -> Vec<f32> {
    let max_logit = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|x| (x - max_logit).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

pub fn argmax(logits: &[f32]) -> u32 {
    logits
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(i, _)| i as u32)
        .unwrap_or(0)
}

/// Nucleus sampling over an already-normalised distribution.
///
/// Keeps the smallest set of most likely tokens whose mass reaches `p`
/// (never fewer than one) and maps `draw` in `[0, 1)` onto that set.
pub fn sample_top_p(probs: &[f32], p: f32, draw: f32) -> u32 {
    let mut indexed: Vec<(usize, f32)> = probs.iter().copied().enumerate().collect();
    indexed.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    let mut cumsum = 0.0;
    let mut cutoff = indexed.len();
    for (i, (_, prob)) in indexed.iter().enumerate() {
        cumsum += prob;
        if cumsum >= p {
            cutoff = i + 1;
            break;
        }
    }
    let nucleus = &indexed[..cutoff.max(1).min(indexed.len())];

    let mass: f32 = nucleus.iter().map(|(_, prob)| prob).sum();
    let target = draw * mass;
    let mut acc = 0.0;
    for (idx, prob) in nucleus {
        acc += prob;
        if target < acc {
            return *idx as u32;
        }
    }

    nucleus.last().map(|(idx, _)| *idx as u32).unwrap_or(0)
}
