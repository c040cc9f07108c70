//! Run results, summary statistics, and JSON persistence

use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::evaluator::Evaluation;

/// Outcome of one test case
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    /// Test case name
    pub test: String,
    pub prompt: String,
    /// Generated text with the echoed prompt removed
    pub response: String,
    pub evaluation: Evaluation,
}

/// Aggregate statistics over a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub avg_score: f64,
    pub total_tests: usize,
    /// Cases scoring exactly 100
    pub perfect_scores: usize,
    /// Cases scoring 80 or more
    pub high_scores: usize,
}

impl Summary {
    pub fn from_results(results: &[ResultRecord]) -> Self {
        let total_tests = results.len();
        let avg_score = if results.is_empty() {
            0.0
        } else {
            results.iter().map(|r| r.evaluation.score).sum::<f64>() / total_tests as f64
        };

        Self {
            avg_score,
            total_tests,
            perfect_scores: results.iter().filter(|r| r.evaluation.is_perfect()).count(),
            high_scores: results.iter().filter(|r| r.evaluation.is_high()).count(),
        }
    }

    pub fn print(&self) {
        println!("\n\n{}", "=".repeat(80));
        println!("SUMMARY");
        println!("{}", "=".repeat(80));
        println!("\nAverage Score: {:.1}%", self.avg_score);
        println!("Total Tests: {}", self.total_tests);
        println!("Tests with 100% score: {}", self.perfect_scores);
        println!("Tests with 80%+ score: {}", self.high_scores);
    }
}

/// Model settings recorded alongside the results
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    pub max_seq_length: usize,
    pub load_in_4bit: bool,
}

/// Everything written to disk for one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    /// Time the report was written, `YYYYMMDD_HHMMSS` local time
    pub timestamp: String,
    pub model: String,
    pub config: RunConfig,
    pub results: Vec<ResultRecord>,
    pub summary: Summary,
}

impl RunReport {
    pub fn new(
        written_at: DateTime<Local>,
        model: impl Into<String>,
        config: RunConfig,
        results: Vec<ResultRecord>,
    ) -> Self {
        let summary = Summary::from_results(&results);
        Self {
            timestamp: written_at.format("%Y%m%d_%H%M%S").to_string(),
            model: model.into(),
            config,
            results,
            summary,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize run report")
    }

    /// Write the report into `output_dir` as `inference_results_<timestamp>.json`.
    ///
    /// The directory is created if needed. Existing files are never
    /// overwritten; a `_2`, `_3`, ... suffix is added instead.
    pub fn save(&self, output_dir: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(output_dir).with_context(|| {
            format!("Failed to create output directory: {}", output_dir.display())
        })?;

        let json = self.to_json()?;
        let mut attempt = 1;
        loop {
            let path = output_dir.join(report_file_name(&self.timestamp, attempt));
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    file.write_all(json.as_bytes())
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    return Ok(path);
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => attempt += 1,
                Err(e) => {
                    return Err(e).with_context(|| format!("Failed to create {}", path.display()))
                }
            }
        }
    }
}

fn report_file_name(timestamp: &str, attempt: usize) -> String {
    if attempt == 1 {
        format!("inference_results_{}.json", timestamp)
    } else {
        format!("inference_results_{}_{}.json", timestamp, attempt)
    }
}
