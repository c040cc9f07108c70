//! Evaluation framework for SQL generation models
//!
//! Runs a fixed set of natural-language prompts through a model and scores
//! each response by which expected SQL keywords it contains.
//!
//! ## Metrics
//!
//! - **Score**: percentage of a case's expected features found in the response
//! - **Average score**: mean over all cases
//! - **Perfect / high scores**: cases at 100% / at or above 80%

pub mod case;
pub mod config;
pub mod evaluator;
pub mod harness;
pub mod loader;
pub mod report;

pub use case::{builtin_cases, TestCase};
pub use config::{load_config, log_filter, EvalConfig};
pub use evaluator::{evaluate, Evaluation};
pub use harness::TestHarness;
pub use loader::{get_cases, load_cases_from_dir};
pub use report::{ResultRecord, RunConfig, RunReport, Summary};
