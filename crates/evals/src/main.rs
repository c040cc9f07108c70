//! SQLite expert model evaluation runner
//!
//! Loads the model, runs every test case, prints progress and a summary, and
//! saves the results as JSON.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand};

use llm::{DeviceReport, LlmClient};
use sqleval::case::filter_cases;
use sqleval::{get_cases, load_config, log_filter, EvalConfig, RunConfig, RunReport, TestHarness};

#[derive(Parser)]
#[command(name = "sqleval")]
#[command(about = "Evaluate a SQL generation model against built-in prompts")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Path to a TOML config file (or set SQLEVAL_CONFIG_PATH)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Directory containing TOML test case files
    #[arg(long, global = true, env = "SQLEVAL_CASES")]
    cases_dir: Option<PathBuf>,

    /// Directory results are written to (overrides config)
    #[arg(short, long, global = true)]
    output_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the evaluation (default)
    Run {
        /// Only run cases whose name contains this string
        #[arg(short, long)]
        filter: Option<String>,

        /// Only run built-in cases (ignore --cases-dir)
        #[arg(long)]
        builtin_only: bool,
    },

    /// List available test cases
    List {
        /// Only list built-in cases
        #[arg(long)]
        builtin_only: bool,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(std::env::var("RUST_LOG").ok().as_deref()))
        .init();

    let cli = Cli::parse();

    let mut config = load_config(cli.config.as_deref())?;
    if let Some(dir) = cli.output_dir {
        config.output.dir = dir;
    }

    match cli.command.unwrap_or(Commands::Run {
        filter: None,
        builtin_only: false,
    }) {
        Commands::Run {
            filter,
            builtin_only,
        } => {
            let cases_dir = if builtin_only {
                None
            } else {
                cli.cases_dir.as_deref()
            };
            run_evals(&config, cases_dir, filter.as_deref()).await
        }
        Commands::List { builtin_only } => {
            let cases_dir = if builtin_only {
                None
            } else {
                cli.cases_dir.as_deref()
            };
            list_cases(cases_dir)
        }
    }
}

async fn run_evals(config: &EvalConfig, cases_dir: Option<&Path>, filter: Option<&str>) -> Result<()> {
    println!("{}", "=".repeat(80));
    println!("SQLite Expert Model Inference Test");
    println!("{}", "=".repeat(80));
    println!();

    let cases = filter_cases(get_cases(cases_dir)?, filter);
    if cases.is_empty() {
        println!("No test cases match the filter");
        return Ok(());
    }

    if config.model.provider == "local" {
        DeviceReport::detect().print();
    }

    println!("Loading model: {}", config.model.model);
    println!("This may take a few minutes on first run (downloading model)...\n");

    let client = LlmClient::load(config.model.clone(), config.generation.clone())
        .with_context(|| format!("Failed to load model {}", config.model.model))?;
    println!("Model loaded successfully: {}\n", client.describe());
    let model = client.model().to_string();

    let mut harness = TestHarness::new(client);
    let results = harness.run_cases(&cases).await?;

    let report = RunReport::new(
        Local::now(),
        model,
        RunConfig {
            max_seq_length: config.model.max_seq_length,
            load_in_4bit: config.model.load_in_4bit,
        },
        results,
    );
    report.summary.print();

    let path = report.save(&config.output.dir)?;
    println!("\nResults saved to: {}", path.display());

    Ok(())
}

fn list_cases(cases_dir: Option<&Path>) -> Result<()> {
    let cases = get_cases(cases_dir)?;
    println!("Available test cases:\n");
    for case in cases {
        println!("  {}", case.name);
        println!("    Prompt: {}", case.prompt);
        println!("    Expected: {}", case.expected_features.join(", "));
        println!();
    }
    Ok(())
}
