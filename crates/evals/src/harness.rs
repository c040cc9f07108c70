//! Test harness for running cases against a model
//!
//! Generates a response per case, scores it, and prints progress as it goes.

use std::time::Instant;

use anyhow::{Context, Result};
use llm::TextGenerator;
use tracing::info;

use crate::case::TestCase;
use crate::evaluator::{evaluate, Evaluation};
use crate::report::ResultRecord;

/// Runs test cases sequentially against one generator
pub struct TestHarness<G> {
    generator: G,
}

impl<G: TextGenerator> TestHarness<G> {
    pub fn new(generator: G) -> Self {
        Self { generator }
    }

    /// Run a single case. `index` is 1-based.
    pub async fn run_case(
        &mut self,
        case: &TestCase,
        index: usize,
        total: usize,
    ) -> Result<ResultRecord> {
        print_case_header(case, index, total);

        let started = Instant::now();
        let response = self
            .generator
            .generate(&case.prompt)
            .await
            .with_context(|| format!("Generation failed for test case: {}", case.name))?;
        info!("Generated response for {} in {:.1?}", case.name, started.elapsed());
        println!("{}", response);

        let evaluation = evaluate(&response, &case.expected_features);
        print_evaluation(&evaluation);

        Ok(ResultRecord {
            test: case.name.clone(),
            prompt: case.prompt.clone(),
            response,
            evaluation,
        })
    }

    /// Run every case in order, stopping at the first failure
    pub async fn run_cases(&mut self, cases: &[TestCase]) -> Result<Vec<ResultRecord>> {
        let mut results = Vec::with_capacity(cases.len());

        for (i, case) in cases.iter().enumerate() {
            let result = self.run_case(case, i + 1, cases.len()).await?;
            results.push(result);
        }

        Ok(results)
    }

    pub fn into_inner(self) -> G {
        self.generator
    }
}

fn print_case_header(case: &TestCase, index: usize, total: usize) {
    println!("\n{}", "=".repeat(80));
    println!("Test {}/{}: {}", index, total, case.name);
    println!("{}", "=".repeat(80));
    println!("\nPrompt: {}", case.prompt);
    println!("\n{}", "-".repeat(80));
    println!("Generated SQL:");
    println!("{}", "-".repeat(80));
}

fn print_evaluation(evaluation: &Evaluation) {
    println!("\n{}", "-".repeat(80));
    println!("Evaluation:");
    println!("{}", "-".repeat(80));
    println!("Score: {:.1}%", evaluation.score);
    println!("Found features: {}", join_or_none(&evaluation.found));
    println!("Missing features: {}", join_or_none(&evaluation.missing));
}

fn join_or_none(items: &[String]) -> String {
    if items.is_empty() {
        "None".to_string()
    } else {
        items.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use super::*;
    use crate::case::builtin_cases;
    use crate::report::Summary;

    /// Replays canned responses and records the prompts it saw
    struct ScriptedGenerator {
        responses: VecDeque<String>,
        prompts: Vec<String>,
    }

    impl ScriptedGenerator {
        fn new(responses: &[&str]) -> Self {
            Self {
                responses: responses.iter().map(|s| s.to_string()).collect(),
                prompts: Vec::new(),
            }
        }
    }

    impl TextGenerator for ScriptedGenerator {
        async fn generate(&mut self, prompt: &str) -> llm::Result<String> {
            self.prompts.push(prompt.to_string());
            self.responses.pop_front().ok_or_else(|| {
                llm::LlmError::Io(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "script exhausted",
                ))
            })
        }
    }

    #[tokio::test]
    async fn test_run_cases_in_order() {
        let cases: Vec<_> = builtin_cases().into_iter().take(3).collect();
        let generator = ScriptedGenerator::new(&[
            "SELECT * FROM customers JOIN orders ON customers.id = orders.customer_id;",
            "SELECT customer_id, SUM(amount) FROM sales GROUP BY customer_id;",
            "SELECT name FROM products ORDER BY sales DESC;",
        ]);

        let mut harness = TestHarness::new(generator);
        let results = harness.run_cases(&cases).await.unwrap();

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].test, "Basic SELECT with JOIN");
        assert_eq!(results[0].evaluation.score, 100.0);
        assert_eq!(results[1].evaluation.score, 75.0);
        assert_eq!(results[1].evaluation.missing, vec!["HAVING"]);
        assert_eq!(results[2].evaluation.score, 25.0);
        assert_eq!(results[2].evaluation.found, vec!["ORDER BY"]);

        let summary = Summary::from_results(&results);
        assert_eq!(summary.perfect_scores, 1);
        assert_eq!(summary.high_scores, 1);

        let generator = harness.into_inner();
        let expected_prompts: Vec<_> = cases.iter().map(|c| c.prompt.clone()).collect();
        assert_eq!(generator.prompts, expected_prompts);
    }

    #[tokio::test]
    async fn test_generation_failure_aborts_run() {
        let cases = builtin_cases();
        let mut harness = TestHarness::new(ScriptedGenerator::new(&["SELECT 1"]));

        let err = harness.run_cases(&cases).await.unwrap_err();
        assert!(format!("{:#}", err).contains("Complex aggregation with GROUP BY"));
    }

    #[test]
    fn test_join_or_none() {
        assert_eq!(join_or_none(&[]), "None");
        assert_eq!(
            join_or_none(&["SELECT".to_string(), "JOIN".to_string()]),
            "SELECT, JOIN"
        );
    }
}
