//! Keyword-coverage scoring
//!
//! A response is scored by the share of expected features it contains,
//! matched as case-insensitive substrings. Matching is deliberately loose:
//! "deselected" contains "SELECT".

use serde::{Deserialize, Serialize};

/// Score for one response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    /// Percentage of expected features found (0-100)
    pub score: f64,
    /// Features present in the response, in expected order
    pub found: Vec<String>,
    /// Features absent from the response, in expected order
    pub missing: Vec<String>,
}

impl Evaluation {
    pub fn is_perfect(&self) -> bool {
        self.score == 100.0
    }

    pub fn is_high(&self) -> bool {
        self.score >= 80.0
    }
}

/// Partition `expected_features` by presence in `response`.
///
/// An empty feature list scores 0.
pub fn evaluate(response: &str, expected_features: &[String]) -> Evaluation {
    let response_upper = response.to_uppercase();
    let (found, missing): (Vec<String>, Vec<String>) = expected_features
        .iter()
        .cloned()
        .partition(|feature| response_upper.contains(&feature.to_uppercase()));

    let score = if expected_features.is_empty() {
        0.0
    } else {
        found.len() as f64 * 100.0 / expected_features.len() as f64
    };

    Evaluation {
        score,
        found,
        missing,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn features(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_all_features_found() {
        let expected = features(&["SELECT", "JOIN", "customers", "orders"]);
        let eval = evaluate(
            "SELECT * FROM customers JOIN orders ON customers.id = orders.customer_id",
            &expected,
        );
        assert_eq!(eval.score, 100.0);
        assert_eq!(eval.found, expected);
        assert!(eval.missing.is_empty());
        assert!(eval.is_perfect());
    }

    #[test]
    fn test_partial_match_keeps_order() {
        let expected = features(&["RANK()", "PARTITION BY", "OVER", "ORDER BY"]);
        let eval = evaluate("SELECT name FROM products ORDER BY price", &expected);
        assert_eq!(eval.score, 25.0);
        assert_eq!(eval.found, features(&["ORDER BY"]));
        assert_eq!(eval.missing, features(&["RANK()", "PARTITION BY", "OVER"]));
        assert!(!eval.is_high());
    }

    #[test]
    fn test_case_insensitive() {
        let eval = evaluate("select * FROM t", &features(&["SELECT"]));
        assert_eq!(eval.found, features(&["SELECT"]));
        assert_eq!(eval.score, 100.0);

        let eval = evaluate("SELECT DATE('now')", &features(&["date"]));
        assert_eq!(eval.found, features(&["date"]));
    }

    #[test]
    fn test_substring_not_word_match() {
        let eval = evaluate("deselected", &features(&["SELECT"]));
        assert_eq!(eval.found, features(&["SELECT"]));
    }

    #[test]
    fn test_empty_features_score_zero() {
        let eval = evaluate("SELECT 1", &[]);
        assert_eq!(eval.score, 0.0);
        assert!(eval.found.is_empty());
        assert!(eval.missing.is_empty());
    }

    #[test]
    fn test_partition_is_complete_and_disjoint() {
        let expected = features(&["WITH", "AS", "SELECT", "AVG", "||"]);
        let eval = evaluate("with x as (select 1) select * from x", &expected);

        assert_eq!(eval.found.len() + eval.missing.len(), expected.len());
        for f in &expected {
            assert!(eval.found.contains(f) ^ eval.missing.contains(f));
        }
        assert_eq!(eval.score, 60.0);
    }

    #[test]
    fn test_high_threshold() {
        let expected = features(&["SELECT", "CASE", "WHEN", "THEN", "END"]);
        let eval = evaluate("SELECT CASE WHEN price > 10 THEN 'x' ELSE 'y'", &expected);
        assert_eq!(eval.score, 80.0);
        assert!(eval.is_high());
        assert!(!eval.is_perfect());
    }
}
