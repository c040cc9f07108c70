//! Test case definitions
//!
//! A test case is a natural-language request for a SQL query plus the
//! substrings a good answer is expected to contain.

use serde::{Deserialize, Serialize};

/// A single prompt to run and score
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCase {
    /// Human-readable name, also used for filtering
    pub name: String,
    /// The prompt sent to the model
    pub prompt: String,
    /// Substrings (usually SQL keywords) the response should contain
    pub expected_features: Vec<String>,
}

impl TestCase {
    pub fn new(name: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            prompt: prompt.into(),
            expected_features: Vec::new(),
        }
    }

    /// Add expected features
    pub fn expect<I, S>(mut self, features: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.expected_features
            .extend(features.into_iter().map(Into::into));
        self
    }
}

/// Built-in SQLite generation cases
pub fn builtin_cases() -> Vec<TestCase> {
    vec![
        TestCase::new(
            "Basic SELECT with JOIN",
            "Write a SQLite query to select all customers and their orders, joining the customers and orders tables.",
        )
        .expect(["SELECT", "JOIN", "customers", "orders"]),

        TestCase::new(
            "Complex aggregation with GROUP BY",
            "Create a SQLite query to find the total sales amount per customer, grouped by customer_id, and show only customers with total sales over $1000.",
        )
        .expect(["SELECT", "SUM", "GROUP BY", "HAVING"]),

        TestCase::new(
            "Window function",
            "Write a SQLite query using window functions to rank products by sales within each category.",
        )
        .expect(["RANK()", "PARTITION BY", "OVER", "ORDER BY"]),

        TestCase::new(
            "Common Table Expression (CTE)",
            "Create a SQLite query using a CTE to find employees who earn more than the average salary in their department.",
        )
        .expect(["WITH", "AS", "SELECT", "AVG"]),

        TestCase::new(
            "Subquery with EXISTS",
            "Write a SQLite query to find all products that have at least one order, using EXISTS clause.",
        )
        .expect(["SELECT", "EXISTS", "WHERE"]),

        TestCase::new(
            "Complex JOIN with multiple tables",
            "Create a SQLite query to show customer names, their orders, and product details by joining customers, orders, and products tables.",
        )
        .expect(["SELECT", "JOIN", "customers", "orders", "products"]),

        TestCase::new(
            "Date/Time operations",
            "Write a SQLite query to find all orders placed in the last 30 days using date functions.",
        )
        .expect(["SELECT", "date", "datetime", "WHERE"]),

        TestCase::new(
            "String manipulation",
            "Create a SQLite query to concatenate first_name and last_name, and convert to uppercase.",
        )
        .expect(["SELECT", "||", "UPPER"]),

        TestCase::new(
            "CASE statement",
            "Write a SQLite query to categorize products as 'Expensive', 'Moderate', or 'Cheap' based on price using CASE.",
        )
        .expect(["SELECT", "CASE", "WHEN", "THEN", "END"]),

        TestCase::new(
            "Recursive CTE",
            "Create a recursive SQLite query to show employee hierarchy (manager-employee relationships).",
        )
        .expect(["WITH RECURSIVE", "UNION", "SELECT"]),
    ]
}

/// Keep only cases whose name contains `filter`
pub fn filter_cases(cases: Vec<TestCase>, filter: Option<&str>) -> Vec<TestCase> {
    match filter {
        Some(f) => cases.into_iter().filter(|c| c.name.contains(f)).collect(),
        None => cases,
    }
}
