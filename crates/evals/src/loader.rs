//! TOML test case loader
//!
//! Loads extra test cases from a directory. Each file holds one or more
//! `[[cases]]` tables:
//!
//! ```toml
//! [[cases]]
//! name = "Simple count"
//! prompt = "Write a SQLite query counting rows in the users table."
//! expected_features = ["SELECT", "COUNT", "users"]
//! ```

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::case::{builtin_cases, TestCase};

#[derive(Debug, Deserialize)]
struct CaseFile {
    #[serde(default)]
    cases: Vec<TomlCase>,
}

#[derive(Debug, Deserialize)]
struct TomlCase {
    name: String,
    prompt: String,
    #[serde(default)]
    expected_features: Vec<String>,
}

impl From<TomlCase> for TestCase {
    fn from(toml: TomlCase) -> Self {
        TestCase {
            name: toml.name,
            prompt: toml.prompt,
            expected_features: toml.expected_features,
        }
    }
}

/// Load the cases of a single TOML file, in file order
pub fn load_case_file(path: &Path) -> Result<Vec<TestCase>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read case file: {}", path.display()))?;

    let file: CaseFile = toml::from_str(&content)
        .with_context(|| format!("Failed to parse case file: {}", path.display()))?;

    Ok(file.cases.into_iter().map(TestCase::from).collect())
}

/// Load all cases from a directory, files in name order
pub fn load_cases_from_dir(dir: &Path) -> Result<Vec<TestCase>> {
    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read cases directory: {}", dir.display()))?
    {
        let path = entry?.path();
        if path.extension().map_or(false, |ext| ext == "toml") {
            paths.push(path);
        }
    }
    paths.sort();

    let mut cases = Vec::new();
    for path in paths {
        match load_case_file(&path) {
            Ok(loaded) => {
                tracing::info!("Loaded {} case(s) from {}", loaded.len(), path.display());
                cases.extend(loaded);
            }
            Err(e) => {
                tracing::warn!("Failed to load {}: {:#}", path.display(), e);
            }
        }
    }

    Ok(cases)
}

/// Cases from `dir` when given and non-empty, otherwise the built-in set
pub fn get_cases(dir: Option<&Path>) -> Result<Vec<TestCase>> {
    match dir {
        Some(dir) => {
            println!("Loading test cases from: {}", dir.display());
            let cases = load_cases_from_dir(dir)?;

            if cases.is_empty() {
                println!("No test cases found in directory, using built-in cases");
                return Ok(builtin_cases());
            }

            Ok(cases)
        }
        None => Ok(builtin_cases()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_case_file() {
        let toml_str = r#"
[[cases]]
name = "Simple count"
prompt = "Count the users."
expected_features = ["SELECT", "COUNT"]

[[cases]]
name = "No features"
prompt = "Say hello."
"#;

        let file: CaseFile = toml::from_str(toml_str).unwrap();
        let cases: Vec<TestCase> = file.cases.into_iter().map(TestCase::from).collect();

        assert_eq!(cases.len(), 2);
        assert_eq!(cases[0].name, "Simple count");
        assert_eq!(cases[0].expected_features, vec!["SELECT", "COUNT"]);
        assert!(cases[1].expected_features.is_empty());
    }

    #[test]
    fn test_load_dir_sorted_and_skips_bad_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("b.toml"),
            "[[cases]]\nname = \"second\"\nprompt = \"p2\"\n",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("a.toml"),
            "[[cases]]\nname = \"first\"\nprompt = \"p1\"\nexpected_features = [\"SELECT\"]\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("broken.toml"), "[[cases]]\nname = 3\n").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let cases = load_cases_from_dir(dir.path()).unwrap();
        let names: Vec<_> = cases.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["first", "second"]);
    }

    #[test]
    fn test_empty_dir_falls_back_to_builtin() {
        let dir = tempfile::tempdir().unwrap();
        let cases = get_cases(Some(dir.path())).unwrap();
        assert_eq!(cases, builtin_cases());
    }

    #[test]
    fn test_missing_dir_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_cases_from_dir(&dir.path().join("missing")).is_err());
    }
}
