use anyhow::{Context, Result};
use directories::ProjectDirs;
use llm::{GenerationParams, LlmConfig};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

const APP_NAME: &str = "sqleval";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EvalConfig {
    #[serde(default)]
    pub model: LlmConfig,
    #[serde(default)]
    pub generation: GenerationParams,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("outputs")
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
        }
    }
}

pub fn default_config_dir() -> Result<PathBuf> {
    ProjectDirs::from("", "", APP_NAME)
        .map(|dirs| dirs.config_dir().to_path_buf())
        .context("Could not determine config directory")
}

/// Where to read configuration from, and whether the file must exist.
///
/// `--config` and a `SQLEVAL_CONFIG_PATH` naming a file are both required
/// to exist. A `SQLEVAL_CONFIG_PATH` naming a directory, or the default
/// location, may be absent.
pub fn config_location(
    explicit: Option<&Path>,
    env_path: Option<PathBuf>,
) -> Result<(PathBuf, bool)> {
    if let Some(path) = explicit {
        return Ok((path.to_path_buf(), true));
    }

    if let Some(path) = env_path {
        if path.is_dir() {
            return Ok((path.join("config.toml"), false));
        }
        return Ok((path, true));
    }

    Ok((default_config_dir()?.join("config.toml"), false))
}

/// Load configuration from `--config`, `SQLEVAL_CONFIG_PATH`, or the default
/// location, then apply environment overrides.
pub fn load_config(explicit: Option<&Path>) -> Result<EvalConfig> {
    load_config_from(
        explicit,
        std::env::var_os("SQLEVAL_CONFIG_PATH").map(PathBuf::from),
        |key| std::env::var(key).ok(),
    )
}

pub fn load_config_from(
    explicit: Option<&Path>,
    env_path: Option<PathBuf>,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<EvalConfig> {
    let (config_file, required) = config_location(explicit, env_path)?;

    let mut config = if required || config_file.exists() {
        read_config_file(&config_file)?
    } else {
        tracing::debug!("No config at {}, using defaults", config_file.display());
        EvalConfig::default()
    };

    config.apply_overrides(lookup);
    Ok(config)
}

/// Log filter from a `RUST_LOG` value, `info` when unset.
///
/// Directives in `rust_log` are kept as given, so `RUST_LOG=debug` lowers
/// the level rather than being capped at `info`.
pub fn log_filter(rust_log: Option<&str>) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .parse_lossy(rust_log.unwrap_or_default())
}

fn read_config_file(path: &Path) -> Result<EvalConfig> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config = toml::from_str(&contents)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
    tracing::info!("Loaded config from {}", path.display());
    Ok(config)
}

impl EvalConfig {
    /// Apply `SQLEVAL_*` and `OPENAI_*` overrides from `lookup`
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(provider) = lookup("SQLEVAL_PROVIDER") {
            self.model.provider = provider;
        }
        if let Some(model) = lookup("SQLEVAL_MODEL") {
            self.model.model = model;
        }
        if let Some(dir) = lookup("SQLEVAL_OUTPUT_DIR") {
            self.output.dir = PathBuf::from(dir);
        }
        if let Some(key) = lookup("OPENAI_API_KEY") {
            self.model.api_key = Some(key);
        }
        if let Some(url) = lookup("OPENAI_BASE_URL") {
            self.model.base_url = Some(url);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_match_builtin_run() {
        let config = EvalConfig::default();
        assert_eq!(config.model.model, "eeezeecee/sqlite-expert-v1");
        assert_eq!(config.model.max_seq_length, 2048);
        assert!(config.model.load_in_4bit);
        assert_eq!(config.generation.max_new_tokens, 512);
        assert_eq!(config.output.dir, PathBuf::from("outputs"));
    }

    #[test]
    fn test_partial_file() {
        let config: EvalConfig = toml::from_str(
            r#"
[model]
load_in_4bit = false
dtype = "f16"

[generation]
temperature = 0.2
seed = 7
"#,
        )
        .unwrap();

        assert!(!config.model.load_in_4bit);
        assert_eq!(config.model.dtype, Some(llm::Precision::F16));
        assert_eq!(config.model.provider, "local");
        assert!((config.generation.temperature - 0.2).abs() < 1e-6);
        assert!((config.generation.top_p - 0.9).abs() < 1e-6);
        assert_eq!(config.generation.seed, Some(7));
        assert_eq!(config.output.dir, PathBuf::from("outputs"));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("SQLEVAL_PROVIDER", "openai"),
            ("SQLEVAL_MODEL", "sqlite-expert"),
            ("SQLEVAL_OUTPUT_DIR", "/tmp/results"),
            ("OPENAI_BASE_URL", "http://localhost:8000/v1"),
        ]
        .into_iter()
        .collect();

        let mut config = EvalConfig::default();
        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.model.provider, "openai");
        assert_eq!(config.model.model, "sqlite-expert");
        assert_eq!(config.output.dir, PathBuf::from("/tmp/results"));
        assert_eq!(config.model.base_url.as_deref(), Some("http://localhost:8000/v1"));
        assert!(config.model.api_key.is_none());
    }

    #[test]
    fn test_explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_config(Some(&dir.path().join("nope.toml"))).is_err());
    }

    #[test]
    fn test_env_path_to_missing_file_does_not_fall_back_to_sibling() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("config.toml"), "[output]\ndir = \"sibling\"\n").unwrap();

        let result = load_config_from(None, Some(dir.path().join("mine.toml")), |_| None);
        assert!(result.is_err());
    }

    #[test]
    fn test_env_path_to_file_is_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mine.toml");
        std::fs::write(&path, "[output]\ndir = \"mine\"\n").unwrap();
        std::fs::write(dir.path().join("config.toml"), "[output]\ndir = \"sibling\"\n").unwrap();

        let config = load_config_from(None, Some(path), |_| None).unwrap();
        assert_eq!(config.output.dir, PathBuf::from("mine"));
    }

    #[test]
    fn test_env_path_to_dir() {
        let dir = tempfile::tempdir().unwrap();

        let config = load_config_from(None, Some(dir.path().to_path_buf()), |_| None).unwrap();
        assert_eq!(config.output.dir, PathBuf::from("outputs"));

        std::fs::write(dir.path().join("config.toml"), "[output]\ndir = \"from-dir\"\n").unwrap();
        let config = load_config_from(None, Some(dir.path().to_path_buf()), |_| None).unwrap();
        assert_eq!(config.output.dir, PathBuf::from("from-dir"));
    }

    #[test]
    fn test_explicit_path_wins_over_env() {
        let dir = tempfile::tempdir().unwrap();
        let explicit = dir.path().join("explicit.toml");
        std::fs::write(&explicit, "[output]\ndir = \"explicit\"\n").unwrap();

        let config = load_config_from(
            Some(&explicit),
            Some(dir.path().join("missing.toml")),
            |key| (key == "SQLEVAL_MODEL").then(|| "override".to_string()),
        )
        .unwrap();
        assert_eq!(config.output.dir, PathBuf::from("explicit"));
        assert_eq!(config.model.model, "override");
    }

    #[test]
    fn test_log_filter_defaults_to_info() {
        assert_eq!(log_filter(None).max_level_hint(), Some(LevelFilter::INFO));
        assert_eq!(log_filter(Some("")).max_level_hint(), Some(LevelFilter::INFO));
    }

    #[test]
    fn test_log_filter_honours_rust_log() {
        assert_eq!(log_filter(Some("debug")).max_level_hint(), Some(LevelFilter::DEBUG));
    }

    #[test]
    fn test_explicit_file_is_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[output]\ndir = \"custom\"\n").unwrap();

        let config = read_config_file(&path).unwrap();
        assert_eq!(config.output.dir, PathBuf::from("custom"));
    }
}
