//! # Configuration File Parser
//!
//! Reads and parses `fieldlens.toml`, the optional user configuration file
//! that customizes FieldLens without CLI flags. Supports:
//!
//! - `[rules]` — rule pack paths and preset language/context/country filters
//! - `[scan]` — record limit, confidence threshold, dict share
//! - `[llm]` — provider, model, registry, index location, retrieval depth
//!
//! Example `fieldlens.toml`:
//!
//! ```toml
//! [rules]
//! paths = ["rules"]
//! langs = ["en", "ru"]
//!
//! [scan]
//! limit = 1000
//! confidence = 5.0
//!
//! [llm]
//! provider = "openai"
//! registry = "registry/datatypes_latest.jsonl"
//! index = ".fieldlens/index.json"
//! top_k = 10
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{FieldLensError, Result};

/// Default config file name.
pub const CONFIG_FILE_NAME: &str = "fieldlens.toml";

/// Default rule directory when no config file names one.
pub const DEFAULT_RULE_PATH: &str = "rules";

/// Top-level fieldlens.toml structure.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FieldLensConfig {
    pub rules: RulesConfig,
    pub scan: ScanConfig,
    pub llm: LlmConfig,

    /// Absolute path to the directory containing fieldlens.toml.
    ///
    /// Populated by `read_config()` so that relative paths resolve against
    /// the config file's location, not the CWD.
    #[serde(skip)]
    pub config_dir: Option<PathBuf>,
}

/// Rule pack locations and preset filters.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RulesConfig {
    /// Directories or files to load rules from.
    pub paths: Vec<String>,
    /// Only load rule files in these languages (empty = all).
    pub langs: Vec<String>,
    /// Only load rule files in these contexts (empty = all).
    pub contexts: Vec<String>,
    /// Only load rule files for these country codes (empty = all).
    pub country_codes: Vec<String>,
}

/// Default scan parameters.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    pub limit: Option<usize>,
    pub confidence: Option<f64>,
    pub dict_share: Option<f64>,
    pub parse_dates: Option<bool>,
    pub ignore_imprecise: Option<bool>,
}

/// LLM classifier settings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Provider preset name (openai, openrouter, perplexity, ollama, lmstudio).
    pub provider: Option<String>,
    pub model: Option<String>,
    /// API key; when absent the provider's environment variable is used.
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    /// Path to the JSONL semantic-type registry.
    pub registry: Option<String>,
    /// Where to persist the vector index.
    pub index: Option<String>,
    pub embedding_base_url: Option<String>,
    pub embedding_model: Option<String>,
    pub top_k: Option<usize>,
    pub max_retries: Option<usize>,
    pub timeout_secs: Option<u64>,
}

impl FieldLensConfig {
    /// Resolve a configured path against the config file's directory.
    pub fn resolve_path(&self, value: &str) -> PathBuf {
        let path = Path::new(value);
        if path.is_absolute() {
            return path.to_path_buf();
        }
        match &self.config_dir {
            Some(dir) => dir.join(path),
            None => path.to_path_buf(),
        }
    }

    /// Rule paths to load: configured ones, or the `rules` default.
    pub fn rule_paths(&self) -> Vec<PathBuf> {
        if self.rules.paths.is_empty() {
            vec![PathBuf::from(DEFAULT_RULE_PATH)]
        } else {
            self.rules.paths.iter().map(|p| self.resolve_path(p)).collect()
        }
    }
}

/// Read and parse a config file.
pub fn read_config<P: AsRef<Path>>(path: P) -> Result<FieldLensConfig> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|e| FieldLensError::Config {
        message: format!("cannot read {}: {}", path.display(), e),
    })?;
    let mut config: FieldLensConfig =
        toml::from_str(&text).map_err(|e| FieldLensError::Config {
            message: format!("cannot parse {}: {}", path.display(), e),
        })?;
    config.config_dir = path
        .canonicalize()
        .ok()
        .and_then(|p| p.parent().map(Path::to_path_buf));
    Ok(config)
}

/// Look for `fieldlens.toml` in the current directory.
pub fn find_config() -> Option<PathBuf> {
    let candidate = PathBuf::from(CONFIG_FILE_NAME);
    candidate.exists().then_some(candidate)
}
