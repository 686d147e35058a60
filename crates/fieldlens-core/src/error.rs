//! # Error Types
//!
//! Defines `FieldLensError`, the unified error enum for every failure mode in
//! the FieldLens pipeline. Every variant includes enough context (file path,
//! rule id, provider name) to debug immediately without digging through logs.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can occur in FieldLens operations.
#[derive(Error, Debug)]
pub enum FieldLensError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Failed to compile rule '{rule_id}' in {file}: {message}")]
    RuleCompile {
        file: PathBuf,
        rule_id: String,
        message: String,
    },

    #[error("Failed to load rule file {file}: {message}")]
    RuleFile { file: PathBuf, message: String },

    #[error("No rule files could be loaded from {path}: {message}")]
    NoRulesLoaded { path: String, message: String },

    #[error("Data source error reading {source_name}: {message}")]
    DataSource {
        source_name: String,
        message: String,
    },

    #[error("Profiling failed for {source_name}: {source}")]
    Profiling {
        source_name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("LLM classifier error: {message}")]
    Llm { message: String },

    #[error("Embedding request failed: {message}")]
    Embedding { message: String },

    #[error("Output error: {message}: {source}")]
    Output {
        message: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Scan cancelled")]
    Cancelled,

    #[error("{0}")]
    Other(String),
}

impl FieldLensError {
    /// Process exit code for embedding CLIs.
    ///
    /// 0 success, 2 configuration, 3 rule compile, 4 data source, 5 cancelled.
    pub fn exit_code(&self) -> i32 {
        match self {
            FieldLensError::Config { .. } => 2,
            FieldLensError::RuleCompile { .. }
            | FieldLensError::RuleFile { .. }
            | FieldLensError::NoRulesLoaded { .. } => 3,
            FieldLensError::DataSource { .. } | FieldLensError::Profiling { .. } => 4,
            FieldLensError::Cancelled => 5,
            _ => 1,
        }
    }
}

pub type Result<T> = std::result::Result<T, FieldLensError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        let config = FieldLensError::Config {
            message: "bad".to_string(),
        };
        assert_eq!(config.exit_code(), 2);

        let compile = FieldLensError::RuleCompile {
            file: PathBuf::from("r.yaml"),
            rule_id: "x".to_string(),
            message: "bad".to_string(),
        };
        assert_eq!(compile.exit_code(), 3);

        let data = FieldLensError::DataSource {
            source_name: "f.csv".to_string(),
            message: "unreadable".to_string(),
        };
        assert_eq!(data.exit_code(), 4);

        assert_eq!(FieldLensError::Cancelled.exit_code(), 5);
        assert_eq!(FieldLensError::Other("x".to_string()).exit_code(), 1);
    }
}
