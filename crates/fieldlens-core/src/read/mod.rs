//! # File Connectors
//!
//! Readers that turn CSV, JSON-lines and JSON-array files into the record
//! sequence the engine consumes. Database connectors live outside the core;
//! these file readers exist so the CLI (and tests) can feed the engine
//! without one.

mod csv_file;
mod json_file;
mod jsonl;

pub use csv_file::read_csv;
pub use json_file::read_json;
pub use jsonl::read_jsonl;

use std::path::Path;

use crate::error::{FieldLensError, Result};
use crate::value::Record;

/// Supported input formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Csv,
    JsonLines,
    Json,
}

/// Detect a file's format from its extension.
pub fn detect_format(path: &Path) -> Option<FileFormat> {
    match path.extension()?.to_str()?.to_lowercase().as_str() {
        "csv" | "tsv" => Some(FileFormat::Csv),
        "jsonl" | "ndjson" => Some(FileFormat::JsonLines),
        "json" => Some(FileFormat::Json),
        _ => None,
    }
}

/// Read up to `limit` records from a file, dispatching on its extension.
pub fn read_records<P: AsRef<Path>>(path: P, limit: usize) -> Result<Vec<Record>> {
    let path = path.as_ref();
    let format = detect_format(path).ok_or_else(|| FieldLensError::DataSource {
        source_name: path.display().to_string(),
        message: "unsupported file type (supported: csv, tsv, jsonl, ndjson, json)".to_string(),
    })?;
    match format {
        FileFormat::Csv => read_csv(path, limit),
        FileFormat::JsonLines => read_jsonl(path, limit),
        FileFormat::Json => read_json(path, limit),
    }
}
