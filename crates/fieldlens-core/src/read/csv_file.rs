//! CSV reader with single-line delimiter sniffing. Every cell arrives as a
//! string; the profiler's type guessing handles the rest.

use std::io::{BufRead, BufReader};
use std::path::Path;

use indexmap::IndexMap;

use crate::error::{FieldLensError, Result};
use crate::value::{Record, Value};

/// Candidate delimiters, most common first.
const DELIMITERS: &[u8] = b",;\t|";

/// Pick the delimiter that occurs most often in the header line.
fn sniff_delimiter(path: &Path) -> Result<u8> {
    let file = std::fs::File::open(path).map_err(|e| FieldLensError::DataSource {
        source_name: path.display().to_string(),
        message: e.to_string(),
    })?;
    let mut first_line = String::new();
    BufReader::new(file)
        .read_line(&mut first_line)
        .map_err(|e| FieldLensError::DataSource {
            source_name: path.display().to_string(),
            message: e.to_string(),
        })?;
    Ok(DELIMITERS
        .iter()
        .copied()
        .max_by_key(|d| first_line.bytes().filter(|b| b == d).count())
        .unwrap_or(b','))
}

/// Read up to `limit` records from a CSV (or TSV) file.
pub fn read_csv(path: &Path, limit: usize) -> Result<Vec<Record>> {
    let delimiter = sniff_delimiter(path)?;
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_path(path)
        .map_err(|e| FieldLensError::DataSource {
            source_name: path.display().to_string(),
            message: e.to_string(),
        })?;

    let headers = reader
        .headers()
        .map_err(|e| FieldLensError::DataSource {
            source_name: path.display().to_string(),
            message: e.to_string(),
        })?
        .clone();

    let mut records = Vec::new();
    for row in reader.records() {
        if limit > 0 && records.len() >= limit {
            break;
        }
        let row = row.map_err(|e| FieldLensError::DataSource {
            source_name: path.display().to_string(),
            message: e.to_string(),
        })?;
        let mut record: Record = IndexMap::with_capacity(headers.len());
        for (header, cell) in headers.iter().zip(row.iter()) {
            record.insert(header.to_string(), Value::Str(cell.to_string()));
        }
        records.push(record);
    }
    Ok(records)
}
