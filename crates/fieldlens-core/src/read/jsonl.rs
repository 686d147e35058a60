//! JSON-lines reader. Malformed lines are logged and skipped; the scan sees
//! only well-formed records.

use std::io::{BufRead, BufReader};
use std::path::Path;

use tracing::warn;

use crate::error::{FieldLensError, Result};
use crate::value::{record_from_json, Record};

/// Read up to `limit` records from a JSON-lines file.
pub fn read_jsonl(path: &Path, limit: usize) -> Result<Vec<Record>> {
    let file = std::fs::File::open(path).map_err(|e| FieldLensError::DataSource {
        source_name: path.display().to_string(),
        message: e.to_string(),
    })?;

    let mut records = Vec::new();
    for (line_no, line) in BufReader::new(file).lines().enumerate() {
        if limit > 0 && records.len() >= limit {
            break;
        }
        let line = line.map_err(|e| FieldLensError::DataSource {
            source_name: path.display().to_string(),
            message: e.to_string(),
        })?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<serde_json::Value>(&line) {
            Ok(value) if value.is_object() => records.push(record_from_json(value)),
            Ok(_) => warn!(
                "{}:{}: not a JSON object, skipped",
                path.display(),
                line_no + 1
            ),
            Err(e) => warn!("{}:{}: {}, skipped", path.display(), line_no + 1, e),
        }
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    #[test]
    fn test_read_jsonl_skips_bad_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.jsonl");
        std::fs::write(
            &path,
            "{\"a\": 1}\nnot json\n[1,2]\n\n{\"a\": 2, \"b\": {\"c\": true}}\n",
        )
        .unwrap();

        let records = read_jsonl(&path, 100).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].get("a"), Some(&Value::Int(1)));
        match records[1].get("b") {
            Some(Value::Map(m)) => assert_eq!(m.get("c"), Some(&Value::Bool(true))),
            other => panic!("expected nested map, got {:?}", other),
        }
    }

    #[test]
    fn test_limit_applied() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.jsonl");
        let body: String = (0..40).map(|i| format!("{{\"n\": {}}}\n", i)).collect();
        std::fs::write(&path, body).unwrap();
        assert_eq!(read_jsonl(&path, 5).unwrap().len(), 5);
    }
}
