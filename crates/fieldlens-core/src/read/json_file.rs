//! JSON array-of-objects reader.

use std::path::Path;

use tracing::warn;

use crate::error::{FieldLensError, Result};
use crate::value::{record_from_json, Record};

/// Read up to `limit` records from a JSON file holding an array of objects.
pub fn read_json(path: &Path, limit: usize) -> Result<Vec<Record>> {
    let text = std::fs::read_to_string(path).map_err(|e| FieldLensError::DataSource {
        source_name: path.display().to_string(),
        message: e.to_string(),
    })?;
    let value: serde_json::Value =
        serde_json::from_str(&text).map_err(|e| FieldLensError::DataSource {
            source_name: path.display().to_string(),
            message: e.to_string(),
        })?;
    let serde_json::Value::Array(items) = value else {
        return Err(FieldLensError::DataSource {
            source_name: path.display().to_string(),
            message: "expected a JSON array of objects".to_string(),
        });
    };

    let mut records = Vec::new();
    for item in items {
        if limit > 0 && records.len() >= limit {
            break;
        }
        if item.is_object() {
            records.push(record_from_json(item));
        } else {
            warn!("{}: non-object array element skipped", path.display());
        }
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    #[test]
    fn test_read_json_array() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.json");
        std::fs::write(&path, r#"[{"x": "a"}, {"x": "b"}, 3]"#).unwrap();
        let records = read_json(&path, 100).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].get("x"), Some(&Value::Str("b".to_string())));
    }

    #[test]
    fn test_non_array_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.json");
        std::fs::write(&path, r#"{"not": "an array"}"#).unwrap();
        let err = read_json(&path, 100).unwrap_err();
        assert!(matches!(err, FieldLensError::DataSource { .. }));
    }
}
