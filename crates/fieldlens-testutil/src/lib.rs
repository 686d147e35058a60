//! Shared fixtures for FieldLens tests: record builders and rule-file
//! scaffolding over temporary directories.

use std::path::{Path, PathBuf};

use fieldlens_core::value::{Record, Value};
use indexmap::IndexMap;

/// Build a record from `(key, value)` pairs, preserving order.
pub fn record(entries: Vec<(&str, Value)>) -> Record {
    let mut rec = IndexMap::new();
    for (k, v) in entries {
        rec.insert(k.to_string(), v);
    }
    rec
}

/// A nested map value from `(key, value)` pairs.
pub fn map(entries: Vec<(&str, Value)>) -> Value {
    Value::Map(record(entries))
}

/// Shorthand for a string value.
pub fn s(v: &str) -> Value {
    Value::Str(v.to_string())
}

/// One single-column record per value.
pub fn column_records(field: &str, values: &[&str]) -> Vec<Record> {
    values
        .iter()
        .map(|v| record(vec![(field, s(v))]))
        .collect()
}

/// A temporary directory of rule files.
pub struct RuleFixture {
    dir: tempfile::TempDir,
}

impl RuleFixture {
    pub fn new() -> Self {
        RuleFixture {
            dir: tempfile::tempdir().expect("create temp rule dir"),
        }
    }

    /// Write one rule file; returns its path.
    pub fn add_file(&self, name: &str, body: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        std::fs::write(&path, body).expect("write rule file");
        path
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }
}

impl Default for RuleFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// A minimal rule group covering the matcher kinds most tests need.
pub const COMMON_RULES_YAML: &str = r#"
name: common
description: common test rules
context: common
lang: en
rules:
  email:
    key: email
    type: data
    match: regex
    rule: '.+@.+\..+'
  email_field:
    key: email
    type: field
    match: text
    rule: "email,e_mail,mail"
  url:
    key: url
    type: data
    match: func
    rule: "validators:url"
    minlen: 8
    maxlen: 200
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_records_shape() {
        let records = column_records("email", &["a@b.com", "c@d.com"]);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].get("email"), Some(&s("a@b.com")));
    }

    #[test]
    fn test_rule_fixture_writes_files() {
        let fixture = RuleFixture::new();
        let path = fixture.add_file("common.yaml", COMMON_RULES_YAML);
        assert!(path.exists());
        assert!(std::fs::read_to_string(path).unwrap().contains("email"));
    }
}
