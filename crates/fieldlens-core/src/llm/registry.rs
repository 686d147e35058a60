//! # Semantic Type Registry
//!
//! Loads the line-oriented registry of semantic types (one JSON record per
//! line) and produces the canonical textualization each entry is embedded
//! under.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{FieldLensError, Result};

/// One semantic type record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatatypeEntry {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub doc: String,
    #[serde(default)]
    pub categories: Vec<NameOrId>,
    #[serde(default)]
    pub country: Vec<NameOrId>,
    #[serde(default)]
    pub langs: Vec<NameOrId>,
    #[serde(default)]
    pub examples: Vec<Example>,
    #[serde(default)]
    pub regexp: Option<String>,
    #[serde(default)]
    pub classification: Option<String>,
}

/// Registry lists hold either plain strings or `{id, name}` objects.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NameOrId {
    Text(String),
    Entry {
        #[serde(default)]
        id: Option<String>,
        #[serde(default)]
        name: Option<String>,
    },
}

impl NameOrId {
    pub fn id(&self) -> &str {
        match self {
            NameOrId::Text(s) => s,
            NameOrId::Entry { id, name } => {
                id.as_deref().or(name.as_deref()).unwrap_or_default()
            }
        }
    }

    pub fn display_name(&self) -> &str {
        match self {
            NameOrId::Text(s) => s,
            NameOrId::Entry { id, name } => {
                name.as_deref().or(id.as_deref()).unwrap_or_default()
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Example {
    Text(String),
    Entry {
        value: String,
        #[serde(default)]
        description: Option<String>,
    },
}

/// Load all entries from a JSONL registry file. Unparseable lines are logged
/// and skipped.
pub fn load_registry<P: AsRef<Path>>(path: P) -> Result<Vec<DatatypeEntry>> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|e| FieldLensError::Config {
        message: format!("cannot read registry {}: {}", path.display(), e),
    })?;

    let mut entries = Vec::new();
    for (line_no, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<DatatypeEntry>(line) {
            Ok(entry) if !entry.id.is_empty() => entries.push(entry),
            Ok(_) => warn!("registry line {} has no id, skipped", line_no + 1),
            Err(e) => warn!("registry line {} unparseable: {}", line_no + 1, e),
        }
    }
    info!("loaded {} datatypes from {}", entries.len(), path.display());
    Ok(entries)
}

/// Canonical text an entry is embedded under: id, name, description,
/// categories, countries, languages, examples, pattern and classification.
pub fn entry_text(entry: &DatatypeEntry) -> String {
    let mut parts = vec![format!("ID: {}", entry.id)];
    if !entry.name.is_empty() {
        parts.push(format!("Name: {}", entry.name));
    }
    if !entry.doc.is_empty() {
        parts.push(format!("Description: {}", entry.doc));
    }
    push_list(&mut parts, "Categories", &entry.categories);
    push_list(&mut parts, "Countries", &entry.country);
    push_list(&mut parts, "Languages", &entry.langs);
    if !entry.examples.is_empty() {
        let examples: Vec<String> = entry
            .examples
            .iter()
            .map(|ex| match ex {
                Example::Text(v) => v.clone(),
                Example::Entry {
                    value,
                    description: Some(desc),
                } => format!("{} ({})", value, desc),
                Example::Entry { value, .. } => value.clone(),
            })
            .collect();
        parts.push(format!("Examples: {}", examples.join(", ")));
    }
    if let Some(regexp) = &entry.regexp {
        parts.push(format!("Pattern: {}", regexp));
    }
    if let Some(classification) = &entry.classification {
        parts.push(format!("Classification: {}", classification));
    }
    parts.join("\n")
}

/// Comma-joined ids of a `NameOrId` list, the normalized form stored as
/// metadata for post-filtering.
pub fn joined_ids(items: &[NameOrId]) -> String {
    items
        .iter()
        .map(NameOrId::id)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(",")
}

fn push_list(parts: &mut Vec<String>, label: &str, items: &[NameOrId]) {
    if !items.is_empty() {
        let names: Vec<&str> = items.iter().map(NameOrId::display_name).collect();
        parts.push(format!("{}: {}", label, names.join(", ")));
    }
}
