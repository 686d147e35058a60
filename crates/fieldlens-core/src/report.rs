//! # Scan Report Model
//!
//! The canonical output of a scan: per-column match lists plus the full
//! statistics map, serialized with stable field and column ordering so that
//! identical scans produce byte-identical JSON.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::profile::{BaseType, ColumnStats, Tag};

/// Registry URL template for a matched dataclass. Held stable.
pub const CLASS_BASE_URL: &str = "https://meta.apicrafter.io/class/{dataclass}";

/// Expand the registry URL for one dataclass label.
pub fn class_url(dataclass: &str) -> String {
    CLASS_BASE_URL.replace("{dataclass}", dataclass)
}

/// Which stage of the engine produced a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchKind {
    Field,
    Data,
    FieldType,
    Date,
    Llm,
}

/// One rule match for one column.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleResult {
    pub rule_id: String,
    pub dataclass: String,
    /// Percent in `[0, 100]`.
    pub confidence: f64,
    pub rule_type: MatchKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pii: Option<String>,
}

impl RuleResult {
    pub fn is_pii(&self) -> bool {
        self.pii.is_some()
    }

    pub fn class_url(&self) -> String {
        class_url(&self.dataclass)
    }

    pub fn pii_url(&self) -> Option<String> {
        self.pii.as_deref().map(class_url)
    }
}

/// All matches for one column, in engine stage order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnResult {
    pub field: String,
    pub ftype: BaseType,
    pub tags: Vec<Tag>,
    pub matches: Vec<RuleResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub datatype_url: Option<String>,
}

impl ColumnResult {
    pub fn new(field: String, ftype: BaseType, tags: Vec<Tag>) -> Self {
        ColumnResult {
            field,
            ftype,
            tags,
            matches: Vec::new(),
            datatype_url: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    /// Derive `datatype_url` from the first match, once all stages ran.
    pub fn seal(&mut self) {
        self.datatype_url = self.matches.first().map(|m| m.class_url());
    }
}

/// A non-fatal problem observed during a scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diagnostic {
    pub stage: String,
    pub message: String,
}

impl Diagnostic {
    pub fn new(stage: &str, message: impl Into<String>) -> Self {
        Diagnostic {
            stage: stage.to_string(),
            message: message.into(),
        }
    }
}

/// Terminal output of one table scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanReport {
    pub table: String,
    pub fields: Vec<ColumnResult>,
    pub stats: IndexMap<String, ColumnStats>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<Diagnostic>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub cancelled: bool,
}

impl ScanReport {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
