//! # Scan Engine
//!
//! Two-phase matching over a profiled table: field-name rules against column
//! short names, then data rules — narrowed by column statistics — against
//! sampled values, with the date-grammar fallback and the optional LLM stage
//! folded in at the end. All per-scan state lives in the engine instance;
//! the rule set is shared and read-only.

use tracing::{debug, warn};

use crate::cancel::CancelToken;
use crate::dates::DateMatcher;
use crate::llm::classifier::LlmClassifier;
use crate::profile::{BaseType, ColumnStats, Profile, Profiler};
use crate::report::{ColumnResult, Diagnostic, MatchKind, RuleResult, ScanReport};
use crate::rules::{Rule, RuleKind, RuleSet};
use crate::value::{Record, Value};

/// Default data-rule confidence threshold (percent, exclusive).
pub const DEFAULT_CONFIDENCE: f64 = 5.0;

/// Rule id attached to the date-grammar fallback result.
const DATE_PATTERN_RULE_ID: &str = "date_pattern";

/// Which stages classify a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScanMode {
    /// Rule engine only.
    #[default]
    Rules,
    /// Rule engine first; the LLM sees only columns it left unclassified.
    Hybrid,
    /// LLM only; the rule engine is skipped.
    Llm,
}

/// Per-scan knobs. The defaults mirror a plain `scan` invocation.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Record and per-column sample cap.
    pub limit: usize,
    /// Data-rule confidence threshold (strictly-greater comparison).
    pub confidence: f64,
    /// Requested context tags (empty = all).
    pub contexts: Vec<String>,
    /// Requested languages (empty = all).
    pub langs: Vec<String>,
    /// Stop evaluating further rules on a column after its first match.
    pub stop_on_match: bool,
    /// Try date grammars on unmatched string columns.
    pub parse_dates: bool,
    /// Exclude empty values from the confidence denominator.
    pub except_empty: bool,
    /// Drop rules flagged imprecise.
    pub ignore_imprecise: bool,
    /// `share_uniq` percentage at or below which a column is a dict.
    pub dict_share: f64,
    pub mode: ScanMode,
    /// Hybrid mode: a column counts as classified once a data or date rule
    /// reaches this confidence.
    pub llm_min_confidence: f64,
    /// Country filter forwarded to LLM retrieval.
    pub llm_country: Option<String>,
}

impl Default for ScanOptions {
    fn default() -> Self {
        ScanOptions {
            limit: crate::profile::DEFAULT_SAMPLE_LIMIT,
            confidence: DEFAULT_CONFIDENCE,
            contexts: Vec::new(),
            langs: Vec::new(),
            stop_on_match: false,
            parse_dates: true,
            except_empty: true,
            ignore_imprecise: true,
            dict_share: crate::profile::DEFAULT_DICT_SHARE,
            mode: ScanMode::Rules,
            llm_min_confidence: DEFAULT_CONFIDENCE,
            llm_country: None,
        }
    }
}

/// The scan engine: borrows a shared rule set, owns per-scan options.
#[derive(Debug)]
pub struct Scanner<'r> {
    rules: &'r RuleSet,
    options: ScanOptions,
    dates: DateMatcher,
}

impl<'r> Scanner<'r> {
    pub fn new(rules: &'r RuleSet, options: ScanOptions) -> Self {
        Scanner {
            rules,
            options,
            dates: DateMatcher::new(),
        }
    }

    pub fn options(&self) -> &ScanOptions {
        &self.options
    }

    /// Profile and match without an LLM stage. In `Hybrid` mode unmatched
    /// columns simply stay unmatched; `Llm` mode yields a diagnostic since
    /// there is nothing to classify with.
    pub fn scan<I>(&self, table: &str, records: I, cancel: &CancelToken) -> ScanReport
    where
        I: IntoIterator<Item = Record>,
    {
        let (profile, cancelled) = self.profile(records, cancel);
        let mut report = self.match_profile(table, &profile, cancelled, cancel);
        if self.options.mode == ScanMode::Llm {
            report.diagnostics.push(Diagnostic::new(
                "llm",
                "llm mode requested but no classifier configured",
            ));
        }
        report
    }

    /// Full scan including the LLM stage for `Hybrid` and `Llm` modes.
    pub async fn scan_with_classifier<I>(
        &self,
        table: &str,
        records: I,
        classifier: &LlmClassifier,
        cancel: &CancelToken,
    ) -> ScanReport
    where
        I: IntoIterator<Item = Record>,
    {
        let (profile, cancelled) = self.profile(records, cancel);
        let mut report = self.match_profile(table, &profile, cancelled, cancel);
        if report.cancelled || self.options.mode == ScanMode::Rules {
            return report;
        }

        let mut llm_diagnostics = Vec::new();
        let mut cancelled_in_llm = false;
        for column in report.fields.iter_mut() {
            if !self.needs_llm(column) {
                continue;
            }
            if cancel.is_cancelled() {
                cancelled_in_llm = true;
                break;
            }
            let short = short_name(&column.field);
            let samples = llm_samples(&profile, &column.field);
            match classifier
                .classify(
                    short,
                    &samples,
                    self.options.llm_country.as_deref(),
                    self.options.langs.first().map(|s| s.as_str()),
                    None,
                )
                .await
            {
                Ok(classification) => {
                    if let Some(datatype_id) = classification.datatype_id {
                        column.matches.push(RuleResult {
                            rule_id: "llm".to_string(),
                            dataclass: datatype_id,
                            confidence: (classification.confidence * 100.0).clamp(0.0, 100.0),
                            rule_type: MatchKind::Llm,
                            format: None,
                            pii: None,
                        });
                        column.seal();
                    }
                }
                Err(err) => {
                    warn!("llm classification failed for '{}': {}", column.field, err);
                    llm_diagnostics.push(Diagnostic::new("llm", err.to_string()));
                }
            }
        }
        report.diagnostics.extend(llm_diagnostics);
        report.cancelled |= cancelled_in_llm;
        report
    }

    /// Stream records through the profiler, honoring the record cap and the
    /// cancellation token at record boundaries.
    fn profile<I>(&self, records: I, cancel: &CancelToken) -> (Profile, bool)
    where
        I: IntoIterator<Item = Record>,
    {
        let mut profiler = Profiler::new(self.options.limit, self.options.dict_share);
        if self.options.parse_dates {
            profiler = profiler.with_dates(self.dates);
        }
        let mut cancelled = false;
        for (seen, record) in records.into_iter().enumerate() {
            if self.options.limit > 0 && seen >= self.options.limit {
                break;
            }
            if cancel.is_cancelled() {
                cancelled = true;
                break;
            }
            profiler.observe(&record);
        }
        (profiler.finish(), cancelled)
    }

    /// Match every profiled column and assemble the report. A cancellation
    /// observed while matching keeps only the columns that were fully
    /// processed.
    fn match_profile(
        &self,
        table: &str,
        profile: &Profile,
        cancelled_in_profiling: bool,
        cancel: &CancelToken,
    ) -> ScanReport {
        let mut report = ScanReport {
            table: table.to_string(),
            fields: Vec::new(),
            stats: profile.stats.clone(),
            diagnostics: Vec::new(),
            cancelled: cancelled_in_profiling,
        };
        if report.cancelled {
            return report;
        }

        let rules_active = self.options.mode != ScanMode::Llm;
        let field_rules = if rules_active {
            self.rules.filtered(
                RuleKind::Field,
                &self.options.contexts,
                &self.options.langs,
                self.options.ignore_imprecise,
            )
        } else {
            Vec::new()
        };
        let data_rules = if rules_active {
            self.rules.filtered(
                RuleKind::Data,
                &self.options.contexts,
                &self.options.langs,
                self.options.ignore_imprecise,
            )
        } else {
            Vec::new()
        };

        for (path, stats) in profile.stats.iter() {
            if cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }
            let mut column = ColumnResult::new(path.clone(), stats.ftype, stats.tags.clone());
            if rules_active {
                self.match_column(&mut column, stats, profile, &field_rules, &data_rules);
            }
            column.seal();
            report.fields.push(column);
        }
        report
    }

    /// Run every rule stage for one column.
    fn match_column(
        &self,
        column: &mut ColumnResult,
        stats: &ColumnStats,
        profile: &Profile,
        field_rules: &[&Rule],
        data_rules: &[&Rule],
    ) {
        let short = short_name(&column.field).to_string();
        let field_matches = self.match_field_name(&short, field_rules);

        match stats.ftype {
            BaseType::Bool => {
                column.matches =
                    with_intrinsic("_fieldtype_boolean", "boolean", None, field_matches);
            }
            BaseType::DateTime => {
                column.matches =
                    with_intrinsic("_fieldtype_datetime", "datetime", None, field_matches);
            }
            BaseType::Date => {
                column.matches = with_intrinsic(
                    "_fieldtype_date",
                    "date",
                    stats.date_format.clone(),
                    field_matches,
                );
            }
            // Float columns are reported without data-rule matches.
            BaseType::Float => {
                column.matches = field_matches;
            }
            _ => {
                column.matches = field_matches;
                let sample = profile
                    .samples
                    .get(&column.field)
                    .map(Vec::as_slice)
                    .unwrap_or_default();
                self.match_values(&short, stats, sample, data_rules, column);
                if column.is_empty() && self.options.parse_dates && stats.ftype == BaseType::Str {
                    if let Some(result) = self.match_dates(sample) {
                        column.matches.push(result);
                    }
                }
            }
        }
    }

    /// Every candidate field rule against the column short name, each match
    /// at confidence 100.
    fn match_field_name(&self, short: &str, field_rules: &[&Rule]) -> Vec<RuleResult> {
        let mut matches = Vec::new();
        for rule in field_rules {
            if rule.matcher.matches(short) {
                matches.push(RuleResult {
                    rule_id: rule.id.clone(),
                    dataclass: rule.dataclass.clone(),
                    confidence: 100.0,
                    rule_type: MatchKind::Field,
                    format: None,
                    pii: rule.pii.clone(),
                });
                if self.options.stop_on_match {
                    break;
                }
            }
        }
        matches
    }

    /// Value matching for one column. Rules rejected by the length window
    /// or the field gate are never evaluated against values.
    fn match_values(
        &self,
        short: &str,
        stats: &ColumnStats,
        sample: &[Value],
        data_rules: &[&Rule],
        column: &mut ColumnResult,
    ) {
        let candidates = data_rules.iter().filter(|rule| {
            rule.length_overlaps(stats.minlen, stats.maxlen)
                && rule
                    .field_gate
                    .as_ref()
                    .is_none_or(|gate| gate.matches(short))
        });

        for rule in candidates {
            let confidence = self.eval_data_rule(rule, sample);
            if confidence > self.options.confidence {
                debug!(
                    "column '{}' matched rule '{}' at {:.2}",
                    column.field, rule.id, confidence
                );
                column.matches.push(RuleResult {
                    rule_id: rule.id.clone(),
                    dataclass: rule.dataclass.clone(),
                    confidence,
                    rule_type: MatchKind::Data,
                    format: None,
                    pii: rule.pii.clone(),
                });
                if self.options.stop_on_match {
                    break;
                }
            }
        }
    }

    /// Confidence of one data rule over the sample: percentage of non-empty
    /// values that pass the length window, the matcher and the validator.
    fn eval_data_rule(&self, rule: &Rule, sample: &[Value]) -> f64 {
        let total = sample.len();
        let mut success = 0usize;
        let mut empty = 0usize;
        for value in sample {
            if value.is_empty() {
                if self.options.except_empty {
                    empty += 1;
                }
                continue;
            }
            let text = value.to_text();
            let text_len = text.chars().count();
            if text_len < rule.min_len || text_len > rule.max_len {
                continue;
            }
            if !rule.matcher.matches(&text) {
                continue;
            }
            if let Some(validator) = &rule.validator {
                if !validator.call(&text) {
                    continue;
                }
            }
            success += 1;
        }
        let denominator = if self.options.except_empty {
            total - empty
        } else {
            total
        };
        if denominator == 0 {
            0.0
        } else {
            success as f64 * 100.0 / denominator as f64
        }
    }

    /// Date-grammar fallback over the sample of an unmatched string column.
    fn match_dates(&self, sample: &[Value]) -> Option<RuleResult> {
        let total = sample.len();
        let mut success = 0usize;
        let mut empty = 0usize;
        let mut format = None;
        for value in sample {
            if value.is_empty() {
                if self.options.except_empty {
                    empty += 1;
                }
                continue;
            }
            let Value::Str(text) = value else { continue };
            if let Some(key) = self.dates.match_str(text) {
                success += 1;
                format = Some(key);
            }
        }
        let denominator = if self.options.except_empty {
            total - empty
        } else {
            total
        };
        if denominator == 0 {
            return None;
        }
        let confidence = success as f64 * 100.0 / denominator as f64;
        if confidence > self.options.confidence {
            Some(RuleResult {
                rule_id: DATE_PATTERN_RULE_ID.to_string(),
                dataclass: "datetime".to_string(),
                confidence,
                rule_type: MatchKind::Date,
                format: format.map(str::to_string),
                pii: None,
            })
        } else {
            None
        }
    }

    /// Hybrid: a column goes to the LLM only when the rule engine produced
    /// neither a fieldtype intrinsic nor a sufficiently confident data or
    /// date match. `Llm` mode sends every column.
    fn needs_llm(&self, column: &ColumnResult) -> bool {
        match self.options.mode {
            ScanMode::Rules => false,
            ScanMode::Llm => true,
            ScanMode::Hybrid => !column.matches.iter().any(|m| match m.rule_type {
                MatchKind::FieldType => true,
                MatchKind::Data | MatchKind::Date => {
                    m.confidence > self.options.llm_min_confidence
                }
                MatchKind::Field | MatchKind::Llm => false,
            }),
        }
    }
}

/// Up to five non-empty sample strings for LLM retrieval.
fn llm_samples(profile: &Profile, path: &str) -> Vec<String> {
    profile
        .samples
        .get(path)
        .map(Vec::as_slice)
        .unwrap_or_default()
        .iter()
        .filter(|v| !v.is_empty())
        .map(Value::to_text)
        .take(5)
        .collect()
}

fn short_name(path: &str) -> &str {
    path.rsplit('.').next().unwrap_or(path).trim()
}

fn with_intrinsic(
    rule_id: &str,
    dataclass: &str,
    format: Option<String>,
    field_matches: Vec<RuleResult>,
) -> Vec<RuleResult> {
    let mut matches = Vec::with_capacity(field_matches.len() + 1);
    matches.push(RuleResult {
        rule_id: rule_id.to_string(),
        dataclass: dataclass.to_string(),
        confidence: 100.0,
        rule_type: MatchKind::FieldType,
        format,
        pii: None,
    });
    matches.extend(field_matches);
    matches
}
