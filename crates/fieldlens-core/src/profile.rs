//! # Field Profiler
//!
//! Streams records through the flattener and accumulates per-column
//! statistics: base type histogram, length range, uniqueness, character
//! composition, numeric min/max and low-cardinality (dict) detection. The
//! profiler also retains the first N values of every column; the matching
//! engine samples from those.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::dates::DateMatcher;
use crate::flatten::flatten;
use crate::value::{Record, Value};

/// Default number of values retained per column.
pub const DEFAULT_SAMPLE_LIMIT: usize = 1000;

/// Default `share_uniq` percentage at or below which a column is a dict.
pub const DEFAULT_DICT_SHARE: f64 = 10.0;

/// String forms treated as empty when deciding whether a dict column is
/// actually all placeholder values.
pub const EMPTY_VALUES: &[&str] = &["", "None", "NaN", "-", "N/A"];

/// Base type of a single value, and of a column once aggregated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BaseType {
    Str,
    Int,
    Float,
    NumStr,
    Bool,
    Date,
    DateTime,
    Empty,
    Typed,
}

impl BaseType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BaseType::Str => "str",
            BaseType::Int => "int",
            BaseType::Float => "float",
            BaseType::NumStr => "numstr",
            BaseType::Bool => "bool",
            BaseType::Date => "date",
            BaseType::DateTime => "datetime",
            BaseType::Empty => "empty",
            BaseType::Typed => "typed",
        }
    }
}

/// Column-level tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tag {
    Uniq,
    Dict,
    Empty,
}

/// Guess the base type of one value.
///
/// All-digit strings with a leading zero are `numstr` (identifiers like
/// postal codes, not numbers); other all-digit strings are `int`. When a
/// date matcher is supplied, strings that fit a date grammar come back as
/// `date` together with the matched pattern key.
pub fn guess_type(value: &Value, dates: Option<&DateMatcher>) -> (BaseType, Option<&'static str>) {
    match value {
        Value::Null => (BaseType::Empty, None),
        Value::Bool(_) => (BaseType::Bool, None),
        Value::Int(_) => (BaseType::Int, None),
        Value::Float(_) => (BaseType::Float, None),
        Value::DateTime(_) => (BaseType::DateTime, None),
        Value::Date(_) => (BaseType::Date, None),
        Value::List(_) | Value::Map(_) => (BaseType::Typed, None),
        Value::Str(s) => {
            if s.trim().is_empty() {
                return (BaseType::Empty, None);
            }
            if s.bytes().all(|b| b.is_ascii_digit()) {
                if s.starts_with('0') {
                    return (BaseType::NumStr, None);
                }
                return (BaseType::Int, None);
            }
            if s.trim().parse::<f64>().is_ok() {
                return (BaseType::Float, None);
            }
            if let Some(matcher) = dates {
                if let Some(key) = matcher.match_str(s) {
                    return (BaseType::Date, Some(key));
                }
            }
            (BaseType::Str, None)
        }
    }
}

/// Final statistics for one column.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnStats {
    pub key: String,
    pub ftype: BaseType,
    pub total: usize,
    pub n_uniq: usize,
    pub share_uniq: f64,
    pub minlen: usize,
    pub maxlen: usize,
    pub avglen: f64,
    pub has_any_digit: bool,
    pub has_any_alpha: bool,
    pub has_any_special: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_val: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_val: Option<f64>,
    pub tags: Vec<Tag>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dict_values: Option<Vec<String>>,
    /// Date grammar key, when string values were typed via the date matcher.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_format: Option<String>,
}

impl ColumnStats {
    pub fn is_uniq(&self) -> bool {
        self.tags.contains(&Tag::Uniq)
    }

    pub fn is_dict(&self) -> bool {
        self.tags.contains(&Tag::Dict)
    }
}

/// Profiler output: per-column stats plus the retained value samples, both
/// in first-seen column order.
#[derive(Debug, Default)]
pub struct Profile {
    pub stats: IndexMap<String, ColumnStats>,
    pub samples: IndexMap<String, Vec<Value>>,
    pub records: usize,
}

#[derive(Debug, Default)]
struct ColumnAccum {
    uniq: IndexMap<String, usize>,
    total: usize,
    minlen: Option<usize>,
    maxlen: usize,
    totallen: usize,
    has_digit: bool,
    has_alpha: bool,
    has_special: bool,
    min_val: Option<f64>,
    max_val: Option<f64>,
    types: IndexMap<BaseType, usize>,
    date_format: Option<&'static str>,
    samples: Vec<Value>,
}

/// Streaming statistics accumulator.
#[derive(Debug)]
pub struct Profiler {
    sample_limit: usize,
    dict_share: f64,
    dates: Option<DateMatcher>,
    columns: IndexMap<String, ColumnAccum>,
    records: usize,
}

impl Profiler {
    pub fn new(sample_limit: usize, dict_share: f64) -> Self {
        Profiler {
            sample_limit,
            dict_share,
            dates: None,
            columns: IndexMap::new(),
            records: 0,
        }
    }

    /// Enable date-grammar typing of string values.
    pub fn with_dates(mut self, matcher: DateMatcher) -> Self {
        self.dates = Some(matcher);
        self
    }

    /// Fold one record into the running statistics.
    pub fn observe(&mut self, record: &Record) {
        self.records += 1;
        for (path, value) in flatten(record) {
            if is_noise_path(&path) {
                continue;
            }
            let accum = self.columns.entry(path).or_default();

            let text = value.to_text();
            let text_len = text.chars().count();
            *accum.uniq.entry(text.clone()).or_insert(0) += 1;
            accum.total += 1;
            accum.minlen = Some(accum.minlen.map_or(text_len, |m| m.min(text_len)));
            accum.maxlen = accum.maxlen.max(text_len);
            accum.totallen += text_len;

            if let Value::Str(s) = value {
                if !s.is_empty() {
                    accum.has_digit |= s.chars().any(|c| c.is_ascii_digit());
                    accum.has_alpha |= s.chars().any(|c| c.is_alphabetic());
                    accum.has_special |=
                        s.chars().any(|c| !c.is_alphanumeric() && !c.is_whitespace());
                }
            }

            let (base, pattern) = guess_type(value, self.dates.as_ref());
            if let Some(key) = pattern {
                accum.date_format.get_or_insert(key);
            }
            if matches!(base, BaseType::Int | BaseType::Float) {
                if let Some(n) = value.as_number() {
                    accum.min_val = Some(accum.min_val.map_or(n, |m| m.min(n)));
                    accum.max_val = Some(accum.max_val.map_or(n, |m| m.max(n)));
                }
            }
            *accum.types.entry(base).or_insert(0) += 1;

            if accum.samples.len() < self.sample_limit {
                accum.samples.push(value.clone());
            }
        }
    }

    /// Finalize into per-column stats and samples.
    pub fn finish(self) -> Profile {
        let dict_share = self.dict_share;
        let mut stats = IndexMap::with_capacity(self.columns.len());
        let mut samples = IndexMap::with_capacity(self.columns.len());

        for (key, accum) in self.columns {
            let total = accum.total.max(1);
            let n_uniq = accum.uniq.len();
            let share_uniq = n_uniq as f64 * 100.0 / total as f64;

            let ftype = resolve_ftype(&accum.types);

            let mut tags = Vec::new();
            if share_uniq >= 100.0 {
                tags.push(Tag::Uniq);
            }
            let mut dict_values = None;
            if share_uniq <= dict_share {
                let empty_total: usize = accum
                    .uniq
                    .iter()
                    .filter(|(v, _)| EMPTY_VALUES.contains(&v.as_str()))
                    .map(|(_, c)| *c)
                    .sum();
                if empty_total == accum.total {
                    tags.push(Tag::Empty);
                } else {
                    tags.push(Tag::Dict);
                    dict_values = Some(accum.uniq.keys().cloned().collect());
                }
            }

            stats.insert(
                key.clone(),
                ColumnStats {
                    key: key.clone(),
                    ftype,
                    total: accum.total,
                    n_uniq,
                    share_uniq,
                    minlen: accum.minlen.unwrap_or(0),
                    maxlen: accum.maxlen,
                    avglen: accum.totallen as f64 / total as f64,
                    has_any_digit: accum.has_digit,
                    has_any_alpha: accum.has_alpha,
                    has_any_special: accum.has_special,
                    min_val: accum.min_val,
                    max_val: accum.max_val,
                    tags,
                    dict_values,
                    date_format: accum.date_format.map(str::to_string),
                },
            );
            samples.insert(key, accum.samples);
        }

        Profile {
            stats,
            samples,
            records: self.records,
        }
    }
}

/// Dominant base type: drop `empty` from the histogram; a single surviving
/// type wins, anything else (mixed or all-empty) is `str`.
fn resolve_ftype(types: &IndexMap<BaseType, usize>) -> BaseType {
    let mut survivors = types.keys().filter(|t| **t != BaseType::Empty);
    match (survivors.next(), survivors.next()) {
        (Some(only), None) => *only,
        _ => BaseType::Str,
    }
}

/// Accidental array-index columns: first path segment is a single character
/// or starts with a digit.
fn is_noise_path(path: &str) -> bool {
    let first = path.split('.').next().unwrap_or(path);
    first.chars().count() == 1 || first.chars().next().is_some_and(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;

    fn record(entries: Vec<(&str, Value)>) -> Record {
        let mut rec = IndexMap::new();
        for (k, v) in entries {
            rec.insert(k.to_string(), v);
        }
        rec
    }

    fn s(v: &str) -> Value {
        Value::Str(v.to_string())
    }

    #[test]
    fn test_guess_type_table() {
        assert_eq!(guess_type(&Value::Null, None).0, BaseType::Empty);
        assert_eq!(guess_type(&Value::Bool(true), None).0, BaseType::Bool);
        assert_eq!(guess_type(&Value::Int(5), None).0, BaseType::Int);
        assert_eq!(guess_type(&Value::Float(1.5), None).0, BaseType::Float);
        assert_eq!(guess_type(&s(""), None).0, BaseType::Empty);
        assert_eq!(guess_type(&s("  "), None).0, BaseType::Empty);
        assert_eq!(guess_type(&s("042"), None).0, BaseType::NumStr);
        assert_eq!(guess_type(&s("42"), None).0, BaseType::Int);
        assert_eq!(guess_type(&s("4.2"), None).0, BaseType::Float);
        assert_eq!(guess_type(&s("hello"), None).0, BaseType::Str);
    }

    #[test]
    fn test_guess_type_date_with_matcher() {
        let matcher = DateMatcher::new();
        let (base, pattern) = guess_type(&s("2021-03-14"), Some(&matcher));
        assert_eq!(base, BaseType::Date);
        assert_eq!(pattern, Some("date_iso"));
        // Without a matcher the same string is plain text.
        assert_eq!(guess_type(&s("2021-03-14"), None).0, BaseType::Str);
    }

    #[test]
    fn test_single_type_column() {
        let mut profiler = Profiler::new(100, DEFAULT_DICT_SHARE);
        for v in ["a@b.com", "c@d.com", "e@f.com"] {
            profiler.observe(&record(vec![("email", s(v))]));
        }
        let profile = profiler.finish();
        let stats = &profile.stats["email"];
        assert_eq!(stats.ftype, BaseType::Str);
        assert_eq!(stats.total, 3);
        assert_eq!(stats.n_uniq, 3);
        assert!(stats.is_uniq());
        assert_eq!(stats.minlen, 7);
        assert_eq!(stats.maxlen, 7);
        assert!(stats.has_any_special);
    }

    #[test]
    fn test_mixed_types_resolve_to_str() {
        let mut profiler = Profiler::new(100, DEFAULT_DICT_SHARE);
        profiler.observe(&record(vec![("v", Value::Int(1))]));
        profiler.observe(&record(vec![("v", s("x"))]));
        let profile = profiler.finish();
        assert_eq!(profile.stats["v"].ftype, BaseType::Str);
    }

    #[test]
    fn test_ftype_ignores_empty_values() {
        let mut profiler = Profiler::new(100, DEFAULT_DICT_SHARE);
        profiler.observe(&record(vec![("flag", Value::Bool(true))]));
        profiler.observe(&record(vec![("flag", Value::Null)]));
        profiler.observe(&record(vec![("flag", Value::Bool(false))]));
        let profile = profiler.finish();
        assert_eq!(profile.stats["flag"].ftype, BaseType::Bool);
    }

    #[test]
    fn test_ftype_monotone_under_empty_records() {
        // Adding a record whose values are all empty must not change ftype.
        let mut a = Profiler::new(100, DEFAULT_DICT_SHARE);
        let mut b = Profiler::new(100, DEFAULT_DICT_SHARE);
        for profiler in [&mut a, &mut b] {
            profiler.observe(&record(vec![("n", Value::Int(1))]));
            profiler.observe(&record(vec![("n", Value::Int(2))]));
        }
        b.observe(&record(vec![("n", Value::Null)]));
        assert_eq!(a.finish().stats["n"].ftype, b.finish().stats["n"].ftype);
    }

    #[test]
    fn test_dict_detection() {
        let mut profiler = Profiler::new(200, 10.0);
        for i in 0..99 {
            let v = ["A", "B", "C"][i % 3];
            profiler.observe(&record(vec![("status", s(v))]));
        }
        let profile = profiler.finish();
        let stats = &profile.stats["status"];
        assert!(stats.is_dict());
        let mut values = stats.dict_values.clone().unwrap();
        values.sort();
        assert_eq!(values, vec!["A", "B", "C"]);
    }

    #[test]
    fn test_all_empty_dict_column_tagged_empty() {
        let mut profiler = Profiler::new(100, 50.0);
        for _ in 0..10 {
            profiler.observe(&record(vec![("blank", s("N/A"))]));
        }
        let profile = profiler.finish();
        let stats = &profile.stats["blank"];
        assert!(stats.tags.contains(&Tag::Empty));
        assert!(!stats.is_dict());
        assert!(stats.dict_values.is_none());
    }

    #[test]
    fn test_share_uniq_formula() {
        let mut profiler = Profiler::new(100, DEFAULT_DICT_SHARE);
        for v in ["x", "x", "y", "z"] {
            profiler.observe(&record(vec![("c", s(v))]));
        }
        let stats = profiler.finish().stats;
        assert_eq!(stats["c"].n_uniq, 3);
        assert!((stats["c"].share_uniq - 75.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_numeric_min_max() {
        let mut profiler = Profiler::new(100, DEFAULT_DICT_SHARE);
        for v in [3, -1, 7] {
            profiler.observe(&record(vec![("n", Value::Int(v))]));
        }
        let stats = profiler.finish().stats;
        assert_eq!(stats["n"].min_val, Some(-1.0));
        assert_eq!(stats["n"].max_val, Some(7.0));
    }

    #[test]
    fn test_noise_paths_dropped() {
        let mut profiler = Profiler::new(100, DEFAULT_DICT_SHARE);
        profiler.observe(&record(vec![
            ("x", Value::Int(1)),
            ("0index", Value::Int(2)),
            ("name", s("ok")),
        ]));
        let profile = profiler.finish();
        assert!(!profile.stats.contains_key("x"));
        assert!(!profile.stats.contains_key("0index"));
        assert!(profile.stats.contains_key("name"));
    }

    #[test]
    fn test_samples_capped_and_ordered() {
        let mut profiler = Profiler::new(3, DEFAULT_DICT_SHARE);
        for i in 0..10 {
            profiler.observe(&record(vec![("n", Value::Int(i))]));
        }
        let profile = profiler.finish();
        assert_eq!(
            profile.samples["n"],
            vec![Value::Int(0), Value::Int(1), Value::Int(2)]
        );
        // Stats still cover every record.
        assert_eq!(profile.stats["n"].total, 10);
    }

    #[test]
    fn test_column_order_is_first_seen() {
        let mut profiler = Profiler::new(100, DEFAULT_DICT_SHARE);
        profiler.observe(&record(vec![("bb", Value::Int(1)), ("aa", Value::Int(2))]));
        profiler.observe(&record(vec![("cc", Value::Int(3)), ("bb", Value::Int(4))]));
        let profile = profiler.finish();
        let keys: Vec<&String> = profile.stats.keys().collect();
        assert_eq!(keys, vec!["bb", "aa", "cc"]);
    }
}
