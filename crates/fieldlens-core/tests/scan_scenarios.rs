//! End-to-end scan scenarios: rule files loaded from disk, records streamed
//! through the engine, reports checked field by field.

use fieldlens_core::cancel::CancelToken;
use fieldlens_core::engine::{ScanMode, ScanOptions, Scanner};
use fieldlens_core::profile::{BaseType, Tag};
use fieldlens_core::report::MatchKind;
use fieldlens_core::rules::loader::RuleLoader;
use fieldlens_core::rules::registry::FnRegistry;
use fieldlens_core::rules::RuleSet;
use fieldlens_core::value::Value;

use fieldlens_testutil::{column_records, record, s, RuleFixture, COMMON_RULES_YAML};

fn load_rules(fixture: &RuleFixture) -> RuleSet {
    let mut loader = RuleLoader::new(FnRegistry::with_builtins());
    loader.load_path(fixture.path()).unwrap();
    loader.finish().0
}

#[test]
fn scenario_single_email_column_csv() {
    let dir = tempfile::tempdir().unwrap();
    let csv_path = dir.path().join("emails.csv");
    std::fs::write(
        &csv_path,
        "email\na@b.com\nb@b.com\nc@b.com\nd@b.com\ne@b.com\n",
    )
    .unwrap();
    let records = fieldlens_core::read::read_records(&csv_path, 1000).unwrap();

    let fixture = RuleFixture::new();
    fixture.add_file("common.yaml", COMMON_RULES_YAML);
    let rules = load_rules(&fixture);

    let scanner = Scanner::new(&rules, ScanOptions::default());
    let report = scanner.scan("emails.csv", records, &CancelToken::new());

    assert_eq!(report.fields.len(), 1);
    let column = &report.fields[0];
    assert_eq!(column.field, "email");
    // The field-name rule and the data rule both fire; field matches come
    // first, then the data match at full confidence.
    let data_match = column
        .matches
        .iter()
        .find(|m| m.rule_type == MatchKind::Data)
        .expect("data match");
    assert_eq!(data_match.dataclass, "email");
    assert!((data_match.confidence - 100.0).abs() < f64::EPSILON);
    assert_eq!(report.stats["email"].ftype, BaseType::Str);
}

#[test]
fn scenario_boolean_short_circuit() {
    let fixture = RuleFixture::new();
    fixture.add_file("common.yaml", COMMON_RULES_YAML);
    let rules = load_rules(&fixture);

    let records = vec![
        record(vec![("flag", Value::Bool(true))]),
        record(vec![("flag", Value::Bool(false))]),
        record(vec![("flag", Value::Bool(true))]),
    ];
    let scanner = Scanner::new(&rules, ScanOptions::default());
    let report = scanner.scan("t", records, &CancelToken::new());

    let column = &report.fields[0];
    assert_eq!(column.matches.len(), 1);
    assert_eq!(column.matches[0].dataclass, "boolean");
    assert_eq!(column.matches[0].rule_type, MatchKind::FieldType);
    assert!((column.matches[0].confidence - 100.0).abs() < f64::EPSILON);
    assert_eq!(report.stats["flag"].ftype, BaseType::Bool);
}

#[test]
fn scenario_dictionary_detection() {
    let rules = RuleSet::default();
    let values: Vec<&str> = (0..100).map(|i| ["A", "B", "C"][i % 3]).collect();
    let records = column_records("status", &values);

    let mut options = ScanOptions::default();
    options.dict_share = 10.0;
    let scanner = Scanner::new(&rules, options);
    let report = scanner.scan("t", records, &CancelToken::new());

    let stats = &report.stats["status"];
    assert!(stats.tags.contains(&Tag::Dict));
    let mut dict = stats.dict_values.clone().unwrap();
    dict.sort();
    assert_eq!(dict, vec!["A", "B", "C"]);
}

#[test]
fn scenario_field_gate_and_length_filter() {
    let fixture = RuleFixture::new();
    fixture.add_file(
        "ssn.yaml",
        r#"
name: ssn rules
context: common
lang: en
rules:
  ssn:
    key: ssn
    type: data
    match: regex
    rule: '\d{9}'
    minlen: 9
    maxlen: 9
    fieldrule: "ssn,ssnum"
    fieldrulematch: text
"#,
    );
    let rules = load_rules(&fixture);

    let records: Vec<_> = (0..6)
        .map(|_| record(vec![("ssn", s("123456789")), ("other", s("123456789"))]))
        .collect();
    let scanner = Scanner::new(&rules, ScanOptions::default());
    let report = scanner.scan("t", records, &CancelToken::new());

    let by_field = |name: &str| {
        report
            .fields
            .iter()
            .find(|f| f.field == name)
            .expect("column present")
    };
    assert_eq!(by_field("ssn").matches.len(), 1);
    assert_eq!(by_field("ssn").matches[0].dataclass, "ssn");
    assert!(by_field("other").matches.is_empty());
}

#[test]
fn scenario_rule_context_filter() {
    let fixture = RuleFixture::new();
    fixture.add_file(
        "common.yaml",
        r#"
name: common foo
context: common
lang: en
rules:
  foo_common:
    key: foo_common
    type: data
    match: regex
    rule: 'foo'
"#,
    );
    fixture.add_file(
        "finance.yaml",
        r#"
name: finance foo
context: finance
lang: en
rules:
  foo_finance:
    key: foo_finance
    type: data
    match: regex
    rule: 'foo'
"#,
    );
    let rules = load_rules(&fixture);

    let records = column_records("c", &["foo", "foo", "foo"]);
    let mut options = ScanOptions::default();
    options.contexts = vec!["finance".to_string()];
    let scanner = Scanner::new(&rules, options);
    let report = scanner.scan("t", records, &CancelToken::new());

    let matches = &report.fields[0].matches;
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].dataclass, "foo_finance");
}

#[test]
fn first_wins_is_observable_end_to_end() {
    let both = RuleFixture::new();
    both.add_file(
        "a_first.yaml",
        r#"
name: first
context: common
lang: en
rules:
  code_rule:
    key: from_first
    type: data
    match: regex
    rule: '\d+'
"#,
    );
    both.add_file(
        "b_second.yaml",
        r#"
name: second
context: common
lang: en
rules:
  code_rule:
    key: from_second
    type: data
    match: regex
    rule: '\d+'
"#,
    );
    let only_first = RuleFixture::new();
    only_first.add_file(
        "a_first.yaml",
        &std::fs::read_to_string(both.path().join("a_first.yaml")).unwrap(),
    );

    let records = || column_records("code", &["123", "456", "789"]);
    let scan = |rules: &RuleSet| {
        Scanner::new(rules, ScanOptions::default())
            .scan("t", records(), &CancelToken::new())
            .to_json()
            .unwrap()
    };
    assert_eq!(scan(&load_rules(&both)), scan(&load_rules(&only_first)));
}

#[test]
fn scan_twice_is_byte_identical() {
    let fixture = RuleFixture::new();
    fixture.add_file("common.yaml", COMMON_RULES_YAML);
    let rules = load_rules(&fixture);

    let records = || {
        vec![
            record(vec![
                ("email", s("a@b.com")),
                ("site", s("https://example.com/x")),
                ("flag", Value::Bool(true)),
                ("note", s("free text here")),
            ]),
            record(vec![
                ("email", s("c@d.com")),
                ("site", s("https://example.org/y")),
                ("flag", Value::Bool(false)),
                ("note", Value::Null),
            ]),
        ]
    };
    let scanner = Scanner::new(&rules, ScanOptions::default());
    let a = scanner.scan("t", records(), &CancelToken::new());
    let b = scanner.scan("t", records(), &CancelToken::new());
    assert_eq!(a.to_json().unwrap(), b.to_json().unwrap());
}

#[test]
fn confidences_stay_in_range() {
    let fixture = RuleFixture::new();
    fixture.add_file("common.yaml", COMMON_RULES_YAML);
    let rules = load_rules(&fixture);

    let records = vec![
        record(vec![("email", s("a@b.com")), ("num", s("14.03.2021"))]),
        record(vec![("email", s("nope")), ("num", s("not a date"))]),
        record(vec![("email", Value::Null), ("num", s("15.03.2021"))]),
    ];
    let scanner = Scanner::new(&rules, ScanOptions::default());
    let report = scanner.scan("t", records, &CancelToken::new());
    for field in &report.fields {
        for m in &field.matches {
            assert!(
                (0.0..=100.0).contains(&m.confidence),
                "confidence {} out of range for {}",
                m.confidence,
                field.field
            );
        }
    }
}

// --- LLM hybrid scenario ---

mod llm {
    use super::*;
    use async_trait::async_trait;
    use fieldlens_core::error::Result;
    use fieldlens_core::llm::classifier::{LlmClassifier, LlmClassifierConfig};
    use fieldlens_core::llm::embed::Embedder;
    use fieldlens_core::llm::provider::ChatProvider;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Deterministic embedder: email-flavored texts land on one axis,
    /// everything else on the other.
    struct KeywordEmbedder;

    #[async_trait]
    impl Embedder for KeywordEmbedder {
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts
                .iter()
                .map(|t| {
                    if t.to_lowercase().contains("email") {
                        vec![1.0, 0.0]
                    } else {
                        vec![0.0, 1.0]
                    }
                })
                .collect())
        }
    }

    /// Scripted provider: always answers with the same classification and
    /// counts how often it was asked.
    #[derive(Debug)]
    struct ScriptedProvider {
        response: String,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl ChatProvider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn complete(&self, _prompt: &str, _t: f32, _m: u32) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.response.clone())
        }
    }

    fn registry_file(dir: &std::path::Path) -> PathBuf {
        let path = dir.join("datatypes.jsonl");
        std::fs::write(
            &path,
            concat!(
                "{\"id\": \"email\", \"name\": \"Email\", \"doc\": \"Email address\", \"langs\": [\"en\"]}\n",
                "{\"id\": \"phone\", \"name\": \"Phone\", \"doc\": \"Phone number\", \"langs\": [\"en\"]}\n",
            ),
        )
        .unwrap();
        path
    }

    async fn scripted_classifier(
        dir: &std::path::Path,
        response: &str,
        calls: Arc<AtomicUsize>,
    ) -> LlmClassifier {
        let config = LlmClassifierConfig::new(registry_file(dir));
        LlmClassifier::build(
            config,
            Box::new(KeywordEmbedder),
            Box::new(ScriptedProvider {
                response: response.to_string(),
                calls,
            }),
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn scenario_hybrid_fallback_classifies_unmatched_column() {
        let dir = tempfile::tempdir().unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let classifier = scripted_classifier(
            dir.path(),
            r#"{"datatype_id": "email", "confidence": 0.8, "reason": "mock"}"#,
            calls.clone(),
        )
        .await;
        assert_eq!(classifier.index_size(), 2);

        let fixture = RuleFixture::new();
        fixture.add_file("common.yaml", COMMON_RULES_YAML);
        let rules = load_rules(&fixture);

        let records = column_records("odd_field", &["zq1x", "zq2x", "zq3x"]);
        let mut options = ScanOptions::default();
        options.mode = ScanMode::Hybrid;
        let scanner = Scanner::new(&rules, options);
        let report = scanner
            .scan_with_classifier("t", records, &classifier, &CancelToken::new())
            .await;

        let column = &report.fields[0];
        let llm_match = column
            .matches
            .iter()
            .find(|m| m.rule_type == MatchKind::Llm)
            .expect("llm match");
        assert_eq!(llm_match.dataclass, "email");
        assert!((llm_match.confidence - 80.0).abs() < f64::EPSILON);
        assert_eq!(
            column.datatype_url.as_deref(),
            Some("https://meta.apicrafter.io/class/email")
        );
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn hybrid_skips_columns_rules_already_classified() {
        let dir = tempfile::tempdir().unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let classifier = scripted_classifier(
            dir.path(),
            r#"{"datatype_id": "phone", "confidence": 0.9, "reason": "mock"}"#,
            calls.clone(),
        )
        .await;

        let fixture = RuleFixture::new();
        fixture.add_file("common.yaml", COMMON_RULES_YAML);
        let rules = load_rules(&fixture);

        // email matches a data rule at 100, flag short-circuits as boolean;
        // neither reaches the LLM.
        let records = vec![
            record(vec![("email", s("a@b.com")), ("flag", Value::Bool(true))]),
            record(vec![("email", s("c@d.com")), ("flag", Value::Bool(false))]),
        ];
        let mut options = ScanOptions::default();
        options.mode = ScanMode::Hybrid;
        let scanner = Scanner::new(&rules, options);
        let report = scanner
            .scan_with_classifier("t", records, &classifier, &CancelToken::new())
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(report
            .fields
            .iter()
            .all(|f| f.matches.iter().all(|m| m.rule_type != MatchKind::Llm)));
    }

    #[tokio::test]
    async fn llm_mode_skips_rule_engine_entirely() {
        let dir = tempfile::tempdir().unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let classifier = scripted_classifier(
            dir.path(),
            r#"{"datatype_id": "email", "confidence": 0.7, "reason": "mock"}"#,
            calls.clone(),
        )
        .await;

        let fixture = RuleFixture::new();
        fixture.add_file("common.yaml", COMMON_RULES_YAML);
        let rules = load_rules(&fixture);

        let records = column_records("email", &["a@b.com", "c@d.com"]);
        let mut options = ScanOptions::default();
        options.mode = ScanMode::Llm;
        let scanner = Scanner::new(&rules, options);
        let report = scanner
            .scan_with_classifier("t", records, &classifier, &CancelToken::new())
            .await;

        let column = &report.fields[0];
        assert_eq!(column.matches.len(), 1);
        assert_eq!(column.matches[0].rule_type, MatchKind::Llm);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
