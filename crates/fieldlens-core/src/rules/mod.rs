//! # Classification Rules
//!
//! Compiled, immutable rules and the rule set they live in. A rule either
//! matches column names (`field`) or column values (`data`); the set keeps
//! both sequences in load order together with inverted counters over the
//! context / language / country tags used for filtering.

pub mod loader;
pub mod pattern;
pub mod registry;

use std::collections::{BTreeMap, HashSet};

use regex::Regex;

use crate::rules::registry::Predicate;

/// What a rule is applied to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuleKind {
    Field,
    Data,
}

/// A registry predicate together with the name it resolved from.
#[derive(Clone)]
pub struct NamedPredicate {
    pub name: String,
    pub func: Predicate,
}

impl NamedPredicate {
    pub fn call(&self, value: &str) -> bool {
        (self.func)(value)
    }
}

impl std::fmt::Debug for NamedPredicate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("NamedPredicate").field(&self.name).finish()
    }
}

/// How a rule recognizes its input.
#[derive(Clone)]
pub enum Matcher {
    /// Compiled declarative pattern tree, anchored.
    Pattern(Regex),
    /// Anchored regex straight from the rule file.
    Regex(Regex),
    /// Lowercased literal keywords, matched exactly (case-insensitive).
    Keywords(HashSet<String>),
    /// Named predicate resolved from the registry at load time.
    Func(NamedPredicate),
}

impl Matcher {
    /// Stable tag used by diagnostics and the rules stats dump.
    pub fn kind(&self) -> &'static str {
        match self {
            Matcher::Pattern(_) => "ppr",
            Matcher::Regex(_) => "regex",
            Matcher::Keywords(_) => "text",
            Matcher::Func(_) => "func",
        }
    }

    /// Apply the matcher to one string.
    pub fn matches(&self, value: &str) -> bool {
        match self {
            Matcher::Pattern(re) | Matcher::Regex(re) => re.is_match(value),
            Matcher::Keywords(keywords) => keywords.contains(&value.to_lowercase()),
            Matcher::Func(predicate) => predicate.call(value),
        }
    }
}

impl std::fmt::Debug for Matcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Matcher::Pattern(re) => f.debug_tuple("Pattern").field(&re.as_str()).finish(),
            Matcher::Regex(re) => f.debug_tuple("Regex").field(&re.as_str()).finish(),
            Matcher::Keywords(k) => f.debug_tuple("Keywords").field(&k.len()).finish(),
            Matcher::Func(predicate) => f.debug_tuple("Func").field(&predicate.name).finish(),
        }
    }
}

/// Name-check attached to a data rule: the rule is only considered for a
/// column whose short name passes the gate.
#[derive(Debug, Clone)]
pub enum FieldGate {
    Pattern(Regex),
    Keywords(HashSet<String>),
}

impl FieldGate {
    pub fn matches(&self, short_name: &str) -> bool {
        match self {
            FieldGate::Pattern(re) => re.is_match(short_name),
            FieldGate::Keywords(keywords) => keywords.contains(&short_name.to_lowercase()),
        }
    }
}

/// A compiled classification rule.
#[derive(Debug, Clone)]
pub struct Rule {
    pub id: String,
    /// Semantic label emitted on match.
    pub dataclass: String,
    /// Parallel label marking matched values as PII.
    pub pii: Option<String>,
    pub kind: RuleKind,
    pub matcher: Matcher,
    /// Second predicate required to pass after the matcher succeeds.
    pub validator: Option<NamedPredicate>,
    pub field_gate: Option<FieldGate>,
    pub min_len: usize,
    pub max_len: usize,
    /// Context tags (a `piikey` implies `pii` is present).
    pub context: Vec<String>,
    pub lang: String,
    pub country: Vec<String>,
    /// Noisy-rule hint; filtered out when the caller ignores imprecise rules.
    pub imprecise: bool,
    /// Present in rule files, preserved, never used for ordering.
    pub priority: Option<i64>,
    pub group: String,
    pub group_desc: String,
}

impl Rule {
    /// Closed-interval overlap of the rule's length window with a column's
    /// observed length range.
    pub fn length_overlaps(&self, col_min: usize, col_max: usize) -> bool {
        col_min <= self.max_len && self.min_len <= col_max
    }

    pub fn in_context(&self, contexts: &[String]) -> bool {
        contexts.is_empty() || self.context.iter().any(|c| contexts.contains(c))
    }

    pub fn in_lang(&self, langs: &[String]) -> bool {
        langs.is_empty() || langs.contains(&self.lang)
    }
}

/// All compiled rules, split by kind, plus tag counters.
#[derive(Debug, Default)]
pub struct RuleSet {
    pub field_rules: Vec<Rule>,
    pub data_rules: Vec<Rule>,
    pub contexts: BTreeMap<String, usize>,
    pub langs: BTreeMap<String, usize>,
    pub countries: BTreeMap<String, usize>,
}

impl RuleSet {
    pub fn is_empty(&self) -> bool {
        self.field_rules.is_empty() && self.data_rules.is_empty()
    }

    pub fn len(&self) -> usize {
        self.field_rules.len() + self.data_rules.len()
    }

    fn rules_of(&self, kind: RuleKind) -> &[Rule] {
        match kind {
            RuleKind::Field => &self.field_rules,
            RuleKind::Data => &self.data_rules,
        }
    }

    /// Static filter: context intersection, language membership and the
    /// imprecise flag. Empty request dimensions pass everything. Rules
    /// rejected here are never evaluated against names or values.
    pub fn filtered(
        &self,
        kind: RuleKind,
        contexts: &[String],
        langs: &[String],
        ignore_imprecise: bool,
    ) -> Vec<&Rule> {
        self.rules_of(kind)
            .iter()
            .filter(|rule| {
                rule.in_context(contexts)
                    && rule.in_lang(langs)
                    && !(ignore_imprecise && rule.imprecise)
            })
            .collect()
    }

    pub(crate) fn track_tags(&mut self, rule: &Rule) {
        for context in &rule.context {
            *self.contexts.entry(context.clone()).or_insert(0) += 1;
        }
        *self.langs.entry(rule.lang.clone()).or_insert(0) += 1;
        for country in &rule.country {
            *self.countries.entry(country.clone()).or_insert(0) += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keyword_rule(id: &str, kind: RuleKind, context: &[&str], lang: &str) -> Rule {
        Rule {
            id: id.to_string(),
            dataclass: id.to_string(),
            pii: None,
            kind,
            matcher: Matcher::Keywords(HashSet::from(["email".to_string()])),
            validator: None,
            field_gate: None,
            min_len: 3,
            max_len: 100,
            context: context.iter().map(|s| s.to_string()).collect(),
            lang: lang.to_string(),
            country: vec![],
            imprecise: false,
            priority: None,
            group: "g".to_string(),
            group_desc: String::new(),
        }
    }

    #[test]
    fn test_keyword_matcher_case_insensitive() {
        let m = Matcher::Keywords(HashSet::from(["email".to_string(), "mail".to_string()]));
        assert!(m.matches("Email"));
        assert!(m.matches("MAIL"));
        assert!(!m.matches("emails"));
    }

    #[test]
    fn test_length_overlap() {
        let mut rule = keyword_rule("r", RuleKind::Data, &["common"], "en");
        rule.min_len = 9;
        rule.max_len = 9;
        assert!(rule.length_overlaps(9, 9));
        assert!(rule.length_overlaps(5, 12));
        assert!(!rule.length_overlaps(10, 12));
        assert!(!rule.length_overlaps(1, 8));
    }

    #[test]
    fn test_filter_by_context() {
        let mut set = RuleSet::default();
        set.data_rules
            .push(keyword_rule("a", RuleKind::Data, &["common"], "en"));
        set.data_rules
            .push(keyword_rule("b", RuleKind::Data, &["finance"], "en"));

        let finance = set.filtered(RuleKind::Data, &["finance".to_string()], &[], false);
        assert_eq!(finance.len(), 1);
        assert_eq!(finance[0].id, "b");

        let all = set.filtered(RuleKind::Data, &[], &[], false);
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn test_filter_by_lang_and_imprecise() {
        let mut set = RuleSet::default();
        set.field_rules
            .push(keyword_rule("en_rule", RuleKind::Field, &["common"], "en"));
        let mut noisy = keyword_rule("ru_rule", RuleKind::Field, &["common"], "ru");
        noisy.imprecise = true;
        set.field_rules.push(noisy);

        let ru = set.filtered(RuleKind::Field, &[], &["ru".to_string()], false);
        assert_eq!(ru.len(), 1);
        assert_eq!(ru[0].id, "ru_rule");

        let ru_precise = set.filtered(RuleKind::Field, &[], &["ru".to_string()], true);
        assert!(ru_precise.is_empty());
    }

    #[test]
    fn test_filter_preserves_order() {
        let mut set = RuleSet::default();
        for id in ["first", "second", "third"] {
            set.data_rules
                .push(keyword_rule(id, RuleKind::Data, &["common"], "en"));
        }
        let ids: Vec<&str> = set
            .filtered(RuleKind::Data, &[], &[], false)
            .iter()
            .map(|r| r.id.as_str())
            .collect();
        assert_eq!(ids, vec!["first", "second", "third"]);
    }
}
