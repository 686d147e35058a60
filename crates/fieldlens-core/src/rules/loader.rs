//! # Rule File Loading
//!
//! Parses YAML rule files (one file = one rule group) and compiles each
//! entry into a [`Rule`]. Duplicate rule ids are skipped, first wins. A rule
//! that fails to compile aborts its whole file — none of the file's rules are
//! committed — but other files keep loading; the scan only aborts when every
//! attempted file failed.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{FieldLensError, Result};
use crate::report::Diagnostic;
use crate::rules::pattern::PatternExpr;
use crate::rules::registry::FnRegistry;
use crate::rules::{FieldGate, Matcher, NamedPredicate, Rule, RuleKind, RuleSet};

pub const DEFAULT_MIN_LEN: usize = 3;
pub const DEFAULT_MAX_LEN: usize = 100;

/// Top-level structure of a rule file.
#[derive(Debug, Deserialize)]
struct RuleFileDoc {
    name: String,
    #[serde(default)]
    description: String,
    context: String,
    lang: String,
    #[serde(default)]
    country_code: Option<OneOrMany>,
    rules: IndexMap<String, RuleDef>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    fn into_vec(self) -> Vec<String> {
        match self {
            OneOrMany::One(s) => vec![s],
            OneOrMany::Many(v) => v,
        }
    }
}

/// One rule definition as written in YAML.
#[derive(Debug, Deserialize)]
struct RuleDef {
    #[serde(default)]
    key: Option<String>,
    #[serde(default)]
    piikey: Option<String>,
    #[serde(rename = "type")]
    kind: String,
    #[serde(rename = "match")]
    match_kind: String,
    rule: serde_yaml::Value,
    #[serde(default)]
    minlen: Option<usize>,
    #[serde(default)]
    maxlen: Option<usize>,
    #[serde(default)]
    priority: Option<i64>,
    #[serde(default)]
    validator: Option<String>,
    #[serde(default)]
    fieldrule: Option<serde_yaml::Value>,
    #[serde(default)]
    fieldrulematch: Option<String>,
    #[serde(default)]
    imprecise: Option<i64>,
}

/// Builds a [`RuleSet`] from files and directories.
#[derive(Debug)]
pub struct RuleLoader {
    registry: FnRegistry,
    preset_langs: Vec<String>,
    preset_contexts: Vec<String>,
    preset_countries: Vec<String>,
    seen_ids: HashSet<String>,
    set: RuleSet,
    diagnostics: Vec<Diagnostic>,
}

impl RuleLoader {
    pub fn new(registry: FnRegistry) -> Self {
        RuleLoader {
            registry,
            preset_langs: Vec::new(),
            preset_contexts: Vec::new(),
            preset_countries: Vec::new(),
            seen_ids: HashSet::new(),
            set: RuleSet::default(),
            diagnostics: Vec::new(),
        }
    }

    /// Only load files whose `lang` is in this set (empty = all).
    pub fn with_langs(mut self, langs: Vec<String>) -> Self {
        self.preset_langs = langs;
        self
    }

    /// Only load files whose `context` is in this set (empty = all).
    pub fn with_contexts(mut self, contexts: Vec<String>) -> Self {
        self.preset_contexts = contexts;
        self
    }

    /// Only load files whose `country_code` intersects this set (empty = all;
    /// files without country codes always load).
    pub fn with_countries(mut self, countries: Vec<String>) -> Self {
        self.preset_countries = countries;
        self
    }

    /// Load a rule file, or every `*.yaml` / `*.yml` under a directory
    /// (recursive, sorted for deterministic rule order).
    pub fn load_path<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(FieldLensError::Config {
                message: format!("rule path does not exist: {}", path.display()),
            });
        }

        let files = if path.is_file() {
            vec![path.to_path_buf()]
        } else {
            let mut collected = Vec::new();
            collect_yaml_files(path, &mut collected)?;
            collected.sort();
            collected
        };

        let mut loaded = 0usize;
        let mut failed = 0usize;
        for file in &files {
            match self.load_file(file) {
                Ok(()) => loaded += 1,
                Err(err) => {
                    failed += 1;
                    warn!("skipping rule file {}: {}", file.display(), err);
                    self.diagnostics
                        .push(Diagnostic::new("rules", err.to_string()));
                }
            }
        }

        if failed > 0 && loaded == 0 {
            return Err(FieldLensError::NoRulesLoaded {
                path: path.display().to_string(),
                message: format!("{} file(s) failed to load", failed),
            });
        }
        Ok(())
    }

    /// Load one rule file. Files whose group `lang`, `context` or
    /// `country_code` fall outside the presets are silently skipped.
    pub fn load_file<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| FieldLensError::RuleFile {
            file: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let mut doc: RuleFileDoc =
            serde_yaml::from_str(&text).map_err(|e| FieldLensError::RuleFile {
                file: path.to_path_buf(),
                message: e.to_string(),
            })?;

        if !self.preset_langs.is_empty() && !self.preset_langs.contains(&doc.lang) {
            return Ok(());
        }
        if !self.preset_contexts.is_empty() && !self.preset_contexts.contains(&doc.context) {
            return Ok(());
        }
        let countries = doc
            .country_code
            .take()
            .map(OneOrMany::into_vec)
            .unwrap_or_default();
        if !self.preset_countries.is_empty()
            && !countries.is_empty()
            && !countries.iter().any(|c| self.preset_countries.contains(c))
        {
            return Ok(());
        }

        // Compile the whole file before committing anything, so a bad rule
        // cannot leave half a file in the set.
        let mut compiled = Vec::new();
        let mut file_ids = HashSet::new();
        for (rule_id, def) in &doc.rules {
            if self.seen_ids.contains(rule_id) || file_ids.contains(rule_id) {
                debug!("rule id '{}' already loaded, first wins", rule_id);
                continue;
            }
            let rule = compile_rule(path, rule_id, def, &doc, &countries, &self.registry)?;
            file_ids.insert(rule_id.clone());
            compiled.push(rule);
        }

        for rule in compiled {
            self.seen_ids.insert(rule.id.clone());
            self.set.track_tags(&rule);
            match rule.kind {
                RuleKind::Field => self.set.field_rules.push(rule),
                RuleKind::Data => self.set.data_rules.push(rule),
            }
        }
        debug!("loaded rules from {}", path.display());
        Ok(())
    }

    pub fn finish(self) -> (RuleSet, Vec<Diagnostic>) {
        (self.set, self.diagnostics)
    }
}

fn collect_yaml_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    let entries = std::fs::read_dir(dir).map_err(|e| FieldLensError::Config {
        message: format!("cannot read rule directory {}: {}", dir.display(), e),
    })?;
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_yaml_files(&path, out)?;
        } else if matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("yaml") | Some("yml")
        ) {
            out.push(path);
        }
    }
    Ok(())
}

fn compile_rule(
    file: &Path,
    rule_id: &str,
    def: &RuleDef,
    doc: &RuleFileDoc,
    countries: &[String],
    registry: &FnRegistry,
) -> Result<Rule> {
    let fail = |message: String| FieldLensError::RuleCompile {
        file: file.to_path_buf(),
        rule_id: rule_id.to_string(),
        message,
    };

    let dataclass = def
        .key
        .as_deref()
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .ok_or_else(|| fail("missing dataclass key".to_string()))?
        .to_string();

    let kind = match def.kind.as_str() {
        "field" => RuleKind::Field,
        "data" => RuleKind::Data,
        other => return Err(fail(format!("unknown rule type '{}'", other))),
    };

    let (matcher, keyword_lens) = match def.match_kind.as_str() {
        "ppr" => {
            let expr: PatternExpr = serde_yaml::from_value(def.rule.clone())
                .map_err(|e| fail(format!("unparseable pattern expression: {}", e)))?;
            let regex = expr.compile().map_err(|e| fail(e.to_string()))?;
            (Matcher::Pattern(regex), None)
        }
        "regex" => {
            let source = rule_string(&def.rule).ok_or_else(|| {
                fail("regex rule must be a string".to_string())
            })?;
            let anchored = anchor_regex(&source);
            let regex = regex::Regex::new(&anchored)
                .map_err(|e| fail(format!("invalid regex: {}", e)))?;
            (Matcher::Regex(regex), None)
        }
        "text" => {
            let source = rule_string(&def.rule)
                .ok_or_else(|| fail("keyword rule must be a CSV string".to_string()))?;
            let keywords: HashSet<String> = source
                .split(',')
                .map(|k| k.trim().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect();
            if keywords.is_empty() {
                return Err(fail("keyword rule lists no keywords".to_string()));
            }
            let min = keywords.iter().map(|k| k.chars().count()).min().unwrap();
            let max = keywords.iter().map(|k| k.chars().count()).max().unwrap();
            (Matcher::Keywords(keywords), Some((min, max)))
        }
        "func" => {
            let name = rule_string(&def.rule)
                .ok_or_else(|| fail("func rule must be a function name".to_string()))?;
            let func = registry
                .resolve(&name)
                .ok_or_else(|| fail(format!("unknown function '{}'", name)))?;
            (Matcher::Func(NamedPredicate { name, func }), None)
        }
        other => return Err(fail(format!("unknown match kind '{}'", other))),
    };

    let validator = match &def.validator {
        Some(name) => {
            let func = registry
                .resolve(name)
                .ok_or_else(|| fail(format!("unknown validator '{}'", name)))?;
            Some(NamedPredicate {
                name: name.clone(),
                func,
            })
        }
        None => None,
    };

    let field_gate = match (&def.fieldrule, def.fieldrulematch.as_deref()) {
        (None, _) => None,
        (Some(_), None) => {
            return Err(fail(
                "fieldrule requires fieldrulematch (ppr or text)".to_string(),
            ))
        }
        (Some(value), Some("ppr")) => {
            let expr: PatternExpr = serde_yaml::from_value(value.clone())
                .map_err(|e| fail(format!("unparseable fieldrule pattern: {}", e)))?;
            Some(FieldGate::Pattern(
                expr.compile().map_err(|e| fail(e.to_string()))?,
            ))
        }
        (Some(value), Some("text")) => {
            let source = rule_string(value)
                .ok_or_else(|| fail("fieldrule keywords must be a CSV string".to_string()))?;
            let keywords: HashSet<String> = source
                .split(',')
                .map(|k| k.trim().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect();
            Some(FieldGate::Keywords(keywords))
        }
        (Some(_), Some(other)) => {
            return Err(fail(format!("unknown fieldrulematch kind '{}'", other)))
        }
    };

    let (min_len, max_len) = match keyword_lens {
        Some(lens) => lens,
        None => (
            def.minlen.unwrap_or(DEFAULT_MIN_LEN),
            def.maxlen.unwrap_or(DEFAULT_MAX_LEN),
        ),
    };
    if min_len > max_len {
        return Err(fail(format!(
            "minlen {} exceeds maxlen {}",
            min_len, max_len
        )));
    }

    let mut context: Vec<String> = doc
        .context
        .split('.')
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .collect();
    if def.piikey.is_some() && !context.iter().any(|c| c == "pii") {
        context.push("pii".to_string());
    }

    Ok(Rule {
        id: rule_id.to_string(),
        dataclass,
        pii: def.piikey.clone(),
        kind,
        matcher,
        validator,
        field_gate,
        min_len,
        max_len,
        context,
        lang: doc.lang.clone(),
        country: countries.to_vec(),
        imprecise: def.imprecise.unwrap_or(0) != 0,
        priority: def.priority,
        group: doc.name.clone(),
        group_desc: doc.description.clone(),
    })
}

fn rule_string(value: &serde_yaml::Value) -> Option<String> {
    value.as_str().map(str::to_string)
}

/// Anchor a regex to whole-value matching unless the author anchored it.
fn anchor_regex(source: &str) -> String {
    if source.starts_with('^') && source.ends_with('$') {
        source.to_string()
    } else {
        format!("^(?:{})$", source)
    }
}
