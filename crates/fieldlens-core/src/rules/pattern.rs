//! # Declarative Pattern Expressions
//!
//! Rule files describe value shapes as a small tagged tree (`seq`, `alt`,
//! `repeat`, `opt`, `class`, `chars`, `literal`) that YAML encodes directly.
//! The loader translates the tree into a single anchored regex, so rule
//! authors get grammar-style composition without any code evaluation.

use regex::Regex;
use serde::Deserialize;

use crate::error::{FieldLensError, Result};

/// One node of a pattern tree.
///
/// ```yaml
/// rule:
///   seq:
///     - repeat: { of: { class: digits }, min: 4 }
///     - literal: "-"
///     - alt:
///         - literal: "DE"
///         - literal: "FR"
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternExpr {
    /// Exact text, matched case-sensitively.
    Literal(String),
    /// One character from a named class.
    Class(CharClass),
    /// One character from an explicit set.
    Chars(String),
    /// Each element in order.
    Seq(Vec<PatternExpr>),
    /// First matching alternative.
    Alt(Vec<PatternExpr>),
    /// `of` repeated between `min` and `max` times.
    Repeat(RepeatExpr),
    /// Zero or one occurrence.
    Opt(Box<PatternExpr>),
}

#[derive(Debug, Clone, Deserialize)]
pub struct RepeatExpr {
    pub of: Box<PatternExpr>,
    #[serde(default = "default_min")]
    pub min: u32,
    #[serde(default)]
    pub max: Option<u32>,
}

fn default_min() -> u32 {
    1
}

/// Named character classes available to rule authors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CharClass {
    Digits,
    Alphas,
    Alnums,
    Hex,
    Upper,
    Lower,
}

impl CharClass {
    fn to_regex(self) -> &'static str {
        match self {
            CharClass::Digits => "[0-9]",
            CharClass::Alphas => "[a-zA-Z]",
            CharClass::Alnums => "[a-zA-Z0-9]",
            CharClass::Hex => "[0-9a-fA-F]",
            CharClass::Upper => "[A-Z]",
            CharClass::Lower => "[a-z]",
        }
    }
}

impl PatternExpr {
    /// Compile the tree into a regex anchored to line start and end.
    pub fn compile(&self) -> Result<Regex> {
        let mut body = String::new();
        self.write_regex(&mut body)?;
        Regex::new(&format!("^(?:{})$", body)).map_err(|e| FieldLensError::Other(e.to_string()))
    }

    fn write_regex(&self, out: &mut String) -> Result<()> {
        match self {
            PatternExpr::Literal(text) => {
                if text.is_empty() {
                    return Err(FieldLensError::Other(
                        "pattern literal must not be empty".to_string(),
                    ));
                }
                out.push_str(&regex::escape(text));
            }
            PatternExpr::Class(class) => out.push_str(class.to_regex()),
            PatternExpr::Chars(set) => {
                if set.is_empty() {
                    return Err(FieldLensError::Other(
                        "pattern chars set must not be empty".to_string(),
                    ));
                }
                out.push('[');
                for ch in set.chars() {
                    if matches!(ch, '^' | ']' | '\\' | '-') {
                        out.push('\\');
                    }
                    out.push(ch);
                }
                out.push(']');
            }
            PatternExpr::Seq(parts) => {
                for part in parts {
                    part.write_regex(out)?;
                }
            }
            PatternExpr::Alt(parts) => {
                if parts.is_empty() {
                    return Err(FieldLensError::Other(
                        "pattern alt must list at least one branch".to_string(),
                    ));
                }
                out.push_str("(?:");
                for (i, part) in parts.iter().enumerate() {
                    if i > 0 {
                        out.push('|');
                    }
                    part.write_regex(out)?;
                }
                out.push(')');
            }
            PatternExpr::Repeat(rep) => {
                if let Some(max) = rep.max {
                    if max < rep.min {
                        return Err(FieldLensError::Other(format!(
                            "pattern repeat max {} below min {}",
                            max, rep.min
                        )));
                    }
                }
                out.push_str("(?:");
                rep.of.write_regex(out)?;
                out.push(')');
                match (rep.min, rep.max) {
                    (1, None) => out.push('+'),
                    (0, None) => out.push('*'),
                    (min, None) => out.push_str(&format!("{{{},}}", min)),
                    (min, Some(max)) if min == max => out.push_str(&format!("{{{}}}", min)),
                    (min, Some(max)) => out.push_str(&format!("{{{},{}}}", min, max)),
                }
            }
            PatternExpr::Opt(inner) => {
                out.push_str("(?:");
                inner.write_regex(out)?;
                out.push_str(")?");
            }
        }
        Ok(())
    }
}
