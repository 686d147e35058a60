//! # Date Pattern Matching
//!
//! A fixed table of named date grammars tried against string values, both by
//! the profiler (to type date-looking strings) and as the fallback matcher
//! for columns no data rule claimed. Each pattern carries a stable key that
//! is reported as the match `format`.

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;

/// Field order of the capture groups in a pattern's regex.
#[derive(Clone, Copy)]
enum Order {
    Ymd,
    Dmy,
    /// day, month-name, year
    DayNameYear,
    /// month-name, day, year
    NameDayYear,
}

struct DatePattern {
    key: &'static str,
    regex: Regex,
    order: Order,
    /// Month group is a name looked up in this table instead of a number.
    months: Option<&'static [(&'static str, u32)]>,
}

static EN_MONTHS: &[(&str, u32)] = &[
    ("january", 1),
    ("february", 2),
    ("march", 3),
    ("april", 4),
    ("may", 5),
    ("june", 6),
    ("july", 7),
    ("august", 8),
    ("september", 9),
    ("october", 10),
    ("november", 11),
    ("december", 12),
    ("jan", 1),
    ("feb", 2),
    ("mar", 3),
    ("apr", 4),
    ("jun", 6),
    ("jul", 7),
    ("aug", 8),
    ("sep", 9),
    ("sept", 9),
    ("oct", 10),
    ("nov", 11),
    ("dec", 12),
];

static RU_MONTHS: &[(&str, u32)] = &[
    ("января", 1),
    ("февраля", 2),
    ("марта", 3),
    ("апреля", 4),
    ("мая", 5),
    ("июня", 6),
    ("июля", 7),
    ("августа", 8),
    ("сентября", 9),
    ("октября", 10),
    ("ноября", 11),
    ("декабря", 12),
];

// Time-of-day tails are validated by the regex alone ([01]\d|2[0-3] etc.),
// so the calendar check only ever sees the three date groups.
const HH: &str = r"(?:[01]\d|2[0-3])";
const MS: &str = r"[0-5]\d";

static PATTERNS: LazyLock<Vec<DatePattern>> = LazyLock::new(|| {
    let p = |key, re: String, order, months| DatePattern {
        key,
        regex: Regex::new(&re).unwrap(),
        order,
        months,
    };
    vec![
        p(
            "date_iso",
            r"^(\d{4})-(\d{2})-(\d{2})$".to_string(),
            Order::Ymd,
            None,
        ),
        p(
            "datetime_iso_t",
            format!(
                r"^(\d{{4}})-(\d{{2}})-(\d{{2}})T{HH}:{MS}:{MS}(?:\.\d+)?(?:Z|[+-]\d{{2}}:?\d{{2}})?$"
            ),
            Order::Ymd,
            None,
        ),
        p(
            "datetime_iso_space",
            format!(r"^(\d{{4}})-(\d{{2}})-(\d{{2}}) {HH}:{MS}:{MS}$"),
            Order::Ymd,
            None,
        ),
        p(
            "date_dmy_dot",
            r"^(\d{1,2})\.(\d{1,2})\.(\d{4})$".to_string(),
            Order::Dmy,
            None,
        ),
        p(
            "datetime_dmy_dot",
            format!(r"^(\d{{1,2}})\.(\d{{1,2}})\.(\d{{4}}) {HH}:{MS}(?::{MS})?$"),
            Order::Dmy,
            None,
        ),
        p(
            "date_dmy_slash",
            r"^(\d{1,2})/(\d{1,2})/(\d{4})$".to_string(),
            Order::Dmy,
            None,
        ),
        p(
            "date_ymd_slash",
            r"^(\d{4})/(\d{1,2})/(\d{1,2})$".to_string(),
            Order::Ymd,
            None,
        ),
        p(
            "date_dmy_dash",
            r"^(\d{1,2})-(\d{1,2})-(\d{4})$".to_string(),
            Order::Dmy,
            None,
        ),
        p(
            "date_en_dmy",
            r"(?i)^(\d{1,2})\s+([a-z]+)\.?\s+(\d{4})$".to_string(),
            Order::DayNameYear,
            Some(EN_MONTHS),
        ),
        p(
            "date_en_mdy",
            r"(?i)^([a-z]+)\.?\s+(\d{1,2}),?\s+(\d{4})$".to_string(),
            Order::NameDayYear,
            Some(EN_MONTHS),
        ),
        p(
            "date_ru_dmy",
            r"^(\d{1,2})\s+([а-яё]+)\s+(\d{4})(?:\s+(?:года|г\.))?$".to_string(),
            Order::DayNameYear,
            Some(RU_MONTHS),
        ),
    ]
});

/// Matcher over the built-in pattern table.
#[derive(Debug, Clone, Copy, Default)]
pub struct DateMatcher;

impl DateMatcher {
    pub fn new() -> Self {
        DateMatcher
    }

    /// Number of grammars in the table (surfaced by the rules stats dump).
    pub fn pattern_count(&self) -> usize {
        PATTERNS.len()
    }

    /// Try every grammar in order; return the key of the first that both
    /// matches and survives calendar validation.
    pub fn match_str(&self, value: &str) -> Option<&'static str> {
        let trimmed = value.trim();
        // Cheap pre-checks: every grammar needs a digit and fits in 40 chars.
        if trimmed.len() < 6 || trimmed.len() > 40 || !trimmed.bytes().any(|b| b.is_ascii_digit())
        {
            return None;
        }
        for pattern in PATTERNS.iter() {
            let Some(caps) = pattern.regex.captures(trimmed) else {
                continue;
            };
            if validate_calendar(&caps, pattern.order, pattern.months) {
                return Some(pattern.key);
            }
        }
        None
    }
}

fn validate_calendar(
    caps: &regex::Captures<'_>,
    order: Order,
    months: Option<&[(&str, u32)]>,
) -> bool {
    let group = |i: usize| caps.get(i).map(|m| m.as_str());
    let num = |i: usize| group(i).and_then(|s| s.parse::<u32>().ok());

    let (year, month, day) = match order {
        Order::Ymd => (num(1), num(2), num(3)),
        Order::Dmy => (num(3), num(2), num(1)),
        Order::DayNameYear => (num(3), month_from_name(group(2), months), num(1)),
        Order::NameDayYear => (num(3), month_from_name(group(1), months), num(2)),
    };
    match (year, month, day) {
        (Some(y), Some(m), Some(d)) => NaiveDate::from_ymd_opt(y as i32, m, d).is_some(),
        _ => false,
    }
}

fn month_from_name(name: Option<&str>, months: Option<&[(&str, u32)]>) -> Option<u32> {
    let name = name?.to_lowercase();
    months?
        .iter()
        .find(|(candidate, _)| *candidate == name)
        .map(|(_, number)| *number)
}
