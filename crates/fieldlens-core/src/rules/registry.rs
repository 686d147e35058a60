//! # Predicate Registry
//!
//! Rule files reference external predicates (`match: func` and `validator:`)
//! by name. Names resolve against this closed-world table of statically
//! known functions; callers extend it with `register` before loading rules.
//! Nothing is looked up dynamically at match time.

use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

use regex::Regex;

/// A named value predicate.
pub type Predicate = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// Closed-world name → predicate table.
#[derive(Clone, Default)]
pub struct FnRegistry {
    table: HashMap<String, Predicate>,
}

impl std::fmt::Debug for FnRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&String> = self.table.keys().collect();
        names.sort();
        f.debug_struct("FnRegistry").field("names", &names).finish()
    }
}

impl FnRegistry {
    /// An empty registry (no names resolve).
    pub fn empty() -> Self {
        Self::default()
    }

    /// The default registry, pre-populated with the builtin validators.
    pub fn with_builtins() -> Self {
        let mut registry = Self::default();
        registry.register("validators:email", |v| is_email(v));
        registry.register("validators:url", |v| is_url(v));
        registry.register("validators:uuid", |v| is_uuid(v));
        registry.register("validators:ipv4", |v| is_ipv4(v));
        registry.register("validators:inn", |v| is_inn(v));
        registry.register("validators:snils", |v| is_snils(v));
        registry
    }

    /// Register a predicate under a rule-file-visible name. Later
    /// registrations replace earlier ones.
    pub fn register<F>(&mut self, name: &str, func: F)
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        self.table.insert(name.to_string(), Arc::new(func));
    }

    /// Resolve a name, or `None` if the rule references an unknown function.
    pub fn resolve(&self, name: &str) -> Option<Predicate> {
        self.table.get(name).cloned()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.table.keys().map(|s| s.as_str())
    }
}

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s.]+$").unwrap());

static UUID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$")
        .unwrap()
});

fn is_email(value: &str) -> bool {
    EMAIL_RE.is_match(value.trim())
}

fn is_url(value: &str) -> bool {
    match url::Url::parse(value.trim()) {
        Ok(parsed) => {
            matches!(parsed.scheme(), "http" | "https" | "ftp") && parsed.host_str().is_some()
        }
        Err(_) => false,
    }
}

fn is_uuid(value: &str) -> bool {
    UUID_RE.is_match(value.trim())
}

fn is_ipv4(value: &str) -> bool {
    let parts: Vec<&str> = value.trim().split('.').collect();
    parts.len() == 4
        && parts.iter().all(|p| {
            !p.is_empty() && p.len() <= 3 && p.parse::<u8>().is_ok() && !(p.len() > 1 && p.starts_with('0'))
        })
}

fn digits_of(value: &str) -> Option<Vec<u32>> {
    let trimmed = value.trim();
    if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(trimmed.chars().map(|c| c.to_digit(10).unwrap()).collect())
}

/// Russian tax number (10 digits for organizations, 12 for persons) with its
/// modulo-11 check digits.
fn is_inn(value: &str) -> bool {
    let Some(digits) = digits_of(value) else {
        return false;
    };
    let weighted = |weights: &[u32]| -> u32 {
        weights
            .iter()
            .zip(&digits)
            .map(|(w, d)| w * d)
            .sum::<u32>()
            % 11
            % 10
    };
    match digits.len() {
        10 => weighted(&[2, 4, 10, 3, 5, 9, 4, 6, 8]) == digits[9],
        12 => {
            weighted(&[7, 2, 4, 10, 3, 5, 9, 4, 6, 8]) == digits[10]
                && weighted(&[3, 7, 2, 4, 10, 3, 5, 9, 4, 6, 8]) == digits[11]
        }
        _ => false,
    }
}

/// Russian pension insurance number: 11 digits, checksum over the first nine
/// with weights 9..1, modulo 101 (100 counts as 0).
fn is_snils(value: &str) -> bool {
    let normalized: String = value
        .trim()
        .chars()
        .filter(|c| c.is_ascii_digit())
        .collect();
    let Some(digits) = digits_of(&normalized) else {
        return false;
    };
    if digits.len() != 11 {
        return false;
    }
    let sum: u32 = digits[..9]
        .iter()
        .enumerate()
        .map(|(i, d)| d * (9 - i as u32))
        .sum();
    let mut check = sum % 101;
    if check == 100 {
        check = 0;
    }
    check == digits[9] * 10 + digits[10]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email() {
        assert!(is_email("user@example.com"));
        assert!(is_email("a.b+c@mail.example.org"));
        assert!(!is_email("not-an-email"));
        assert!(!is_email("two@@example.com"));
        assert!(!is_email("user@nodot"));
    }

    #[test]
    fn test_url() {
        assert!(is_url("https://example.com/path?q=1"));
        assert!(is_url("http://localhost:8080"));
        assert!(is_url("ftp://files.example.org/a.txt"));
        assert!(!is_url("example.com"));
        assert!(!is_url("mailto:user@example.com"));
    }

    #[test]
    fn test_uuid() {
        assert!(is_uuid("550e8400-e29b-41d4-a716-446655440000"));
        assert!(is_uuid("550E8400-E29B-41D4-A716-446655440000"));
        assert!(!is_uuid("550e8400e29b41d4a716446655440000"));
        assert!(!is_uuid("550e8400-e29b-41d4-a716-44665544000g"));
    }

    #[test]
    fn test_ipv4() {
        assert!(is_ipv4("192.168.0.1"));
        assert!(is_ipv4("8.8.8.8"));
        assert!(!is_ipv4("256.1.1.1"));
        assert!(!is_ipv4("1.2.3"));
        assert!(!is_ipv4("01.2.3.4"));
    }

    #[test]
    fn test_inn() {
        // Known-valid check digits.
        assert!(is_inn("7707083893"));
        assert!(is_inn("500100732259"));
        assert!(!is_inn("7707083894"));
        assert!(!is_inn("123"));
        assert!(!is_inn("77070838ab"));
    }

    #[test]
    fn test_snils() {
        assert!(is_snils("11223344595"));
        assert!(is_snils("112-233-445 95"));
        assert!(!is_snils("11223344596"));
        assert!(!is_snils("1122334459"));
    }

    #[test]
    fn test_registry_resolution() {
        let registry = FnRegistry::with_builtins();
        let email = registry.resolve("validators:email").unwrap();
        assert!(email("a@b.com"));
        assert!(registry.resolve("no.such:fn").is_none());
    }

    #[test]
    fn test_registry_extension() {
        let mut registry = FnRegistry::empty();
        assert!(registry.resolve("custom:even_len").is_none());
        registry.register("custom:even_len", |v| v.len() % 2 == 0);
        let f = registry.resolve("custom:even_len").unwrap();
        assert!(f("ab"));
        assert!(!f("abc"));
    }
}
