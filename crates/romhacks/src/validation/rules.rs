//! Built-in field rules.
//!
//! Each rule is a named regex that a whole field value must match.

use regex::Regex;

/// A compiled field rule.
#[derive(Debug, Clone)]
pub struct FieldRule {
    /// Name of the rule for identification.
    pub name: &'static str,

    /// What a matching value looks like, used in error messages.
    pub description: &'static str,

    /// The compiled regex.
    regex: Regex,
}

impl FieldRule {
    /// Create a new field rule.
    ///
    /// # Panics
    ///
    /// Panics if the regex pattern is invalid.
    #[must_use]
    pub fn new(name: &'static str, description: &'static str, pattern: &str) -> Self {
        Self {
            name,
            description,
            regex: Regex::new(pattern).expect("Invalid regex pattern"),
        }
    }

    /// Check if the trimmed value matches this rule.
    #[must_use]
    pub fn matches(&self, value: &str) -> bool {
        self.regex.is_match(value.trim())
    }
}

/// CRC32 checksum, 8 hex digits.
#[must_use]
pub fn crc32() -> FieldRule {
    FieldRule::new("crc32", "8 hexadecimal digits", r"^[0-9A-Fa-f]{8}$")
}

/// MD5 checksum, 32 hex digits.
#[must_use]
pub fn md5() -> FieldRule {
    FieldRule::new("md5", "32 hexadecimal digits", r"^[0-9A-Fa-f]{32}$")
}

/// SHA-1 checksum, 40 hex digits.
#[must_use]
pub fn sha1() -> FieldRule {
    FieldRule::new("sha1", "40 hexadecimal digits", r"^[0-9A-Fa-f]{40}$")
}

/// A plausible email address.
#[must_use]
pub fn email() -> FieldRule {
    FieldRule::new(
        "email",
        "a valid email address",
        r"^[^@\s]+@[^@\s]+\.[^@\s]+$",
    )
}

/// A release date with year, optional month and optional day.
#[must_use]
pub fn release_date() -> FieldRule {
    FieldRule::new(
        "release_date",
        "YYYY, YYYY-MM or YYYY-MM-DD",
        r"^\d{4}(-(0[1-9]|1[0-2])(-(0[1-9]|[12]\d|3[01]))?)?$",
    )
}

/// Get all built-in field rules.
#[must_use]
pub fn builtin_rules() -> Vec<FieldRule> {
    vec![crc32(), md5(), sha1(), email(), release_date()]
}
