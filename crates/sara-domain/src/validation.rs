//! Field validation
//!
//! Validators collect every failing field instead of stopping at the first
//! one, so a form can highlight all of its problems at once.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9\-]+(\.[A-Za-z0-9\-]+)*\.[A-Za-z]{2,}$")
        .expect("email pattern is valid")
});

static PHONE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\+?[0-9 ]{8,15}$").expect("phone pattern is valid"));

/// One failing field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    /// Field name as submitted
    pub field: String,
    /// Human readable reason
    pub message: String,
}

/// All failing fields of a submission
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationErrors {
    errors: Vec<FieldError>,
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .errors
            .iter()
            .map(|e| format!("{}: {}", e.field, e.message))
            .collect();
        write!(f, "{}", parts.join("; "))
    }
}

impl std::error::Error for ValidationErrors {}

impl ValidationErrors {
    /// Empty collector
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Collector holding a single failure
    #[must_use]
    pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.push(field, message);
        errors
    }

    /// Record a failure
    pub fn push(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(FieldError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Record a failure unless `ok` holds
    pub fn check(&mut self, ok: bool, field: &str, message: &str) {
        if !ok {
            self.push(field, message);
        }
    }

    /// Required text with length bounds (counted in chars, after trimming)
    pub fn text(&mut self, field: &str, value: &str, min: usize, max: usize) {
        let len = value.trim().chars().count();
        if len == 0 && min > 0 {
            self.push(field, "is required");
        } else if len < min {
            self.push(field, format!("must have at least {min} characters"));
        } else if len > max {
            self.push(field, format!("must have at most {max} characters"));
        }
    }

    /// Email address shape
    pub fn email(&mut self, field: &str, value: &str) {
        if !is_valid_email(value) {
            self.push(field, "is not a valid email address");
        }
    }

    /// Whether nothing failed
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Failures in insertion order
    #[inline]
    #[must_use]
    pub fn errors(&self) -> &[FieldError] {
        &self.errors
    }

    /// Whether a given field failed
    #[must_use]
    pub fn has(&self, field: &str) -> bool {
        self.errors.iter().any(|e| e.field == field)
    }

    /// `Ok(())` when empty, otherwise `Err(self)`
    ///
    /// # Errors
    /// Returns the collector itself when any field failed
    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

/// Email address shape check
#[must_use]
pub fn is_valid_email(value: &str) -> bool {
    let value = value.trim();
    value.len() <= 254 && EMAIL_RE.is_match(value)
}

/// Normalize an email for lookups
#[must_use]
pub fn normalize_email(value: &str) -> String {
    value.trim().to_lowercase()
}

/// Chilean phone number shape (`+56 9 1234 5678`, `912345678`)
#[must_use]
pub fn is_valid_phone(value: &str) -> bool {
    PHONE_RE.is_match(value.trim())
}

/// Amount in Chilean pesos (no decimals)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Clp(pub i64);

impl Clp {
    /// Whether the amount is strictly positive
    #[inline]
    #[must_use]
    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Raw amount
    #[inline]
    #[must_use]
    pub fn amount(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for Clp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let digits = self.0.unsigned_abs().to_string();
        let mut grouped = String::with_capacity(digits.len() + 4);
        for (i, c) in digits.chars().enumerate() {
            if i > 0 && (digits.len() - i) % 3 == 0 {
                grouped.push('.');
            }
            grouped.push(c);
        }
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{sign}${grouped}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_shapes() {
        assert!(is_valid_email("ana.perez@correo.cl"));
        assert!(is_valid_email("  x+tag@sub.example.com "));
        assert!(!is_valid_email("ana@"));
        assert!(!is_valid_email("ana.correo.cl"));
        assert!(!is_valid_email("ana@correo"));
    }

    #[test]
    fn phone_shapes() {
        assert!(is_valid_phone("+56 9 1234 5678"));
        assert!(is_valid_phone("912345678"));
        assert!(!is_valid_phone("12-34"));
    }

    #[test]
    fn collects_every_failure() {
        let mut errors = ValidationErrors::new();
        errors.text("name", "", 1, 10);
        errors.text("title", "abc", 5, 10);
        errors.email("email", "nope");
        assert_eq!(errors.errors().len(), 3);
        assert!(errors.has("title"));
        assert!(errors.clone().into_result().is_err());
        assert!(errors.to_string().contains("name: is required"));
    }

    #[test]
    fn clp_formatting() {
        assert_eq!(Clp(450_000).to_string(), "$450.000");
        assert_eq!(Clp(1_250_000).to_string(), "$1.250.000");
        assert_eq!(Clp(999).to_string(), "$999");
        assert_eq!(Clp(-5_000).to_string(), "-$5.000");
    }
}
