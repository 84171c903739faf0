//! Chilean RUT (Rol Único Tributario)
//!
//! A RUT is a body number plus a modulo-11 check digit (`0-9` or `K`).
//! Parsing accepts the usual spellings (`12.345.678-5`, `12345678-5`,
//! `123456785`) and always displays the dotted form.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Largest body accepted
const MAX_BODY: u32 = 99_999_999;

/// RUT parse failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RutError {
    /// Nothing to parse
    #[error("RUT is empty")]
    Empty,

    /// Character outside digits, dots, dash and K
    #[error("RUT contains invalid character '{0}'")]
    InvalidCharacter(char),

    /// Body is zero or too long
    #[error("RUT number out of range")]
    OutOfRange,

    /// Check digit does not match the body
    #[error("RUT check digit mismatch: expected {expected}, found {found}")]
    CheckDigitMismatch {
        /// Computed digit
        expected: char,
        /// Supplied digit
        found: char,
    },
}

/// A validated RUT
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rut {
    body: u32,
    verifier: char,
}

impl Rut {
    /// Build from body, computing the check digit
    ///
    /// # Errors
    /// `OutOfRange` when the body is zero or exceeds eight digits
    pub fn from_body(body: u32) -> Result<Self, RutError> {
        if body == 0 || body > MAX_BODY {
            return Err(RutError::OutOfRange);
        }
        Ok(Self {
            body,
            verifier: check_digit(body),
        })
    }

    /// Parse any common spelling
    ///
    /// # Errors
    /// See [`RutError`]
    pub fn parse(input: &str) -> Result<Self, RutError> {
        let mut cleaned = String::with_capacity(input.len());
        for c in input.trim().chars() {
            match c {
                '.' | '-' | ' ' => {}
                '0'..='9' => cleaned.push(c),
                'k' | 'K' => cleaned.push('K'),
                other => return Err(RutError::InvalidCharacter(other)),
            }
        }
        let Some(found) = cleaned.pop() else {
            return Err(RutError::Empty);
        };
        if cleaned.is_empty() {
            return Err(RutError::OutOfRange);
        }
        if let Some(k) = cleaned.chars().find(|c| !c.is_ascii_digit()) {
            return Err(RutError::InvalidCharacter(k));
        }
        if cleaned.len() > 8 {
            return Err(RutError::OutOfRange);
        }
        let body: u32 = cleaned.parse().map_err(|_| RutError::OutOfRange)?;
        let rut = Self::from_body(body)?;
        if rut.verifier != found {
            return Err(RutError::CheckDigitMismatch {
                expected: rut.verifier,
                found,
            });
        }
        Ok(rut)
    }

    /// Numeric body
    #[inline]
    #[must_use]
    pub fn body(&self) -> u32 {
        self.body
    }

    /// Check digit
    #[inline]
    #[must_use]
    pub fn verifier(&self) -> char {
        self.verifier
    }
}

/// Modulo-11 check digit
fn check_digit(body: u32) -> char {
    let mut sum = 0u32;
    let mut factor = 2u32;
    let mut rest = body;
    while rest > 0 {
        sum += (rest % 10) * factor;
        rest /= 10;
        factor = if factor == 7 { 2 } else { factor + 1 };
    }
    match 11 - (sum % 11) {
        11 => '0',
        10 => 'K',
        d => char::from_digit(d, 10).unwrap_or('0'),
    }
}

impl fmt::Display for Rut {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let digits = self.body.to_string();
        let mut grouped = String::with_capacity(digits.len() + 3);
        for (i, c) in digits.chars().enumerate() {
            if i > 0 && (digits.len() - i) % 3 == 0 {
                grouped.push('.');
            }
            grouped.push(c);
        }
        write!(f, "{grouped}-{}", self.verifier)
    }
}

impl FromStr for Rut {
    type Err = RutError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for Rut {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Rut {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Rut::parse(&raw).map_err(serde::de::Error::custom)
    }
}
