//! Outgoing messages

use serde::{Deserialize, Serialize};
use std::fmt;

/// A rendered email ready for delivery
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutgoingEmail {
    /// Recipient address
    pub to: String,
    /// Subject line
    pub subject: String,
    /// HTML body
    pub html: String,
}

impl OutgoingEmail {
    /// New message
    #[must_use]
    pub fn new(to: impl Into<String>, subject: impl Into<String>, html: impl Into<String>) -> Self {
        Self {
            to: to.into(),
            subject: subject.into(),
            html: html.into(),
        }
    }
}

/// Provider-assigned message id
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub String);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Loose sanity check on a recipient: one `@`, non-empty local part, dotted domain
#[must_use]
pub fn plausible_address(addr: &str) -> bool {
    let Some((local, domain)) = addr.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !addr.chars().any(|c| c.is_whitespace() || c.is_control())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_check() {
        assert!(plausible_address("ana@example.cl"));
        assert!(!plausible_address("ana@@example.cl"));
        assert!(!plausible_address("ana example.cl"));
        assert!(!plausible_address("ana@localhost"));
        assert!(!plausible_address("ana@x.cl\r\nBcc: y@z.cl"));
    }
}
