//! Document paths
//!
//! A path alternates collection and document segments:
//! `contracts/01HV…` is a top-level document and
//! `contracts/01HV…/payments/01HW…` lives in the `payments` subcollection of
//! that contract.

use crate::error::StoreError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Location of a single document
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DocPath {
    collection: String,
    id: String,
}

impl DocPath {
    /// Build from a collection path and document id
    ///
    /// # Errors
    /// `InvalidPath` when a segment is empty or the collection path has an
    /// even number of segments
    pub fn new(collection: impl Into<String>, id: impl Into<String>) -> Result<Self, StoreError> {
        let collection = collection.into();
        let id = id.into();
        validate_collection(&collection)?;
        if !valid_segment(&id) {
            return Err(StoreError::InvalidPath(format!("{collection}/{id}")));
        }
        Ok(Self { collection, id })
    }

    /// Collection path (may include parent document segments)
    #[inline]
    #[must_use]
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Document id
    #[inline]
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Path of a subcollection below this document
    #[must_use]
    pub fn subcollection(&self, name: &str) -> String {
        format!("{}/{}/{name}", self.collection, self.id)
    }
}

impl fmt::Display for DocPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.collection, self.id)
    }
}

impl FromStr for DocPath {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (collection, id) = s
            .rsplit_once('/')
            .ok_or_else(|| StoreError::InvalidPath(s.to_string()))?;
        Self::new(collection, id)
    }
}

fn valid_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment != "."
        && segment != ".."
        && !segment.contains('/')
        && !segment.chars().any(char::is_whitespace)
}

/// Check a collection path: odd number of non-empty segments
///
/// # Errors
/// `InvalidPath` on malformed input
pub fn validate_collection(collection: &str) -> Result<(), StoreError> {
    let segments: Vec<&str> = collection.split('/').collect();
    if segments.len() % 2 == 0 || !segments.iter().all(|s| valid_segment(s)) {
        return Err(StoreError::InvalidPath(collection.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn top_level_and_nested() {
        let contract = DocPath::new("contracts", "c1").unwrap();
        assert_eq!(contract.to_string(), "contracts/c1");
        let payments = contract.subcollection("payments");
        assert_eq!(payments, "contracts/c1/payments");
        let payment = DocPath::new(payments, "p1").unwrap();
        assert_eq!(payment.collection(), "contracts/c1/payments");
        assert_eq!(payment.id(), "p1");
    }

    #[test]
    fn parse_from_string() {
        let p: DocPath = "contracts/c1/payments/p1".parse().unwrap();
        assert_eq!(p.collection(), "contracts/c1/payments");
        assert!("contracts".parse::<DocPath>().is_err());
        assert!("contracts/c1/payments".parse::<DocPath>().is_err());
    }

    #[test]
    fn rejects_bad_segments() {
        assert!(DocPath::new("contracts", "").is_err());
        assert!(DocPath::new("contracts", "..").is_err());
        assert!(DocPath::new("contracts//x", "id").is_err());
        assert!(DocPath::new("contracts", "a b").is_err());
    }
}
