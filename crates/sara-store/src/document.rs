//! Stored documents

use crate::error::StoreError;
use crate::path::DocPath;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A document as held by the store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredDocument {
    /// Location
    pub path: DocPath,
    /// Starts at 1, bumped by every write
    pub revision: u64,
    /// JSON body
    pub data: Value,
    /// Last write time
    pub updated_at: DateTime<Utc>,
}

impl StoredDocument {
    /// Decode the body into a typed record
    ///
    /// # Errors
    /// `Serialization` when the body does not match `T`
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, StoreError> {
        Ok(serde_json::from_value(self.data.clone())?)
    }

    /// Field lookup with dotted paths (`scores.communication`)
    #[must_use]
    pub fn field(&self, path: &str) -> Option<&Value> {
        lookup(&self.data, path)
    }
}

/// Dotted-path lookup in a JSON value
#[must_use]
pub fn lookup<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(value, |current, key| current.get(key))
}

/// A decoded record together with the revision it was read at
#[derive(Debug, Clone, PartialEq)]
pub struct Versioned<T> {
    /// Record
    pub value: T,
    /// Revision read
    pub revision: u64,
}

impl<T> Versioned<T> {
    /// Map the inner value
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Versioned<U> {
        Versioned {
            value: f(self.value),
            revision: self.revision,
        }
    }
}
