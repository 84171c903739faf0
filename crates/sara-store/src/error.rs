//! Error types for storage
//!
//! Distinguishes:
//! - Caller mistakes (bad paths, bad keys)
//! - Precondition failures (stale revisions, duplicates, missing documents)
//! - Infrastructure failures (disk, encoding)

use std::path::PathBuf;

/// Storage error
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Malformed document or collection path
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// A batch precondition did not hold
    #[error("precondition failed on {path}: expected {expected}, found {actual}")]
    PreconditionFailed {
        /// Document path
        path: String,
        /// What the batch required
        expected: String,
        /// What the store holds
        actual: String,
    },

    /// Update or delete targeted a missing document
    #[error("document not found: {0}")]
    NotFound(String),

    /// Batch carried no operations
    #[error("empty write batch")]
    EmptyBatch,

    /// Update payload was not a JSON object
    #[error("update payload for {0} must be a JSON object")]
    NotAnObject(String),

    /// Document could not be encoded or decoded
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Disk failure
    #[error("io error at {path}: {source}")]
    Io {
        /// File involved
        path: PathBuf,
        /// Underlying failure
        #[source]
        source: std::io::Error,
    },

    /// Blob key outside the store root or malformed
    #[error("invalid blob key: {0}")]
    InvalidKey(String),

    /// Blob larger than allowed
    #[error("blob too large: {size} bytes (max {max})")]
    TooLarge {
        /// Actual size
        size: u64,
        /// Limit
        max: u64,
    },
}

impl StoreError {
    /// Create IO error for path
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether re-reading and retrying may succeed
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::PreconditionFailed { .. } | Self::Io { .. })
    }

    /// Whether this is a lost race on a revision or existence check
    #[inline]
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::PreconditionFailed { .. })
    }
}
