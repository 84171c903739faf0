//! Error types for the service layer
//!
//! Distinguishes:
//! - Caller mistakes (validation, illegal transitions, business conflicts)
//! - Access failures (unauthenticated, forbidden, not found)
//! - Infrastructure failures (document store, blob store, mail provider)

use sara_domain::{TransitionError, ValidationErrors};
use sara_mail::MailError;
use sara_store::StoreError;

/// Service error
#[derive(Debug, thiserror::Error)]
pub enum SaraError {
    /// Submitted data failed validation
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationErrors),

    /// Record missing or not visible to the caller
    #[error("{0} not found")]
    NotFound(String),

    /// Caller is known but not allowed
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Missing or invalid credentials
    #[error("unauthenticated: {0}")]
    Unauthenticated(String),

    /// Business rule conflict (duplicate period, property busy, ...)
    #[error("conflict: {0}")]
    Conflict(String),

    /// Status change not allowed from the current status
    #[error(transparent)]
    InvalidTransition(#[from] TransitionError),

    /// Document store failure, including lost optimistic-concurrency races
    #[error("store error: {0}")]
    Store(StoreError),

    /// Mail provider failure
    #[error("mail error: {0}")]
    Mail(#[from] MailError),

    /// Blob store failure
    #[error("blob storage error: {0}")]
    Blob(StoreError),

    /// Invalid configuration
    #[error("configuration error: {0}")]
    Config(String),

    /// Unexpected internal failure
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<StoreError> for SaraError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::InvalidPath(path) => Self::NotFound(path),
            other => Self::Store(other),
        }
    }
}

impl SaraError {
    /// Wrap a blob store failure; oversized uploads become validation errors
    #[must_use]
    pub fn blob(err: StoreError) -> Self {
        match err {
            StoreError::TooLarge { size, max } => Self::Validation(ValidationErrors::single(
                "file",
                format!("is {size} bytes, the limit is {max}"),
            )),
            StoreError::InvalidKey(key) => Self::NotFound(key),
            other => Self::Blob(other),
        }
    }

    /// Not-found error for a record kind and id
    #[must_use]
    pub fn not_found(kind: &str, id: impl std::fmt::Display) -> Self {
        Self::NotFound(format!("{kind} {id}"))
    }

    /// Whether retrying the same request may succeed
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Store(e) | Self::Blob(e) => e.is_retryable(),
            Self::Mail(e) => e.is_retryable(),
            _ => false,
        }
    }

    /// Stable machine-readable code
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_failed",
            Self::NotFound(_) => "not_found",
            Self::Forbidden(_) => "forbidden",
            Self::Unauthenticated(_) => "unauthenticated",
            Self::Conflict(_) => "conflict",
            Self::Store(e) if e.is_conflict() => "concurrent_modification",
            Self::InvalidTransition(_) => "invalid_transition",
            Self::Store(_) => "store_unavailable",
            Self::Mail(_) => "mail_failed",
            Self::Blob(_) => "blob_storage_failed",
            Self::Config(_) => "configuration_error",
            Self::Internal(_) => "internal",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stale_write_is_retryable_conflict() {
        let err: SaraError = StoreError::PreconditionFailed {
            path: "contracts/c1".into(),
            expected: "revision 1".into(),
            actual: "revision 2".into(),
        }
        .into();
        assert!(err.is_retryable());
        assert_eq!(err.code(), "concurrent_modification");
    }

    #[test]
    fn bad_path_reads_as_not_found() {
        let err: SaraError = StoreError::InvalidPath("users/..".into()).into();
        assert!(matches!(err, SaraError::NotFound(_)));
    }

    #[test]
    fn oversized_blob_is_validation() {
        let err = SaraError::blob(StoreError::TooLarge { size: 10, max: 5 });
        assert_eq!(err.code(), "validation_failed");
        assert!(!err.is_retryable());
    }

    #[test]
    fn mail_rate_limit_is_retryable() {
        assert!(SaraError::Mail(MailError::RateLimited).is_retryable());
        assert!(!SaraError::Conflict("x".into()).is_retryable());
    }
}
