//! Mail delivery errors

/// Mail error
#[derive(Debug, thiserror::Error)]
pub enum MailError {
    /// Mailer misconfigured (missing key, bad URL)
    #[error("mail configuration error: {0}")]
    Config(String),

    /// Recipient address rejected before sending
    #[error("invalid recipient address: {0}")]
    InvalidAddress(String),

    /// Network failure or timeout talking to the provider
    #[error("mail transport error: {0}")]
    Transport(String),

    /// Provider throttled the request
    #[error("mail provider rate limited the request")]
    RateLimited,

    /// Provider failed (5xx)
    #[error("mail provider error: HTTP {status}")]
    Upstream {
        /// HTTP status
        status: u16,
    },

    /// Provider refused the message (4xx other than 429)
    #[error("mail rejected by provider: HTTP {status}: {message}")]
    Rejected {
        /// HTTP status
        status: u16,
        /// Provider message, truncated
        message: String,
    },
}

impl MailError {
    /// Whether sending again later may succeed
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Transport(_) | Self::RateLimited | Self::Upstream { .. }
        )
    }

    /// Classify a non-success HTTP status
    #[must_use]
    pub fn from_status(status: u16, body: &str) -> Self {
        match status {
            429 => Self::RateLimited,
            500..=599 => Self::Upstream { status },
            _ => Self::Rejected {
                status,
                message: body.chars().take(200).collect(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_classification() {
        assert!(MailError::from_status(429, "").is_retryable());
        assert!(MailError::from_status(503, "").is_retryable());
        let rejected = MailError::from_status(422, "bad from");
        assert!(!rejected.is_retryable());
        assert!(rejected.to_string().contains("bad from"));
    }

    #[test]
    fn long_bodies_truncated() {
        let body = "x".repeat(1000);
        match MailError::from_status(400, &body) {
            MailError::Rejected { message, .. } => assert_eq!(message.len(), 200),
            other => panic!("unexpected {other:?}"),
        }
    }
}
