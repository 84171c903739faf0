//! Mailer seam and its implementations

use crate::error::MailError;
use crate::message::{plausible_address, MessageId, OutgoingEmail};
use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Delivers rendered messages
#[cfg_attr(any(test, feature = "mock"), mockall::automock)]
#[async_trait]
pub trait Mailer: Send + Sync + fmt::Debug {
    /// Send one message
    async fn send(&self, email: OutgoingEmail) -> Result<MessageId, MailError>;
}

/// Mail provider settings
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct MailConfig {
    /// Provider endpoint accepting `{from, to, subject, html}`
    pub api_url: String,
    /// Bearer key; no key means messages are only recorded
    pub api_key: Option<String>,
    /// Sender address
    pub from_address: String,
    /// Sender display name
    pub from_name: String,
    /// Request timeout
    pub timeout_secs: u64,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.resend.com/emails".into(),
            api_key: None,
            from_address: "no-reply@sara.cl".into(),
            from_name: "S.A.R.A.".into(),
            timeout_secs: 10,
        }
    }
}

impl fmt::Debug for MailConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MailConfig")
            .field("api_url", &self.api_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("from_address", &self.from_address)
            .field("from_name", &self.from_name)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl MailConfig {
    /// `Name <address>` header value
    #[must_use]
    pub fn from_header(&self) -> String {
        format!("{} <{}>", self.from_name, self.from_address)
    }

    /// Check the settings
    ///
    /// # Errors
    /// `Config` naming the first bad field
    pub fn validate(&self) -> Result<(), MailError> {
        if !(self.api_url.starts_with("http://") || self.api_url.starts_with("https://")) {
            return Err(MailError::Config(format!(
                "mail.api_url must be an http(s) URL, got {:?}",
                self.api_url
            )));
        }
        if !plausible_address(&self.from_address) {
            return Err(MailError::Config(format!(
                "mail.from_address is not an email address: {:?}",
                self.from_address
            )));
        }
        if self.timeout_secs == 0 {
            return Err(MailError::Config("mail.timeout_secs must be positive".into()));
        }
        if self.api_key.as_deref().is_some_and(str::is_empty) {
            return Err(MailError::Config("mail.api_key is set but empty".into()));
        }
        Ok(())
    }
}

#[derive(Serialize)]
struct ProviderRequest<'a> {
    from: String,
    to: [&'a str; 1],
    subject: &'a str,
    html: &'a str,
}

#[derive(Deserialize)]
struct ProviderResponse {
    id: Option<String>,
}

/// Sends through a JSON email API
#[derive(Clone)]
pub struct HttpMailer {
    client: reqwest::Client,
    config: MailConfig,
    api_key: String,
}

impl fmt::Debug for HttpMailer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpMailer")
            .field("api_url", &self.config.api_url)
            .field("from", &self.config.from_header())
            .finish_non_exhaustive()
    }
}

impl HttpMailer {
    /// Build from settings; requires an API key
    ///
    /// # Errors
    /// `Config` when settings are invalid or the key is missing
    pub fn new(config: MailConfig) -> Result<Self, MailError> {
        config.validate()?;
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| MailError::Config("mail.api_key is required for HTTP delivery".into()))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| MailError::Config(format!("http client: {e}")))?;
        Ok(Self {
            client,
            config,
            api_key,
        })
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, email: OutgoingEmail) -> Result<MessageId, MailError> {
        if !plausible_address(&email.to) {
            return Err(MailError::InvalidAddress(email.to));
        }
        let body = ProviderRequest {
            from: self.config.from_header(),
            to: [email.to.as_str()],
            subject: &email.subject,
            html: &email.html,
        };
        let response = self
            .client
            .post(&self.config.api_url)
            .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
            .header(CONTENT_TYPE, "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| MailError::Transport(e.without_url().to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let err = MailError::from_status(status.as_u16(), &text);
            tracing::warn!(status = status.as_u16(), subject = %email.subject, "Mail provider refused message");
            return Err(err);
        }
        let parsed: ProviderResponse = response.json().await.unwrap_or(ProviderResponse { id: None });
        let id = MessageId(
            parsed
                .id
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
        );
        tracing::info!(message_id = %id, subject = %email.subject, "Mail sent");
        Ok(id)
    }
}

/// Keeps messages in memory instead of sending them
#[derive(Debug, Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<OutgoingEmail>>,
}

impl RecordingMailer {
    /// Empty recorder
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages recorded so far
    #[must_use]
    pub fn sent(&self) -> Vec<OutgoingEmail> {
        self.sent.lock().clone()
    }

    /// Messages addressed to `to`
    #[must_use]
    pub fn sent_to(&self, to: &str) -> Vec<OutgoingEmail> {
        self.sent
            .lock()
            .iter()
            .filter(|m| m.to.eq_ignore_ascii_case(to))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, email: OutgoingEmail) -> Result<MessageId, MailError> {
        if !plausible_address(&email.to) {
            return Err(MailError::InvalidAddress(email.to));
        }
        tracing::info!(to = %email.to, subject = %email.subject, "Recorded mail (delivery disabled)");
        self.sent.lock().push(email);
        Ok(MessageId(uuid::Uuid::new_v4().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_redacts_key() {
        let config = MailConfig {
            api_key: Some("re_secret_123".into()),
            ..MailConfig::default()
        };
        let shown = format!("{config:?}");
        assert!(!shown.contains("re_secret_123"));
        assert!(shown.contains("<redacted>"));
        let mailer = HttpMailer::new(config).unwrap();
        assert!(!format!("{mailer:?}").contains("re_secret_123"));
    }

    #[test]
    fn http_mailer_needs_key() {
        assert!(matches!(
            HttpMailer::new(MailConfig::default()),
            Err(MailError::Config(_))
        ));
    }

    #[test]
    fn config_validation() {
        let mut config = MailConfig::default();
        assert!(config.validate().is_ok());
        config.api_url = "ftp://x".into();
        assert!(config.validate().is_err());
        config = MailConfig {
            from_address: "nope".into(),
            ..MailConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[tokio::test]
    async fn recording_mailer_keeps_messages() {
        let mailer = RecordingMailer::new();
        mailer
            .send(OutgoingEmail::new("Ana@Example.cl", "Hola", "<p>x</p>"))
            .await
            .unwrap();
        assert_eq!(mailer.sent_to("ana@example.cl").len(), 1);
        assert!(mailer
            .send(OutgoingEmail::new("bad", "Hola", ""))
            .await
            .is_err());
        assert_eq!(mailer.sent().len(), 1);
    }
}
