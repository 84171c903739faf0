//! Runtime configuration
//!
//! Loaded in three layers: built-in defaults, an optional TOML file, then
//! `SARA_*` environment variables. [`SaraConfig::validate`] runs last.

use crate::error::SaraError;
use sara_mail::MailConfig;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SaraConfig {
    /// Public application settings
    pub app: AppConfig,
    /// HTTP listener
    pub server: ServerConfig,
    /// Persistence
    pub store: StoreConfig,
    /// Email provider
    pub mail: MailConfig,
    /// Credentials and sessions
    pub auth: AuthConfig,
    /// Size and time limits
    pub limits: LimitsConfig,
}

/// Public application settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Front-end base URL used in email links
    pub base_url: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5173".into(),
        }
    }
}

impl AppConfig {
    /// Absolute front-end link for `path`
    #[must_use]
    pub fn link(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

/// HTTP listener settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address
    pub bind: String,
    /// Largest accepted JSON body
    pub max_json_bytes: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8080".into(),
            max_json_bytes: 256 * 1024,
        }
    }
}

/// Persistence settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// JSON snapshot of the document store; volatile when unset
    pub snapshot_path: Option<PathBuf>,
    /// Blob directory
    pub blob_root: PathBuf,
    /// Public URL prefix for blobs
    pub blob_base_url: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            snapshot_path: None,
            blob_root: PathBuf::from("data/blobs"),
            blob_base_url: "http://127.0.0.1:8080/blobs".into(),
        }
    }
}

/// Credential settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Bearer token lifetime
    pub session_ttl_hours: u32,
    /// Password reset code lifetime
    pub reset_code_ttl_minutes: u32,
    /// SHA-256 stretching rounds for password hashes
    pub hash_rounds: u32,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_ttl_hours: 24,
            reset_code_ttl_minutes: 60,
            hash_rounds: 10_000,
        }
    }
}

/// Size and time limits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Largest receipt, attachment, PDF or user file
    pub max_upload_bytes: u64,
    /// Largest bulk CSV import
    pub max_bulk_rows: usize,
    /// Days before an invitation expires
    pub invitation_ttl_days: u32,
    /// Rendered certificate cache lifetime
    pub certificate_cache_ttl_secs: u64,
    /// Attachments per incident
    pub max_incident_attachments: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_upload_bytes: 10 * 1024 * 1024,
            max_bulk_rows: 500,
            invitation_ttl_days: 7,
            certificate_cache_ttl_secs: 300,
            max_incident_attachments: 5,
        }
    }
}

impl SaraConfig {
    /// Defaults, then `path` (when given), then the process environment
    ///
    /// # Errors
    /// `Config` when the file cannot be read or parsed, or a variable is malformed
    pub fn load(path: Option<&Path>) -> Result<Self, SaraError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    /// Parse a TOML file
    ///
    /// # Errors
    /// `Config` on read or parse failure
    pub fn from_file(path: &Path) -> Result<Self, SaraError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| SaraError::Config(format!("cannot read {}: {e}", path.display())))?;
        Self::from_toml(&raw)
            .map_err(|e| SaraError::Config(format!("{}: {e}", path.display())))
    }

    /// Parse TOML text
    ///
    /// # Errors
    /// Message from the TOML parser
    pub fn from_toml(raw: &str) -> Result<Self, String> {
        toml::from_str(raw).map_err(|e| e.to_string())
    }

    /// Apply `SARA_*` overrides read through `lookup`
    ///
    /// # Errors
    /// `Config` when a numeric variable does not parse
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<(), SaraError> {
        fn number<T: std::str::FromStr>(name: &str, raw: &str) -> Result<T, SaraError> {
            raw.trim()
                .parse()
                .map_err(|_| SaraError::Config(format!("{name} must be a number, got {raw:?}")))
        }

        if let Some(v) = lookup("SARA_BIND") {
            self.server.bind = v;
        }
        if let Some(v) = lookup("SARA_BASE_URL") {
            self.app.base_url = v;
        }
        if let Some(v) = lookup("SARA_SNAPSHOT_PATH") {
            self.store.snapshot_path = (!v.is_empty()).then(|| PathBuf::from(v));
        }
        if let Some(v) = lookup("SARA_BLOB_ROOT") {
            self.store.blob_root = PathBuf::from(v);
        }
        if let Some(v) = lookup("SARA_BLOB_BASE_URL") {
            self.store.blob_base_url = v;
        }
        if let Some(v) = lookup("SARA_MAIL_API_URL") {
            self.mail.api_url = v;
        }
        if let Some(v) = lookup("SARA_MAIL_API_KEY") {
            self.mail.api_key = (!v.is_empty()).then_some(v);
        }
        if let Some(v) = lookup("SARA_MAIL_FROM") {
            self.mail.from_address = v;
        }
        if let Some(v) = lookup("SARA_MAX_UPLOAD_BYTES") {
            self.limits.max_upload_bytes = number("SARA_MAX_UPLOAD_BYTES", &v)?;
        }
        if let Some(v) = lookup("SARA_MAX_BULK_ROWS") {
            self.limits.max_bulk_rows = number("SARA_MAX_BULK_ROWS", &v)?;
        }
        if let Some(v) = lookup("SARA_INVITATION_TTL_DAYS") {
            self.limits.invitation_ttl_days = number("SARA_INVITATION_TTL_DAYS", &v)?;
        }
        Ok(())
    }

    /// Check every section
    ///
    /// # Errors
    /// `Config` naming the first offending setting
    pub fn validate(&self) -> Result<(), SaraError> {
        self.bind_addr()?;
        for (name, url) in [
            ("app.base_url", &self.app.base_url),
            ("store.blob_base_url", &self.store.blob_base_url),
        ] {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(SaraError::Config(format!("{name} must be an http(s) URL")));
            }
        }
        self.mail
            .validate()
            .map_err(|e| SaraError::Config(e.to_string()))?;
        let positive = [
            ("auth.session_ttl_hours", u64::from(self.auth.session_ttl_hours)),
            ("auth.reset_code_ttl_minutes", u64::from(self.auth.reset_code_ttl_minutes)),
            ("auth.hash_rounds", u64::from(self.auth.hash_rounds)),
            ("limits.max_upload_bytes", self.limits.max_upload_bytes),
            ("limits.max_bulk_rows", self.limits.max_bulk_rows as u64),
            ("limits.invitation_ttl_days", u64::from(self.limits.invitation_ttl_days)),
            ("server.max_json_bytes", self.server.max_json_bytes),
        ];
        if let Some((name, _)) = positive.iter().find(|(_, v)| *v == 0) {
            return Err(SaraError::Config(format!("{name} must be greater than zero")));
        }
        Ok(())
    }

    /// Parsed listen address
    ///
    /// # Errors
    /// `Config` when `server.bind` is not `host:port`
    pub fn bind_addr(&self) -> Result<SocketAddr, SaraError> {
        self.server
            .bind
            .parse()
            .map_err(|_| SaraError::Config(format!("server.bind is not an address: {:?}", self.server.bind)))
    }
}
