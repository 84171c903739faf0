//! Shared service state

use crate::auth::IdentityProvider;
use crate::certificate::CertificateCache;
use crate::clock::Clock;
use crate::config::SaraConfig;
use crate::error::SaraError;
use crate::paths;
use crate::repo;
use chrono::{DateTime, NaiveDate, Utc};
use sara_domain::{UserId, UserProfile};
use sara_mail::Mailer;
use sara_store::{BlobStore, DocumentStore, Versioned};
use std::sync::Arc;

/// Everything a service needs, shared behind one `Arc`
#[derive(Debug)]
pub struct Context {
    pub(crate) config: SaraConfig,
    pub(crate) store: Arc<dyn DocumentStore>,
    pub(crate) blobs: Arc<dyn BlobStore>,
    pub(crate) mailer: Arc<dyn Mailer>,
    pub(crate) identity: Arc<dyn IdentityProvider>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) certificates: CertificateCache,
}

impl Context {
    /// Configuration
    #[must_use]
    pub fn config(&self) -> &SaraConfig {
        &self.config
    }

    /// Document store
    #[must_use]
    pub fn store(&self) -> &dyn DocumentStore {
        self.store.as_ref()
    }

    /// Current instant
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Current date
    #[must_use]
    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    pub(crate) async fn profile(&self, uid: &UserId) -> Result<Option<Versioned<UserProfile>>, SaraError> {
        repo::load(self.store(), &paths::user(uid)?).await
    }

    pub(crate) async fn require_profile(&self, uid: &UserId) -> Result<UserProfile, SaraError> {
        Ok(repo::require(self.store(), &paths::user(uid)?, "user").await?.value)
    }
}
