//! S.A.R.A. services
//!
//! The rental-management use cases: accounts and roles, properties and bulk
//! import, the contract workflow with invitations and observations, payment
//! declarations, incidents, evaluations, tenant certificates, the payment
//! calendar, announcements and file uploads.
//!
//! [`Sara`] wires a document store, a blob store, a mailer, an identity
//! provider and a clock into one shared [`Context`] and hands out the
//! services that operate on it.
//!
//! # Example
//!
//! ```rust,ignore
//! use sara_core::{Sara, SaraConfig};
//!
//! # async fn example() -> Result<(), sara_core::SaraError> {
//! let sara = Sara::from_config(SaraConfig::load(None)?).await?;
//! let principal = sara.accounts().principal("bearer-token").await?;
//! let contracts = sara.contracts().list_for(&principal).await?;
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]

pub mod accounts;
pub mod announcements;
pub mod auth;
pub mod bulk_upload;
pub mod calendar;
pub mod certificate;
pub mod clock;
pub mod config;
pub mod context;
pub mod contracts;
pub mod error;
pub mod evaluations;
pub mod files;
pub mod incidents;
pub mod invitations;
pub mod notify;
pub mod paths;
pub mod payments;
pub mod properties;
mod repo;

pub use accounts::{AccountService, Registered, SignedIn};
pub use announcements::AnnouncementService;
pub use auth::{IdentityProvider, LocalIdentity, Principal, Session};
pub use bulk_upload::{BulkReport, BulkUploadService, RowError};
pub use calendar::{CalendarEvent, CalendarService, EventKind};
pub use certificate::{CertificateCache, CertificateService, Classification, TenantCertificate};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::SaraConfig;
pub use context::Context;
pub use contracts::{ContractCreated, ContractService};
pub use error::SaraError;
pub use evaluations::EvaluationService;
pub use files::{FileService, Upload};
pub use incidents::IncidentService;
pub use invitations::{InvitationService, Invited};
pub use notify::{Delivery, Notifier};
pub use payments::PaymentService;
pub use properties::PropertyService;

use sara_mail::{HttpMailer, Mailer, RecordingMailer};
use sara_store::{BlobStore, DocumentStore, FsBlobStore, MemoryBlobStore, MemoryStore};
use std::sync::Arc;
use std::time::Duration;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application facade
#[derive(Debug, Clone)]
pub struct Sara {
    ctx: Arc<Context>,
}

impl Sara {
    /// Builder with in-memory defaults for every backend
    #[inline]
    #[must_use]
    pub fn builder(config: SaraConfig) -> SaraBuilder {
        SaraBuilder {
            config,
            store: None,
            blobs: None,
            mailer: None,
            identity: None,
            clock: None,
        }
    }

    /// Production wiring from configuration
    ///
    /// Documents go to a snapshot-backed [`MemoryStore`] when
    /// `store.snapshot_path` is set, blobs to the filesystem, mail to the
    /// HTTP provider when an API key is configured.
    ///
    /// # Errors
    /// `Config` for invalid settings, `Store` when the snapshot cannot be loaded
    pub async fn from_config(config: SaraConfig) -> Result<Self, SaraError> {
        config.validate()?;
        let store: Arc<dyn DocumentStore> = match &config.store.snapshot_path {
            Some(path) => Arc::new(MemoryStore::with_snapshot(path.clone()).await?),
            None => {
                tracing::warn!("No snapshot path configured, documents are kept in memory only");
                Arc::new(MemoryStore::new())
            }
        };
        let blobs = FsBlobStore::new(&config.store.blob_root, config.store.blob_base_url.clone())
            .with_max_bytes(config.limits.max_upload_bytes);
        let mailer: Arc<dyn Mailer> = if config.mail.api_key.is_some() {
            Arc::new(HttpMailer::new(config.mail.clone())?)
        } else {
            tracing::warn!("No mail API key configured, outgoing email is recorded but not sent");
            Arc::new(RecordingMailer::new())
        };
        tracing::info!(
            bind = %config.server.bind,
            blob_root = %config.store.blob_root.display(),
            "Services configured"
        );
        Ok(Self::builder(config)
            .with_store(store)
            .with_blobs(Arc::new(blobs))
            .with_mailer(mailer)
            .build())
    }

    /// Shared context
    #[must_use]
    pub fn context(&self) -> &Arc<Context> {
        &self.ctx
    }

    /// Configuration
    #[must_use]
    pub fn config(&self) -> &SaraConfig {
        &self.ctx.config
    }

    /// Accounts, sessions and roles
    #[must_use]
    pub fn accounts(&self) -> AccountService {
        AccountService::new(Arc::clone(&self.ctx))
    }

    /// Properties
    #[must_use]
    pub fn properties(&self) -> PropertyService {
        PropertyService::new(Arc::clone(&self.ctx))
    }

    /// CSV property import
    #[must_use]
    pub fn bulk_upload(&self) -> BulkUploadService {
        BulkUploadService::new(Arc::clone(&self.ctx))
    }

    /// Contract workflow
    #[must_use]
    pub fn contracts(&self) -> ContractService {
        ContractService::new(Arc::clone(&self.ctx))
    }

    /// Tenant invitations
    #[must_use]
    pub fn invitations(&self) -> InvitationService {
        InvitationService::new(Arc::clone(&self.ctx))
    }

    /// Rent payments
    #[must_use]
    pub fn payments(&self) -> PaymentService {
        PaymentService::new(Arc::clone(&self.ctx))
    }

    /// Incidents
    #[must_use]
    pub fn incidents(&self) -> IncidentService {
        IncidentService::new(Arc::clone(&self.ctx))
    }

    /// Tenant evaluations
    #[must_use]
    pub fn evaluations(&self) -> EvaluationService {
        EvaluationService::new(Arc::clone(&self.ctx))
    }

    /// Tenant certificates
    #[must_use]
    pub fn certificates(&self) -> CertificateService {
        CertificateService::new(Arc::clone(&self.ctx))
    }

    /// Payment calendar
    #[must_use]
    pub fn calendar(&self) -> CalendarService {
        CalendarService::new(Arc::clone(&self.ctx))
    }

    /// Announcement inbox
    #[must_use]
    pub fn announcements(&self) -> AnnouncementService {
        AnnouncementService::new(Arc::clone(&self.ctx))
    }

    /// User files
    #[must_use]
    pub fn files(&self) -> FileService {
        FileService::new(Arc::clone(&self.ctx))
    }

    /// Email delivery
    #[must_use]
    pub fn notifier(&self) -> Notifier {
        Notifier::new(Arc::clone(&self.ctx))
    }
}

/// Builder for [`Sara`]
#[derive(Debug)]
pub struct SaraBuilder {
    config: SaraConfig,
    store: Option<Arc<dyn DocumentStore>>,
    blobs: Option<Arc<dyn BlobStore>>,
    mailer: Option<Arc<dyn Mailer>>,
    identity: Option<Arc<dyn IdentityProvider>>,
    clock: Option<Arc<dyn Clock>>,
}

impl SaraBuilder {
    /// Document store
    #[inline]
    #[must_use]
    pub fn with_store(mut self, store: Arc<dyn DocumentStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Blob store
    #[inline]
    #[must_use]
    pub fn with_blobs(mut self, blobs: Arc<dyn BlobStore>) -> Self {
        self.blobs = Some(blobs);
        self
    }

    /// Mailer
    #[inline]
    #[must_use]
    pub fn with_mailer(mut self, mailer: Arc<dyn Mailer>) -> Self {
        self.mailer = Some(mailer);
        self
    }

    /// Identity provider (defaults to [`LocalIdentity`] over the store)
    #[inline]
    #[must_use]
    pub fn with_identity(mut self, identity: Arc<dyn IdentityProvider>) -> Self {
        self.identity = Some(identity);
        self
    }

    /// Clock
    #[inline]
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Assemble the context
    #[must_use]
    pub fn build(self) -> Sara {
        let store = self.store.unwrap_or_else(|| Arc::new(MemoryStore::new()));
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let identity = self.identity.unwrap_or_else(|| {
            Arc::new(LocalIdentity::new(
                Arc::clone(&store),
                Arc::clone(&clock),
                self.config.auth.clone(),
            ))
        });
        let blobs = self.blobs.unwrap_or_else(|| {
            Arc::new(MemoryBlobStore::new().with_max_bytes(self.config.limits.max_upload_bytes))
        });
        let certificates = CertificateCache::new(Duration::from_secs(self.config.limits.certificate_cache_ttl_secs));
        Sara {
            ctx: Arc::new(Context {
                config: self.config,
                store,
                blobs,
                mailer: self.mailer.unwrap_or_else(|| Arc::new(RecordingMailer::new())),
                identity,
                clock,
                certificates,
            }),
        }
    }
}
