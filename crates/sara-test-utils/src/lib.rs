//! Testing utilities for the SARA workspace
//!
//! Shared fixtures plus [`TestApp`], a fully in-memory application with a
//! settable clock and a recording mailer.

#![allow(missing_docs)]
#![allow(clippy::missing_panics_doc)]

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use sara_core::{FixedClock, Principal, Sara, SaraConfig};
use sara_domain::{
    Clp, Contract, NewAccount, NewContract, NewProperty, Property, PropertyKind, Role,
};
use sara_mail::{Mailer, RecordingMailer};
use sara_store::{MemoryBlobStore, MemoryStore};
use std::sync::Arc;

pub const PASSWORD: &str = "clave-segura-1";

/// Noon, 1 March 2024 UTC
#[must_use]
pub fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
}

#[must_use]
pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Defaults with cheap password hashing
#[must_use]
pub fn test_config() -> SaraConfig {
    let mut config = SaraConfig::default();
    config.auth.hash_rounds = 2;
    config.app.base_url = "https://sara.test".into();
    config
}

#[must_use]
pub fn new_account(email: &str, name: &str, role: Role) -> NewAccount {
    NewAccount {
        email: email.into(),
        password: PASSWORD.into(),
        name: name.into(),
        rut: None,
        phone: None,
        role,
    }
}

#[must_use]
pub fn new_property(name: &str) -> NewProperty {
    NewProperty {
        name: name.into(),
        address: "Av. Providencia 1234, depto 56".into(),
        commune: "Providencia".into(),
        region: "Metropolitana".into(),
        kind: PropertyKind::Departamento,
        bedrooms: 2,
        bathrooms: 1,
        area_m2: 55,
        rent: Clp(450_000),
        description: "Departamento luminoso cerca del metro".into(),
    }
}

/// One-year lease from 1 April 2024, rent due on the 5th
#[must_use]
pub fn new_contract(property: &Property, tenant_email: &str) -> NewContract {
    NewContract {
        property_id: property.id,
        tenant_email: tenant_email.into(),
        rent: Clp(450_000),
        deposit: Clp(450_000),
        start_date: date(2024, 4, 1),
        end_date: date(2025, 3, 31),
        payment_day: 5,
        terms: "Arriendo mensual, gastos comunes incluidos".into(),
    }
}

/// In-memory application
pub struct TestApp {
    pub sara: Sara,
    pub store: Arc<MemoryStore>,
    pub blobs: Arc<MemoryBlobStore>,
    pub mailer: Arc<RecordingMailer>,
    pub clock: Arc<FixedClock>,
}

impl Default for TestApp {
    fn default() -> Self {
        Self::new()
    }
}

impl TestApp {
    #[must_use]
    pub fn new() -> Self {
        let mailer = Arc::new(RecordingMailer::new());
        let mut app = Self::with_mailer(Arc::clone(&mailer) as Arc<dyn Mailer>);
        app.mailer = mailer;
        app
    }

    /// App sending mail through `mailer`; [`TestApp::mailer`] then stays empty
    #[must_use]
    pub fn with_mailer(mailer: Arc<dyn Mailer>) -> Self {
        Self::build(test_config(), mailer)
    }

    #[must_use]
    pub fn with_config(config: SaraConfig) -> Self {
        let mailer = Arc::new(RecordingMailer::new());
        let mut app = Self::build(config, Arc::clone(&mailer) as Arc<dyn Mailer>);
        app.mailer = mailer;
        app
    }

    fn build(config: SaraConfig, mailer: Arc<dyn Mailer>) -> Self {
        let store = Arc::new(MemoryStore::new());
        let blobs = Arc::new(MemoryBlobStore::new().with_max_bytes(config.limits.max_upload_bytes));
        let clock = Arc::new(FixedClock::new(epoch()));
        let sara = Sara::builder(config)
            .with_store(Arc::clone(&store) as _)
            .with_blobs(Arc::clone(&blobs) as _)
            .with_mailer(mailer)
            .with_clock(Arc::clone(&clock) as _)
            .build();
        Self {
            sara,
            store,
            blobs,
            mailer: Arc::new(RecordingMailer::new()),
            clock,
        }
    }

    /// Register, sign in and resolve the principal
    pub async fn user(&self, email: &str, name: &str, role: Role) -> Principal {
        self.sara
            .accounts()
            .register(new_account(email, name, role))
            .await
            .expect("register");
        let signed = self.sara.accounts().login(email, PASSWORD).await.expect("login");
        self.sara
            .accounts()
            .principal(&signed.session.token)
            .await
            .expect("principal")
    }

    pub async fn landlord(&self) -> Principal {
        self.user("ana.arrendadora@example.cl", "Ana Arrendadora", Role::Arrendador).await
    }

    pub async fn tenant(&self) -> Principal {
        self.user("tomas.inquilino@example.cl", "Tomás Inquilino", Role::Inquilino).await
    }

    #[must_use]
    pub fn admin() -> Principal {
        Principal::new("admin-1", Role::Admin)
    }

    pub async fn property(&self, owner: &Principal, name: &str) -> Property {
        self.sara
            .properties()
            .create(owner, new_property(name))
            .await
            .expect("create property")
    }

    /// Pending contract offered to `tenant_email`
    pub async fn contract(&self, landlord: &Principal, property: &Property, tenant_email: &str) -> Contract {
        self.sara
            .contracts()
            .create(landlord, new_contract(property, tenant_email))
            .await
            .expect("create contract")
            .contract
    }

    /// Landlord, tenant, and an approved contract between them
    pub async fn active_contract(&self) -> (Principal, Principal, Contract) {
        let landlord = self.landlord().await;
        let tenant = self.tenant().await;
        let property = self.property(&landlord, "Depto Providencia").await;
        let contract = self.contract(&landlord, &property, "tomas.inquilino@example.cl").await;
        let contract = self
            .sara
            .contracts()
            .approve(&tenant, contract.id)
            .await
            .expect("approve");
        (landlord, tenant, contract)
    }
}
