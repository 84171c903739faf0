//! Identity and principals
//!
//! [`IdentityProvider`] owns credentials, bearer tokens and password-reset
//! codes. [`LocalIdentity`] keeps credentials in the document store and
//! tokens in memory. A [`Principal`] is the authenticated caller with the
//! role that governs what the services let it do.

use crate::clock::Clock;
use crate::config::AuthConfig;
use crate::error::SaraError;
use crate::paths;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use sara_domain::validation::normalize_email;
use sara_domain::{Role, UserId};
use sara_store::{DocPath, DocumentStore, Precondition, WriteBatch};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt::Debug;
use std::sync::Arc;

/// Authenticated caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    /// User id
    pub uid: UserId,
    /// Effective role
    pub role: Role,
}

impl Principal {
    /// New principal
    #[must_use]
    pub fn new(uid: impl Into<String>, role: Role) -> Self {
        Self {
            uid: UserId::new(uid),
            role,
        }
    }

    /// Whether the caller is an admin
    #[inline]
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Whether the caller is `uid` or an admin
    #[must_use]
    pub fn is_self_or_admin(&self, uid: &UserId) -> bool {
        self.is_admin() || self.uid == *uid
    }

    /// Require one of `roles` (admins always pass)
    ///
    /// # Errors
    /// `Forbidden` for any other role
    pub fn require(&self, roles: &[Role], action: &str) -> Result<(), SaraError> {
        if self.is_admin() || roles.contains(&self.role) {
            Ok(())
        } else {
            tracing::warn!(uid = %self.uid, role = %self.role, action, "Role not allowed");
            Err(SaraError::Forbidden(format!("{} cannot {action}", self.role)))
        }
    }

    /// Require the admin role
    ///
    /// # Errors
    /// `Forbidden` for non-admins
    pub fn require_admin(&self, action: &str) -> Result<(), SaraError> {
        self.require(&[], action)
    }
}

/// Issued bearer token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Opaque token
    pub token: String,
    /// Owner
    pub uid: UserId,
    /// Expiry
    pub expires_at: DateTime<Utc>,
}

/// Credential backend
#[async_trait]
pub trait IdentityProvider: Send + Sync + Debug {
    /// Register credentials; fails with `Conflict` when the email is taken
    async fn create_user(&self, email: &str, password: &str) -> Result<UserId, SaraError>;

    /// Remove credentials (used to undo a failed registration)
    async fn delete_user(&self, uid: &UserId) -> Result<(), SaraError>;

    /// Check credentials and issue a token
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, SaraError>;

    /// Resolve a bearer token
    async fn verify_token(&self, token: &str) -> Result<UserId, SaraError>;

    /// Drop a bearer token
    async fn sign_out(&self, token: &str) -> Result<(), SaraError>;

    /// Look up the uid registered for `email`
    async fn user_by_email(&self, email: &str) -> Result<Option<UserId>, SaraError>;

    /// Reset link for `email`, built on `continue_url`; `None` for unknown emails
    async fn password_reset_link(
        &self,
        email: &str,
        continue_url: &str,
    ) -> Result<Option<String>, SaraError>;

    /// Redeem a reset code
    async fn confirm_password_reset(&self, code: &str, new_password: &str) -> Result<(), SaraError>;

    /// Set or clear the role claim
    async fn set_role_claim(&self, uid: &UserId, role: Option<Role>) -> Result<(), SaraError>;

    /// Current role claim
    async fn role_claim(&self, uid: &UserId) -> Result<Option<Role>, SaraError>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Credential {
    uid: UserId,
    email: String,
    salt: String,
    hash: String,
    role_claim: Option<Role>,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct EmailIndex {
    uid: UserId,
}

#[derive(Debug, Clone)]
struct Expiring {
    uid: UserId,
    expires_at: DateTime<Utc>,
}

/// Credentials in the document store, sessions and reset codes in memory
#[derive(Debug)]
pub struct LocalIdentity {
    store: Arc<dyn DocumentStore>,
    clock: Arc<dyn Clock>,
    config: AuthConfig,
    sessions: DashMap<String, Expiring>,
    reset_codes: DashMap<String, Expiring>,
}

impl LocalIdentity {
    /// New provider over `store`
    #[must_use]
    pub fn new(store: Arc<dyn DocumentStore>, clock: Arc<dyn Clock>, config: AuthConfig) -> Self {
        Self {
            store,
            clock,
            config,
            sessions: DashMap::new(),
            reset_codes: DashMap::new(),
        }
    }

    /// Salted, stretched SHA-256
    fn hash_password(&self, salt: &str, password: &str) -> String {
        let mut digest = Sha256::new()
            .chain_update(salt.as_bytes())
            .chain_update(password.as_bytes())
            .finalize();
        for _ in 1..self.config.hash_rounds {
            digest = Sha256::new()
                .chain_update(digest)
                .chain_update(salt.as_bytes())
                .finalize();
        }
        hex::encode(digest)
    }

    fn email_path(email: &str) -> Result<DocPath, SaraError> {
        let key = hex::encode(Sha256::digest(normalize_email(email).as_bytes()));
        Ok(DocPath::new(paths::CREDENTIAL_EMAILS, key)?)
    }

    fn credential_path(uid: &UserId) -> Result<DocPath, SaraError> {
        Ok(DocPath::new(paths::CREDENTIALS, uid.as_str())?)
    }

    async fn credential_by_email(&self, email: &str) -> Result<Option<(Credential, u64)>, SaraError> {
        let Some(index) = self.store.get(&Self::email_path(email)?).await? else {
            return Ok(None);
        };
        let index: EmailIndex = index.decode()?;
        self.credential(&index.uid).await
    }

    async fn credential(&self, uid: &UserId) -> Result<Option<(Credential, u64)>, SaraError> {
        match self.store.get(&Self::credential_path(uid)?).await? {
            Some(doc) => Ok(Some((doc.decode()?, doc.revision))),
            None => Ok(None),
        }
    }

    fn fresh_token() -> String {
        format!("{}{}", uuid::Uuid::new_v4().simple(), uuid::Uuid::new_v4().simple())
    }

    fn check_password(password: &str) -> Result<(), SaraError> {
        if password.chars().count() < sara_domain::user::MIN_PASSWORD_LEN {
            return Err(sara_domain::ValidationErrors::single(
                "password",
                format!(
                    "must have at least {} characters",
                    sara_domain::user::MIN_PASSWORD_LEN
                ),
            )
            .into());
        }
        Ok(())
    }
}

#[async_trait]
impl IdentityProvider for LocalIdentity {
    async fn create_user(&self, email: &str, password: &str) -> Result<UserId, SaraError> {
        Self::check_password(password)?;
        let uid = UserId::new(ulid::Ulid::new().to_string());
        let salt = uuid::Uuid::new_v4().simple().to_string();
        let credential = Credential {
            uid: uid.clone(),
            email: normalize_email(email),
            hash: self.hash_password(&salt, password),
            salt,
            role_claim: None,
            created_at: self.clock.now(),
        };
        let mut batch = WriteBatch::new();
        batch.create(Self::email_path(email)?, &EmailIndex { uid: uid.clone() })?;
        batch.create(Self::credential_path(&uid)?, &credential)?;
        match self.store.commit(batch).await {
            Ok(_) => Ok(uid),
            Err(e) if e.is_conflict() => Err(SaraError::Conflict(format!(
                "an account already exists for {}",
                normalize_email(email)
            ))),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete_user(&self, uid: &UserId) -> Result<(), SaraError> {
        let Some((credential, revision)) = self.credential(uid).await? else {
            return Ok(());
        };
        let mut batch = WriteBatch::new();
        batch.delete(Self::credential_path(uid)?, Precondition::Revision(revision));
        batch.delete(Self::email_path(&credential.email)?, Precondition::None);
        self.store.commit(batch).await?;
        self.sessions.retain(|_, s| s.uid != *uid);
        Ok(())
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, SaraError> {
        let rejected = || SaraError::Unauthenticated("invalid email or password".into());
        let (credential, _) = self.credential_by_email(email).await?.ok_or_else(rejected)?;
        if !digests_match(&self.hash_password(&credential.salt, password), &credential.hash) {
            tracing::warn!(uid = %credential.uid, "Failed sign-in");
            return Err(rejected());
        }
        let now = self.clock.now();
        let session = Session {
            token: Self::fresh_token(),
            uid: credential.uid,
            expires_at: now + Duration::hours(i64::from(self.config.session_ttl_hours)),
        };
        self.sessions.retain(|_, s| s.expires_at > now);
        self.sessions.insert(
            session.token.clone(),
            Expiring {
                uid: session.uid.clone(),
                expires_at: session.expires_at,
            },
        );
        tracing::info!(uid = %session.uid, "Signed in");
        Ok(session)
    }

    async fn verify_token(&self, token: &str) -> Result<UserId, SaraError> {
        let now = self.clock.now();
        let found = self
            .sessions
            .get(token)
            .map(|s| (s.uid.clone(), s.expires_at));
        match found {
            Some((uid, expires_at)) if expires_at > now => Ok(uid),
            Some(_) => {
                self.sessions.remove(token);
                Err(SaraError::Unauthenticated("token expired".into()))
            }
            None => Err(SaraError::Unauthenticated("invalid token".into())),
        }
    }

    async fn sign_out(&self, token: &str) -> Result<(), SaraError> {
        self.sessions.remove(token);
        Ok(())
    }

    async fn user_by_email(&self, email: &str) -> Result<Option<UserId>, SaraError> {
        Ok(self.credential_by_email(email).await?.map(|(c, _)| c.uid))
    }

    async fn password_reset_link(
        &self,
        email: &str,
        continue_url: &str,
    ) -> Result<Option<String>, SaraError> {
        let Some((credential, _)) = self.credential_by_email(email).await? else {
            return Ok(None);
        };
        let code = Self::fresh_token();
        let expires_at =
            self.clock.now() + Duration::minutes(i64::from(self.config.reset_code_ttl_minutes));
        self.reset_codes.retain(|_, r| r.uid != credential.uid);
        self.reset_codes.insert(
            code.clone(),
            Expiring {
                uid: credential.uid,
                expires_at,
            },
        );
        let separator = if continue_url.contains('?') { '&' } else { '?' };
        Ok(Some(format!("{continue_url}{separator}code={code}")))
    }

    async fn confirm_password_reset(&self, code: &str, new_password: &str) -> Result<(), SaraError> {
        Self::check_password(new_password)?;
        let invalid = || SaraError::Unauthenticated("invalid or expired reset code".into());
        let (_, entry) = self.reset_codes.remove(code).ok_or_else(invalid)?;
        if entry.expires_at <= self.clock.now() {
            return Err(invalid());
        }
        let (mut credential, revision) = self.credential(&entry.uid).await?.ok_or_else(invalid)?;
        credential.salt = uuid::Uuid::new_v4().simple().to_string();
        credential.hash = self.hash_password(&credential.salt, new_password);
        let mut batch = WriteBatch::new();
        batch.set_if(Self::credential_path(&entry.uid)?, &credential, revision)?;
        self.store.commit(batch).await?;
        self.sessions.retain(|_, s| s.uid != entry.uid);
        tracing::info!(uid = %entry.uid, "Password reset");
        Ok(())
    }

    async fn set_role_claim(&self, uid: &UserId, role: Option<Role>) -> Result<(), SaraError> {
        let (mut credential, revision) = self
            .credential(uid)
            .await?
            .ok_or_else(|| SaraError::not_found("user", uid))?;
        credential.role_claim = role;
        let mut batch = WriteBatch::new();
        batch.set_if(Self::credential_path(uid)?, &credential, revision)?;
        self.store.commit(batch).await?;
        Ok(())
    }

    async fn role_claim(&self, uid: &UserId) -> Result<Option<Role>, SaraError> {
        Ok(self.credential(uid).await?.and_then(|(c, _)| c.role_claim))
    }
}

/// Compare two hex digests without stopping at the first difference
fn digests_match(a: &str, b: &str) -> bool {
    a.len() == b.len()
        && a
            .bytes()
            .zip(b.bytes())
            .fold(0u8, |acc, (x, y)| acc | (x ^ y))
            == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_comparison() {
        assert!(digests_match("a1b2c3", "a1b2c3"));
        assert!(!digests_match("a1b2c3", "a1b2c4"));
        assert!(!digests_match("f1b2c3", "a1b2c3"));
        assert!(!digests_match("a1b2c3", "a1b2c"));
        assert!(digests_match("", ""));
    }
    use crate::clock::FixedClock;
    use sara_store::MemoryStore;

    fn identity() -> (LocalIdentity, Arc<FixedClock>) {
        let clock = Arc::new(FixedClock::new(Utc::now()));
        let config = AuthConfig {
            hash_rounds: 2,
            ..AuthConfig::default()
        };
        (
            LocalIdentity::new(Arc::new(MemoryStore::new()), clock.clone(), config),
            clock,
        )
    }

    #[tokio::test]
    async fn sign_in_round_trip() {
        let (id, _) = identity();
        let uid = id.create_user("Ana@Example.cl", "secreto123").await.unwrap();
        let session = id.sign_in("ana@example.cl", "secreto123").await.unwrap();
        assert_eq!(session.uid, uid);
        assert_eq!(id.verify_token(&session.token).await.unwrap(), uid);
        assert!(id.sign_in("ana@example.cl", "otra-clave").await.is_err());
        id.sign_out(&session.token).await.unwrap();
        assert!(id.verify_token(&session.token).await.is_err());
    }

    #[tokio::test]
    async fn duplicate_email_conflicts() {
        let (id, _) = identity();
        id.create_user("ana@example.cl", "secreto123").await.unwrap();
        let err = id.create_user(" ANA@example.cl", "secreto456").await.unwrap_err();
        assert!(matches!(err, SaraError::Conflict(_)));
    }

    #[tokio::test]
    async fn short_password_rejected() {
        let (id, _) = identity();
        assert!(matches!(
            id.create_user("ana@example.cl", "corta").await,
            Err(SaraError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn tokens_expire() {
        let (id, clock) = identity();
        id.create_user("ana@example.cl", "secreto123").await.unwrap();
        let session = id.sign_in("ana@example.cl", "secreto123").await.unwrap();
        clock.advance(Duration::hours(25));
        assert!(id.verify_token(&session.token).await.is_err());
    }

    #[tokio::test]
    async fn reset_code_single_use() {
        let (id, _) = identity();
        id.create_user("ana@example.cl", "secreto123").await.unwrap();
        let link = id
            .password_reset_link("ana@example.cl", "https://sara.cl/reset")
            .await
            .unwrap()
            .unwrap();
        let code = link.split("code=").nth(1).unwrap().to_string();
        id.confirm_password_reset(&code, "nueva-clave-1").await.unwrap();
        assert!(id.confirm_password_reset(&code, "nueva-clave-2").await.is_err());
        assert!(id.sign_in("ana@example.cl", "nueva-clave-1").await.is_ok());
        assert!(id.sign_in("ana@example.cl", "secreto123").await.is_err());
        assert!(id
            .password_reset_link("nadie@example.cl", "https://sara.cl/reset")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn reset_code_expires() {
        let (id, clock) = identity();
        id.create_user("ana@example.cl", "secreto123").await.unwrap();
        let link = id
            .password_reset_link("ana@example.cl", "https://sara.cl/reset?x=1")
            .await
            .unwrap()
            .unwrap();
        assert!(link.contains("?x=1&code="));
        let code = link.split("code=").nth(1).unwrap().to_string();
        clock.advance(Duration::minutes(61));
        assert!(id.confirm_password_reset(&code, "nueva-clave-1").await.is_err());
    }

    #[test]
    fn principal_roles() {
        let admin = Principal::new("a", Role::Admin);
        let tenant = Principal::new("t", Role::Inquilino);
        assert!(admin.require(&[Role::Arrendador], "create properties").is_ok());
        assert!(tenant.require(&[Role::Arrendador], "create properties").is_err());
        assert!(tenant.require_admin("grant roles").is_err());
        assert!(tenant.is_self_or_admin(&UserId::new("t")));
    }
}
