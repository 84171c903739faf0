//! Registration, sign-in, password recovery and role management

use crate::announcements::announce;
use crate::auth::{Principal, Session};
use crate::context::Context;
use crate::error::SaraError;
use crate::invitations::expire_if_due;
use crate::notify::Notifier;
use crate::paths;
use crate::repo;
use sara_domain::validation::normalize_email;
use sara_domain::{
    AnnouncementKind, Contract, ContractStatus, Invitation, InvitationStatus, NewAccount, Role,
    UserId, UserProfile, ValidationErrors,
};
use sara_store::{Query, WriteBatch};
use serde::Serialize;
use std::sync::Arc;

/// Result of a sign-in
#[derive(Debug, Clone, Serialize)]
pub struct SignedIn {
    /// Bearer token
    pub session: Session,
    /// Profile of the signed-in user
    pub profile: UserProfile,
}

/// Result of a registration
#[derive(Debug, Clone, Serialize)]
pub struct Registered {
    /// New profile
    pub profile: UserProfile,
    /// Contracts linked from accepted invitations
    pub linked_contracts: Vec<sara_domain::ContractId>,
}

/// Account service
#[derive(Debug, Clone)]
pub struct AccountService {
    ctx: Arc<Context>,
}

impl AccountService {
    pub(crate) fn new(ctx: Arc<Context>) -> Self {
        Self { ctx }
    }

    /// Resolve a bearer token into a principal
    ///
    /// An admin claim wins over the profile role. A token without a profile
    /// is rejected.
    ///
    /// # Errors
    /// `Unauthenticated` for bad tokens or missing profiles
    pub async fn principal(&self, token: &str) -> Result<Principal, SaraError> {
        let uid = self.ctx.identity.verify_token(token).await?;
        if self.ctx.identity.role_claim(&uid).await? == Some(Role::Admin) {
            return Ok(Principal { uid, role: Role::Admin });
        }
        match self.ctx.profile(&uid).await? {
            Some(profile) => Ok(Principal {
                uid,
                role: profile.value.role,
            }),
            None => Err(SaraError::Unauthenticated("no profile for this account".into())),
        }
    }

    /// Create credentials and profile
    ///
    /// Pending, unexpired invitations for the email are accepted in the same
    /// batch and the invited contracts get the new tenant linked.
    ///
    /// # Errors
    /// `Validation` for bad input, `Conflict` when the email is taken
    pub async fn register(&self, account: NewAccount) -> Result<Registered, SaraError> {
        let rut = account.validate()?;
        let email = normalize_email(&account.email);
        let uid = self.ctx.identity.create_user(&email, &account.password).await?;
        match self.write_profile(&uid, &email, &account, rut).await {
            Ok(registered) => {
                tracing::info!(uid = %uid, role = %registered.profile.role, linked = registered.linked_contracts.len(), "Account registered");
                Ok(registered)
            }
            Err(e) => {
                tracing::error!(uid = %uid, error = %e, "Profile write failed, removing credentials");
                if let Err(undo) = self.ctx.identity.delete_user(&uid).await {
                    tracing::error!(uid = %uid, error = %undo, "Could not remove orphaned credentials");
                }
                Err(e)
            }
        }
    }

    async fn write_profile(
        &self,
        uid: &UserId,
        email: &str,
        account: &NewAccount,
        rut: Option<sara_domain::Rut>,
    ) -> Result<Registered, SaraError> {
        let now = self.ctx.now();
        let profile = UserProfile {
            id: uid.clone(),
            email: email.to_string(),
            name: sara_domain::text::squash_whitespace(&account.name),
            rut,
            phone: account.phone.clone().filter(|p| !p.trim().is_empty()),
            role: account.role,
            created_at: now,
        };
        let mut batch = WriteBatch::new();
        batch.create(paths::user(uid)?, &profile)?;

        let mut linked = Vec::new();
        if profile.role == Role::Inquilino {
            let query = Query::collection(paths::INVITATIONS)
                .where_eq("email", email)
                .where_eq("status", InvitationStatus::Enviada.as_str());
            for mut invitation in repo::find::<Invitation>(self.ctx.store(), &query).await? {
                if expire_if_due(&mut batch, &mut invitation, now)? {
                    continue;
                }
                let path = paths::invitation(invitation.value.id);
                let mut value = invitation.value;
                let contract_path = paths::contract(value.contract_id);
                let Some(contract) = repo::load::<Contract>(self.ctx.store(), &contract_path).await? else {
                    continue;
                };
                let mut c = contract.value;
                if c.status != ContractStatus::Pendiente || c.tenant_id.is_some() {
                    continue;
                }
                c.tenant_id = Some(uid.clone());
                c.tenant_name = Some(profile.name.clone());
                c.updated_at = now;
                batch.set_if(contract_path, &c, contract.revision)?;
                value.status = InvitationStatus::Aceptada;
                batch.set_if(path, &value, invitation.revision)?;
                announce(
                    &mut batch,
                    uid,
                    AnnouncementKind::Contract,
                    "Contrato pendiente de revisión",
                    format!(
                        "{} te envió un contrato para {}. Revísalo para aprobarlo o dejar observaciones.",
                        c.landlord_name, c.property_name
                    ),
                    Some(c.id.to_string()),
                    now,
                )?;
                announce(
                    &mut batch,
                    &c.landlord_id,
                    AnnouncementKind::Contract,
                    "Invitación aceptada",
                    format!("{} creó su cuenta y puede revisar el contrato de {}.", profile.name, c.property_name),
                    Some(c.id.to_string()),
                    now,
                )?;
                linked.push(c.id);
            }
        }
        self.ctx.store.commit(batch).await?;
        Ok(Registered {
            profile,
            linked_contracts: linked,
        })
    }

    /// Sign in with email and password
    ///
    /// # Errors
    /// `Unauthenticated` on bad credentials or missing profile
    pub async fn login(&self, email: &str, password: &str) -> Result<SignedIn, SaraError> {
        let session = self.ctx.identity.sign_in(email, password).await?;
        let profile = self
            .ctx
            .profile(&session.uid)
            .await?
            .ok_or_else(|| SaraError::Unauthenticated("no profile for this account".into()))?
            .value;
        Ok(SignedIn { session, profile })
    }

    /// Invalidate a token
    ///
    /// # Errors
    /// Identity backend failures
    pub async fn logout(&self, token: &str) -> Result<(), SaraError> {
        self.ctx.identity.sign_out(token).await
    }

    /// Profile of the caller
    ///
    /// # Errors
    /// `NotFound` when the profile is missing
    pub async fn me(&self, principal: &Principal) -> Result<UserProfile, SaraError> {
        let mut profile = self.ctx.require_profile(&principal.uid).await?;
        profile.role = principal.role;
        Ok(profile)
    }

    /// Send a password reset email
    ///
    /// Unknown addresses succeed without sending anything so the endpoint
    /// cannot be used to probe for accounts.
    ///
    /// # Errors
    /// `Validation` for malformed addresses, `Mail` when delivery fails
    pub async fn request_password_reset(&self, email: &str) -> Result<(), SaraError> {
        let mut errors = ValidationErrors::new();
        errors.email("email", email);
        errors.into_result()?;
        let email = normalize_email(email);
        let continue_url = self.ctx.config.app.link("restablecer-clave");
        let Some(link) = self.ctx.identity.password_reset_link(&email, &continue_url).await? else {
            tracing::debug!("Password reset requested for unknown email");
            return Ok(());
        };
        let name = match self.ctx.identity.user_by_email(&email).await? {
            Some(uid) => self.ctx.profile(&uid).await?.map(|p| p.value.name),
            None => None,
        };
        Notifier::new(Arc::clone(&self.ctx))
            .password_reset(&email, name.as_deref(), &link)
            .await?;
        tracing::info!("Password reset email sent");
        Ok(())
    }

    /// Redeem a reset code
    ///
    /// # Errors
    /// `Unauthenticated` for unknown or expired codes, `Validation` for weak passwords
    pub async fn confirm_password_reset(&self, code: &str, new_password: &str) -> Result<(), SaraError> {
        self.ctx.identity.confirm_password_reset(code, new_password).await
    }

    /// Change a user's role (admin only)
    ///
    /// # Errors
    /// `Forbidden` for non-admins, `NotFound` for unknown users
    pub async fn grant_role(&self, admin: &Principal, uid: &UserId, role: Role) -> Result<UserProfile, SaraError> {
        admin.require_admin("grant roles")?;
        let path = paths::user(uid)?;
        let current = repo::require::<UserProfile>(self.ctx.store(), &path, "user").await?;
        let claim = (role == Role::Admin).then_some(Role::Admin);
        self.ctx.identity.set_role_claim(uid, claim).await?;
        let mut profile = current.value;
        profile.role = role;
        let mut batch = WriteBatch::new();
        batch.set_if(path, &profile, current.revision)?;
        self.ctx.store.commit(batch).await?;
        tracing::info!(admin = %admin.uid, uid = %uid, role = %role, "Role granted");
        Ok(profile)
    }

    /// Any user's profile (admins, or the user)
    ///
    /// # Errors
    /// `NotFound` when hidden or missing
    pub async fn profile(&self, principal: &Principal, uid: &UserId) -> Result<UserProfile, SaraError> {
        if !principal.is_self_or_admin(uid) {
            return Err(SaraError::not_found("user", uid));
        }
        self.ctx.require_profile(uid).await
    }
}

