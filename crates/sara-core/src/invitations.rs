//! Invitations for tenants without an account
//!
//! An invitation links a pending contract to an email. Registration with
//! that email accepts it. Invitations past `limits.invitation_ttl_days` are
//! marked `Expirada` when next read.

use crate::auth::Principal;
use crate::context::Context;
use crate::error::SaraError;
use crate::notify::{Delivery, Notifier};
use crate::paths;
use crate::repo;
use chrono::{DateTime, Duration, Utc};
use sara_domain::validation::normalize_email;
use sara_domain::{
    Contract, ContractId, ContractStatus, Invitation, InvitationId, InvitationStatus, Role,
    ValidationErrors,
};
use sara_store::{Query, Versioned, WriteBatch};
use serde::Serialize;
use std::sync::Arc;

/// An invitation plus the outcome of its email
#[derive(Debug, Clone, Serialize)]
pub struct Invited {
    /// Stored invitation
    pub invitation: Invitation,
    /// Email outcome
    pub delivery: Delivery,
}

/// Fresh invitation for `contract`
pub(crate) fn new_invitation(contract: &Contract, email: &str, ttl_days: u32, now: DateTime<Utc>) -> Invitation {
    Invitation {
        id: InvitationId::new(),
        contract_id: contract.id,
        email: normalize_email(email),
        landlord_id: contract.landlord_id.clone(),
        landlord_name: contract.landlord_name.clone(),
        property_name: contract.property_name.clone(),
        status: InvitationStatus::Enviada,
        resent_count: 0,
        sent_at: now,
        expires_at: now + Duration::days(i64::from(ttl_days)),
        created_at: now,
    }
}

/// Mark an overdue invitation `Expirada`, staging the write in `batch`
///
/// Returns whether the invitation is (now) expired.
pub(crate) fn expire_if_due(
    batch: &mut WriteBatch,
    invitation: &mut Versioned<Invitation>,
    now: DateTime<Utc>,
) -> Result<bool, SaraError> {
    if invitation.value.status == InvitationStatus::Enviada && invitation.value.is_expired(now) {
        invitation.value.status = InvitationStatus::Expirada;
        batch.set_if(
            paths::invitation(invitation.value.id),
            &invitation.value,
            invitation.revision,
        )?;
    }
    Ok(invitation.value.status == InvitationStatus::Expirada)
}

/// Invitation service
#[derive(Debug, Clone)]
pub struct InvitationService {
    ctx: Arc<Context>,
}

impl InvitationService {
    pub(crate) fn new(ctx: Arc<Context>) -> Self {
        Self { ctx }
    }

    /// Invite `email` to a pending contract that has no tenant yet
    ///
    /// Earlier open invitations of the contract are expired and the
    /// contract's tenant email is replaced, all in one batch.
    ///
    /// # Errors
    /// `Conflict` when the contract already has a tenant or is no longer
    /// pending, or the email belongs to a registered user
    pub async fn invite(&self, principal: &Principal, contract_id: ContractId, email: &str) -> Result<Invited, SaraError> {
        principal.require(&[Role::Arrendador], "invite tenants")?;
        let mut errors = ValidationErrors::new();
        errors.email("email", email);
        errors.into_result()?;
        let email = normalize_email(email);

        let contract_path = paths::contract(contract_id);
        let contract = repo::require::<Contract>(self.ctx.store(), &contract_path, "contract").await?;
        if !principal.is_self_or_admin(&contract.value.landlord_id) {
            return Err(SaraError::not_found("contract", contract_id));
        }
        if contract.value.status != ContractStatus::Pendiente || contract.value.tenant_id.is_some() {
            return Err(SaraError::Conflict(
                "only pending contracts without a tenant accept invitations".into(),
            ));
        }
        if self.ctx.identity.user_by_email(&email).await?.is_some() {
            return Err(SaraError::Conflict(format!(
                "{email} already has an account; create the contract for it directly"
            )));
        }

        let now = self.ctx.now();
        let mut batch = WriteBatch::new();
        for open in self.open_for_contract(contract_id).await? {
            let mut value = open.value;
            value.status = InvitationStatus::Expirada;
            batch.set_if(paths::invitation(value.id), &value, open.revision)?;
        }
        let invitation = new_invitation(&contract.value, &email, self.ctx.config.limits.invitation_ttl_days, now);
        let mut updated = contract.value;
        updated.tenant_email = email;
        updated.invitation_id = Some(invitation.id);
        updated.updated_at = now;
        batch.set_if(contract_path, &updated, contract.revision)?;
        batch.create(paths::invitation(invitation.id), &invitation)?;
        self.ctx.store.commit(batch).await?;
        tracing::info!(invitation_id = %invitation.id, contract_id = %contract_id, "Invitation created");

        let delivery = Notifier::new(Arc::clone(&self.ctx)).invitation(&invitation).await;
        Ok(Invited { invitation, delivery })
    }

    /// Send the invitation again with a refreshed expiry
    ///
    /// # Errors
    /// `Conflict` when the invitation was already accepted or its contract
    /// is no longer pending
    pub async fn resend(&self, principal: &Principal, id: InvitationId) -> Result<Invited, SaraError> {
        let path = paths::invitation(id);
        let current = repo::require::<Invitation>(self.ctx.store(), &path, "invitation").await?;
        if !principal.is_self_or_admin(&current.value.landlord_id) {
            return Err(SaraError::not_found("invitation", id));
        }
        if current.value.status == InvitationStatus::Aceptada {
            return Err(SaraError::Conflict("invitation was already accepted".into()));
        }
        let contract = repo::require::<Contract>(
            self.ctx.store(),
            &paths::contract(current.value.contract_id),
            "contract",
        )
        .await?;
        if contract.value.status != ContractStatus::Pendiente || contract.value.tenant_id.is_some() {
            return Err(SaraError::Conflict("contract is no longer waiting for this tenant".into()));
        }
        if contract.value.invitation_id != Some(id) {
            return Err(SaraError::Conflict("a newer invitation replaced this one".into()));
        }

        let now = self.ctx.now();
        let mut invitation = current.value;
        invitation.status = InvitationStatus::Enviada;
        invitation.resent_count += 1;
        invitation.sent_at = now;
        invitation.expires_at = now + Duration::days(i64::from(self.ctx.config.limits.invitation_ttl_days));
        let mut batch = WriteBatch::new();
        batch.set_if(path, &invitation, current.revision)?;
        self.ctx.store.commit(batch).await?;
        tracing::info!(invitation_id = %id, resent = invitation.resent_count, "Invitation resent");

        let delivery = Notifier::new(Arc::clone(&self.ctx))
            .invitation_reminder(&invitation)
            .await;
        Ok(Invited { invitation, delivery })
    }

    /// Invitations sent by the caller, newest first, expiring overdue ones
    ///
    /// # Errors
    /// `Store` failures
    pub async fn list_for_landlord(&self, principal: &Principal) -> Result<Vec<Invitation>, SaraError> {
        principal.require(&[Role::Arrendador], "list invitations")?;
        let query = Query::collection(paths::INVITATIONS).where_eq("landlord_id", principal.uid.as_str());
        let found = repo::find::<Invitation>(self.ctx.store(), &query).await?;
        let now = self.ctx.now();
        let mut batch = WriteBatch::new();
        let mut list = Vec::with_capacity(found.len());
        for mut invitation in found {
            expire_if_due(&mut batch, &mut invitation, now)?;
            list.push(invitation.value);
        }
        if !batch.is_empty() {
            // A concurrent writer already handled these; the listing stays valid.
            if let Err(e) = self.ctx.store.commit(batch).await {
                tracing::warn!(error = %e, "Could not persist invitation expiry");
            }
        }
        list.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(list)
    }

    async fn open_for_contract(&self, contract_id: ContractId) -> Result<Vec<Versioned<Invitation>>, SaraError> {
        let query = Query::collection(paths::INVITATIONS)
            .where_eq("contract_id", contract_id.to_string())
            .where_eq("status", InvitationStatus::Enviada.as_str());
        repo::find(self.ctx.store(), &query).await
    }
}
