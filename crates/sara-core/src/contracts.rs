//! Contract lifecycle: creation, tenant approval or rejection, observations,
//! cancellation and finalization
//!
//! Every operation that touches more than one record commits a single batch
//! guarded by the revisions it read, so a concurrent change aborts the whole
//! operation instead of leaving contract and property out of step.

use crate::announcements::announce;
use crate::auth::Principal;
use crate::context::Context;
use crate::error::SaraError;
use crate::files::{store_upload, Upload};
use crate::invitations::new_invitation;
use crate::notify::{Delivery, Notifier};
use crate::paths;
use crate::properties::OPEN_CONTRACT;
use crate::repo;
use bytes::Bytes;
use sara_domain::state_machine::validate_contract_transition;
use sara_domain::{
    AnnouncementKind, Contract, ContractAmendment, ContractId, ContractStatus, Evaluation,
    EvaluationId, EvaluationStatus, Invitation, InvitationStatus, NewContract, Observation,
    ObservationId, ObservationResponse, Property, PropertyStatus, Role, UserProfile,
    ValidationErrors,
};
use sara_store::{Precondition, Query, Versioned, WriteBatch};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;

/// Result of creating a contract
#[derive(Debug, Clone, Serialize)]
pub struct ContractCreated {
    /// New contract
    pub contract: Contract,
    /// Invitation, when the tenant has no account yet
    pub invitation: Option<Invitation>,
    /// Invitation email outcome
    pub delivery: Delivery,
}

/// Contract service
#[derive(Debug, Clone)]
pub struct ContractService {
    ctx: Arc<Context>,
}

impl ContractService {
    pub(crate) fn new(ctx: Arc<Context>) -> Self {
        Self { ctx }
    }

    /// Offer a contract for one of the landlord's available properties
    ///
    /// A registered tenant is linked immediately and notified. An unknown
    /// email gets an invitation and the contract waits without a tenant.
    ///
    /// # Errors
    /// `Validation` for bad terms, `Conflict` when the property is not
    /// available or already has an open contract
    pub async fn create(&self, principal: &Principal, new: NewContract) -> Result<ContractCreated, SaraError> {
        principal.require(&[Role::Arrendador], "create contracts")?;
        new.validate()?;
        let property_path = paths::property(new.property_id);
        let property = repo::require::<Property>(self.ctx.store(), &property_path, "property").await?;
        if !principal.is_self_or_admin(&property.value.owner_id) {
            return Err(SaraError::not_found("property", new.property_id));
        }
        if property.value.status != PropertyStatus::Disponible {
            return Err(SaraError::Conflict(format!(
                "property is {}, only Disponible properties can be offered",
                property.value.status
            )));
        }
        let open = Query::collection(paths::CONTRACTS)
            .where_eq("property_id", new.property_id.to_string())
            .where_in("status", OPEN_CONTRACT.iter().map(|s| s.as_str()));
        if !self.ctx.store.query(&open).await?.is_empty() {
            return Err(SaraError::Conflict("property already has an open contract".into()));
        }

        let landlord = self.ctx.require_profile(&property.value.owner_id).await?;
        let email = new.normalized_email();
        let tenant = self.registered_tenant(&email, &landlord).await?;

        let now = self.ctx.now();
        let mut contract = Contract {
            id: ContractId::new(),
            property_id: property.value.id,
            property_name: property.value.name.clone(),
            property_address: property.value.address.clone(),
            landlord_id: landlord.id.clone(),
            landlord_name: landlord.name.clone(),
            tenant_id: tenant.as_ref().map(|t| t.id.clone()),
            tenant_name: tenant.as_ref().map(|t| t.name.clone()),
            tenant_email: email.clone(),
            rent: new.rent,
            deposit: new.deposit,
            start_date: new.start_date,
            end_date: new.end_date,
            payment_day: new.payment_day,
            terms: new.terms.trim().to_string(),
            status: ContractStatus::Pendiente,
            observations: Vec::new(),
            rejection_reason: None,
            pdf_url: None,
            invitation_id: None,
            created_at: now,
            updated_at: now,
            activated_at: None,
            closed_at: None,
        };

        let mut batch = WriteBatch::new();
        // Serializes offers on the same property.
        batch.update(
            property_path,
            json!({ "updated_at": now }),
            Precondition::Revision(property.revision),
        )?;
        let invitation = match &tenant {
            Some(t) => {
                announce(
                    &mut batch,
                    &t.id,
                    AnnouncementKind::Contract,
                    "Nuevo contrato por revisar",
                    format!(
                        "{} te envió un contrato para {}. Revísalo para aprobarlo o dejar observaciones.",
                        contract.landlord_name, contract.property_name
                    ),
                    Some(contract.id.to_string()),
                    now,
                )?;
                None
            }
            None => {
                let invitation = new_invitation(&contract, &email, self.ctx.config.limits.invitation_ttl_days, now);
                contract.invitation_id = Some(invitation.id);
                batch.create(paths::invitation(invitation.id), &invitation)?;
                Some(invitation)
            }
        };
        batch.create(paths::contract(contract.id), &contract)?;
        self.ctx.store.commit(batch).await?;
        tracing::info!(
            contract_id = %contract.id,
            property_id = %contract.property_id,
            invited = invitation.is_some(),
            "Contract created"
        );

        let delivery = match &invitation {
            Some(inv) => Notifier::new(Arc::clone(&self.ctx)).invitation(inv).await,
            None => Delivery::Skipped,
        };
        Ok(ContractCreated {
            contract,
            invitation,
            delivery,
        })
    }

    async fn registered_tenant(&self, email: &str, landlord: &UserProfile) -> Result<Option<UserProfile>, SaraError> {
        let Some(uid) = self.ctx.identity.user_by_email(email).await? else {
            return Ok(None);
        };
        let Some(profile) = self.ctx.profile(&uid).await? else {
            return Ok(None);
        };
        let profile = profile.value;
        if profile.id == landlord.id {
            return Err(ValidationErrors::single("tenant_email", "cannot be your own account").into());
        }
        if profile.role != Role::Inquilino {
            return Err(ValidationErrors::single("tenant_email", "belongs to an account that is not a tenant").into());
        }
        Ok(Some(profile))
    }

    /// Read a contract visible to the caller
    ///
    /// # Errors
    /// `NotFound` when missing or the caller is not a party
    pub async fn get(&self, principal: &Principal, id: ContractId) -> Result<Contract, SaraError> {
        Ok(self.visible(principal, id).await?.value)
    }

    /// Contracts where the caller is landlord or tenant (all for admins), newest first
    ///
    /// # Errors
    /// `Store` failures
    pub async fn list_for(&self, principal: &Principal) -> Result<Vec<Contract>, SaraError> {
        let query = match principal.role {
            Role::Admin => Query::collection(paths::CONTRACTS),
            Role::Arrendador => Query::collection(paths::CONTRACTS).where_eq("landlord_id", principal.uid.as_str()),
            Role::Inquilino => Query::collection(paths::CONTRACTS).where_eq("tenant_id", principal.uid.as_str()),
        };
        let mut list: Vec<Contract> = repo::find_values(self.ctx.store(), &query).await?;
        list.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(list)
    }

    /// Tenant accepts: contract `Activo`, property `Arrendada`, both parties notified
    ///
    /// # Errors
    /// `InvalidTransition` unless pending, `Conflict` when the property is
    /// no longer available, `Store` conflict on a concurrent change
    pub async fn approve(&self, principal: &Principal, id: ContractId) -> Result<Contract, SaraError> {
        let current = self.as_tenant(principal, id).await?;
        validate_contract_transition(current.value.status, ContractStatus::Activo)?;
        let property_path = paths::property(current.value.property_id);
        let property = repo::require::<Property>(self.ctx.store(), &property_path, "property").await?;
        if property.value.status != PropertyStatus::Disponible {
            return Err(SaraError::Conflict(format!(
                "property is {}, the contract can no longer be approved",
                property.value.status
            )));
        }

        let now = self.ctx.now();
        let mut contract = current.value;
        contract.status = ContractStatus::Activo;
        contract.activated_at = Some(now);
        contract.updated_at = now;
        let mut prop = property.value;
        prop.status = PropertyStatus::Arrendada;
        prop.current_contract_id = Some(contract.id);
        prop.updated_at = now;

        let mut batch = WriteBatch::new();
        batch.set_if(paths::contract(id), &contract, current.revision)?;
        batch.set_if(property_path, &prop, property.revision)?;
        let tenant_name = contract.tenant_name.clone().unwrap_or_default();
        announce(
            &mut batch,
            &contract.landlord_id,
            AnnouncementKind::Contract,
            "Contrato aprobado",
            format!("{tenant_name} aprobó el contrato de {}.", contract.property_name),
            Some(id.to_string()),
            now,
        )?;
        announce(
            &mut batch,
            &principal.uid,
            AnnouncementKind::Contract,
            "Contrato activo",
            format!(
                "Tu contrato de {} está activo desde el {}.",
                contract.property_name,
                contract.start_date.format("%d-%m-%Y")
            ),
            Some(id.to_string()),
            now,
        )?;
        self.ctx.store.commit(batch).await?;
        self.ctx.certificates.invalidate(&principal.uid).await;
        tracing::info!(contract_id = %id, property_id = %prop.id, "Contract approved");
        Ok(contract)
    }

    /// Tenant declines with a reason
    ///
    /// # Errors
    /// `Validation` for a missing reason, `InvalidTransition` unless pending
    pub async fn reject(&self, principal: &Principal, id: ContractId, reason: &str) -> Result<Contract, SaraError> {
        let mut errors = ValidationErrors::new();
        errors.text("reason", reason, 3, 500);
        errors.into_result()?;
        let current = self.as_tenant(principal, id).await?;
        validate_contract_transition(current.value.status, ContractStatus::Rechazado)?;

        let now = self.ctx.now();
        let mut contract = current.value;
        contract.status = ContractStatus::Rechazado;
        contract.rejection_reason = Some(reason.trim().to_string());
        contract.closed_at = Some(now);
        contract.updated_at = now;
        let mut batch = WriteBatch::new();
        batch.set_if(paths::contract(id), &contract, current.revision)?;
        announce(
            &mut batch,
            &contract.landlord_id,
            AnnouncementKind::Contract,
            "Contrato rechazado",
            format!(
                "{} rechazó el contrato de {}: {}",
                contract.tenant_name.as_deref().unwrap_or("El arrendatario"),
                contract.property_name,
                reason.trim()
            ),
            Some(id.to_string()),
            now,
        )?;
        self.ctx.store.commit(batch).await?;
        tracing::info!(contract_id = %id, "Contract rejected");
        Ok(contract)
    }

    /// Landlord withdraws a pending offer; open invitations expire
    ///
    /// # Errors
    /// `InvalidTransition` unless pending
    pub async fn cancel(&self, principal: &Principal, id: ContractId) -> Result<Contract, SaraError> {
        let current = self.as_landlord(principal, id).await?;
        validate_contract_transition(current.value.status, ContractStatus::Cancelado)?;

        let now = self.ctx.now();
        let mut contract = current.value;
        contract.status = ContractStatus::Cancelado;
        contract.closed_at = Some(now);
        contract.updated_at = now;
        let mut batch = WriteBatch::new();
        batch.set_if(paths::contract(id), &contract, current.revision)?;
        let open = Query::collection(paths::INVITATIONS)
            .where_eq("contract_id", id.to_string())
            .where_eq("status", InvitationStatus::Enviada.as_str());
        for inv in repo::find::<Invitation>(self.ctx.store(), &open).await? {
            let mut value = inv.value;
            value.status = InvitationStatus::Expirada;
            batch.set_if(paths::invitation(value.id), &value, inv.revision)?;
        }
        if let Some(tenant) = &contract.tenant_id {
            announce(
                &mut batch,
                tenant,
                AnnouncementKind::Contract,
                "Contrato cancelado",
                format!("{} canceló el contrato propuesto para {}.", contract.landlord_name, contract.property_name),
                Some(id.to_string()),
                now,
            )?;
        }
        self.ctx.store.commit(batch).await?;
        tracing::info!(contract_id = %id, "Contract cancelled");
        Ok(contract)
    }

    /// Landlord ends an active contract
    ///
    /// The property returns to `Disponible` and a pending evaluation of the
    /// tenant is opened, in the same batch.
    ///
    /// # Errors
    /// `InvalidTransition` unless active
    pub async fn finalize(&self, principal: &Principal, id: ContractId) -> Result<Contract, SaraError> {
        let current = self.as_landlord(principal, id).await?;
        validate_contract_transition(current.value.status, ContractStatus::Finalizado)?;
        let tenant_id = current
            .value
            .tenant_id
            .clone()
            .ok_or_else(|| SaraError::Internal(format!("active contract {id} has no tenant")))?;

        let now = self.ctx.now();
        let mut contract = current.value;
        contract.status = ContractStatus::Finalizado;
        contract.closed_at = Some(now);
        contract.updated_at = now;
        let mut batch = WriteBatch::new();
        batch.set_if(paths::contract(id), &contract, current.revision)?;

        let property_path = paths::property(contract.property_id);
        if let Some(property) = repo::load::<Property>(self.ctx.store(), &property_path).await? {
            if property.value.current_contract_id == Some(id) {
                let mut prop = property.value;
                prop.status = PropertyStatus::Disponible;
                prop.current_contract_id = None;
                prop.updated_at = now;
                batch.set_if(property_path, &prop, property.revision)?;
            }
        }

        let existing = Query::collection(paths::EVALUATIONS).where_eq("contract_id", id.to_string());
        if self.ctx.store.query(&existing).await?.is_empty() {
            let evaluation = Evaluation {
                id: EvaluationId::new(),
                contract_id: id,
                property_name: contract.property_name.clone(),
                landlord_id: contract.landlord_id.clone(),
                landlord_name: contract.landlord_name.clone(),
                tenant_id: tenant_id.clone(),
                status: EvaluationStatus::Pendiente,
                scores: None,
                comment: None,
                created_at: now,
                completed_at: None,
            };
            batch.create(paths::evaluation(evaluation.id), &evaluation)?;
            announce(
                &mut batch,
                &contract.landlord_id,
                AnnouncementKind::Evaluation,
                "Evaluación pendiente",
                format!(
                    "Evalúa a {} por el arriendo de {}.",
                    contract.tenant_name.as_deref().unwrap_or("tu arrendatario"),
                    contract.property_name
                ),
                Some(evaluation.id.to_string()),
                now,
            )?;
        }
        announce(
            &mut batch,
            &tenant_id,
            AnnouncementKind::Contract,
            "Contrato finalizado",
            format!("El contrato de {} fue finalizado.", contract.property_name),
            Some(id.to_string()),
            now,
        )?;
        self.ctx.store.commit(batch).await?;
        self.ctx.certificates.invalidate(&tenant_id).await;
        tracing::info!(contract_id = %id, "Contract finalized");
        Ok(contract)
    }

    /// Tenant raises a remark on a pending contract
    ///
    /// Only one observation may await an answer at a time.
    ///
    /// # Errors
    /// `Conflict` unless pending or while another observation is open
    pub async fn add_observation(&self, principal: &Principal, id: ContractId, text: &str) -> Result<Contract, SaraError> {
        let mut errors = ValidationErrors::new();
        errors.text("text", text, 3, 2000);
        errors.into_result()?;
        let current = self.as_tenant(principal, id).await?;
        if current.value.status != ContractStatus::Pendiente {
            return Err(SaraError::Conflict("observations are only accepted on pending contracts".into()));
        }
        if current.value.open_observation().is_some() {
            return Err(SaraError::Conflict("the previous observation has not been answered yet".into()));
        }

        let now = self.ctx.now();
        let mut contract = current.value;
        let observation = Observation {
            id: ObservationId::new(),
            author_id: principal.uid.clone(),
            text: text.trim().to_string(),
            created_at: now,
            response: None,
        };
        let observation_id = observation.id;
        contract.observations.push(observation);
        contract.updated_at = now;
        let mut batch = WriteBatch::new();
        batch.set_if(paths::contract(id), &contract, current.revision)?;
        announce(
            &mut batch,
            &contract.landlord_id,
            AnnouncementKind::Contract,
            "Nueva observación",
            format!("Hay una observación sobre el contrato de {}.", contract.property_name),
            Some(id.to_string()),
            now,
        )?;
        self.ctx.store.commit(batch).await?;
        tracing::info!(contract_id = %id, observation_id = %observation_id, "Observation added");
        Ok(contract)
    }

    /// Landlord answers an observation, optionally amending terms
    ///
    /// # Errors
    /// `NotFound` for unknown observations, `Conflict` when already
    /// answered, `Validation` for invalid amended terms
    pub async fn respond_observation(
        &self,
        principal: &Principal,
        id: ContractId,
        observation_id: ObservationId,
        text: &str,
        amendment: Option<ContractAmendment>,
    ) -> Result<Contract, SaraError> {
        let mut errors = ValidationErrors::new();
        errors.text("text", text, 1, 2000);
        errors.into_result()?;
        let current = self.as_landlord(principal, id).await?;
        if current.value.status != ContractStatus::Pendiente {
            return Err(SaraError::Conflict("observations can only be answered on pending contracts".into()));
        }

        let now = self.ctx.now();
        let mut contract = current.value;
        let amendment = amendment.filter(|a| !a.is_empty());
        if let Some(a) = &amendment {
            a.apply(&mut contract)?;
        }
        let observation = contract
            .observation_mut(observation_id)
            .ok_or_else(|| SaraError::not_found("observation", observation_id))?;
        if observation.response.is_some() {
            return Err(SaraError::Conflict("observation was already answered".into()));
        }
        observation.response = Some(ObservationResponse {
            author_id: principal.uid.clone(),
            text: text.trim().to_string(),
            created_at: now,
            amendment: amendment.clone(),
        });
        contract.updated_at = now;

        let mut batch = WriteBatch::new();
        batch.set_if(paths::contract(id), &contract, current.revision)?;
        if let Some(tenant) = &contract.tenant_id {
            let body = if amendment.is_some() {
                format!("{} respondió tu observación y modificó las condiciones del contrato de {}.", contract.landlord_name, contract.property_name)
            } else {
                format!("{} respondió tu observación sobre el contrato de {}.", contract.landlord_name, contract.property_name)
            };
            announce(
                &mut batch,
                tenant,
                AnnouncementKind::Contract,
                "Observación respondida",
                body,
                Some(id.to_string()),
                now,
            )?;
        }
        self.ctx.store.commit(batch).await?;
        tracing::info!(contract_id = %id, observation_id = %observation_id, amended = amendment.is_some(), "Observation answered");
        Ok(contract)
    }

    /// Store the signed PDF and link it from the contract
    ///
    /// # Errors
    /// `Validation` when the content is not a PDF or too large, `Conflict`
    /// for closed contracts
    pub async fn attach_pdf(&self, principal: &Principal, id: ContractId, data: Bytes) -> Result<Contract, SaraError> {
        if !data.starts_with(b"%PDF-") {
            return Err(ValidationErrors::single("file", "is not a PDF document").into());
        }
        let current = self.as_landlord(principal, id).await?;
        if !OPEN_CONTRACT.contains(&current.value.status) {
            return Err(SaraError::Conflict(format!("contract is {}", current.value.status)));
        }
        let upload = Upload::new(format!("contrato-{id}.pdf"), "application/pdf", data);
        let blob = store_upload(&self.ctx, &format!("contracts/{id}"), &upload).await?;

        let now = self.ctx.now();
        let mut contract = current.value;
        contract.pdf_url = Some(blob.url);
        contract.updated_at = now;
        let mut batch = WriteBatch::new();
        batch.set_if(paths::contract(id), &contract, current.revision)?;
        self.ctx.store.commit(batch).await?;
        tracing::info!(contract_id = %id, size = blob.size, "Contract PDF attached");
        Ok(contract)
    }

    pub(crate) async fn load(&self, id: ContractId) -> Result<Versioned<Contract>, SaraError> {
        repo::require(self.ctx.store(), &paths::contract(id), "contract").await
    }

    pub(crate) async fn visible(&self, principal: &Principal, id: ContractId) -> Result<Versioned<Contract>, SaraError> {
        let contract = self.load(id).await?;
        if principal.is_admin() || contract.value.is_party(&principal.uid) {
            Ok(contract)
        } else {
            Err(SaraError::not_found("contract", id))
        }
    }

    pub(crate) async fn as_landlord(&self, principal: &Principal, id: ContractId) -> Result<Versioned<Contract>, SaraError> {
        let contract = self.visible(principal, id).await?;
        if principal.is_self_or_admin(&contract.value.landlord_id) {
            Ok(contract)
        } else {
            tracing::warn!(uid = %principal.uid, contract_id = %id, "Landlord action attempted by tenant");
            Err(SaraError::Forbidden("only the landlord can do this".into()))
        }
    }

    pub(crate) async fn as_tenant(&self, principal: &Principal, id: ContractId) -> Result<Versioned<Contract>, SaraError> {
        let contract = self.visible(principal, id).await?;
        if contract.value.is_tenant(&principal.uid) {
            Ok(contract)
        } else {
            tracing::warn!(uid = %principal.uid, contract_id = %id, "Tenant action attempted by non-tenant");
            Err(SaraError::Forbidden("only the tenant can do this".into()))
        }
    }
}
