//! Incident reports on active contracts

use crate::announcements::announce;
use crate::auth::Principal;
use crate::context::Context;
use crate::contracts::ContractService;
use crate::error::SaraError;
use crate::files::{store_upload, Upload};
use crate::paths;
use crate::repo;
use sara_domain::state_machine::validate_incident_transition;
use sara_domain::{
    AnnouncementKind, ContractStatus, Incident, IncidentId, IncidentResponse, IncidentStatus,
    NewIncident, ResponseId, Role, ValidationErrors,
};
use sara_store::{Query, Versioned, WriteBatch};
use std::sync::Arc;

/// Incident service
#[derive(Debug, Clone)]
pub struct IncidentService {
    ctx: Arc<Context>,
    contracts: ContractService,
}

impl IncidentService {
    pub(crate) fn new(ctx: Arc<Context>) -> Self {
        let contracts = ContractService::new(Arc::clone(&ctx));
        Self { ctx, contracts }
    }

    /// Tenant reports a problem with the rented property
    ///
    /// # Errors
    /// `Validation` for bad input or too many attachments, `Conflict` when
    /// the contract is not active
    pub async fn report(&self, principal: &Principal, new: NewIncident, attachments: Vec<Upload>) -> Result<Incident, SaraError> {
        new.validate()?;
        let max = self.ctx.config.limits.max_incident_attachments;
        if attachments.len() > max {
            return Err(ValidationErrors::single("attachments", format!("at most {max} files")).into());
        }
        let contract = self.contracts.as_tenant(principal, new.contract_id).await?.value;
        if contract.status != ContractStatus::Activo {
            return Err(SaraError::Conflict(format!(
                "incidents can only be reported on active contracts, this one is {}",
                contract.status
            )));
        }

        let id = IncidentId::new();
        let mut urls = Vec::with_capacity(attachments.len());
        for upload in &attachments {
            urls.push(store_upload(&self.ctx, &format!("incidents/{id}"), upload).await?.url);
        }
        let now = self.ctx.now();
        let incident = Incident {
            id,
            contract_id: contract.id,
            property_id: contract.property_id,
            property_name: contract.property_name.clone(),
            tenant_id: principal.uid.clone(),
            landlord_id: contract.landlord_id.clone(),
            title: new.title.trim().to_string(),
            description: new.description.trim().to_string(),
            priority: new.priority,
            status: IncidentStatus::Pendiente,
            attachments: urls,
            responses: Vec::new(),
            created_at: now,
            updated_at: now,
            resolved_at: None,
        };
        let mut batch = WriteBatch::new();
        batch.create(paths::incident(id), &incident)?;
        announce(
            &mut batch,
            &incident.landlord_id,
            AnnouncementKind::Incident,
            "Nueva incidencia",
            format!(
                "Incidencia de prioridad {} en {}: {}",
                incident.priority, incident.property_name, incident.title
            ),
            Some(id.to_string()),
            now,
        )?;
        self.ctx.store.commit(batch).await?;
        self.ctx.certificates.invalidate(&incident.tenant_id).await;
        tracing::info!(incident_id = %id, contract_id = %contract.id, priority = %incident.priority, "Incident reported");
        Ok(incident)
    }

    /// Landlord answers an incident, optionally moving its status
    ///
    /// # Errors
    /// `InvalidTransition` for a status the incident cannot move to,
    /// `Conflict` once resolved
    pub async fn respond(
        &self,
        principal: &Principal,
        id: IncidentId,
        text: &str,
        new_status: Option<IncidentStatus>,
    ) -> Result<Incident, SaraError> {
        let mut errors = ValidationErrors::new();
        errors.text("text", text, 1, 2000);
        errors.into_result()?;
        let current = self.visible(principal, id).await?;
        if !principal.is_self_or_admin(&current.value.landlord_id) {
            tracing::warn!(uid = %principal.uid, incident_id = %id, "Incident response attempted by non-landlord");
            return Err(SaraError::Forbidden("only the landlord can respond to incidents".into()));
        }
        if current.value.status == IncidentStatus::Resuelto {
            return Err(SaraError::Conflict("incident is already resolved".into()));
        }
        let status_change = new_status.filter(|s| *s != current.value.status);
        if let Some(to) = status_change {
            validate_incident_transition(current.value.status, to)?;
        }

        let now = self.ctx.now();
        let mut incident = current.value;
        incident.responses.push(IncidentResponse {
            id: ResponseId::new(),
            author_id: principal.uid.clone(),
            text: text.trim().to_string(),
            status_change,
            created_at: now,
        });
        if let Some(to) = status_change {
            incident.status = to;
            if to == IncidentStatus::Resuelto {
                incident.resolved_at = Some(now);
            }
        }
        incident.updated_at = now;
        let mut batch = WriteBatch::new();
        batch.set_if(paths::incident(id), &incident, current.revision)?;
        let body = match status_change {
            Some(to) => format!("La incidencia \"{}\" pasó a {to}.", incident.title),
            None => format!("Hay una respuesta a la incidencia \"{}\".", incident.title),
        };
        announce(
            &mut batch,
            &incident.tenant_id,
            AnnouncementKind::Incident,
            "Incidencia actualizada",
            body,
            Some(id.to_string()),
            now,
        )?;
        self.ctx.store.commit(batch).await?;
        self.ctx.certificates.invalidate(&incident.tenant_id).await;
        tracing::info!(incident_id = %id, status = %incident.status, "Incident answered");
        Ok(incident)
    }

    /// Read one incident
    ///
    /// # Errors
    /// `NotFound` when missing or the caller is not a party
    pub async fn get(&self, principal: &Principal, id: IncidentId) -> Result<Incident, SaraError> {
        Ok(self.visible(principal, id).await?.value)
    }

    /// Incidents the caller reported or received, newest first
    ///
    /// # Errors
    /// `Store` failures
    pub async fn list_for(&self, principal: &Principal) -> Result<Vec<Incident>, SaraError> {
        let query = match principal.role {
            Role::Admin => Query::collection(paths::INCIDENTS),
            Role::Arrendador => Query::collection(paths::INCIDENTS).where_eq("landlord_id", principal.uid.as_str()),
            Role::Inquilino => Query::collection(paths::INCIDENTS).where_eq("tenant_id", principal.uid.as_str()),
        };
        let mut list: Vec<Incident> = repo::find_values(self.ctx.store(), &query).await?;
        list.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(list)
    }

    async fn visible(&self, principal: &Principal, id: IncidentId) -> Result<Versioned<Incident>, SaraError> {
        let incident: Versioned<Incident> = repo::require(self.ctx.store(), &paths::incident(id), "incident").await?;
        let party = incident.value.tenant_id == principal.uid || incident.value.landlord_id == principal.uid;
        if party || principal.is_admin() {
            Ok(incident)
        } else {
            Err(SaraError::not_found("incident", id))
        }
    }
}
