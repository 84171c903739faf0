//! Landlord evaluations of tenants
//!
//! One evaluation per contract. Finalizing a contract opens a `Pendiente`
//! evaluation; submitting scores completes it, or creates a completed one
//! when the landlord evaluates before the contract ends.

use crate::announcements::announce;
use crate::auth::Principal;
use crate::context::Context;
use crate::contracts::ContractService;
use crate::error::SaraError;
use crate::paths;
use crate::repo;
use sara_domain::state_machine::validate_evaluation_transition;
use sara_domain::{
    AnnouncementKind, Contract, ContractId, ContractStatus, Evaluation, EvaluationId,
    EvaluationStatus, EvaluationSubmission, Role, UserId,
};
use sara_store::{Precondition, Query, Versioned, WriteBatch};
use serde_json::json;
use std::sync::Arc;

/// Evaluation service
#[derive(Debug, Clone)]
pub struct EvaluationService {
    ctx: Arc<Context>,
    contracts: ContractService,
}

impl EvaluationService {
    pub(crate) fn new(ctx: Arc<Context>) -> Self {
        let contracts = ContractService::new(Arc::clone(&ctx));
        Self { ctx, contracts }
    }

    /// Landlord scores the tenant of a contract
    ///
    /// # Errors
    /// `Validation` for out-of-range scores, `Conflict` when the contract
    /// has no tenant history yet or was already evaluated, a store conflict
    /// when another submission or the finalization landed first
    pub async fn submit(
        &self,
        principal: &Principal,
        contract_id: ContractId,
        submission: EvaluationSubmission,
    ) -> Result<Evaluation, SaraError> {
        submission.validate()?;
        let current_contract = self.contracts.as_landlord(principal, contract_id).await?;
        let contract = current_contract.value;
        if !matches!(contract.status, ContractStatus::Activo | ContractStatus::Finalizado) {
            return Err(SaraError::Conflict(format!(
                "only active or finalized contracts can be evaluated, this one is {}",
                contract.status
            )));
        }
        let tenant_id = contract
            .tenant_id
            .clone()
            .ok_or_else(|| SaraError::Internal(format!("contract {contract_id} has no tenant")))?;

        let now = self.ctx.now();
        let comment = submission.comment.map(|c| c.trim().to_string()).filter(|c| !c.is_empty());
        let mut batch = WriteBatch::new();
        // Concurrent submissions and finalization all write the contract
        batch.update(
            paths::contract(contract_id),
            json!({ "updated_at": now }),
            Precondition::Revision(current_contract.revision),
        )?;
        let evaluation = match self.for_contract(contract_id).await? {
            Some(current) => {
                validate_evaluation_transition(current.value.status, EvaluationStatus::Completada).map_err(|_| {
                    SaraError::Conflict(format!("contract {contract_id} was already evaluated"))
                })?;
                let mut evaluation = current.value;
                evaluation.status = EvaluationStatus::Completada;
                evaluation.scores = Some(submission.scores);
                evaluation.comment = comment;
                evaluation.completed_at = Some(now);
                batch.set_if(paths::evaluation(evaluation.id), &evaluation, current.revision)?;
                evaluation
            }
            None => {
                let evaluation = completed(&contract, tenant_id.clone(), submission.scores, comment, now);
                batch.create(paths::evaluation(evaluation.id), &evaluation)?;
                evaluation
            }
        };
        announce(
            &mut batch,
            &tenant_id,
            AnnouncementKind::Evaluation,
            "Nueva evaluación",
            format!(
                "{} te evaluó por el arriendo de {} con un promedio de {:.1}.",
                contract.landlord_name,
                contract.property_name,
                submission.scores.average()
            ),
            Some(evaluation.id.to_string()),
            now,
        )?;
        self.ctx.store.commit(batch).await?;
        self.ctx.certificates.invalidate(&tenant_id).await;
        tracing::info!(evaluation_id = %evaluation.id, contract_id = %contract_id, "Evaluation submitted");
        Ok(evaluation)
    }

    /// Completed evaluations of a tenant, newest first
    ///
    /// Visible to the tenant, admins and landlords who rented to them.
    ///
    /// # Errors
    /// `Forbidden` for anyone else
    pub async fn list_for_tenant(&self, principal: &Principal, tenant_id: &UserId) -> Result<Vec<Evaluation>, SaraError> {
        ensure_can_view_tenant(&self.ctx, principal, tenant_id).await?;
        tenant_evaluations(&self.ctx, tenant_id).await
    }

    /// Evaluations the landlord still owes, oldest first
    ///
    /// # Errors
    /// `Forbidden` for tenants
    pub async fn pending_for(&self, principal: &Principal) -> Result<Vec<Evaluation>, SaraError> {
        principal.require(&[Role::Arrendador], "list pending evaluations")?;
        let query = Query::collection(paths::EVALUATIONS)
            .where_eq("landlord_id", principal.uid.as_str())
            .where_eq("status", EvaluationStatus::Pendiente.as_str());
        let mut list: Vec<Evaluation> = repo::find_values(self.ctx.store(), &query).await?;
        list.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(list)
    }

    async fn for_contract(&self, contract_id: ContractId) -> Result<Option<Versioned<Evaluation>>, SaraError> {
        let query = Query::collection(paths::EVALUATIONS).where_eq("contract_id", contract_id.to_string());
        Ok(repo::find(self.ctx.store(), &query).await?.into_iter().next())
    }
}

fn completed(
    contract: &Contract,
    tenant_id: UserId,
    scores: sara_domain::EvaluationScores,
    comment: Option<String>,
    now: chrono::DateTime<chrono::Utc>,
) -> Evaluation {
    Evaluation {
        id: EvaluationId::new(),
        contract_id: contract.id,
        property_name: contract.property_name.clone(),
        landlord_id: contract.landlord_id.clone(),
        landlord_name: contract.landlord_name.clone(),
        tenant_id,
        status: EvaluationStatus::Completada,
        scores: Some(scores),
        comment,
        created_at: now,
        completed_at: Some(now),
    }
}

/// Completed evaluations of `tenant_id`, newest first
pub(crate) async fn tenant_evaluations(ctx: &Context, tenant_id: &UserId) -> Result<Vec<Evaluation>, SaraError> {
    let query = Query::collection(paths::EVALUATIONS)
        .where_eq("tenant_id", tenant_id.as_str())
        .where_eq("status", EvaluationStatus::Completada.as_str());
    let mut list: Vec<Evaluation> = repo::find_values(ctx.store(), &query).await?;
    list.sort_by(|a, b| b.completed_at.cmp(&a.completed_at).then(b.id.cmp(&a.id)));
    Ok(list)
}

/// Tenant history is visible to the tenant, admins and their landlords
pub(crate) async fn ensure_can_view_tenant(ctx: &Context, principal: &Principal, tenant_id: &UserId) -> Result<(), SaraError> {
    if principal.is_self_or_admin(tenant_id) {
        return Ok(());
    }
    if principal.role == Role::Arrendador {
        let query = Query::collection(paths::CONTRACTS)
            .where_eq("landlord_id", principal.uid.as_str())
            .where_eq("tenant_id", tenant_id.as_str())
            .limit(1);
        if !ctx.store().query(&query).await?.is_empty() {
            return Ok(());
        }
    }
    tracing::warn!(uid = %principal.uid, tenant = %tenant_id, "Tenant history requested without a contract");
    Err(SaraError::Forbidden("no contract with this tenant".into()))
}
