//! Rent payment declarations and landlord review

use crate::announcements::announce;
use crate::auth::Principal;
use crate::context::Context;
use crate::contracts::ContractService;
use crate::error::SaraError;
use crate::files::{store_upload, Upload};
use crate::paths;
use crate::repo;
use sara_domain::state_machine::validate_payment_transition;
use sara_domain::{
    AnnouncementKind, Contract, ContractId, ContractStatus, NewPayment, Payment, PaymentId,
    PaymentStatus, ValidationErrors,
};
use sara_store::{Precondition, Query, Versioned, WriteBatch};
use serde_json::json;
use std::sync::Arc;

/// Payment service
#[derive(Debug, Clone)]
pub struct PaymentService {
    ctx: Arc<Context>,
    contracts: ContractService,
}

impl PaymentService {
    pub(crate) fn new(ctx: Arc<Context>) -> Self {
        let contracts = ContractService::new(Arc::clone(&ctx));
        Self { ctx, contracts }
    }

    /// Tenant declares a payment for one month of an active contract
    ///
    /// A month can be declared again only after its previous declaration
    /// was rejected. The contract record is touched under its revision so
    /// two concurrent declarations for the same month cannot both land.
    ///
    /// # Errors
    /// `Validation` for bad input, `Conflict` for inactive contracts or a
    /// month already declared
    pub async fn declare(
        &self,
        principal: &Principal,
        contract_id: ContractId,
        new: NewPayment,
        receipt: Option<Upload>,
    ) -> Result<Payment, SaraError> {
        let contract = self.contracts.as_tenant(principal, contract_id).await?;
        if contract.value.status != ContractStatus::Activo {
            return Err(SaraError::Conflict(format!(
                "payments can only be declared on active contracts, this one is {}",
                contract.value.status
            )));
        }
        new.validate(&contract.value, self.ctx.today())?;
        let same_period = Query::collection(paths::payments(contract_id))
            .where_eq("period", new.period.to_string())
            .where_ne("status", PaymentStatus::Rechazado.as_str());
        if !self.ctx.store.query(&same_period).await?.is_empty() {
            return Err(SaraError::Conflict(format!("period {} was already declared", new.period)));
        }

        let receipt_url = match &receipt {
            Some(upload) => Some(store_upload(&self.ctx, &format!("receipts/{contract_id}"), upload).await?.url),
            None => None,
        };
        let now = self.ctx.now();
        let payment = Payment {
            id: PaymentId::new(),
            contract_id,
            tenant_id: principal.uid.clone(),
            period: new.period,
            amount: new.amount,
            paid_on: new.paid_on,
            method: new.method,
            note: new.note.map(|n| n.trim().to_string()).filter(|n| !n.is_empty()),
            receipt_url,
            status: PaymentStatus::Pendiente,
            rejection_reason: None,
            declared_at: now,
            reviewed_at: None,
        };

        let mut batch = WriteBatch::new();
        batch.update(
            paths::contract(contract_id),
            json!({ "updated_at": now }),
            Precondition::Revision(contract.revision),
        )?;
        batch.create(paths::payment(contract_id, payment.id), &payment)?;
        announce(
            &mut batch,
            &contract.value.landlord_id,
            AnnouncementKind::Payment,
            "Pago declarado",
            format!(
                "{} declaró el pago de {} por {} para {}.",
                contract.value.tenant_name.as_deref().unwrap_or("El arrendatario"),
                payment.period,
                payment.amount,
                contract.value.property_name
            ),
            Some(payment.id.to_string()),
            now,
        )?;
        self.ctx.store.commit(batch).await?;
        self.ctx.certificates.invalidate(&principal.uid).await;
        tracing::info!(contract_id = %contract_id, payment_id = %payment.id, period = %payment.period, "Payment declared");
        Ok(payment)
    }

    /// Landlord confirms a declared payment
    ///
    /// # Errors
    /// `InvalidTransition` unless pending review
    pub async fn accept(&self, principal: &Principal, contract_id: ContractId, id: PaymentId) -> Result<Payment, SaraError> {
        self.review(principal, contract_id, id, PaymentStatus::Aceptado, None).await
    }

    /// Landlord rejects a declared payment with a reason
    ///
    /// # Errors
    /// `Validation` for a missing reason, `InvalidTransition` unless pending review
    pub async fn reject(
        &self,
        principal: &Principal,
        contract_id: ContractId,
        id: PaymentId,
        reason: &str,
    ) -> Result<Payment, SaraError> {
        let mut errors = ValidationErrors::new();
        errors.text("reason", reason, 3, 500);
        errors.into_result()?;
        self.review(principal, contract_id, id, PaymentStatus::Rechazado, Some(reason.trim().to_string()))
            .await
    }

    async fn review(
        &self,
        principal: &Principal,
        contract_id: ContractId,
        id: PaymentId,
        to: PaymentStatus,
        reason: Option<String>,
    ) -> Result<Payment, SaraError> {
        let contract = self.contracts.as_landlord(principal, contract_id).await?.value;
        let current: Versioned<Payment> =
            repo::require(self.ctx.store(), &paths::payment(contract_id, id), "payment").await?;
        validate_payment_transition(current.value.status, to)?;

        let now = self.ctx.now();
        let mut payment = current.value;
        payment.status = to;
        payment.rejection_reason = reason;
        payment.reviewed_at = Some(now);
        let (title, body) = match to {
            PaymentStatus::Aceptado => (
                "Pago aceptado",
                format!("Tu pago de {} para {} fue aceptado.", payment.period, contract.property_name),
            ),
            _ => (
                "Pago rechazado",
                format!(
                    "Tu pago de {} para {} fue rechazado: {}",
                    payment.period,
                    contract.property_name,
                    payment.rejection_reason.as_deref().unwrap_or_default()
                ),
            ),
        };
        let mut batch = WriteBatch::new();
        batch.set_if(paths::payment(contract_id, id), &payment, current.revision)?;
        announce(
            &mut batch,
            &payment.tenant_id,
            AnnouncementKind::Payment,
            title,
            body,
            Some(id.to_string()),
            now,
        )?;
        self.ctx.store.commit(batch).await?;
        self.ctx.certificates.invalidate(&payment.tenant_id).await;
        tracing::info!(contract_id = %contract_id, payment_id = %id, status = %to, "Payment reviewed");
        Ok(payment)
    }

    /// Payments of a contract, newest period first
    ///
    /// # Errors
    /// `NotFound` when the caller is not a party
    pub async fn list(&self, principal: &Principal, contract_id: ContractId) -> Result<Vec<Payment>, SaraError> {
        self.contracts.visible(principal, contract_id).await?;
        list_payments(&self.ctx, contract_id).await
    }

    /// Whether a payment was made by its due date
    ///
    /// # Errors
    /// `NotFound` when the caller is not a party or the payment is unknown
    pub async fn is_on_time(&self, principal: &Principal, contract_id: ContractId, id: PaymentId) -> Result<bool, SaraError> {
        let contract = self.contracts.visible(principal, contract_id).await?.value;
        let payment: Payment = repo::require(self.ctx.store(), &paths::payment(contract_id, id), "payment")
            .await?
            .value;
        Ok(payment.is_on_time(&contract))
    }
}

/// Every payment of `contract_id`, newest period first
pub(crate) async fn list_payments(ctx: &Context, contract_id: ContractId) -> Result<Vec<Payment>, SaraError> {
    let query = Query::collection(paths::payments(contract_id));
    let mut list: Vec<Payment> = repo::find_values(ctx.store(), &query).await?;
    list.sort_by(|a, b| b.period.cmp(&a.period).then(b.declared_at.cmp(&a.declared_at)));
    Ok(list)
}

/// Payments of every contract in `contracts`
pub(crate) async fn payments_of(ctx: &Context, contracts: &[Contract]) -> Result<Vec<(ContractId, Payment)>, SaraError> {
    let mut out = Vec::new();
    for contract in contracts {
        for payment in list_payments(ctx, contract.id).await? {
            out.push((contract.id, payment));
        }
    }
    Ok(out)
}
