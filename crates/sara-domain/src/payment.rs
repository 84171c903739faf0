//! Payments (`contracts/{id}/payments` subcollection)

use crate::contract::Contract;
use crate::ids::{ContractId, PaymentId, UserId};
use crate::period::Period;
use crate::status::{PaymentMethod, PaymentStatus};
use crate::validation::{Clp, ValidationErrors};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Rent payment declared by a tenant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    /// Identifier
    pub id: PaymentId,
    /// Parent contract
    pub contract_id: ContractId,
    /// Declaring tenant
    pub tenant_id: UserId,
    /// Month being paid
    pub period: Period,
    /// Amount paid
    pub amount: Clp,
    /// Date the money was sent
    pub paid_on: NaiveDate,
    /// How it was paid
    pub method: PaymentMethod,
    /// Tenant note
    pub note: Option<String>,
    /// Uploaded receipt
    pub receipt_url: Option<String>,
    /// Review status
    pub status: PaymentStatus,
    /// Landlord reason when rejected
    pub rejection_reason: Option<String>,
    /// Declaration time
    pub declared_at: DateTime<Utc>,
    /// Review time
    pub reviewed_at: Option<DateTime<Utc>>,
}

impl Payment {
    /// Paid on or before the due date of its period
    #[must_use]
    pub fn is_on_time(&self, contract: &Contract) -> bool {
        self.paid_on <= contract.due_date(self.period)
    }
}

/// Payment declaration form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPayment {
    /// Month being paid
    pub period: Period,
    /// Amount paid
    pub amount: Clp,
    /// Date the money was sent
    pub paid_on: NaiveDate,
    /// How it was paid
    pub method: PaymentMethod,
    /// Tenant note
    #[serde(default)]
    pub note: Option<String>,
}

impl NewPayment {
    /// Validate against the contract and today's date
    ///
    /// # Errors
    /// Every failing field
    pub fn validate(&self, contract: &Contract, today: NaiveDate) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        errors.check(self.amount.is_positive(), "amount", "must be greater than zero");
        errors.check(self.paid_on <= today, "paid_on", "cannot be in the future");
        errors.check(
            contract.covers(self.period),
            "period",
            "is outside the contract term",
        );
        if let Some(note) = &self.note {
            errors.text("note", note, 0, 500);
        }
        errors.into_result()
    }
}
