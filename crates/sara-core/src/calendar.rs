//! Calendar of contract dates and rent due dates

use crate::auth::Principal;
use crate::context::Context;
use crate::error::SaraError;
use crate::paths;
use crate::payments::list_payments;
use crate::repo;
use chrono::NaiveDate;
use sara_domain::{Clp, Contract, ContractId, ContractStatus, PaymentStatus, Period, Role, ValidationErrors};
use sara_store::Query;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;

/// Longest range a single request may span, in days
pub const MAX_RANGE_DAYS: i64 = 731;

/// What happens on a calendar date
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// Lease begins
    ContractStart,
    /// Lease ends
    ContractEnd,
    /// Monthly rent is due
    PaymentDue,
}

/// One calendar entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CalendarEvent {
    /// Date
    pub date: NaiveDate,
    /// Kind
    pub kind: EventKind,
    /// Contract concerned
    pub contract_id: ContractId,
    /// Property name
    pub property_name: String,
    /// Short label
    pub title: String,
    /// Rent, for due dates
    pub amount: Option<Clp>,
    /// For due dates, whether an accepted payment covers the month
    pub paid: bool,
}

/// Events of one contract within `[from, to]`
///
/// One due event per month from the contract start through
/// `min(end, to)`, on the payment day clamped to the month length.
#[must_use]
pub fn contract_events(contract: &Contract, paid: &HashSet<Period>, from: NaiveDate, to: NaiveDate) -> Vec<CalendarEvent> {
    let in_range = |d: NaiveDate| d >= from && d <= to;
    let event = |date, kind, title: String| CalendarEvent {
        date,
        kind,
        contract_id: contract.id,
        property_name: contract.property_name.clone(),
        title,
        amount: None,
        paid: false,
    };
    let mut events = Vec::new();
    if in_range(contract.start_date) {
        events.push(event(
            contract.start_date,
            EventKind::ContractStart,
            format!("Inicio de contrato: {}", contract.property_name),
        ));
    }

    let last = Period::of(contract.end_date.min(to));
    let mut period = Period::of(contract.start_date).max(Period::of(from));
    while period <= last {
        let due = contract.due_date(period);
        if in_range(due) && due >= contract.start_date && due <= contract.end_date {
            let mut e = event(due, EventKind::PaymentDue, format!("Pago de arriendo: {}", contract.property_name));
            e.amount = Some(contract.rent);
            e.paid = paid.contains(&period);
            events.push(e);
        }
        period = period.next();
    }

    if in_range(contract.end_date) {
        events.push(event(
            contract.end_date,
            EventKind::ContractEnd,
            format!("Término de contrato: {}", contract.property_name),
        ));
    }
    events
}

/// Calendar service
#[derive(Debug, Clone)]
pub struct CalendarService {
    ctx: Arc<Context>,
}

impl CalendarService {
    pub(crate) fn new(ctx: Arc<Context>) -> Self {
        Self { ctx }
    }

    /// Events of the caller's active contracts between `from` and `to`, by date
    ///
    /// # Errors
    /// `Validation` for an inverted or overlong range
    pub async fn events_for(&self, principal: &Principal, from: NaiveDate, to: NaiveDate) -> Result<Vec<CalendarEvent>, SaraError> {
        let mut errors = ValidationErrors::new();
        errors.check(from <= to, "to", "must not be before from");
        errors.check(
            (to - from).num_days() <= MAX_RANGE_DAYS,
            "to",
            &format!("range cannot exceed {MAX_RANGE_DAYS} days"),
        );
        errors.into_result()?;

        let mut query = Query::collection(paths::CONTRACTS).where_eq("status", ContractStatus::Activo.as_str());
        query = match principal.role {
            Role::Admin => query,
            Role::Arrendador => query.where_eq("landlord_id", principal.uid.as_str()),
            Role::Inquilino => query.where_eq("tenant_id", principal.uid.as_str()),
        };
        let contracts: Vec<Contract> = repo::find_values(self.ctx.store(), &query).await?;

        let mut events = Vec::new();
        for contract in &contracts {
            let paid: HashSet<Period> = list_payments(&self.ctx, contract.id)
                .await?
                .into_iter()
                .filter(|p| p.status == PaymentStatus::Aceptado)
                .map(|p| p.period)
                .collect();
            events.extend(contract_events(contract, &paid, from, to));
        }
        events.sort_by(|a, b| a.date.cmp(&b.date).then(a.contract_id.cmp(&b.contract_id)));
        Ok(events)
    }
}
