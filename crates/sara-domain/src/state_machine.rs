//! Status transition tables
//!
//! Every status change goes through `validate_*_transition`; a transition
//! missing from the table is refused.

use crate::status::{ContractStatus, EvaluationStatus, IncidentStatus, PaymentStatus};

/// Refused status change
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("illegal {kind} transition: {from} -> {to}")]
pub struct TransitionError {
    /// Record kind
    pub kind: &'static str,
    /// Current status
    pub from: String,
    /// Requested status
    pub to: String,
}

/// Contract statuses reachable from `from`
#[must_use]
pub fn allowed_contract_transitions(from: ContractStatus) -> Vec<ContractStatus> {
    use ContractStatus::*;
    match from {
        Pendiente => vec![Activo, Rechazado, Cancelado],
        Activo => vec![Finalizado],
        Rechazado | Cancelado | Finalizado => vec![],
    }
}

/// Payment statuses reachable from `from`
#[must_use]
pub fn allowed_payment_transitions(from: PaymentStatus) -> Vec<PaymentStatus> {
    use PaymentStatus::*;
    match from {
        Pendiente => vec![Aceptado, Rechazado],
        Aceptado | Rechazado => vec![],
    }
}

/// Incident statuses reachable from `from`
#[must_use]
pub fn allowed_incident_transitions(from: IncidentStatus) -> Vec<IncidentStatus> {
    use IncidentStatus::*;
    match from {
        Pendiente => vec![EnProceso, Resuelto],
        EnProceso => vec![Resuelto],
        Resuelto => vec![],
    }
}

/// Evaluation statuses reachable from `from`
#[must_use]
pub fn allowed_evaluation_transitions(from: EvaluationStatus) -> Vec<EvaluationStatus> {
    use EvaluationStatus::*;
    match from {
        Pendiente => vec![Completada],
        Completada => vec![],
    }
}

macro_rules! validator {
    ($fn_name:ident, $ty:ty, $table:ident, $kind:literal) => {
        /// Check a transition against its table
        ///
        /// # Errors
        /// `TransitionError` when the table has no such edge
        pub fn $fn_name(from: $ty, to: $ty) -> Result<(), TransitionError> {
            if $table(from).contains(&to) {
                Ok(())
            } else {
                Err(TransitionError {
                    kind: $kind,
                    from: from.to_string(),
                    to: to.to_string(),
                })
            }
        }
    };
}

validator!(validate_contract_transition, ContractStatus, allowed_contract_transitions, "contract");
validator!(validate_payment_transition, PaymentStatus, allowed_payment_transitions, "payment");
validator!(validate_incident_transition, IncidentStatus, allowed_incident_transitions, "incident");
validator!(
    validate_evaluation_transition,
    EvaluationStatus,
    allowed_evaluation_transitions,
    "evaluation"
);

/// Whether a contract status is terminal
#[must_use]
pub fn is_terminal(status: ContractStatus) -> bool {
    allowed_contract_transitions(status).is_empty()
}
