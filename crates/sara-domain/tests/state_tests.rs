use sara_domain::state_machine::{
    allowed_contract_transitions, allowed_incident_transitions, is_terminal,
    validate_contract_transition, validate_incident_transition, validate_payment_transition,
};
use sara_domain::{ContractStatus, IncidentStatus, PaymentStatus};
use proptest::prelude::*;

#[test]
fn test_pending_contract_transitions() {
    assert!(validate_contract_transition(ContractStatus::Pendiente, ContractStatus::Activo).is_ok());
    assert!(validate_contract_transition(ContractStatus::Pendiente, ContractStatus::Rechazado).is_ok());
    assert!(validate_contract_transition(ContractStatus::Pendiente, ContractStatus::Cancelado).is_ok());

    // A pending contract was never active, so it cannot be finalized
    assert!(validate_contract_transition(ContractStatus::Pendiente, ContractStatus::Finalizado).is_err());
}

#[test]
fn test_active_contract_only_finalizes() {
    assert!(validate_contract_transition(ContractStatus::Activo, ContractStatus::Finalizado).is_ok());
    assert!(validate_contract_transition(ContractStatus::Activo, ContractStatus::Rechazado).is_err());
    assert!(validate_contract_transition(ContractStatus::Activo, ContractStatus::Pendiente).is_err());
}

#[test]
fn test_terminal_contract_statuses() {
    assert!(is_terminal(ContractStatus::Rechazado));
    assert!(is_terminal(ContractStatus::Cancelado));
    assert!(is_terminal(ContractStatus::Finalizado));
    assert!(!is_terminal(ContractStatus::Activo));
}

#[test]
fn test_payment_review_is_final() {
    assert!(validate_payment_transition(PaymentStatus::Pendiente, PaymentStatus::Aceptado).is_ok());
    assert!(validate_payment_transition(PaymentStatus::Aceptado, PaymentStatus::Rechazado).is_err());
}

#[test]
fn test_incident_can_skip_in_progress() {
    assert!(validate_incident_transition(IncidentStatus::Pendiente, IncidentStatus::Resuelto).is_ok());
    assert!(validate_incident_transition(IncidentStatus::Resuelto, IncidentStatus::EnProceso).is_err());
}

#[test]
fn test_error_names_both_ends() {
    let err = validate_contract_transition(ContractStatus::Finalizado, ContractStatus::Activo).unwrap_err();
    assert_eq!(err.to_string(), "illegal contract transition: Finalizado -> Activo");
}

fn contract_status() -> impl Strategy<Value = ContractStatus> {
    prop::sample::select(ContractStatus::ALL.to_vec())
}

fn incident_status() -> impl Strategy<Value = IncidentStatus> {
    prop::sample::select(IncidentStatus::ALL.to_vec())
}

proptest! {
    #[test]
    fn prop_contract_validation_matches_table(from in contract_status(), to in contract_status()) {
        let res = validate_contract_transition(from, to);
        prop_assert_eq!(res.is_ok(), allowed_contract_transitions(from).contains(&to));
    }

    #[test]
    fn prop_incident_validation_matches_table(from in incident_status(), to in incident_status()) {
        let res = validate_incident_transition(from, to);
        prop_assert_eq!(res.is_ok(), allowed_incident_transitions(from).contains(&to));
    }

    #[test]
    fn prop_no_self_transitions(status in contract_status()) {
        prop_assert!(validate_contract_transition(status, status).is_err());
    }

    #[test]
    fn prop_status_parse_ignores_case(status in contract_status(), upper in any::<bool>()) {
        let spelled = if upper {
            status.as_str().to_uppercase()
        } else {
            status.as_str().to_lowercase()
        };
        prop_assert_eq!(spelled.parse::<ContractStatus>().unwrap(), status);
    }
}
