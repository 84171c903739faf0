//! Payments, incidents, evaluations, and what the certificate and calendar
//! make of them

use chrono::{TimeZone, Utc};
use pretty_assertions::assert_eq;
use sara_core::{Classification, EventKind, Principal, Upload};
use sara_domain::{
    Clp, Contract, EvaluationScores, EvaluationStatus, EvaluationSubmission, IncidentPriority,
    IncidentStatus, NewIncident, NewPayment, PaymentMethod, PaymentStatus, Period, Role,
};
use sara_test_utils::{date, TestApp};

fn payment(year: i32, month: u32, paid_day: u32) -> NewPayment {
    NewPayment {
        period: Period::new(year, month).unwrap(),
        amount: Clp(450_000),
        paid_on: date(year, month, paid_day),
        method: PaymentMethod::Transferencia,
        note: Some("Transferencia Banco Estado".into()),
    }
}

fn scores(value: u8) -> EvaluationSubmission {
    EvaluationSubmission {
        scores: EvaluationScores {
            payment_punctuality: value,
            property_care: value,
            communication: value,
            rule_compliance: value,
        },
        comment: Some("Buen arrendatario".into()),
    }
}

async fn active_in_june() -> (TestApp, Principal, Principal, Contract) {
    let app = TestApp::new();
    let (landlord, tenant, contract) = app.active_contract().await;
    app.clock.set(Utc.with_ymd_and_hms(2024, 6, 20, 15, 0, 0).unwrap());
    (app, landlord, tenant, contract)
}

#[tokio::test]
async fn duplicate_period_only_after_rejection() {
    let (app, landlord, tenant, contract) = active_in_june().await;
    let payments = app.sara.payments();

    let first = payments
        .declare(&tenant, contract.id, payment(2024, 4, 4), None)
        .await
        .unwrap();
    assert_eq!(first.status, PaymentStatus::Pendiente);
    let err = payments
        .declare(&tenant, contract.id, payment(2024, 4, 6), None)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "conflict");

    payments
        .reject(&landlord, contract.id, first.id, "No llegó la transferencia")
        .await
        .unwrap();
    let second = payments
        .declare(&tenant, contract.id, payment(2024, 4, 6), None)
        .await
        .unwrap();
    let accepted = payments.accept(&landlord, contract.id, second.id).await.unwrap();
    assert_eq!(accepted.status, PaymentStatus::Aceptado);
    assert!(accepted.reviewed_at.is_some());
    assert!(!payments.is_on_time(&tenant, contract.id, second.id).await.unwrap());

    let err = payments.accept(&landlord, contract.id, second.id).await.unwrap_err();
    assert_eq!(err.code(), "invalid_transition");
    let list = payments.list(&tenant, contract.id).await.unwrap();
    assert_eq!(list.len(), 2);
}

#[tokio::test]
async fn payments_validated_against_contract() {
    let (app, landlord, tenant, contract) = active_in_june().await;
    let payments = app.sara.payments();

    let err = payments
        .declare(&tenant, contract.id, payment(2024, 3, 4), None)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "validation_failed");
    let mut future = payment(2024, 6, 4);
    future.paid_on = date(2024, 6, 30);
    let err = payments.declare(&tenant, contract.id, future, None).await.unwrap_err();
    assert_eq!(err.code(), "validation_failed");
    let err = payments
        .declare(&landlord, contract.id, payment(2024, 5, 4), None)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "forbidden");
}

#[tokio::test]
async fn receipt_is_stored_with_the_payment() {
    let (app, _landlord, tenant, contract) = active_in_june().await;
    let receipt = Upload::new("comprobante mayo.pdf", "application/pdf", b"%PDF-1.4 comprobante".to_vec());
    let declared = app
        .sara
        .payments()
        .declare(&tenant, contract.id, payment(2024, 5, 3), Some(receipt))
        .await
        .unwrap();
    let url = declared.receipt_url.unwrap();
    assert!(url.contains(&format!("receipts/{}/", contract.id)));
    assert!(url.ends_with("comprobante_mayo.pdf"));
}

#[tokio::test]
async fn incident_lifecycle() {
    let (app, landlord, tenant, contract) = active_in_june().await;
    let incidents = app.sara.incidents();
    let report = NewIncident {
        contract_id: contract.id,
        title: "Fuga en el baño".into(),
        description: "Gotea la llave del lavamanos desde ayer".into(),
        priority: IncidentPriority::Alta,
    };
    let photo = Upload::new("fuga.jpg", "image/jpeg", vec![1_u8, 2, 3]);
    let incident = incidents.report(&tenant, report, vec![photo]).await.unwrap();
    assert_eq!(incident.status, IncidentStatus::Pendiente);
    assert_eq!(incident.attachments.len(), 1);
    assert_eq!(incident.landlord_id, landlord.uid);

    let err = incidents
        .respond(&tenant, incident.id, "¿Alguna novedad?", None)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "forbidden");

    let working = incidents
        .respond(&landlord, incident.id, "Mañana va el gasfíter", Some(IncidentStatus::EnProceso))
        .await
        .unwrap();
    assert_eq!(working.status, IncidentStatus::EnProceso);
    let err = incidents
        .respond(&landlord, incident.id, "Volvemos atrás", Some(IncidentStatus::Pendiente))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "invalid_transition");
    let done = incidents
        .respond(&landlord, incident.id, "Reparado", Some(IncidentStatus::Resuelto))
        .await
        .unwrap();
    assert!(done.resolved_at.is_some());
    assert_eq!(done.responses.len(), 2);

    assert_eq!(incidents.list_for(&landlord).await.unwrap().len(), 1);
    assert_eq!(incidents.list_for(&tenant).await.unwrap().len(), 1);
}

#[tokio::test]
async fn one_evaluation_per_contract() {
    let (app, landlord, tenant, contract) = active_in_june().await;
    let evaluations = app.sara.evaluations();

    let err = evaluations.submit(&landlord, contract.id, scores(6)).await.unwrap_err();
    assert_eq!(err.code(), "validation_failed");
    let evaluation = evaluations.submit(&landlord, contract.id, scores(4)).await.unwrap();
    assert_eq!(evaluation.status, EvaluationStatus::Completada);
    let err = evaluations.submit(&landlord, contract.id, scores(5)).await.unwrap_err();
    assert_eq!(err.code(), "conflict");

    // Finalizing does not open a second, pending one.
    app.sara.contracts().finalize(&landlord, contract.id).await.unwrap();
    assert!(evaluations.pending_for(&landlord).await.unwrap().is_empty());
    assert_eq!(evaluations.list_for_tenant(&tenant, &tenant.uid).await.unwrap().len(), 1);
}

#[tokio::test]
async fn pending_evaluation_completed_after_finalize() {
    let (app, landlord, tenant, contract) = active_in_june().await;
    app.sara.contracts().finalize(&landlord, contract.id).await.unwrap();
    let evaluations = app.sara.evaluations();
    let pending = evaluations.pending_for(&landlord).await.unwrap();
    let completed = evaluations.submit(&landlord, contract.id, scores(5)).await.unwrap();
    assert_eq!(completed.id, pending[0].id);
    assert!(evaluations.pending_for(&landlord).await.unwrap().is_empty());
    let list = evaluations.list_for_tenant(&landlord, &tenant.uid).await.unwrap();
    assert_eq!(list[0].scores.map(|s| s.average()), Some(5.0));
}

#[tokio::test]
async fn certificate_reflects_history_and_refreshes() {
    let (app, landlord, tenant, contract) = active_in_june().await;
    let certificates = app.sara.certificates();

    let empty = certificates.build(&tenant, &tenant.uid).await.unwrap();
    assert_eq!(empty.classification, Classification::SinEvaluaciones);
    assert_eq!(empty.contracts.active, 1);

    let payments = app.sara.payments();
    let on_time = payments.declare(&tenant, contract.id, payment(2024, 4, 2), None).await.unwrap();
    let late = payments.declare(&tenant, contract.id, payment(2024, 5, 20), None).await.unwrap();
    payments.accept(&landlord, contract.id, on_time.id).await.unwrap();
    payments.accept(&landlord, contract.id, late.id).await.unwrap();
    let mut submission = scores(4);
    submission.scores.payment_punctuality = 5;
    app.sara.evaluations().submit(&landlord, contract.id, submission).await.unwrap();

    let cert = certificates.build(&landlord, &tenant.uid).await.unwrap();
    assert_eq!(cert.payments.declared, 2);
    assert_eq!(cert.payments.accepted, 2);
    assert_eq!(cert.payments.on_time, 1);
    assert_eq!(cert.payments.on_time_ratio, Some(0.5));
    assert_eq!(cert.evaluations.overall, Some(4.25));
    assert_eq!(cert.classification, Classification::Bueno);

    let html = certificates.html(&TestApp::admin(), &tenant.uid).await.unwrap();
    assert!(html.contains("Tomás Inquilino"));
    assert!(html.contains("Bueno"));
}

#[tokio::test]
async fn certificate_hidden_from_unrelated_landlords() {
    let (app, _landlord, tenant, _contract) = active_in_june().await;
    let stranger = app.user("otro.arrendador@example.cl", "Otro Arrendador", Role::Arrendador).await;
    let err = app.sara.certificates().build(&stranger, &tenant.uid).await.unwrap_err();
    assert_eq!(err.code(), "forbidden");
}

#[tokio::test]
async fn calendar_marks_paid_months() {
    let (app, landlord, tenant, contract) = active_in_june().await;
    let payments = app.sara.payments();
    let april = payments.declare(&tenant, contract.id, payment(2024, 4, 2), None).await.unwrap();
    payments.accept(&landlord, contract.id, april.id).await.unwrap();

    let events = app
        .sara
        .calendar()
        .events_for(&tenant, date(2024, 3, 1), date(2024, 6, 30))
        .await
        .unwrap();
    let kinds: Vec<EventKind> = events.iter().map(|e| e.kind).collect();
    assert_eq!(
        kinds,
        vec![EventKind::ContractStart, EventKind::PaymentDue, EventKind::PaymentDue, EventKind::PaymentDue]
    );
    let paid: Vec<bool> = events[1..].iter().map(|e| e.paid).collect();
    assert_eq!(paid, vec![true, false, false]);
    assert_eq!(events[1].date, date(2024, 4, 5));

    let err = app
        .sara
        .calendar()
        .events_for(&landlord, date(2024, 6, 1), date(2024, 5, 1))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "validation_failed");
}

#[tokio::test]
async fn certificate_refreshes_after_declaration_and_report() {
    let (app, _landlord, tenant, contract) = active_in_june().await;
    let certificates = app.sara.certificates();
    let before = certificates.build(&tenant, &tenant.uid).await.unwrap();
    assert_eq!(before.payments.declared, 0);
    assert_eq!(before.incidents.total, 0);

    app.sara
        .payments()
        .declare(&tenant, contract.id, payment(2024, 4, 3), None)
        .await
        .unwrap();
    let report = NewIncident {
        contract_id: contract.id,
        title: "Calefont no enciende".into(),
        description: "El calefont se apaga al abrir el agua caliente".into(),
        priority: IncidentPriority::Media,
    };
    app.sara.incidents().report(&tenant, report, Vec::new()).await.unwrap();

    let after = certificates.build(&tenant, &tenant.uid).await.unwrap();
    assert_eq!(after.payments.declared, 1);
    assert_eq!(after.payments.pending, 1);
    assert_eq!(after.incidents.total, 1);
    assert_eq!(after.incidents.pending, 1);
}
