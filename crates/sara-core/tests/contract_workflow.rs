//! Contract lifecycle end to end over the in-memory stores

use pretty_assertions::assert_eq;
use sara_core::{Delivery, SaraError, Upload};
use sara_domain::{
    Announcement, AnnouncementKind, Clp, ContractAmendment, ContractStatus, EvaluationStatus,
    InvitationStatus, PropertyStatus, Role,
};
use sara_store::{DocumentStore, Query};
use sara_test_utils::{new_account, TestApp};

const TENANT_EMAIL: &str = "tomas.inquilino@example.cl";

async fn announcements(app: &TestApp, uid: &str) -> Vec<Announcement> {
    let docs = app
        .store
        .query(&Query::collection("announcements").where_eq("user_id", uid))
        .await
        .unwrap();
    docs.iter().map(|d| d.decode().unwrap()).collect()
}

#[tokio::test]
async fn created_contract_carries_denormalized_names() {
    let app = TestApp::new();
    let landlord = app.landlord().await;
    let tenant = app.tenant().await;
    let property = app.property(&landlord, "Depto Providencia").await;

    let created = app
        .sara
        .contracts()
        .create(&landlord, sara_test_utils::new_contract(&property, "  Tomas.Inquilino@Example.cl "))
        .await
        .unwrap();
    let c = &created.contract;
    assert_eq!(c.status, ContractStatus::Pendiente);
    assert_eq!(c.property_name, "Depto Providencia");
    assert_eq!(c.property_address, property.address);
    assert_eq!(c.landlord_name, "Ana Arrendadora");
    assert_eq!(c.tenant_id.as_ref(), Some(&tenant.uid));
    assert_eq!(c.tenant_name.as_deref(), Some("Tomás Inquilino"));
    assert_eq!(c.tenant_email, TENANT_EMAIL);
    assert_eq!(c.rent, Clp(450_000));
    assert!(created.invitation.is_none());
    assert_eq!(created.delivery, Delivery::Skipped);

    let inbox = announcements(&app, tenant.uid.as_str()).await;
    assert_eq!(inbox.len(), 1);
    assert_eq!(inbox[0].kind, AnnouncementKind::Contract);
    assert_eq!(inbox[0].related_id.as_deref(), Some(c.id.to_string().as_str()));
}

#[tokio::test]
async fn approval_rents_the_property_and_notifies_both() {
    let app = TestApp::new();
    let (landlord, tenant, contract) = app.active_contract().await;
    assert_eq!(contract.status, ContractStatus::Activo);
    assert!(contract.activated_at.is_some());

    let property = app.sara.properties().get(&landlord, contract.property_id).await.unwrap();
    assert_eq!(property.status, PropertyStatus::Arrendada);
    assert_eq!(property.current_contract_id, Some(contract.id));

    let landlord_inbox = announcements(&app, landlord.uid.as_str()).await;
    assert!(landlord_inbox.iter().any(|a| a.title == "Contrato aprobado"));
    let tenant_inbox = announcements(&app, tenant.uid.as_str()).await;
    assert!(tenant_inbox.iter().any(|a| a.title == "Contrato activo"));

    let err = app.sara.contracts().approve(&tenant, contract.id).await.unwrap_err();
    assert!(matches!(err, SaraError::InvalidTransition(_)));
}

#[tokio::test]
async fn concurrent_approvals_commit_once() {
    let app = TestApp::new();
    let landlord = app.landlord().await;
    let tenant = app.tenant().await;
    let property = app.property(&landlord, "Casa Ñuñoa").await;
    let contract = app.contract(&landlord, &property, TENANT_EMAIL).await;

    let contracts = app.sara.contracts();
    let (a, b) = tokio::join!(contracts.approve(&tenant, contract.id), contracts.approve(&tenant, contract.id));
    assert_eq!(u8::from(a.is_ok()) + u8::from(b.is_ok()), 1);

    let approved = announcements(&app, landlord.uid.as_str())
        .await
        .into_iter()
        .filter(|a| a.title == "Contrato aprobado")
        .count();
    assert_eq!(approved, 1);
}

#[tokio::test]
async fn unavailable_property_blocks_approval_and_leaves_contract_pending() {
    let app = TestApp::new();
    let landlord = app.landlord().await;
    let tenant = app.tenant().await;
    let property = app.property(&landlord, "Oficina Centro").await;
    let contract = app.contract(&landlord, &property, TENANT_EMAIL).await;

    // Flip the property behind the service's back.
    let path = sara_core::paths::property(property.id);
    let mut batch = sara_store::WriteBatch::new();
    batch
        .update(path, serde_json::json!({"status": "Mantenimiento"}), sara_store::Precondition::Exists)
        .unwrap();
    app.store.commit(batch).await.unwrap();

    let err = app.sara.contracts().approve(&tenant, contract.id).await.unwrap_err();
    assert_eq!(err.code(), "conflict");
    let current = app.sara.contracts().get(&tenant, contract.id).await.unwrap();
    assert_eq!(current.status, ContractStatus::Pendiente);
}

#[tokio::test]
async fn one_open_contract_per_property() {
    let app = TestApp::new();
    let landlord = app.landlord().await;
    app.tenant().await;
    let property = app.property(&landlord, "Depto Providencia").await;
    app.contract(&landlord, &property, TENANT_EMAIL).await;

    let err = app
        .sara
        .contracts()
        .create(&landlord, sara_test_utils::new_contract(&property, "otra@example.cl"))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "conflict");
}

#[tokio::test]
async fn unknown_tenant_is_invited_and_linked_on_registration() {
    let app = TestApp::new();
    let landlord = app.landlord().await;
    let property = app.property(&landlord, "Depto Providencia").await;

    let created = app
        .sara
        .contracts()
        .create(&landlord, sara_test_utils::new_contract(&property, "nueva@example.cl"))
        .await
        .unwrap();
    assert!(created.contract.tenant_id.is_none());
    let invitation = created.invitation.expect("invitation");
    assert_eq!(created.contract.invitation_id, Some(invitation.id));
    assert!(created.delivery.is_sent());
    let sent = app.mailer.sent_to("nueva@example.cl");
    assert_eq!(sent.len(), 1);
    assert!(sent[0].html.contains(&format!("registro?invitacion={}", invitation.id)));

    let registered = app
        .sara
        .accounts()
        .register(new_account("nueva@example.cl", "Nueva Inquilina", Role::Inquilino))
        .await
        .unwrap();
    assert_eq!(registered.linked_contracts, vec![created.contract.id]);

    let tenant = sara_core::Principal::new(registered.profile.id.as_str(), Role::Inquilino);
    let contract = app.sara.contracts().get(&tenant, created.contract.id).await.unwrap();
    assert_eq!(contract.tenant_name.as_deref(), Some("Nueva Inquilina"));
    let invitations = app.sara.invitations().list_for_landlord(&landlord).await.unwrap();
    assert_eq!(invitations[0].status, InvitationStatus::Aceptada);
}

#[tokio::test]
async fn expired_invitation_is_not_linked() {
    let app = TestApp::new();
    let landlord = app.landlord().await;
    let property = app.property(&landlord, "Depto Providencia").await;
    let created = app
        .sara
        .contracts()
        .create(&landlord, sara_test_utils::new_contract(&property, "tarde@example.cl"))
        .await
        .unwrap();

    app.clock.advance(chrono::Duration::days(8));
    let registered = app
        .sara
        .accounts()
        .register(new_account("tarde@example.cl", "Inquilina Tardía", Role::Inquilino))
        .await
        .unwrap();
    assert!(registered.linked_contracts.is_empty());
    let contract = app.sara.contracts().get(&landlord, created.contract.id).await.unwrap();
    assert!(contract.tenant_id.is_none());
    let invitations = app.sara.invitations().list_for_landlord(&landlord).await.unwrap();
    assert_eq!(invitations[0].status, InvitationStatus::Expirada);
}

#[tokio::test]
async fn reject_requires_reason_and_notifies_landlord() {
    let app = TestApp::new();
    let landlord = app.landlord().await;
    let tenant = app.tenant().await;
    let property = app.property(&landlord, "Depto Providencia").await;
    let contract = app.contract(&landlord, &property, TENANT_EMAIL).await;

    let err = app.sara.contracts().reject(&tenant, contract.id, " ").await.unwrap_err();
    assert_eq!(err.code(), "validation_failed");

    let rejected = app
        .sara
        .contracts()
        .reject(&tenant, contract.id, "El arriendo es muy alto")
        .await
        .unwrap();
    assert_eq!(rejected.status, ContractStatus::Rechazado);
    assert_eq!(rejected.rejection_reason.as_deref(), Some("El arriendo es muy alto"));
    let inbox = announcements(&app, landlord.uid.as_str()).await;
    assert!(inbox.iter().any(|a| a.body.contains("El arriendo es muy alto")));

    // The property is free for a new offer.
    app.contract(&landlord, &property, TENANT_EMAIL).await;
}

#[tokio::test]
async fn only_the_landlord_cancels() {
    let app = TestApp::new();
    let landlord = app.landlord().await;
    let tenant = app.tenant().await;
    let property = app.property(&landlord, "Depto Providencia").await;
    let contract = app.contract(&landlord, &property, TENANT_EMAIL).await;

    let err = app.sara.contracts().cancel(&tenant, contract.id).await.unwrap_err();
    assert_eq!(err.code(), "forbidden");
    let cancelled = app.sara.contracts().cancel(&landlord, contract.id).await.unwrap();
    assert_eq!(cancelled.status, ContractStatus::Cancelado);
    assert!(cancelled.closed_at.is_some());
}

#[tokio::test]
async fn strangers_cannot_see_contracts() {
    let app = TestApp::new();
    let (_, _, contract) = app.active_contract().await;
    let other = app.user("otra@example.cl", "Otra Persona", Role::Inquilino).await;
    let err = app.sara.contracts().get(&other, contract.id).await.unwrap_err();
    assert_eq!(err.code(), "not_found");
    assert!(app.sara.contracts().list_for(&other).await.unwrap().is_empty());
    assert_eq!(app.sara.contracts().list_for(&TestApp::admin()).await.unwrap().len(), 1);
}

#[tokio::test]
async fn finalize_frees_property_and_opens_evaluation() {
    let app = TestApp::new();
    let (landlord, _tenant, contract) = app.active_contract().await;

    let finalized = app.sara.contracts().finalize(&landlord, contract.id).await.unwrap();
    assert_eq!(finalized.status, ContractStatus::Finalizado);
    let property = app.sara.properties().get(&landlord, contract.property_id).await.unwrap();
    assert_eq!(property.status, PropertyStatus::Disponible);
    assert_eq!(property.current_contract_id, None);

    let pending = app.sara.evaluations().pending_for(&landlord).await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].contract_id, contract.id);
    assert_eq!(pending[0].status, EvaluationStatus::Pendiente);
}

#[tokio::test]
async fn observation_round_trip_with_amendment() {
    let app = TestApp::new();
    let landlord = app.landlord().await;
    let tenant = app.tenant().await;
    let property = app.property(&landlord, "Depto Providencia").await;
    let contract = app.contract(&landlord, &property, TENANT_EMAIL).await;
    let contracts = app.sara.contracts();

    let observed = contracts
        .add_observation(&tenant, contract.id, "¿Se puede bajar el arriendo?")
        .await
        .unwrap();
    let observation_id = observed.observations[0].id;
    let err = contracts
        .add_observation(&tenant, contract.id, "Otra consulta")
        .await
        .unwrap_err();
    assert_eq!(err.code(), "conflict");

    let amendment = ContractAmendment {
        rent: Some(Clp(420_000)),
        ..ContractAmendment::default()
    };
    let answered = contracts
        .respond_observation(&landlord, contract.id, observation_id, "Acepto 420.000", Some(amendment))
        .await
        .unwrap();
    assert_eq!(answered.rent, Clp(420_000));
    let response = answered.observations[0].response.as_ref().unwrap();
    assert_eq!(response.text, "Acepto 420.000");
    assert!(response.amendment.is_some());

    let err = contracts
        .respond_observation(&landlord, contract.id, observation_id, "De nuevo", None)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "conflict");

    // Answered, so a new observation is allowed.
    contracts
        .add_observation(&tenant, contract.id, "Gracias, lo reviso")
        .await
        .unwrap();
}

#[tokio::test]
async fn pdf_attachment_checks_content() {
    let app = TestApp::new();
    let (landlord, tenant, contract) = app.active_contract().await;
    let contracts = app.sara.contracts();

    let err = contracts
        .attach_pdf(&landlord, contract.id, bytes::Bytes::from_static(b"hola"))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "validation_failed");
    let err = contracts
        .attach_pdf(&tenant, contract.id, bytes::Bytes::from_static(b"%PDF-1.7 test"))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "forbidden");

    let updated = contracts
        .attach_pdf(&landlord, contract.id, bytes::Bytes::from_static(b"%PDF-1.7 test"))
        .await
        .unwrap();
    let url = updated.pdf_url.unwrap();
    assert!(url.starts_with(&format!("memory://blobs/contracts/{}/", contract.id)));
    assert_eq!(app.blobs.len(), 1);
}

#[tokio::test]
async fn uploads_respect_the_size_limit() {
    let mut config = sara_test_utils::test_config();
    config.limits.max_upload_bytes = 4;
    let app = TestApp::with_config(config);
    let landlord = app.landlord().await;
    let err = app
        .sara
        .files()
        .upload(&landlord, Upload::new("foto.jpg", "image/jpeg", vec![0_u8; 5]))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "validation_failed");
}
