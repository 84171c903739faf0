//! Interleaved operations on one contract
//!
//! The store yields to the scheduler before every call, so joined futures
//! read the same revisions before either commits.

use async_trait::async_trait;
use sara_core::{FixedClock, Principal, Sara};
use sara_domain::{Contract, EvaluationScores, EvaluationStatus, EvaluationSubmission, Role};
use sara_mail::RecordingMailer;
use sara_store::{
    CommitResult, DocPath, DocumentStore, MemoryBlobStore, MemoryStore, Query, StoreError,
    StoredDocument, WriteBatch,
};
use sara_test_utils::{epoch, new_account, new_contract, new_property, test_config, PASSWORD};
use std::sync::Arc;

#[derive(Debug)]
struct YieldingStore(MemoryStore);

#[async_trait]
impl DocumentStore for YieldingStore {
    async fn get(&self, path: &DocPath) -> Result<Option<StoredDocument>, StoreError> {
        tokio::task::yield_now().await;
        self.0.get(path).await
    }

    async fn query(&self, query: &Query) -> Result<Vec<StoredDocument>, StoreError> {
        tokio::task::yield_now().await;
        self.0.query(query).await
    }

    async fn commit(&self, batch: WriteBatch) -> Result<CommitResult, StoreError> {
        tokio::task::yield_now().await;
        self.0.commit(batch).await
    }
}

fn app() -> Sara {
    Sara::builder(test_config())
        .with_store(Arc::new(YieldingStore(MemoryStore::new())))
        .with_blobs(Arc::new(MemoryBlobStore::new()))
        .with_mailer(Arc::new(RecordingMailer::new()))
        .with_clock(Arc::new(FixedClock::new(epoch())))
        .build()
}

async fn user(sara: &Sara, email: &str, role: Role) -> Principal {
    sara.accounts()
        .register(new_account(email, "Usuario Prueba", role))
        .await
        .unwrap();
    let signed = sara.accounts().login(email, PASSWORD).await.unwrap();
    sara.accounts().principal(&signed.session.token).await.unwrap()
}

async fn active_contract(sara: &Sara) -> (Principal, Principal, Contract) {
    let landlord = user(sara, "ana.arrendadora@example.cl", Role::Arrendador).await;
    let tenant = user(sara, "tomas.inquilino@example.cl", Role::Inquilino).await;
    let property = sara
        .properties()
        .create(&landlord, new_property("Depto Providencia"))
        .await
        .unwrap();
    let created = sara
        .contracts()
        .create(&landlord, new_contract(&property, "tomas.inquilino@example.cl"))
        .await
        .unwrap();
    let contract = sara.contracts().approve(&tenant, created.contract.id).await.unwrap();
    (landlord, tenant, contract)
}

fn scores(value: u8) -> EvaluationSubmission {
    EvaluationSubmission {
        scores: EvaluationScores {
            payment_punctuality: value,
            property_care: value,
            communication: value,
            rule_compliance: value,
        },
        comment: None,
    }
}

async fn evaluations_for(sara: &Sara, landlord: &Principal, tenant: &Principal) -> usize {
    let evaluations = sara.evaluations();
    let completed = evaluations.list_for_tenant(landlord, &tenant.uid).await.unwrap();
    let pending = evaluations.pending_for(landlord).await.unwrap();
    completed.len() + pending.len()
}

#[tokio::test]
async fn simultaneous_evaluations_store_one() {
    let sara = app();
    let (landlord, tenant, contract) = active_contract(&sara).await;
    let evaluations = sara.evaluations();

    let (a, b) = tokio::join!(
        evaluations.submit(&landlord, contract.id, scores(5)),
        evaluations.submit(&landlord, contract.id, scores(2)),
    );
    assert_eq!(usize::from(a.is_ok()) + usize::from(b.is_ok()), 1);
    let err = a.err().or(b.err()).unwrap();
    assert!(["concurrent_modification", "conflict"].contains(&err.code()), "{err}");

    let list = evaluations.list_for_tenant(&landlord, &tenant.uid).await.unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0].status, EvaluationStatus::Completada);
    let certificate = sara.certificates().build(&tenant, &tenant.uid).await.unwrap();
    assert_eq!(certificate.evaluations.count, 1);
}

#[tokio::test]
async fn evaluation_racing_finalize_stores_one() {
    let sara = app();
    let (landlord, tenant, contract) = active_contract(&sara).await;

    let contracts = sara.contracts();
    let evaluations = sara.evaluations();
    let (finalized, submitted) = tokio::join!(
        contracts.finalize(&landlord, contract.id),
        evaluations.submit(&landlord, contract.id, scores(4)),
    );
    assert!(finalized.is_ok() || submitted.is_ok());
    assert_eq!(evaluations_for(&sara, &landlord, &tenant).await, 1);
}
