//! HTTP surface over the in-memory application

use pretty_assertions::assert_eq;
use sara_domain::{Clp, Role};
use sara_server::routes;
use sara_test_utils::{new_account, new_contract, new_property, TestApp, PASSWORD};
use serde_json::{json, Value};
use warp::http::StatusCode;
use warp::test::request;

const BOUNDARY: &str = "sara-test-boundary";

async fn token(app: &TestApp, email: &str) -> String {
    app.sara
        .accounts()
        .login(email, PASSWORD)
        .await
        .unwrap()
        .session
        .token
}

fn bearer(token: &str) -> String {
    format!("Bearer {token}")
}

fn body(res: &warp::http::Response<bytes::Bytes>) -> Value {
    serde_json::from_slice(res.body()).unwrap()
}

fn multipart(parts: &[(&str, Option<&str>, &str, &[u8])]) -> Vec<u8> {
    let mut out = Vec::new();
    for (name, filename, content_type, data) in parts {
        out.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        let disposition = match filename {
            Some(f) => format!("Content-Disposition: form-data; name=\"{name}\"; filename=\"{f}\"\r\n"),
            None => format!("Content-Disposition: form-data; name=\"{name}\"\r\n"),
        };
        out.extend_from_slice(disposition.as_bytes());
        out.extend_from_slice(format!("Content-Type: {content_type}\r\n\r\n").as_bytes());
        out.extend_from_slice(data);
        out.extend_from_slice(b"\r\n");
    }
    out.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    out
}

fn multipart_type() -> String {
    format!("multipart/form-data; boundary={BOUNDARY}")
}

#[tokio::test]
async fn health_reports_version() {
    let app = TestApp::new();
    let res = request().path("/healthz").reply(&routes(&app.sara)).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(body(&res)["status"], "ok");
}

#[tokio::test]
async fn register_login_and_me() {
    let app = TestApp::new();
    let api = routes(&app.sara);

    let account = new_account("carla@example.cl", "Carla Rojas", Role::Inquilino);
    let res = request()
        .method("POST")
        .path("/api/auth/register")
        .json(&account)
        .reply(&api)
        .await;
    assert_eq!(res.status(), StatusCode::CREATED);
    assert_eq!(body(&res)["profile"]["role"], "Inquilino");

    let res = request()
        .method("POST")
        .path("/api/auth/login")
        .json(&json!({ "email": "carla@example.cl", "password": PASSWORD }))
        .reply(&api)
        .await;
    assert_eq!(res.status(), StatusCode::OK);
    let token = body(&res)["session"]["token"].as_str().unwrap().to_string();

    let res = request()
        .path("/api/me")
        .header("authorization", bearer(&token))
        .reply(&api)
        .await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(body(&res)["name"], "Carla Rojas");

    let res = request()
        .method("POST")
        .path("/api/auth/logout")
        .header("authorization", bearer(&token))
        .reply(&api)
        .await;
    assert_eq!(res.status(), StatusCode::NO_CONTENT);
    let res = request()
        .path("/api/me")
        .header("authorization", bearer(&token))
        .reply(&api)
        .await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn missing_token_uses_error_envelope() {
    let app = TestApp::new();
    let res = request().path("/api/contracts").reply(&routes(&app.sara)).await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let err = &body(&res)["error"];
    assert_eq!(err["code"], "unauthenticated");
    assert!(err["details"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn validation_details_list_fields() {
    let app = TestApp::new();
    app.landlord().await;
    let token = token(&app, "ana.arrendadora@example.cl").await;
    let mut property = new_property("Depto Centro");
    property.name = String::new();
    property.rent = Clp(0);

    let res = request()
        .method("POST")
        .path("/api/properties")
        .header("authorization", bearer(&token))
        .json(&property)
        .reply(&routes(&app.sara))
        .await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let err = &body(&res)["error"];
    assert_eq!(err["code"], "validation_failed");
    let fields: Vec<&str> = err["details"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|d| d["field"].as_str())
        .collect();
    assert!(fields.contains(&"name"));
    assert!(fields.contains(&"rent"));
}

#[tokio::test]
async fn malformed_json_is_rejected() {
    let app = TestApp::new();
    let res = request()
        .method("POST")
        .path("/api/auth/login")
        .header("content-type", "application/json")
        .body("{\"email\": ")
        .reply(&routes(&app.sara))
        .await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body(&res)["error"]["code"], "invalid_body");
}

#[tokio::test]
async fn unknown_route_is_404() {
    let app = TestApp::new();
    let res = request().path("/api/nada").reply(&routes(&app.sara)).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert_eq!(body(&res)["error"]["code"], "route_not_found");
}

#[tokio::test]
async fn contract_created_and_approved_over_http() {
    let app = TestApp::new();
    let landlord = app.landlord().await;
    app.tenant().await;
    let property = app.property(&landlord, "Depto Providencia").await;
    let api = routes(&app.sara);
    let landlord_token = token(&app, "ana.arrendadora@example.cl").await;
    let tenant_token = token(&app, "tomas.inquilino@example.cl").await;

    let res = request()
        .method("POST")
        .path("/api/contracts")
        .header("authorization", bearer(&landlord_token))
        .json(&new_contract(&property, "tomas.inquilino@example.cl"))
        .reply(&api)
        .await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let created = body(&res);
    assert_eq!(created["delivery"]["status"], "skipped");
    let id = created["contract"]["id"].as_str().unwrap().to_string();

    let res = request()
        .method("POST")
        .path(&format!("/api/contracts/{id}/approve"))
        .header("authorization", bearer(&landlord_token))
        .reply(&api)
        .await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = request()
        .method("POST")
        .path(&format!("/api/contracts/{id}/approve"))
        .header("authorization", bearer(&tenant_token))
        .reply(&api)
        .await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(body(&res)["status"], "Activo");

    let res = request()
        .method("POST")
        .path(&format!("/api/contracts/{id}/approve"))
        .header("authorization", bearer(&tenant_token))
        .reply(&api)
        .await;
    assert_eq!(res.status(), StatusCode::CONFLICT);
    assert_eq!(body(&res)["error"]["code"], "invalid_transition");

    let res = request()
        .path("/api/calendar?from=2024-04-01&to=2024-05-31")
        .header("authorization", bearer(&tenant_token))
        .reply(&api)
        .await;
    assert_eq!(res.status(), StatusCode::OK);
    let events = body(&res);
    assert_eq!(events.as_array().unwrap().len(), 3);
    assert_eq!(events[1]["kind"], "payment_due");
}

#[tokio::test]
async fn pdf_upload_is_served_back() {
    let app = TestApp::new();
    let landlord = app.landlord().await;
    let property = app.property(&landlord, "Casa Ñuñoa").await;
    let contract = app.contract(&landlord, &property, "alguien@example.cl").await;
    let api = routes(&app.sara);
    let token = token(&app, "ana.arrendadora@example.cl").await;

    let pdf = b"%PDF-1.4 contrato firmado".to_vec();
    let res = request()
        .method("PUT")
        .path(&format!("/api/contracts/{}/pdf", contract.id))
        .header("authorization", bearer(&token))
        .body(pdf.clone())
        .reply(&api)
        .await;
    assert_eq!(res.status(), StatusCode::OK);
    let url = body(&res)["pdf_url"].as_str().unwrap().to_string();
    let key = url.split("/blobs/").nth(1).unwrap();

    let res = request().path(&format!("/blobs/{key}")).reply(&api).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()["content-type"], "application/pdf");
    assert_eq!(res.body().as_ref(), pdf.as_slice());
}

#[tokio::test]
async fn bulk_csv_upload() {
    let app = TestApp::new();
    app.landlord().await;
    let token = token(&app, "ana.arrendadora@example.cl").await;
    let csv = "nombre,direccion,comuna,region,tipo,dormitorios,banos,metros_cuadrados,precio\n\
               Depto Centro,San Diego 100,Santiago,Metropolitana,departamento,1,1,40,350000\n\
               Roto,,Santiago,Metropolitana,casa,x,1,40,350000\n";
    let res = request()
        .method("POST")
        .path("/api/properties/bulk")
        .header("authorization", bearer(&token))
        .header("content-type", multipart_type())
        .body(multipart(&[("file", Some("propiedades.csv"), "text/csv", csv.as_bytes())]))
        .reply(&routes(&app.sara))
        .await;
    assert_eq!(res.status(), StatusCode::OK);
    let report = body(&res);
    assert_eq!(report["created"].as_array().unwrap().len(), 1);
    assert_eq!(report["errors"][0]["line"], 3);
}

#[tokio::test]
async fn payment_declared_with_receipt_form() {
    let app = TestApp::new();
    let (_landlord, _tenant, contract) = app.active_contract().await;
    app.clock.advance(chrono::Duration::days(40));
    let token = token(&app, "tomas.inquilino@example.cl").await;
    let payment = json!({
        "period": "2024-04",
        "amount": 450000,
        "paid_on": "2024-04-03",
        "method": "Transferencia",
    });
    let payment = serde_json::to_vec(&payment).unwrap();

    let res = request()
        .method("POST")
        .path(&format!("/api/contracts/{}/payments", contract.id))
        .header("authorization", bearer(&token))
        .header("content-type", multipart_type())
        .body(multipart(&[
            ("payment", None, "application/json", payment.as_slice()),
            ("receipt", Some("comprobante.pdf"), "application/pdf", &b"%PDF-1.4 pago"[..]),
        ]))
        .reply(&routes(&app.sara))
        .await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let declared = body(&res);
    assert_eq!(declared["status"], "Pendiente");
    assert!(declared["receipt_url"].as_str().unwrap().ends_with("comprobante.pdf"));
}

#[tokio::test]
async fn only_admins_grant_roles() {
    let app = TestApp::new();
    let tenant = app.tenant().await;
    app.landlord().await;
    let token = token(&app, "ana.arrendadora@example.cl").await;
    let res = request()
        .method("POST")
        .path("/api/admin/roles")
        .header("authorization", bearer(&token))
        .json(&json!({ "uid": tenant.uid, "role": "Arrendador" }))
        .reply(&routes(&app.sara))
        .await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    assert_eq!(body(&res)["error"]["code"], "forbidden");
}
