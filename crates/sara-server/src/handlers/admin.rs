//! Administrative actions and health

use super::{ok, Limits};
use crate::error::reject;
use crate::filters::{json_body, principal, with_sara};
use sara_core::{Principal, Sara};
use sara_domain::{Role, UserId};
use serde::Deserialize;
use serde_json::json;
use warp::filters::BoxedFilter;
use warp::reply::Response;
use warp::{Filter, Rejection};

#[derive(Debug, Deserialize)]
pub(crate) struct RoleGrant {
    uid: String,
    role: Role,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TestEmail {
    to: String,
}

pub(crate) fn routes(sara: &Sara, limits: Limits) -> BoxedFilter<(Response,)> {
    let auth = principal(sara.clone());
    let state = with_sara(sara.clone());

    let health = warp::path!("healthz")
        .and(warp::get())
        .map(|| ok(&json!({ "status": "ok", "version": sara_core::VERSION })));
    let roles = warp::path!("api" / "admin" / "roles")
        .and(warp::post())
        .and(auth.clone())
        .and(json_body::<RoleGrant>(limits.json))
        .and(state.clone())
        .and_then(grant_role);
    let test_email = warp::path!("api" / "admin" / "test-email")
        .and(warp::post())
        .and(auth)
        .and(json_body::<TestEmail>(limits.json))
        .and(state)
        .and_then(test_email);

    health.or(roles).unify().or(test_email).unify().boxed()
}

async fn grant_role(principal: Principal, body: RoleGrant, sara: Sara) -> Result<Response, Rejection> {
    let profile = sara
        .accounts()
        .grant_role(&principal, &UserId::new(body.uid), body.role)
        .await
        .map_err(reject)?;
    Ok(ok(&profile))
}

async fn test_email(principal: Principal, body: TestEmail, sara: Sara) -> Result<Response, Rejection> {
    principal.require_admin("send test emails").map_err(reject)?;
    let id = sara.notifier().test_message(&body.to).await.map_err(reject)?;
    Ok(ok(&json!({ "message_id": id.to_string() })))
}
