//! Tenant evaluations

use super::{created, ok, Limits};
use crate::error::reject;
use crate::filters::{json_body, principal, with_sara};
use sara_core::{Principal, Sara};
use sara_domain::{ContractId, EvaluationSubmission, UserId};
use warp::filters::BoxedFilter;
use warp::reply::Response;
use warp::{Filter, Rejection};

pub(crate) fn routes(sara: &Sara, limits: Limits) -> BoxedFilter<(Response,)> {
    let auth = principal(sara.clone());
    let state = with_sara(sara.clone());

    let submit = warp::path!("api" / "contracts" / ContractId / "evaluation")
        .and(warp::post())
        .and(auth.clone())
        .and(json_body::<EvaluationSubmission>(limits.json))
        .and(state.clone())
        .and_then(submit);
    let pending = warp::path!("api" / "evaluations" / "pending")
        .and(warp::get())
        .and(auth.clone())
        .and(state.clone())
        .and_then(pending);
    let of_tenant = warp::path!("api" / "tenants" / String / "evaluations")
        .and(warp::get())
        .and(auth)
        .and(state)
        .and_then(of_tenant);

    submit.or(pending).unify().or(of_tenant).unify().boxed()
}

async fn submit(id: ContractId, principal: Principal, submission: EvaluationSubmission, sara: Sara) -> Result<Response, Rejection> {
    let evaluation = sara
        .evaluations()
        .submit(&principal, id, submission)
        .await
        .map_err(reject)?;
    Ok(created(&evaluation))
}

async fn pending(principal: Principal, sara: Sara) -> Result<Response, Rejection> {
    let list = sara.evaluations().pending_for(&principal).await.map_err(reject)?;
    Ok(ok(&list))
}

async fn of_tenant(tenant: String, principal: Principal, sara: Sara) -> Result<Response, Rejection> {
    let list = sara
        .evaluations()
        .list_for_tenant(&principal, &UserId::new(tenant))
        .await
        .map_err(reject)?;
    Ok(ok(&list))
}
