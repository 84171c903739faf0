//! Contract workflow

use super::{created, ok, Limits};
use crate::error::reject;
use crate::filters::{json_body, principal, with_sara};
use bytes::Bytes;
use sara_core::{Principal, Sara};
use sara_domain::{ContractAmendment, ContractId, NewContract, ObservationId};
use serde::Deserialize;
use warp::filters::BoxedFilter;
use warp::reply::Response;
use warp::{Filter, Rejection};

#[derive(Debug, Deserialize)]
pub(crate) struct Reason {
    reason: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Note {
    text: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ObservationReply {
    text: String,
    #[serde(default)]
    amendment: Option<ContractAmendment>,
}

/// Lifecycle actions without a body
#[derive(Debug, Clone, Copy)]
enum Action {
    Approve,
    Cancel,
    Finalize,
}

pub(crate) fn routes(sara: &Sara, limits: Limits) -> BoxedFilter<(Response,)> {
    let auth = principal(sara.clone());
    let state = with_sara(sara.clone());

    let create = warp::path!("api" / "contracts")
        .and(warp::post())
        .and(auth.clone())
        .and(json_body::<NewContract>(limits.json))
        .and(state.clone())
        .and_then(create);
    let list = warp::path!("api" / "contracts")
        .and(warp::get())
        .and(auth.clone())
        .and(state.clone())
        .and_then(list);
    let get = warp::path!("api" / "contracts" / ContractId)
        .and(warp::get())
        .and(auth.clone())
        .and(state.clone())
        .and_then(get);
    let approve = warp::path!("api" / "contracts" / ContractId / "approve")
        .map(|id: ContractId| (id, Action::Approve))
        .untuple_one();
    let cancel = warp::path!("api" / "contracts" / ContractId / "cancel")
        .map(|id: ContractId| (id, Action::Cancel))
        .untuple_one();
    let finalize = warp::path!("api" / "contracts" / ContractId / "finalize")
        .map(|id: ContractId| (id, Action::Finalize))
        .untuple_one();
    let lifecycle = approve
        .or(cancel)
        .unify()
        .or(finalize)
        .unify()
        .and(warp::post())
        .and(auth.clone())
        .and(state.clone())
        .and_then(lifecycle);
    let reject_contract = warp::path!("api" / "contracts" / ContractId / "reject")
        .and(warp::post())
        .and(auth.clone())
        .and(json_body::<Reason>(limits.json))
        .and(state.clone())
        .and_then(reject_contract);
    let observe = warp::path!("api" / "contracts" / ContractId / "observations")
        .and(warp::post())
        .and(auth.clone())
        .and(json_body::<Note>(limits.json))
        .and(state.clone())
        .and_then(observe);
    let respond = warp::path!("api" / "contracts" / ContractId / "observations" / ObservationId / "response")
        .and(warp::post())
        .and(auth.clone())
        .and(json_body::<ObservationReply>(limits.json))
        .and(state.clone())
        .and_then(respond);
    let pdf = warp::path!("api" / "contracts" / ContractId / "pdf")
        .and(warp::put())
        .and(auth)
        .and(warp::body::content_length_limit(limits.upload))
        .and(warp::body::bytes())
        .and(state)
        .and_then(attach_pdf);

    create
        .or(list)
        .unify()
        .or(get)
        .unify()
        .or(lifecycle)
        .unify()
        .or(reject_contract)
        .unify()
        .or(observe)
        .unify()
        .or(respond)
        .unify()
        .or(pdf)
        .unify()
        .boxed()
}

async fn create(principal: Principal, new: NewContract, sara: Sara) -> Result<Response, Rejection> {
    let outcome = sara.contracts().create(&principal, new).await.map_err(reject)?;
    Ok(created(&outcome))
}

async fn list(principal: Principal, sara: Sara) -> Result<Response, Rejection> {
    let contracts = sara.contracts().list_for(&principal).await.map_err(reject)?;
    Ok(ok(&contracts))
}

async fn get(id: ContractId, principal: Principal, sara: Sara) -> Result<Response, Rejection> {
    let contract = sara.contracts().get(&principal, id).await.map_err(reject)?;
    Ok(ok(&contract))
}

async fn lifecycle(id: ContractId, action: Action, principal: Principal, sara: Sara) -> Result<Response, Rejection> {
    let contracts = sara.contracts();
    let contract = match action {
        Action::Approve => contracts.approve(&principal, id).await,
        Action::Cancel => contracts.cancel(&principal, id).await,
        Action::Finalize => contracts.finalize(&principal, id).await,
    }
    .map_err(reject)?;
    Ok(ok(&contract))
}

async fn reject_contract(id: ContractId, principal: Principal, body: Reason, sara: Sara) -> Result<Response, Rejection> {
    let contract = sara
        .contracts()
        .reject(&principal, id, &body.reason)
        .await
        .map_err(reject)?;
    Ok(ok(&contract))
}

async fn observe(id: ContractId, principal: Principal, body: Note, sara: Sara) -> Result<Response, Rejection> {
    let contract = sara
        .contracts()
        .add_observation(&principal, id, &body.text)
        .await
        .map_err(reject)?;
    Ok(created(&contract))
}

async fn respond(
    id: ContractId,
    observation: ObservationId,
    principal: Principal,
    body: ObservationReply,
    sara: Sara,
) -> Result<Response, Rejection> {
    let contract = sara
        .contracts()
        .respond_observation(&principal, id, observation, &body.text, body.amendment)
        .await
        .map_err(reject)?;
    Ok(ok(&contract))
}

async fn attach_pdf(id: ContractId, principal: Principal, data: Bytes, sara: Sara) -> Result<Response, Rejection> {
    let contract = sara
        .contracts()
        .attach_pdf(&principal, id, data)
        .await
        .map_err(reject)?;
    Ok(ok(&contract))
}
