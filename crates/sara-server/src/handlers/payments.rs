//! Rent payment declarations and review
//!
//! Declarations arrive either as JSON or as a multipart form with the JSON
//! document in a `payment` field and an optional `receipt` file.

use super::{created, ok, Limits};
use crate::error::reject;
use crate::filters::{json_body, principal, with_sara, Form};
use sara_core::{Principal, Sara, Upload};
use sara_domain::{ContractId, NewPayment, PaymentId};
use serde::Deserialize;
use serde_json::json;
use warp::filters::BoxedFilter;
use warp::multipart::FormData;
use warp::reply::Response;
use warp::{Filter, Rejection};

#[derive(Debug, Deserialize)]
pub(crate) struct Reason {
    reason: String,
}

pub(crate) fn routes(sara: &Sara, limits: Limits) -> BoxedFilter<(Response,)> {
    let auth = principal(sara.clone());
    let state = with_sara(sara.clone());

    let declare_json = warp::path!("api" / "contracts" / ContractId / "payments")
        .and(warp::post())
        .and(auth.clone())
        .and(json_body::<NewPayment>(limits.json))
        .and(state.clone())
        .and_then(|id: ContractId, principal: Principal, new: NewPayment, sara: Sara| {
            declare(id, principal, new, None, sara)
        });
    let declare_form = warp::path!("api" / "contracts" / ContractId / "payments")
        .and(warp::post())
        .and(auth.clone())
        .and(warp::multipart::form().max_length(limits.form))
        .and(state.clone())
        .and_then(declare_form);
    let list = warp::path!("api" / "contracts" / ContractId / "payments")
        .and(warp::get())
        .and(auth.clone())
        .and(state.clone())
        .and_then(list);
    let accept = warp::path!("api" / "contracts" / ContractId / "payments" / PaymentId / "accept")
        .and(warp::post())
        .and(auth.clone())
        .and(state.clone())
        .and_then(accept);
    let reject_payment = warp::path!("api" / "contracts" / ContractId / "payments" / PaymentId / "reject")
        .and(warp::post())
        .and(auth.clone())
        .and(json_body::<Reason>(limits.json))
        .and(state.clone())
        .and_then(reject_payment);
    let on_time = warp::path!("api" / "contracts" / ContractId / "payments" / PaymentId / "on-time")
        .and(warp::get())
        .and(auth)
        .and(state)
        .and_then(on_time);

    declare_json
        .or(declare_form)
        .unify()
        .or(list)
        .unify()
        .or(accept)
        .unify()
        .or(reject_payment)
        .unify()
        .or(on_time)
        .unify()
        .boxed()
}

async fn declare(
    id: ContractId,
    principal: Principal,
    new: NewPayment,
    receipt: Option<Upload>,
    sara: Sara,
) -> Result<Response, Rejection> {
    let payment = sara
        .payments()
        .declare(&principal, id, new, receipt)
        .await
        .map_err(reject)?;
    Ok(created(&payment))
}

async fn declare_form(id: ContractId, principal: Principal, form: FormData, sara: Sara) -> Result<Response, Rejection> {
    let form = Form::read(form).await?;
    let new: NewPayment = form.json("payment")?;
    let receipt = form.uploads("receipt").into_iter().next();
    declare(id, principal, new, receipt, sara).await
}

async fn list(id: ContractId, principal: Principal, sara: Sara) -> Result<Response, Rejection> {
    let payments = sara.payments().list(&principal, id).await.map_err(reject)?;
    Ok(ok(&payments))
}

async fn accept(id: ContractId, payment: PaymentId, principal: Principal, sara: Sara) -> Result<Response, Rejection> {
    let payment = sara
        .payments()
        .accept(&principal, id, payment)
        .await
        .map_err(reject)?;
    Ok(ok(&payment))
}

async fn reject_payment(
    id: ContractId,
    payment: PaymentId,
    principal: Principal,
    body: Reason,
    sara: Sara,
) -> Result<Response, Rejection> {
    let payment = sara
        .payments()
        .reject(&principal, id, payment, &body.reason)
        .await
        .map_err(reject)?;
    Ok(ok(&payment))
}

async fn on_time(id: ContractId, payment: PaymentId, principal: Principal, sara: Sara) -> Result<Response, Rejection> {
    let on_time = sara
        .payments()
        .is_on_time(&principal, id, payment)
        .await
        .map_err(reject)?;
    Ok(ok(&json!({ "on_time": on_time })))
}
