//! Tenant certificates and the payment calendar

use super::ok;
use crate::error::reject;
use crate::filters::{principal, with_sara};
use chrono::NaiveDate;
use sara_core::{Principal, Sara};
use sara_domain::UserId;
use serde::Deserialize;
use warp::filters::BoxedFilter;
use warp::reply::Response;
use warp::{Filter, Rejection, Reply};

#[derive(Debug, Deserialize)]
pub(crate) struct Range {
    from: NaiveDate,
    to: NaiveDate,
}

pub(crate) fn routes(sara: &Sara) -> BoxedFilter<(Response,)> {
    let auth = principal(sara.clone());
    let state = with_sara(sara.clone());

    let certificate = warp::path!("api" / "certificates" / String)
        .and(warp::get())
        .and(auth.clone())
        .and(state.clone())
        .and_then(certificate);
    let certificate_html = warp::path!("api" / "certificates" / String / "html")
        .and(warp::get())
        .and(auth.clone())
        .and(state.clone())
        .and_then(certificate_html);
    let calendar = warp::path!("api" / "calendar")
        .and(warp::get())
        .and(auth)
        .and(warp::query::<Range>())
        .and(state)
        .and_then(calendar);

    certificate
        .or(certificate_html)
        .unify()
        .or(calendar)
        .unify()
        .boxed()
}

async fn certificate(tenant: String, principal: Principal, sara: Sara) -> Result<Response, Rejection> {
    let cert = sara
        .certificates()
        .build(&principal, &UserId::new(tenant))
        .await
        .map_err(reject)?;
    Ok(ok(cert.as_ref()))
}

async fn certificate_html(tenant: String, principal: Principal, sara: Sara) -> Result<Response, Rejection> {
    let html = sara
        .certificates()
        .html(&principal, &UserId::new(tenant))
        .await
        .map_err(reject)?;
    Ok(warp::reply::html(html).into_response())
}

async fn calendar(principal: Principal, range: Range, sara: Sara) -> Result<Response, Rejection> {
    let events = sara
        .calendar()
        .events_for(&principal, range.from, range.to)
        .await
        .map_err(reject)?;
    Ok(ok(&events))
}
