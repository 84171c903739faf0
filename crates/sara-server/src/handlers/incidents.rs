//! Incident reports and landlord responses

use super::{created, ok, Limits};
use crate::error::reject;
use crate::filters::{json_body, principal, with_sara, Form};
use sara_core::{Principal, Sara};
use sara_domain::{IncidentId, IncidentStatus, NewIncident};
use serde::Deserialize;
use warp::filters::BoxedFilter;
use warp::multipart::FormData;
use warp::reply::Response;
use warp::{Filter, Rejection};

#[derive(Debug, Deserialize)]
pub(crate) struct Answer {
    text: String,
    #[serde(default)]
    status: Option<IncidentStatus>,
}

pub(crate) fn routes(sara: &Sara, limits: Limits) -> BoxedFilter<(Response,)> {
    let auth = principal(sara.clone());
    let state = with_sara(sara.clone());

    let report_json = warp::path!("api" / "incidents")
        .and(warp::post())
        .and(auth.clone())
        .and(json_body::<NewIncident>(limits.json))
        .and(state.clone())
        .and_then(report_json);
    let report_form = warp::path!("api" / "incidents")
        .and(warp::post())
        .and(auth.clone())
        .and(warp::multipart::form().max_length(limits.form))
        .and(state.clone())
        .and_then(report_form);
    let list = warp::path!("api" / "incidents")
        .and(warp::get())
        .and(auth.clone())
        .and(state.clone())
        .and_then(list);
    let get = warp::path!("api" / "incidents" / IncidentId)
        .and(warp::get())
        .and(auth.clone())
        .and(state.clone())
        .and_then(get);
    let respond = warp::path!("api" / "incidents" / IncidentId / "responses")
        .and(warp::post())
        .and(auth)
        .and(json_body::<Answer>(limits.json))
        .and(state)
        .and_then(respond);

    report_json
        .or(report_form)
        .unify()
        .or(list)
        .unify()
        .or(get)
        .unify()
        .or(respond)
        .unify()
        .boxed()
}

async fn report_json(principal: Principal, new: NewIncident, sara: Sara) -> Result<Response, Rejection> {
    let incident = sara
        .incidents()
        .report(&principal, new, Vec::new())
        .await
        .map_err(reject)?;
    Ok(created(&incident))
}

/// `incident` JSON field plus any number of `attachment` files
async fn report_form(principal: Principal, form: FormData, sara: Sara) -> Result<Response, Rejection> {
    let form = Form::read(form).await?;
    let new: NewIncident = form.json("incident")?;
    let incident = sara
        .incidents()
        .report(&principal, new, form.uploads("attachment"))
        .await
        .map_err(reject)?;
    Ok(created(&incident))
}

async fn list(principal: Principal, sara: Sara) -> Result<Response, Rejection> {
    let incidents = sara.incidents().list_for(&principal).await.map_err(reject)?;
    Ok(ok(&incidents))
}

async fn get(id: IncidentId, principal: Principal, sara: Sara) -> Result<Response, Rejection> {
    let incident = sara.incidents().get(&principal, id).await.map_err(reject)?;
    Ok(ok(&incident))
}

async fn respond(id: IncidentId, principal: Principal, body: Answer, sara: Sara) -> Result<Response, Rejection> {
    let incident = sara
        .incidents()
        .respond(&principal, id, &body.text, body.status)
        .await
        .map_err(reject)?;
    Ok(ok(&incident))
}
