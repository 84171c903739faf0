//! Property listings and CSV import

use super::{created, no_content, ok, Limits};
use crate::error::reject;
use crate::filters::{json_body, principal, with_sara, Form};
use sara_core::{Principal, Sara};
use sara_domain::{NewProperty, PropertyId, PropertyStatus, PropertyUpdate, UserId};
use serde::Deserialize;
use warp::filters::BoxedFilter;
use warp::multipart::FormData;
use warp::reply::Response;
use warp::{Filter, Rejection};

#[derive(Debug, Deserialize)]
pub(crate) struct OwnerQuery {
    owner: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct StatusChange {
    status: PropertyStatus,
}

pub(crate) fn routes(sara: &Sara, limits: Limits) -> BoxedFilter<(Response,)> {
    let auth = principal(sara.clone());
    let state = with_sara(sara.clone());

    let create = warp::path!("api" / "properties")
        .and(warp::post())
        .and(auth.clone())
        .and(json_body::<NewProperty>(limits.json))
        .and(state.clone())
        .and_then(create);
    let list = warp::path!("api" / "properties")
        .and(warp::get())
        .and(auth.clone())
        .and(warp::query::<OwnerQuery>())
        .and(state.clone())
        .and_then(list);
    let bulk = warp::path!("api" / "properties" / "bulk")
        .and(warp::post())
        .and(auth.clone())
        .and(warp::multipart::form().max_length(limits.form))
        .and(state.clone())
        .and_then(bulk);
    let get = warp::path!("api" / "properties" / PropertyId)
        .and(warp::get())
        .and(auth.clone())
        .and(state.clone())
        .and_then(get);
    let update = warp::path!("api" / "properties" / PropertyId)
        .and(warp::patch())
        .and(auth.clone())
        .and(json_body::<PropertyUpdate>(limits.json))
        .and(state.clone())
        .and_then(update);
    let status = warp::path!("api" / "properties" / PropertyId / "status")
        .and(warp::put())
        .and(auth.clone())
        .and(json_body::<StatusChange>(limits.json))
        .and(state.clone())
        .and_then(set_status);
    let delete = warp::path!("api" / "properties" / PropertyId)
        .and(warp::delete())
        .and(auth)
        .and(state)
        .and_then(delete);

    create
        .or(list)
        .unify()
        .or(bulk)
        .unify()
        .or(get)
        .unify()
        .or(update)
        .unify()
        .or(status)
        .unify()
        .or(delete)
        .unify()
        .boxed()
}

async fn create(principal: Principal, new: NewProperty, sara: Sara) -> Result<Response, Rejection> {
    let property = sara.properties().create(&principal, new).await.map_err(reject)?;
    Ok(created(&property))
}

async fn list(principal: Principal, query: OwnerQuery, sara: Sara) -> Result<Response, Rejection> {
    let owner = query.owner.map_or_else(|| principal.uid.clone(), UserId::new);
    let properties = sara
        .properties()
        .list_for_owner(&principal, &owner)
        .await
        .map_err(reject)?;
    Ok(ok(&properties))
}

async fn bulk(principal: Principal, form: FormData, sara: Sara) -> Result<Response, Rejection> {
    let form = Form::read(form).await?;
    let file = form.upload("file")?;
    let report = sara
        .bulk_upload()
        .import_csv(&principal, &file.data)
        .await
        .map_err(reject)?;
    Ok(ok(&report))
}

async fn get(id: PropertyId, principal: Principal, sara: Sara) -> Result<Response, Rejection> {
    let property = sara.properties().get(&principal, id).await.map_err(reject)?;
    Ok(ok(&property))
}

async fn update(id: PropertyId, principal: Principal, update: PropertyUpdate, sara: Sara) -> Result<Response, Rejection> {
    let property = sara
        .properties()
        .update(&principal, id, update)
        .await
        .map_err(reject)?;
    Ok(ok(&property))
}

async fn set_status(id: PropertyId, principal: Principal, change: StatusChange, sara: Sara) -> Result<Response, Rejection> {
    let property = sara
        .properties()
        .set_status(&principal, id, change.status)
        .await
        .map_err(reject)?;
    Ok(ok(&property))
}

async fn delete(id: PropertyId, principal: Principal, sara: Sara) -> Result<Response, Rejection> {
    sara.properties().delete(&principal, id).await.map_err(reject)?;
    Ok(no_content())
}
