//! Registration, sessions and password reset

use super::{created, no_content, ok, Limits};
use crate::error::reject;
use crate::filters::{json_body, principal, token, with_sara};
use sara_core::{Principal, Sara};
use sara_domain::{NewAccount, UserId};
use serde::Deserialize;
use serde_json::json;
use warp::filters::BoxedFilter;
use warp::http::StatusCode;
use warp::reply::Response;
use warp::{Filter, Rejection, Reply};

#[derive(Debug, Deserialize)]
pub(crate) struct Credentials {
    email: String,
    password: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ResetRequest {
    email: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ResetConfirmation {
    code: String,
    password: String,
}

pub(crate) fn routes(sara: &Sara, limits: Limits) -> BoxedFilter<(Response,)> {
    let register = warp::path!("api" / "auth" / "register")
        .and(warp::post())
        .and(json_body::<NewAccount>(limits.json))
        .and(with_sara(sara.clone()))
        .and_then(register);
    let login = warp::path!("api" / "auth" / "login")
        .and(warp::post())
        .and(json_body::<Credentials>(limits.json))
        .and(with_sara(sara.clone()))
        .and_then(login);
    let logout = warp::path!("api" / "auth" / "logout")
        .and(warp::post())
        .and(token())
        .and(with_sara(sara.clone()))
        .and_then(logout);
    let reset = warp::path!("api" / "auth" / "password-reset")
        .and(warp::post())
        .and(json_body::<ResetRequest>(limits.json))
        .and(with_sara(sara.clone()))
        .and_then(request_reset);
    let confirm = warp::path!("api" / "auth" / "password-reset" / "confirm")
        .and(warp::post())
        .and(json_body::<ResetConfirmation>(limits.json))
        .and(with_sara(sara.clone()))
        .and_then(confirm_reset);
    let me = warp::path!("api" / "me")
        .and(warp::get())
        .and(principal(sara.clone()))
        .and(with_sara(sara.clone()))
        .and_then(me);
    let profile = warp::path!("api" / "users" / String)
        .and(warp::get())
        .and(principal(sara.clone()))
        .and(with_sara(sara.clone()))
        .and_then(profile);

    register
        .or(login)
        .unify()
        .or(logout)
        .unify()
        .or(reset)
        .unify()
        .or(confirm)
        .unify()
        .or(me)
        .unify()
        .or(profile)
        .unify()
        .boxed()
}

async fn register(account: NewAccount, sara: Sara) -> Result<Response, Rejection> {
    let registered = sara.accounts().register(account).await.map_err(reject)?;
    Ok(created(&registered))
}

async fn login(credentials: Credentials, sara: Sara) -> Result<Response, Rejection> {
    let signed = sara
        .accounts()
        .login(&credentials.email, &credentials.password)
        .await
        .map_err(reject)?;
    Ok(ok(&signed))
}

async fn logout(token: String, sara: Sara) -> Result<Response, Rejection> {
    sara.accounts().logout(&token).await.map_err(reject)?;
    Ok(no_content())
}

async fn request_reset(body: ResetRequest, sara: Sara) -> Result<Response, Rejection> {
    sara.accounts()
        .request_password_reset(&body.email)
        .await
        .map_err(reject)?;
    // Same answer whether or not the address has an account
    Ok(warp::reply::with_status(warp::reply::json(&json!({ "status": "sent" })), StatusCode::ACCEPTED).into_response())
}

async fn confirm_reset(body: ResetConfirmation, sara: Sara) -> Result<Response, Rejection> {
    sara.accounts()
        .confirm_password_reset(&body.code, &body.password)
        .await
        .map_err(reject)?;
    Ok(no_content())
}

async fn me(principal: Principal, sara: Sara) -> Result<Response, Rejection> {
    let profile = sara.accounts().me(&principal).await.map_err(reject)?;
    Ok(ok(&profile))
}

async fn profile(uid: String, principal: Principal, sara: Sara) -> Result<Response, Rejection> {
    let profile = sara
        .accounts()
        .profile(&principal, &UserId::new(uid))
        .await
        .map_err(reject)?;
    Ok(ok(&profile))
}
