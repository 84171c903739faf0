//! Announcements, invitations, user files and blob downloads

use super::{created, ok, Limits};
use crate::error::reject;
use crate::filters::{json_body, principal, with_sara, Form};
use sara_core::{Principal, Sara};
use sara_domain::{AnnouncementId, ContractId, InvitationId};
use serde::Deserialize;
use serde_json::json;
use warp::filters::BoxedFilter;
use warp::http::header::{HeaderValue, CONTENT_LENGTH, CONTENT_TYPE};
use warp::multipart::FormData;
use warp::path::Tail;
use warp::reply::Response;
use warp::{Filter, Rejection};

#[derive(Debug, Deserialize)]
pub(crate) struct InboxQuery {
    #[serde(default)]
    unread: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct NewInvitation {
    contract_id: ContractId,
    email: String,
}

pub(crate) fn routes(sara: &Sara, limits: Limits) -> BoxedFilter<(Response,)> {
    let auth = principal(sara.clone());
    let state = with_sara(sara.clone());

    let announcements = warp::path!("api" / "announcements")
        .and(warp::get())
        .and(auth.clone())
        .and(warp::query::<InboxQuery>())
        .and(state.clone())
        .and_then(announcements);
    let read_all = warp::path!("api" / "announcements" / "read-all")
        .and(warp::post())
        .and(auth.clone())
        .and(state.clone())
        .and_then(read_all);
    let read = warp::path!("api" / "announcements" / AnnouncementId / "read")
        .and(warp::post())
        .and(auth.clone())
        .and(state.clone())
        .and_then(read);
    let invite = warp::path!("api" / "invitations")
        .and(warp::post())
        .and(auth.clone())
        .and(json_body::<NewInvitation>(limits.json))
        .and(state.clone())
        .and_then(invite);
    let invitations = warp::path!("api" / "invitations")
        .and(warp::get())
        .and(auth.clone())
        .and(state.clone())
        .and_then(invitations);
    let resend = warp::path!("api" / "invitations" / InvitationId / "resend")
        .and(warp::post())
        .and(auth.clone())
        .and(state.clone())
        .and_then(resend);
    let upload = warp::path!("api" / "files")
        .and(warp::post())
        .and(auth.clone())
        .and(warp::multipart::form().max_length(limits.form))
        .and(state.clone())
        .and_then(upload);
    let files = warp::path!("api" / "files")
        .and(warp::get())
        .and(auth)
        .and(state.clone())
        .and_then(files);
    let blob = warp::path("blobs")
        .and(warp::path::tail())
        .and(warp::get())
        .and(state)
        .and_then(blob);

    announcements
        .or(read_all)
        .unify()
        .or(read)
        .unify()
        .or(invite)
        .unify()
        .or(invitations)
        .unify()
        .or(resend)
        .unify()
        .or(upload)
        .unify()
        .or(files)
        .unify()
        .or(blob)
        .unify()
        .boxed()
}

async fn announcements(principal: Principal, query: InboxQuery, sara: Sara) -> Result<Response, Rejection> {
    let list = sara
        .announcements()
        .list_for(&principal, query.unread)
        .await
        .map_err(reject)?;
    Ok(ok(&list))
}

async fn read_all(principal: Principal, sara: Sara) -> Result<Response, Rejection> {
    let updated = sara.announcements().mark_all_read(&principal).await.map_err(reject)?;
    Ok(ok(&json!({ "updated": updated })))
}

async fn read(id: AnnouncementId, principal: Principal, sara: Sara) -> Result<Response, Rejection> {
    let announcement = sara.announcements().mark_read(&principal, id).await.map_err(reject)?;
    Ok(ok(&announcement))
}

async fn invite(principal: Principal, body: NewInvitation, sara: Sara) -> Result<Response, Rejection> {
    let invited = sara
        .invitations()
        .invite(&principal, body.contract_id, &body.email)
        .await
        .map_err(reject)?;
    Ok(created(&invited))
}

async fn invitations(principal: Principal, sara: Sara) -> Result<Response, Rejection> {
    let list = sara.invitations().list_for_landlord(&principal).await.map_err(reject)?;
    Ok(ok(&list))
}

async fn resend(id: InvitationId, principal: Principal, sara: Sara) -> Result<Response, Rejection> {
    let invited = sara.invitations().resend(&principal, id).await.map_err(reject)?;
    Ok(ok(&invited))
}

async fn upload(principal: Principal, form: FormData, sara: Sara) -> Result<Response, Rejection> {
    let form = Form::read(form).await?;
    let file = sara
        .files()
        .upload(&principal, form.upload("file")?)
        .await
        .map_err(reject)?;
    Ok(created(&file))
}

async fn files(principal: Principal, sara: Sara) -> Result<Response, Rejection> {
    let list = sara.files().list_for(&principal).await.map_err(reject)?;
    Ok(ok(&list))
}

async fn blob(tail: Tail, sara: Sara) -> Result<Response, Rejection> {
    let (meta, data) = sara.files().blob(tail.as_str()).await.map_err(reject)?;
    let mut resp = Response::new(data.into());
    let headers = resp.headers_mut();
    headers.insert(
        CONTENT_TYPE,
        HeaderValue::from_str(&meta.content_type)
            .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream")),
    );
    headers.insert(CONTENT_LENGTH, HeaderValue::from(meta.size));
    Ok(resp)
}
