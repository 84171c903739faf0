//! Route groups and their handlers

pub(crate) mod accounts;
pub(crate) mod admin;
pub(crate) mod contracts;
pub(crate) mod evaluations;
pub(crate) mod inbox;
pub(crate) mod incidents;
pub(crate) mod payments;
pub(crate) mod properties;
pub(crate) mod reports;

use sara_core::Sara;
use serde::Serialize;
use warp::http::StatusCode;
use warp::reply::Response;
use warp::Reply;

/// Request size limits derived from configuration
#[derive(Debug, Clone, Copy)]
pub(crate) struct Limits {
    /// Largest JSON body
    pub(crate) json: u64,
    /// Largest multipart body
    pub(crate) form: u64,
    /// Largest raw upload
    pub(crate) upload: u64,
}

impl Limits {
    pub(crate) fn of(sara: &Sara) -> Self {
        let config = sara.config();
        let upload = config.limits.max_upload_bytes;
        let files = config.limits.max_incident_attachments as u64 + 1;
        Self {
            json: config.server.max_json_bytes,
            // room for every allowed file plus the JSON parts
            form: upload.saturating_mul(files).saturating_add(config.server.max_json_bytes),
            upload,
        }
    }
}

pub(crate) fn ok<T: Serialize>(value: &T) -> Response {
    warp::reply::json(value).into_response()
}

pub(crate) fn created<T: Serialize>(value: &T) -> Response {
    warp::reply::with_status(warp::reply::json(value), StatusCode::CREATED).into_response()
}

pub(crate) fn no_content() -> Response {
    StatusCode::NO_CONTENT.into_response()
}
