//! Error envelope and rejection recovery
//!
//! Every failure leaves the API as
//! `{"error": {"code": "...", "message": "...", "details": [...]}}`.

use sara_core::SaraError;
use serde::Serialize;
use serde_json::{json, Value};
use std::convert::Infallible;
use warp::http::{HeaderValue, StatusCode};
use warp::reject::Reject;
use warp::reply::Response;
use warp::{Rejection, Reply};

/// Service error carried through warp's rejection chain
#[derive(Debug)]
pub struct ApiError(pub SaraError);

impl Reject for ApiError {}

/// Reject with a service error
pub(crate) fn reject(err: SaraError) -> Rejection {
    warp::reject::custom(ApiError(err))
}

/// HTTP status for a service error
#[must_use]
pub fn status_for(err: &SaraError) -> StatusCode {
    match err {
        SaraError::Validation(_) => StatusCode::BAD_REQUEST,
        SaraError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
        SaraError::Forbidden(_) => StatusCode::FORBIDDEN,
        SaraError::NotFound(_) => StatusCode::NOT_FOUND,
        SaraError::Conflict(_) | SaraError::InvalidTransition(_) => StatusCode::CONFLICT,
        SaraError::Store(e) if e.is_conflict() => StatusCode::CONFLICT,
        SaraError::Mail(_) => StatusCode::BAD_GATEWAY,
        SaraError::Store(e) | SaraError::Blob(e) if e.is_retryable() => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    code: &'a str,
    message: String,
    details: Value,
}

fn envelope(status: StatusCode, code: &str, message: String, details: Value) -> Response {
    let body = json!({ "error": ErrorBody { code, message, details } });
    let mut resp = warp::reply::with_status(warp::reply::json(&body), status).into_response();
    if status == StatusCode::SERVICE_UNAVAILABLE {
        resp.headers_mut()
            .insert("retry-after", HeaderValue::from_static("3"));
    }
    resp
}

/// Response for a service error
#[must_use]
pub fn error_response(err: &SaraError) -> Response {
    let status = status_for(err);
    if status.is_server_error() {
        tracing::error!(error = %err, code = err.code(), "Request failed");
    }
    let (message, details) = match err {
        SaraError::Validation(errors) => (
            "validation failed".to_string(),
            json!(errors.errors()),
        ),
        // Internal details stay in the log
        SaraError::Internal(_) | SaraError::Config(_) => ("internal error".to_string(), json!([])),
        other => (other.to_string(), json!([])),
    };
    envelope(status, err.code(), message, details)
}

/// Turn any rejection into the error envelope
///
/// # Errors
/// Never; the `Result` is what `Filter::recover` expects
pub async fn recover(rejection: Rejection) -> Result<Response, Infallible> {
    if let Some(ApiError(err)) = rejection.find::<ApiError>() {
        return Ok(error_response(err));
    }
    let (status, code, message) = if rejection.is_not_found() {
        (StatusCode::NOT_FOUND, "route_not_found", "no such route".to_string())
    } else if let Some(e) = rejection.find::<warp::filters::body::BodyDeserializeError>() {
        (StatusCode::BAD_REQUEST, "invalid_body", e.to_string())
    } else if let Some(e) = rejection.find::<warp::reject::InvalidQuery>() {
        (StatusCode::BAD_REQUEST, "invalid_query", e.to_string())
    } else if rejection.find::<warp::reject::PayloadTooLarge>().is_some() {
        (StatusCode::PAYLOAD_TOO_LARGE, "payload_too_large", "request body is too large".to_string())
    } else if rejection.find::<warp::reject::LengthRequired>().is_some() {
        (StatusCode::LENGTH_REQUIRED, "length_required", "content-length header is required".to_string())
    } else if let Some(e) = rejection.find::<warp::reject::UnsupportedMediaType>() {
        (StatusCode::UNSUPPORTED_MEDIA_TYPE, "unsupported_media_type", e.to_string())
    } else if rejection.find::<warp::reject::MethodNotAllowed>().is_some() {
        (StatusCode::METHOD_NOT_ALLOWED, "method_not_allowed", "method not allowed".to_string())
    } else {
        tracing::error!(rejection = ?rejection, "Unhandled rejection");
        (StatusCode::INTERNAL_SERVER_ERROR, "internal", "internal error".to_string())
    };
    Ok(envelope(status, code, message, json!([])))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sara_domain::ValidationErrors;
    use sara_mail::MailError;
    use sara_store::StoreError;

    #[test]
    fn statuses_follow_error_kind() {
        let cases = [
            (SaraError::Validation(ValidationErrors::single("email", "bad")), 400),
            (SaraError::Unauthenticated("x".into()), 401),
            (SaraError::Forbidden("x".into()), 403),
            (SaraError::NotFound("contract 1".into()), 404),
            (SaraError::Conflict("busy".into()), 409),
            (SaraError::Mail(MailError::Upstream { status: 503 }), 502),
            (
                SaraError::Store(StoreError::Io {
                    path: "data/snapshot.json".into(),
                    source: std::io::Error::other("disk full"),
                }),
                503,
            ),
            (SaraError::Internal("boom".into()), 500),
        ];
        for (err, status) in cases {
            assert_eq!(status_for(&err).as_u16(), status, "{err}");
        }
    }

    #[test]
    fn internal_messages_are_hidden() {
        let resp = error_response(&SaraError::Internal("secret path /etc".into()));
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
