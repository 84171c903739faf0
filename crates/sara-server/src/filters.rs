//! Shared warp filters: state, bearer auth, bodies, multipart forms

use crate::error::reject;
use bytes::BufMut;
use futures::{TryFutureExt, TryStreamExt};
use sara_core::{Principal, Sara, SaraError, Upload};
use sara_domain::ValidationErrors;
use serde::de::DeserializeOwned;
use std::convert::Infallible;
use warp::multipart::{FormData, Part};
use warp::{Filter, Rejection};

/// Clone of the application into each request
pub(crate) fn with_sara(sara: Sara) -> impl Filter<Extract = (Sara,), Error = Infallible> + Clone {
    warp::any().map(move || sara.clone())
}

/// Token from an `Authorization: Bearer <token>` header
pub(crate) fn bearer(header: Option<&str>) -> Option<&str> {
    let value = header?.trim();
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

/// Raw bearer token, rejecting requests without one
pub(crate) fn token() -> impl Filter<Extract = (String,), Error = Rejection> + Clone {
    warp::header::optional::<String>("authorization").and_then(|header: Option<String>| async move {
        bearer(header.as_deref())
            .map(str::to_string)
            .ok_or_else(|| reject(SaraError::Unauthenticated("missing bearer token".into())))
    })
}

/// Authenticated caller
pub(crate) fn principal(sara: Sara) -> impl Filter<Extract = (Principal,), Error = Rejection> + Clone {
    token()
        .and(with_sara(sara))
        .and_then(|token: String, sara: Sara| async move {
            sara.accounts().principal(&token).await.map_err(reject)
        })
}

/// JSON body up to `limit` bytes
pub(crate) fn json_body<T: DeserializeOwned + Send>(
    limit: u64,
) -> impl Filter<Extract = (T,), Error = Rejection> + Clone {
    warp::body::content_length_limit(limit).and(warp::body::json())
}

/// One multipart field
#[derive(Debug)]
pub(crate) struct Field {
    pub(crate) name: String,
    pub(crate) filename: Option<String>,
    pub(crate) content_type: Option<String>,
    pub(crate) data: Vec<u8>,
}

/// Fully read multipart form
#[derive(Debug)]
pub(crate) struct Form {
    fields: Vec<Field>,
}

impl Form {
    /// Read every part of `form`
    pub(crate) async fn read(form: FormData) -> Result<Self, Rejection> {
        let parts: Vec<Part> = form
            .try_collect()
            .await
            .map_err(|e| invalid("form", format!("unreadable multipart body: {e}")))?;
        let mut fields = Vec::with_capacity(parts.len());
        for part in parts {
            let name = part.name().to_string();
            let filename = part.filename().map(str::to_string);
            let content_type = part.content_type().map(str::to_string);
            let data = part
                .stream()
                .try_fold(Vec::new(), |mut acc, chunk| async move {
                    acc.put(chunk);
                    Ok::<_, warp::Error>(acc)
                })
                .map_err(|e| invalid(&name, format!("unreadable part: {e}")))
                .await?;
            fields.push(Field {
                name,
                filename,
                content_type,
                data,
            });
        }
        Ok(Self { fields })
    }

    /// First field named `name`
    pub(crate) fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Every field named `name` as uploads
    pub(crate) fn uploads(&self, name: &str) -> Vec<Upload> {
        self.fields
            .iter()
            .filter(|f| f.name == name)
            .map(Field::to_upload)
            .collect()
    }

    /// Required file field
    pub(crate) fn upload(&self, name: &str) -> Result<Upload, Rejection> {
        self.field(name)
            .map(Field::to_upload)
            .ok_or_else(|| invalid(name, "is required"))
    }

    /// Required field holding a JSON document
    pub(crate) fn json<T: DeserializeOwned>(&self, name: &str) -> Result<T, Rejection> {
        let field = self.field(name).ok_or_else(|| invalid(name, "is required"))?;
        serde_json::from_slice(&field.data).map_err(|e| invalid(name, format!("is not valid JSON: {e}")))
    }
}

impl Field {
    fn to_upload(&self) -> Upload {
        Upload::new(
            self.filename.clone().unwrap_or_else(|| self.name.clone()),
            self.content_type.clone().unwrap_or_default(),
            self.data.clone(),
        )
    }
}

fn invalid(field: &str, message: impl Into<String>) -> Rejection {
    reject(SaraError::Validation(ValidationErrors::single(field, message)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bearer_scheme_is_case_insensitive() {
        assert_eq!(bearer(Some("Bearer abc123")), Some("abc123"));
        assert_eq!(bearer(Some("bearer   abc123 ")), Some("abc123"));
        assert_eq!(bearer(Some("Basic abc123")), None);
        assert_eq!(bearer(Some("Bearer ")), None);
        assert_eq!(bearer(None), None);
    }
}
