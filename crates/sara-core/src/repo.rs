//! Typed reads over the document store

use crate::error::SaraError;
use sara_store::{DocPath, DocumentStore, Query, Versioned};
use serde::de::DeserializeOwned;

/// Read and decode one document
pub(crate) async fn load<T: DeserializeOwned>(
    store: &dyn DocumentStore,
    path: &DocPath,
) -> Result<Option<Versioned<T>>, SaraError> {
    match store.get(path).await? {
        Some(doc) => Ok(Some(Versioned {
            value: doc.decode()?,
            revision: doc.revision,
        })),
        None => Ok(None),
    }
}

/// Read one document or fail with `NotFound("{kind} {id}")`
pub(crate) async fn require<T: DeserializeOwned>(
    store: &dyn DocumentStore,
    path: &DocPath,
    kind: &str,
) -> Result<Versioned<T>, SaraError> {
    load(store, path)
        .await?
        .ok_or_else(|| SaraError::not_found(kind, path.id()))
}

/// Run a query and decode every hit
pub(crate) async fn find<T: DeserializeOwned>(
    store: &dyn DocumentStore,
    query: &Query,
) -> Result<Vec<Versioned<T>>, SaraError> {
    store
        .query(query)
        .await?
        .into_iter()
        .map(|doc| {
            Ok(Versioned {
                value: doc.decode()?,
                revision: doc.revision,
            })
        })
        .collect()
}

/// Run a query and keep only the decoded values
pub(crate) async fn find_values<T: DeserializeOwned>(
    store: &dyn DocumentStore,
    query: &Query,
) -> Result<Vec<T>, SaraError> {
    Ok(find(store, query).await?.into_iter().map(|v| v.value).collect())
}
