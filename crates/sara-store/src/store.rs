//! Store traits

use crate::batch::{CommitResult, WriteBatch};
use crate::document::StoredDocument;
use crate::error::StoreError;
use crate::path::DocPath;
use crate::query::Query;
use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// Schema-agnostic document database
///
/// Reads see only fully committed batches. `commit` applies all operations
/// of a batch or none of them.
#[async_trait]
pub trait DocumentStore: Send + Sync + Debug {
    /// Read one document
    async fn get(&self, path: &DocPath) -> Result<Option<StoredDocument>, StoreError>;

    /// Run a query
    async fn query(&self, query: &Query) -> Result<Vec<StoredDocument>, StoreError>;

    /// Atomically apply a batch
    async fn commit(&self, batch: WriteBatch) -> Result<CommitResult, StoreError>;
}

/// Reference to a stored blob
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobRef {
    /// Store-relative key
    pub key: String,
    /// Public URL
    pub url: String,
    /// Size in bytes
    pub size: u64,
    /// Hex SHA-256 of the content
    pub sha256: String,
    /// MIME type
    pub content_type: String,
}

/// Binary object storage for receipts, contract PDFs and user files
#[async_trait]
pub trait BlobStore: Send + Sync + Debug {
    /// Store `data` under `prefix`, keeping a sanitized form of `name`
    async fn put(
        &self,
        prefix: &str,
        name: &str,
        content_type: &str,
        data: Bytes,
    ) -> Result<BlobRef, StoreError>;

    /// Fetch a blob by key
    async fn get(&self, key: &str) -> Result<Option<(BlobRef, Bytes)>, StoreError>;
}
