//! In-memory document store with optional JSON snapshot
//!
//! Commits are serialized by an async mutex. Each commit stages its writes
//! on a copy of the current documents, checks every precondition against the
//! staged state, persists the snapshot (when configured) and only then swaps
//! the copy in. Readers never observe a partial batch.

use crate::batch::{CommitResult, WriteBatch, WriteKind};
use crate::document::StoredDocument;
use crate::error::StoreError;
use crate::path::DocPath;
use crate::query::Query;
use crate::store::DocumentStore;
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

const SNAPSHOT_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct Snapshot {
    version: u32,
    documents: Vec<StoredDocument>,
}

type Documents = BTreeMap<DocPath, StoredDocument>;

/// Document store held in memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    docs: RwLock<Arc<Documents>>,
    commit_lock: Mutex<()>,
    snapshot: Option<PathBuf>,
}

impl MemoryStore {
    /// Volatile store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store persisted to `path`, loading it when present
    ///
    /// # Errors
    /// `Io` when the file cannot be read, `Serialization` when it is corrupt
    pub async fn with_snapshot(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let docs = match tokio::fs::read(&path).await {
            Ok(raw) => {
                let snapshot: Snapshot = serde_json::from_slice(&raw)?;
                if snapshot.version != SNAPSHOT_VERSION {
                    tracing::warn!(
                        version = snapshot.version,
                        path = %path.display(),
                        "Unexpected snapshot version, loading anyway"
                    );
                }
                snapshot
                    .documents
                    .into_iter()
                    .map(|d| (d.path.clone(), d))
                    .collect()
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Documents::new(),
            Err(e) => return Err(StoreError::io(&path, e)),
        };
        tracing::info!(documents = docs.len(), path = %path.display(), "Loaded document snapshot");
        Ok(Self {
            docs: RwLock::new(Arc::new(docs)),
            commit_lock: Mutex::new(()),
            snapshot: Some(path),
        })
    }

    /// Number of stored documents
    #[must_use]
    pub fn len(&self) -> usize {
        self.docs.read().len()
    }

    /// Whether the store is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.docs.read().is_empty()
    }

    fn current(&self) -> Arc<Documents> {
        Arc::clone(&self.docs.read())
    }

    async fn persist(path: &Path, docs: &Documents) -> Result<(), StoreError> {
        let snapshot = Snapshot {
            version: SNAPSHOT_VERSION,
            documents: docs.values().cloned().collect(),
        };
        let raw = serde_json::to_vec(&snapshot)?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StoreError::io(parent, e))?;
        }
        let tmp = path.with_extension("tmp");
        tokio::fs::write(&tmp, raw)
            .await
            .map_err(|e| StoreError::io(&tmp, e))?;
        tokio::fs::rename(&tmp, path)
            .await
            .map_err(|e| StoreError::io(path, e))
    }
}

fn stage(docs: &mut Documents, batch: WriteBatch) -> Result<CommitResult, StoreError> {
    let now = Utc::now();
    let mut result = CommitResult::default();
    for op in batch.into_ops() {
        let current = docs.get(&op.path);
        op.precondition
            .check(&op.path, current.map(|d| d.revision))?;
        let next_revision = current.map_or(1, |d| d.revision + 1);
        match op.kind {
            WriteKind::Set(data) => {
                docs.insert(
                    op.path.clone(),
                    StoredDocument {
                        path: op.path.clone(),
                        revision: next_revision,
                        data,
                        updated_at: now,
                    },
                );
                result.revisions.push((op.path, next_revision));
            }
            WriteKind::Merge(fields) => {
                let doc = docs
                    .get_mut(&op.path)
                    .ok_or_else(|| StoreError::NotFound(op.path.to_string()))?;
                let Value::Object(body) = &mut doc.data else {
                    return Err(StoreError::NotAnObject(op.path.to_string()));
                };
                body.extend(fields);
                doc.revision = next_revision;
                doc.updated_at = now;
                result.revisions.push((op.path, next_revision));
            }
            WriteKind::Delete => {
                docs.remove(&op.path);
                result.revisions.push((op.path, 0));
            }
        }
    }
    Ok(result)
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, path: &DocPath) -> Result<Option<StoredDocument>, StoreError> {
        Ok(self.docs.read().get(path).cloned())
    }

    async fn query(&self, query: &Query) -> Result<Vec<StoredDocument>, StoreError> {
        crate::path::validate_collection(&query.collection)?;
        let docs = self.current();
        Ok(query.apply(docs.values()))
    }

    async fn commit(&self, batch: WriteBatch) -> Result<CommitResult, StoreError> {
        if batch.is_empty() {
            return Err(StoreError::EmptyBatch);
        }
        let ops = batch.len();
        let _guard = self.commit_lock.lock().await;
        let mut staged = Documents::clone(&self.current());
        let result = match stage(&mut staged, batch) {
            Ok(result) => result,
            Err(e) => {
                tracing::debug!(error = %e, ops, "Batch rejected");
                return Err(e);
            }
        };
        if let Some(path) = &self.snapshot {
            Self::persist(path, &staged).await?;
        }
        *self.docs.write() = Arc::new(staged);
        tracing::debug!(ops, "Batch committed");
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::Precondition;
    use serde_json::json;

    fn path(id: &str) -> DocPath {
        DocPath::new("contracts", id).unwrap()
    }

    #[tokio::test]
    async fn revisions_increment() {
        let store = MemoryStore::new();
        let mut batch = WriteBatch::new();
        batch.create(path("c1"), &json!({"status": "Pendiente"})).unwrap();
        let r = store.commit(batch).await.unwrap();
        assert_eq!(r.revision_of(&path("c1")), Some(1));

        let mut batch = WriteBatch::new();
        batch
            .update(path("c1"), json!({"status": "Activo"}), Precondition::Revision(1))
            .unwrap();
        let r = store.commit(batch).await.unwrap();
        assert_eq!(r.revision_of(&path("c1")), Some(2));

        let doc = store.get(&path("c1")).await.unwrap().unwrap();
        assert_eq!(doc.data["status"], "Activo");
    }

    #[tokio::test]
    async fn empty_batch_rejected() {
        let store = MemoryStore::new();
        assert!(matches!(
            store.commit(WriteBatch::new()).await,
            Err(StoreError::EmptyBatch)
        ));
    }

    #[tokio::test]
    async fn merge_on_missing_fails() {
        let store = MemoryStore::new();
        let mut batch = WriteBatch::new();
        batch.update(path("nope"), json!({"a": 1}), Precondition::None).unwrap();
        let err = store.commit(batch).await.unwrap_err();
        assert!(err.is_conflict());
        assert!(store.is_empty());
    }
}
