//! Document and blob storage
//!
//! Records live in a schema-agnostic document store addressed by
//! collection/id paths. Multi-document changes go through [`WriteBatch`],
//! which commits atomically and can guard each write with a
//! [`Precondition`], giving optimistic concurrency on revisions.
//!
//! # Example
//!
//! ```
//! use sara_store::{DocPath, DocumentStore, MemoryStore, Precondition, WriteBatch};
//! use serde_json::json;
//!
//! # async fn demo() -> Result<(), sara_store::StoreError> {
//! let store = MemoryStore::new();
//! let path = DocPath::new("propiedades", "p1")?;
//! let mut batch = WriteBatch::new();
//! batch.create(path.clone(), &json!({"status": "Disponible"}))?;
//! store.commit(batch).await?;
//!
//! let mut batch = WriteBatch::new();
//! batch.update(path.clone(), json!({"status": "Arrendada"}), Precondition::Revision(1))?;
//! store.commit(batch).await?;
//! # Ok(())
//! # }
//! ```

pub mod batch;
pub mod blob;
pub mod document;
pub mod error;
pub mod memory;
pub mod path;
pub mod query;
pub mod store;

pub use batch::{CommitResult, Precondition, WriteBatch, WriteKind, WriteOp};
pub use blob::{content_hash, sanitize_name, FsBlobStore, MemoryBlobStore};
pub use document::{lookup, StoredDocument, Versioned};
pub use error::StoreError;
pub use memory::MemoryStore;
pub use path::DocPath;
pub use query::{compare_json, Direction, Filter, Query};
pub use store::{BlobRef, BlobStore, DocumentStore};
