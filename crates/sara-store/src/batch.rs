//! Write batches
//!
//! A batch groups writes across documents. The store either applies every
//! operation or none, and each operation may carry a precondition on the
//! state of its target at commit time.

use crate::error::StoreError;
use crate::path::DocPath;
use serde::Serialize;
use serde_json::Value;

/// Condition on a document's state at commit time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Precondition {
    /// No check
    #[default]
    None,
    /// Document must exist
    Exists,
    /// Document must not exist
    Missing,
    /// Document must exist at exactly this revision
    Revision(u64),
}

impl Precondition {
    /// Check against the revision currently held (`None` when missing)
    ///
    /// # Errors
    /// `PreconditionFailed` describing the mismatch
    pub fn check(self, path: &DocPath, current: Option<u64>) -> Result<(), StoreError> {
        let ok = match (self, current) {
            (Self::None, _) | (Self::Exists, Some(_)) | (Self::Missing, None) => true,
            (Self::Revision(want), Some(have)) => want == have,
            _ => false,
        };
        if ok {
            return Ok(());
        }
        Err(StoreError::PreconditionFailed {
            path: path.to_string(),
            expected: self.describe(),
            actual: current.map_or_else(|| "missing".to_string(), |r| format!("revision {r}")),
        })
    }

    fn describe(self) -> String {
        match self {
            Self::None => "anything".into(),
            Self::Exists => "existing document".into(),
            Self::Missing => "missing".into(),
            Self::Revision(r) => format!("revision {r}"),
        }
    }
}

/// Kind of write
#[derive(Debug, Clone, PartialEq)]
pub enum WriteKind {
    /// Replace the whole body
    Set(Value),
    /// Merge top-level fields into the existing body
    Merge(serde_json::Map<String, Value>),
    /// Remove the document
    Delete,
}

/// One write inside a batch
#[derive(Debug, Clone, PartialEq)]
pub struct WriteOp {
    /// Target
    pub path: DocPath,
    /// Write
    pub kind: WriteKind,
    /// Required state of the target
    pub precondition: Precondition,
}

/// Ordered group of writes committed atomically
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    /// Empty batch
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a document that must not exist yet
    ///
    /// # Errors
    /// `Serialization` when `value` cannot be encoded
    pub fn create<T: Serialize>(&mut self, path: DocPath, value: &T) -> Result<&mut Self, StoreError> {
        self.push(path, WriteKind::Set(serde_json::to_value(value)?), Precondition::Missing);
        Ok(self)
    }

    /// Unconditionally write a document
    ///
    /// # Errors
    /// `Serialization` when `value` cannot be encoded
    pub fn set<T: Serialize>(&mut self, path: DocPath, value: &T) -> Result<&mut Self, StoreError> {
        self.push(path, WriteKind::Set(serde_json::to_value(value)?), Precondition::None);
        Ok(self)
    }

    /// Overwrite a document only if it is still at `revision`
    ///
    /// # Errors
    /// `Serialization` when `value` cannot be encoded
    pub fn set_if<T: Serialize>(
        &mut self,
        path: DocPath,
        value: &T,
        revision: u64,
    ) -> Result<&mut Self, StoreError> {
        self.push(
            path,
            WriteKind::Set(serde_json::to_value(value)?),
            Precondition::Revision(revision),
        );
        Ok(self)
    }

    /// Merge fields into an existing document
    ///
    /// # Errors
    /// `NotAnObject` when `fields` is not a JSON object
    pub fn update(
        &mut self,
        path: DocPath,
        fields: Value,
        precondition: Precondition,
    ) -> Result<&mut Self, StoreError> {
        let Value::Object(map) = fields else {
            return Err(StoreError::NotAnObject(path.to_string()));
        };
        let precondition = match precondition {
            Precondition::None => Precondition::Exists,
            other => other,
        };
        self.push(path, WriteKind::Merge(map), precondition);
        Ok(self)
    }

    /// Delete a document
    pub fn delete(&mut self, path: DocPath, precondition: Precondition) -> &mut Self {
        self.push(path, WriteKind::Delete, precondition);
        self
    }

    fn push(&mut self, path: DocPath, kind: WriteKind, precondition: Precondition) {
        self.ops.push(WriteOp {
            path,
            kind,
            precondition,
        });
    }

    /// Operations in commit order
    #[must_use]
    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }

    /// Consume into operations
    #[must_use]
    pub fn into_ops(self) -> Vec<WriteOp> {
        self.ops
    }

    /// Number of operations
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Whether the batch has no operations
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

/// Outcome of a successful commit
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitResult {
    /// New revision of each written document, in batch order; deletes report 0
    pub revisions: Vec<(DocPath, u64)>,
}

impl CommitResult {
    /// Revision written for `path`
    #[must_use]
    pub fn revision_of(&self, path: &DocPath) -> Option<u64> {
        self.revisions
            .iter()
            .rev()
            .find(|(p, _)| p == path)
            .map(|(_, r)| *r)
    }
}
