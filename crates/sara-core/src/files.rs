//! User file uploads
//!
//! Also hosts the upload checks shared by receipts, incident attachments and
//! contract PDFs.

use crate::auth::Principal;
use crate::context::Context;
use crate::error::SaraError;
use crate::paths;
use crate::repo;
use bytes::Bytes;
use sara_domain::{FileId, UserFile, ValidationErrors};
use sara_store::{BlobRef, Query, WriteBatch};
use std::sync::Arc;

/// An uploaded file before storage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upload {
    /// Original file name
    pub name: String,
    /// MIME type
    pub content_type: String,
    /// Content
    pub data: Bytes,
}

impl Upload {
    /// New upload
    #[must_use]
    pub fn new(name: impl Into<String>, content_type: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            content_type: content_type.into(),
            data: data.into(),
        }
    }
}

/// Validate and store an upload under `prefix`
pub(crate) async fn store_upload(ctx: &Context, prefix: &str, upload: &Upload) -> Result<BlobRef, SaraError> {
    let mut errors = ValidationErrors::new();
    errors.text("name", &upload.name, 1, 200);
    errors.check(!upload.data.is_empty(), "file", "is empty");
    let max = ctx.config.limits.max_upload_bytes;
    let size = upload.data.len() as u64;
    errors.check(size <= max, "file", &format!("is {size} bytes, the limit is {max}"));
    errors.into_result()?;
    let content_type = if upload.content_type.trim().is_empty() {
        "application/octet-stream"
    } else {
        upload.content_type.trim()
    };
    ctx.blobs
        .put(prefix, &upload.name, content_type, upload.data.clone())
        .await
        .map_err(SaraError::blob)
}

/// File service
#[derive(Debug, Clone)]
pub struct FileService {
    ctx: Arc<Context>,
}

impl FileService {
    pub(crate) fn new(ctx: Arc<Context>) -> Self {
        Self { ctx }
    }

    /// Store a file for the caller
    ///
    /// # Errors
    /// `Validation` for empty, unnamed or oversized files
    pub async fn upload(&self, principal: &Principal, upload: Upload) -> Result<UserFile, SaraError> {
        let blob = store_upload(&self.ctx, &format!("files/{}", principal.uid), &upload).await?;
        let file = UserFile {
            id: FileId::new(),
            owner_id: principal.uid.clone(),
            name: upload.name.trim().to_string(),
            content_type: blob.content_type,
            size: blob.size,
            key: blob.key,
            url: blob.url,
            uploaded_at: self.ctx.now(),
        };
        let mut batch = WriteBatch::new();
        batch.create(paths::user_file(file.id), &file)?;
        self.ctx.store.commit(batch).await?;
        tracing::info!(file_id = %file.id, size = file.size, "File uploaded");
        Ok(file)
    }

    /// Caller's files, newest first
    ///
    /// # Errors
    /// `Store` failures
    pub async fn list_for(&self, principal: &Principal) -> Result<Vec<UserFile>, SaraError> {
        let query = Query::collection(paths::USER_FILES).where_eq("owner_id", principal.uid.as_str());
        let mut list: Vec<UserFile> = repo::find_values(self.ctx.store(), &query).await?;
        list.sort_by(|a, b| b.uploaded_at.cmp(&a.uploaded_at).then(b.id.cmp(&a.id)));
        Ok(list)
    }

    /// Fetch blob content by key
    ///
    /// # Errors
    /// `NotFound` for unknown keys
    pub async fn blob(&self, key: &str) -> Result<(BlobRef, Bytes), SaraError> {
        self.ctx
            .blobs
            .get(key)
            .await
            .map_err(SaraError::blob)?
            .ok_or_else(|| SaraError::not_found("file", key))
    }
}
