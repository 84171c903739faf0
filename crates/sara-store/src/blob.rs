//! Blob storage backends
//!
//! Keys are `{prefix}/{hash16}-{name}` where `hash16` is the first sixteen hex
//! characters of the content SHA-256, so re-uploading the same file under the
//! same name is idempotent.

use crate::error::StoreError;
use crate::store::{BlobRef, BlobStore};
use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use sha2::{Digest, Sha256};
use std::path::{Component, Path, PathBuf};

/// Hex SHA-256 of `data`
#[must_use]
pub fn content_hash(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Keep ASCII alphanumerics plus `.`, `-` and `_`; everything else becomes `_`
#[must_use]
pub fn sanitize_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let trimmed = cleaned.trim_start_matches('.');
    if trimmed.is_empty() {
        "file".to_string()
    } else {
        trimmed.to_string()
    }
}

fn check_prefix(prefix: &str) -> Result<(), StoreError> {
    let ok = !prefix.is_empty()
        && !prefix.starts_with('/')
        && prefix
            .split('/')
            .all(|s| !s.is_empty() && s != "." && s != "..");
    if ok {
        Ok(())
    } else {
        Err(StoreError::InvalidKey(prefix.to_string()))
    }
}

fn make_ref(base_url: &str, prefix: &str, name: &str, content_type: &str, data: &[u8]) -> BlobRef {
    let sha256 = content_hash(data);
    let key = format!("{prefix}/{}-{}", &sha256[..16], sanitize_name(name));
    BlobRef {
        url: format!("{}/{key}", base_url.trim_end_matches('/')),
        key,
        size: data.len() as u64,
        sha256,
        content_type: content_type.to_string(),
    }
}

fn check_size(len: usize, max: Option<u64>) -> Result<(), StoreError> {
    match max {
        Some(max) if len as u64 > max => Err(StoreError::TooLarge {
            size: len as u64,
            max,
        }),
        _ => Ok(()),
    }
}

/// Blobs on the local filesystem with a JSON metadata sidecar per file
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root: PathBuf,
    base_url: String,
    max_bytes: Option<u64>,
}

impl FsBlobStore {
    /// Store rooted at `root`, serving URLs below `base_url`
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, base_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            base_url: base_url.into(),
            max_bytes: None,
        }
    }

    /// Reject blobs larger than `max`
    #[inline]
    #[must_use]
    pub fn with_max_bytes(mut self, max: u64) -> Self {
        self.max_bytes = Some(max);
        self
    }

    /// Root directory
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, key: &str) -> Result<PathBuf, StoreError> {
        let relative = Path::new(key);
        let safe = !key.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !safe {
            return Err(StoreError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(relative))
    }

    fn meta_path(file: &Path) -> PathBuf {
        let mut name = file.as_os_str().to_owned();
        name.push(".meta.json");
        PathBuf::from(name)
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn put(
        &self,
        prefix: &str,
        name: &str,
        content_type: &str,
        data: Bytes,
    ) -> Result<BlobRef, StoreError> {
        check_prefix(prefix)?;
        check_size(data.len(), self.max_bytes)?;
        let blob = make_ref(&self.base_url, prefix, name, content_type, &data);
        let file = self.resolve(&blob.key)?;
        if let Some(parent) = file.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StoreError::io(parent, e))?;
        }
        tokio::fs::write(&file, &data)
            .await
            .map_err(|e| StoreError::io(&file, e))?;
        let meta = Self::meta_path(&file);
        tokio::fs::write(&meta, serde_json::to_vec(&blob)?)
            .await
            .map_err(|e| StoreError::io(&meta, e))?;
        tracing::debug!(key = %blob.key, size = blob.size, "Stored blob");
        Ok(blob)
    }

    async fn get(&self, key: &str) -> Result<Option<(BlobRef, Bytes)>, StoreError> {
        let file = self.resolve(key)?;
        let data = match tokio::fs::read(&file).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StoreError::io(&file, e)),
        };
        let meta = Self::meta_path(&file);
        let raw = tokio::fs::read(&meta)
            .await
            .map_err(|e| StoreError::io(&meta, e))?;
        let blob: BlobRef = serde_json::from_slice(&raw)?;
        Ok(Some((blob, Bytes::from(data))))
    }
}

/// Volatile blob store for tests
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    blobs: DashMap<String, (BlobRef, Bytes)>,
    base_url: String,
    max_bytes: Option<u64>,
}

impl MemoryBlobStore {
    /// Empty store with `memory://` URLs
    #[must_use]
    pub fn new() -> Self {
        Self {
            blobs: DashMap::new(),
            base_url: "memory://blobs".into(),
            max_bytes: None,
        }
    }

    /// Reject blobs larger than `max`
    #[inline]
    #[must_use]
    pub fn with_max_bytes(mut self, max: u64) -> Self {
        self.max_bytes = Some(max);
        self
    }

    /// Number of stored blobs
    #[must_use]
    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    /// Whether nothing is stored
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(
        &self,
        prefix: &str,
        name: &str,
        content_type: &str,
        data: Bytes,
    ) -> Result<BlobRef, StoreError> {
        check_prefix(prefix)?;
        check_size(data.len(), self.max_bytes)?;
        let blob = make_ref(&self.base_url, prefix, name, content_type, &data);
        self.blobs.insert(blob.key.clone(), (blob.clone(), data));
        Ok(blob)
    }

    async fn get(&self, key: &str) -> Result<Option<(BlobRef, Bytes)>, StoreError> {
        Ok(self.blobs.get(key).map(|entry| entry.value().clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitizes_names() {
        assert_eq!(sanitize_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_name("Comprobante Junio.pdf"), "Comprobante_Junio.pdf");
        assert_eq!(sanitize_name("..."), "file");
        assert_eq!(sanitize_name("C:\\tmp\\recibo.png"), "recibo.png");
    }

    #[test]
    fn prefixes_validated() {
        assert!(check_prefix("receipts/c1").is_ok());
        assert!(check_prefix("../x").is_err());
        assert!(check_prefix("/abs").is_err());
        assert!(check_prefix("").is_err());
    }

    #[tokio::test]
    async fn fs_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::new(dir.path(), "http://localhost/files/");
        let blob = store
            .put("receipts/c1", "junio.pdf", "application/pdf", Bytes::from_static(b"%PDF"))
            .await
            .unwrap();
        assert!(blob.key.starts_with("receipts/c1/"));
        assert!(blob.url.starts_with("http://localhost/files/receipts/c1/"));
        let (meta, data) = store.get(&blob.key).await.unwrap().unwrap();
        assert_eq!(meta, blob);
        assert_eq!(&data[..], b"%PDF");
        assert!(store.get("receipts/c1/missing").await.unwrap().is_none());
        assert!(store.get("../secret").await.is_err());
    }

    #[tokio::test]
    async fn repeated_upload_reuses_key() {
        let store = MemoryBlobStore::new();
        let data = Bytes::from_static(b"%PDF-1.4 recibo");
        let first = store
            .put("receipts/c1", "mayo.pdf", "application/pdf", data.clone())
            .await
            .unwrap();
        let retry = store
            .put("receipts/c1", "mayo.pdf", "application/pdf", data)
            .await
            .unwrap();
        assert_eq!(first, retry);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn size_limit() {
        let store = MemoryBlobStore::new().with_max_bytes(3);
        let err = store
            .put("files/u1", "a.txt", "text/plain", Bytes::from_static(b"abcd"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::TooLarge { size: 4, max: 3 }));
        assert!(store.is_empty());
    }
}
