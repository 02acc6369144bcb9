//! Object storage gateway for entry attachments.
//!
//! Uploads bytes under a generated unique key and hands back a retrieval URL:
//! a permanent public URL when the store accepts public objects, otherwise a
//! presigned URL capped at seven days. Stored URLs can be re-presigned later;
//! the key is always recovered from the URL, so regeneration never creates a
//! new object.

pub mod memory;
pub mod s3;

use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::Serialize;
use uuid::Uuid;

use crate::config::{StorageBackendKind, StorageConfig, MAX_PRESIGN_TTL_SECS};

pub use memory::MemoryObjectStore;
pub use s3::S3ObjectStore;

/// Characters left as-is inside a key segment, as S3 signs them.
const KEY_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'_').remove(b'.').remove(b'~');

/// Failure talking to (or configuring) the object store.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("object storage is not configured")]
    NotConfigured,

    #[error("object storage is misconfigured: {0}")]
    Misconfigured(String),

    #[error("object '{0}' does not exist")]
    NotFound(String),

    #[error("'{0}' does not reference an object in this bucket")]
    InvalidReference(String),

    #[error("operation not supported by the store: {0}")]
    Unsupported(String),

    #[error("store rejected the request ({code}): {message}")]
    Backend { code: String, message: String },
}

/// Minimal capability set the gateway needs from a blob store.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Short backend name for logs and health output.
    fn name(&self) -> &'static str;

    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<(), StorageError>;

    async fn exists(&self, key: &str) -> Result<bool, StorageError>;

    /// Issue a time-limited read URL for `key`.
    async fn presign(&self, key: &str, ttl: Duration) -> Result<String, StorageError>;

    async fn delete(&self, key: &str) -> Result<(), StorageError>;

    /// Make `key` publicly readable. Stores without ACL support return `Unsupported`.
    async fn set_public(&self, key: &str) -> Result<(), StorageError>;
}

/// A retrieval URL plus its expiry. `expires_at` is `None` for public URLs.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct IssuedUrl {
    pub url: String,
    pub expires_at: Option<DateTime<Utc>>,
}

impl IssuedUrl {
    pub fn is_presigned(&self) -> bool {
        self.expires_at.is_some()
    }
}

/// Storage gateway shared through `AppState`. Cheap to clone.
#[derive(Clone)]
pub struct StorageGateway {
    backend: Option<Arc<dyn ObjectStore>>,
    endpoint: String,
    bucket: String,
    presign_ttl: Duration,
}

impl fmt::Debug for StorageGateway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageGateway")
            .field("backend", &self.backend.as_ref().map(|b| b.name()))
            .field("endpoint", &self.endpoint)
            .field("bucket", &self.bucket)
            .field("presign_ttl", &self.presign_ttl)
            .finish()
    }
}

impl StorageGateway {
    pub fn new(
        backend: Arc<dyn ObjectStore>,
        endpoint: &str,
        bucket: &str,
        presign_ttl: Duration,
    ) -> Self {
        Self {
            backend: Some(backend),
            endpoint: endpoint.trim_end_matches('/').to_string(),
            bucket: bucket.trim_matches('/').to_string(),
            presign_ttl: presign_ttl.min(Duration::from_secs(MAX_PRESIGN_TTL_SECS)),
        }
    }

    /// A gateway with no backend. Every operation reports `NotConfigured`.
    pub fn disabled() -> Self {
        Self {
            backend: None,
            endpoint: String::new(),
            bucket: String::new(),
            presign_ttl: Duration::from_secs(MAX_PRESIGN_TTL_SECS),
        }
    }

    /// Build the gateway described by the storage section of the app config.
    pub fn from_config(cfg: &StorageConfig) -> Result<Self, StorageError> {
        let backend: Arc<dyn ObjectStore> = match &cfg.backend {
            StorageBackendKind::Disabled => return Ok(Self::disabled()),
            StorageBackendKind::Unrecognized(name) => {
                return Err(StorageError::Misconfigured(format!(
                    "unknown STORAGE_BACKEND '{name}' (expected s3, memory or disabled)"
                )));
            }
            StorageBackendKind::Memory => {
                let store = MemoryObjectStore::new(&cfg.endpoint, &cfg.bucket);
                Arc::new(if cfg.public_read { store.with_public_acl() } else { store })
            }
            StorageBackendKind::S3 => {
                if cfg.bucket.is_empty() {
                    return Err(StorageError::Misconfigured(
                        "STORAGE_BUCKET is required for the s3 backend".to_string(),
                    ));
                }
                Arc::new(S3ObjectStore::new(cfg)?)
            }
        };

        Ok(Self::new(
            backend,
            &cfg.endpoint,
            &cfg.bucket,
            Duration::from_secs(cfg.presign_ttl_secs),
        ))
    }

    pub fn is_configured(&self) -> bool {
        self.backend.is_some()
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.as_ref().map(|b| b.name()).unwrap_or("disabled")
    }

    pub fn presign_ttl(&self) -> Duration {
        self.presign_ttl
    }

    fn backend(&self) -> Result<&dyn ObjectStore, StorageError> {
        self.backend.as_deref().ok_or(StorageError::NotConfigured)
    }

    /// Permanent URL of a public object: `endpoint/bucket/key`, key percent-encoded.
    pub fn public_url(&self, key: &str) -> String {
        format!("{}/{}/{}", self.endpoint, self.bucket, encode_key(key))
    }

    /// Recover the storage key from a stored URL (public or presigned) or a bare key.
    ///
    /// Returns `None` when the reference is blank or is a URL into some other bucket.
    pub fn key_from_reference(&self, reference: &str) -> Option<String> {
        let reference = reference.trim();
        let without_query = reference
            .split(['?', '#'])
            .next()
            .unwrap_or_default();

        let prefix = format!("{}/{}/", self.endpoint, self.bucket);
        let key = if let Some(rest) = without_query.strip_prefix(&prefix) {
            decode_key(rest)?
        } else if without_query.contains("://") {
            // Same bucket reached through another host (CDN, path-style alias).
            let parsed = url::Url::parse(without_query).ok()?;
            let bucket_prefix = format!("/{}/", self.bucket);
            decode_key(parsed.path().strip_prefix(&bucket_prefix)?)?
        } else {
            without_query.trim_start_matches('/').to_string()
        };

        (!key.is_empty()).then_some(key)
    }

    /// Upload `bytes` into `folder` and return a working URL for it.
    pub async fn upload(
        &self,
        bytes: Vec<u8>,
        original_filename: &str,
        folder: &str,
    ) -> Result<IssuedUrl, StorageError> {
        let backend = self.backend()?;
        let key = storage_key(folder, original_filename, Utc::now());
        let content_type = content_type_for(original_filename);
        let size = bytes.len();

        backend.put(&key, bytes, content_type).await?;

        match backend.set_public(&key).await {
            Ok(()) => {
                tracing::info!(key = %key, size, content_type, "Uploaded public object");
                Ok(IssuedUrl {
                    url: self.public_url(&key),
                    expires_at: None,
                })
            }
            Err(acl_err) => {
                tracing::debug!(key = %key, reason = %acl_err, "Public ACL rejected, presigning instead");
                match self.presign_key(backend, &key).await {
                    Ok(issued) => {
                        tracing::info!(key = %key, size, content_type, "Uploaded private object");
                        Ok(issued)
                    }
                    Err(e) => {
                        // No usable URL: remove the unreachable object and fail loudly.
                        if let Err(cleanup) = backend.delete(&key).await {
                            tracing::warn!(key = %key, error = %cleanup, "Failed to remove unreachable object");
                        }
                        Err(e)
                    }
                }
            }
        }
    }

    /// Issue a fresh presigned URL for an object previously returned by `upload`.
    pub async fn regenerate_presigned_url(&self, reference: &str) -> Result<IssuedUrl, StorageError> {
        let backend = self.backend()?;
        let key = self
            .key_from_reference(reference)
            .ok_or_else(|| StorageError::InvalidReference(reference.to_string()))?;

        if !backend.exists(&key).await? {
            return Err(StorageError::NotFound(key));
        }

        self.presign_key(backend, &key).await
    }

    /// Best-effort delete. Returns `false` instead of failing.
    pub async fn delete(&self, url: &str) -> bool {
        let Ok(backend) = self.backend() else {
            tracing::warn!(url, "Storage not configured, cannot delete object");
            return false;
        };
        let Some(key) = self.key_from_reference(url) else {
            tracing::debug!(url, "URL does not map to a storage key");
            return false;
        };

        match backend.exists(&key).await {
            Ok(true) => {}
            Ok(false) => return false,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Existence check before delete failed");
                return false;
            }
        }

        match backend.delete(&key).await {
            Ok(()) => {
                tracing::info!(key = %key, "Deleted object");
                true
            }
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Failed to delete object");
                false
            }
        }
    }

    async fn presign_key(&self, backend: &dyn ObjectStore, key: &str) -> Result<IssuedUrl, StorageError> {
        let url = backend.presign(key, self.presign_ttl).await?;
        let ttl = chrono::Duration::seconds(self.presign_ttl.as_secs() as i64);
        Ok(IssuedUrl {
            url,
            expires_at: Some(Utc::now() + ttl),
        })
    }
}

/// Percent-encode each `/`-separated segment of a storage key.
pub(crate) fn encode_key(key: &str) -> String {
    key.split('/')
        .map(|segment| utf8_percent_encode(segment, KEY_SEGMENT).to_string())
        .collect::<Vec<_>>()
        .join("/")
}

/// Inverse of `encode_key`. `None` when the escapes are not valid UTF-8.
fn decode_key(encoded: &str) -> Option<String> {
    percent_decode_str(encoded)
        .decode_utf8()
        .ok()
        .map(|key| key.into_owned())
}

/// `folder/<YYYYmmdd_HHMMSS>_<random8hex><ext>`.
pub fn storage_key(folder: &str, original_filename: &str, now: DateTime<Utc>) -> String {
    let random = Uuid::new_v4().simple().to_string();
    let unique = format!(
        "{}_{}{}",
        now.format("%Y%m%d_%H%M%S"),
        &random[..8],
        file_extension(original_filename)
    );

    let folder = folder.trim_matches('/');
    if folder.is_empty() {
        unique
    } else {
        format!("{folder}/{unique}")
    }
}

/// Extension of `filename` including the dot, reduced to ASCII alphanumerics.
fn file_extension(filename: &str) -> String {
    Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            ext.chars()
                .filter(|c| c.is_ascii_alphanumeric())
                .take(10)
                .collect::<String>()
        })
        .filter(|ext| !ext.is_empty())
        .map(|ext| format!(".{ext}"))
        .unwrap_or_default()
}

/// Content type stored with an uploaded object.
pub fn content_type_for(filename: &str) -> &'static str {
    match file_extension(filename).to_ascii_lowercase().as_str() {
        ".jpg" | ".jpeg" => "image/jpeg",
        ".png" => "image/png",
        ".pdf" => "application/pdf",
        ".doc" | ".docx" => "application/msword",
        ".txt" => "text/plain",
        _ => "application/octet-stream",
    }
}
