//! S3-compatible backend (AWS, Railway, R2, MinIO) built on OpenDAL.

use std::time::Duration;

use async_trait::async_trait;
use opendal::{services::S3, ErrorKind, Operator};

use super::{ObjectStore, StorageError};
use crate::config::StorageConfig;

pub struct S3ObjectStore {
    op: Operator,
    public_read: bool,
}

impl S3ObjectStore {
    /// Path-style addressing against `cfg.endpoint`, so stored URLs keep the
    /// `endpoint/bucket/key` shape the gateway strips when recovering keys.
    pub fn new(cfg: &StorageConfig) -> Result<Self, StorageError> {
        let builder = S3::default()
            .endpoint(&cfg.endpoint)
            .region(&cfg.region)
            .bucket(&cfg.bucket)
            .access_key_id(&cfg.access_key_id)
            .secret_access_key(&cfg.secret_access_key);

        let op = Operator::new(builder)?.finish();
        tracing::info!(endpoint = %cfg.endpoint, bucket = %cfg.bucket, "S3 object store initialized");

        Ok(Self {
            op,
            public_read: cfg.public_read,
        })
    }
}

impl From<opendal::Error> for StorageError {
    fn from(err: opendal::Error) -> Self {
        match err.kind() {
            ErrorKind::NotFound => StorageError::NotFound(err.to_string()),
            ErrorKind::Unsupported => StorageError::Unsupported(err.to_string()),
            kind => StorageError::Backend {
                code: format!("{kind:?}"),
                message: err.to_string(),
            },
        }
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    fn name(&self) -> &'static str {
        "s3"
    }

    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<(), StorageError> {
        self.op
            .write_with(key, bytes)
            .content_type(content_type)
            .await?;
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        Ok(self.op.exists(key).await?)
    }

    async fn presign(&self, key: &str, ttl: Duration) -> Result<String, StorageError> {
        let request = self.op.presign_read(key, ttl).await?;
        Ok(request.uri().to_string())
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.op.delete(key).await?;
        Ok(())
    }

    /// OpenDAL exposes no per-object ACL call; objects are readable without a
    /// signature only when the bucket itself grants public read.
    async fn set_public(&self, _key: &str) -> Result<(), StorageError> {
        if self.public_read {
            Ok(())
        } else {
            Err(StorageError::Unsupported(
                "bucket is private and per-object ACLs are unavailable".to_string(),
            ))
        }
    }
}
