//! In-process object store for local development and tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use super::{encode_key, ObjectStore, StorageError};

type PutFailure = Box<dyn Fn(&str, &[u8]) -> bool + Send + Sync>;

/// A stored object and its metadata.
#[derive(Debug, Clone)]
pub struct StoredObject {
    pub bytes: Vec<u8>,
    pub content_type: String,
    pub public: bool,
}

/// HashMap-backed store. Private by default; presigned URLs mimic S3 query signing.
pub struct MemoryObjectStore {
    endpoint: String,
    bucket: String,
    public_acl: bool,
    objects: Mutex<HashMap<String, StoredObject>>,
    put_calls: AtomicUsize,
    put_failure: Option<PutFailure>,
}

impl MemoryObjectStore {
    pub fn new(endpoint: &str, bucket: &str) -> Self {
        Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            bucket: bucket.trim_matches('/').to_string(),
            public_acl: false,
            objects: Mutex::new(HashMap::new()),
            put_calls: AtomicUsize::new(0),
            put_failure: None,
        }
    }

    /// Accept `set_public`, like a bucket with object ACLs enabled.
    pub fn with_public_acl(mut self) -> Self {
        self.public_acl = true;
        self
    }

    /// Reject every `put` for which `predicate(key, body)` is true.
    pub fn fail_puts_when<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&str, &[u8]) -> bool + Send + Sync + 'static,
    {
        self.put_failure = Some(Box::new(predicate));
        self
    }

    /// Number of `put` calls seen, failed ones included.
    pub fn put_calls(&self) -> usize {
        self.put_calls.load(Ordering::SeqCst)
    }

    pub fn object(&self, key: &str) -> Option<StoredObject> {
        self.objects().get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.objects().len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects().is_empty()
    }

    fn objects(&self) -> MutexGuard<'_, HashMap<String, StoredObject>> {
        self.objects.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<(), StorageError> {
        self.put_calls.fetch_add(1, Ordering::SeqCst);

        if self.put_failure.as_ref().is_some_and(|fail| fail(key, bytes.as_slice())) {
            return Err(StorageError::Backend {
                code: "InternalError".to_string(),
                message: format!("simulated write failure for '{key}'"),
            });
        }

        self.objects().insert(
            key.to_string(),
            StoredObject {
                bytes,
                content_type: content_type.to_string(),
                public: false,
            },
        );
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        Ok(self.objects().contains_key(key))
    }

    async fn presign(&self, key: &str, ttl: Duration) -> Result<String, StorageError> {
        let signature = Uuid::new_v4().simple();
        Ok(format!(
            "{}/{}/{}?X-Amz-Expires={}&X-Amz-Signature={signature}",
            self.endpoint,
            self.bucket,
            encode_key(key),
            ttl.as_secs()
        ))
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.objects().remove(key);
        Ok(())
    }

    async fn set_public(&self, key: &str) -> Result<(), StorageError> {
        if !self.public_acl {
            return Err(StorageError::Unsupported(
                "AccessControlListNotSupported: the bucket does not allow ACLs".to_string(),
            ));
        }

        match self.objects().get_mut(key) {
            Some(object) => {
                object.public = true;
                Ok(())
            }
            None => Err(StorageError::NotFound(key.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_then_exists_and_delete() {
        let store = MemoryObjectStore::new("memory://local/", "b");
        store.put("k/1.txt", b"hi".to_vec(), "text/plain").await.unwrap();

        assert!(store.exists("k/1.txt").await.unwrap());
        assert_eq!(store.put_calls(), 1);

        store.delete("k/1.txt").await.unwrap();
        assert!(!store.exists("k/1.txt").await.unwrap());
    }

    #[tokio::test]
    async fn presigned_url_carries_ttl() {
        let store = MemoryObjectStore::new("memory://local", "b");
        let url = store.presign("k.pdf", Duration::from_secs(60)).await.unwrap();
        assert!(url.starts_with("memory://local/b/k.pdf?X-Amz-Expires=60&"));

        let spaced = store.presign("my docs/k.pdf", Duration::from_secs(60)).await.unwrap();
        assert!(spaced.starts_with("memory://local/b/my%20docs/k.pdf?"));
    }

    #[tokio::test]
    async fn set_public_requires_acl_support() {
        let store = MemoryObjectStore::new("memory://local", "b");
        store.put("k", vec![1], "application/octet-stream").await.unwrap();
        assert!(matches!(store.set_public("k").await, Err(StorageError::Unsupported(_))));
    }
}
