use super::{BlobError, BlobId, BlobStore};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;
use uuid::Uuid;

/// In-process blob store. Counts successful puts.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    blobs: RwLock<HashMap<BlobId, Bytes>>,
    puts: AtomicUsize,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_count(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, content: Bytes) -> Result<BlobId, BlobError> {
        let id = Uuid::new_v4().to_string();
        self.blobs.write().await.insert(id.clone(), content);
        self.puts.fetch_add(1, Ordering::SeqCst);
        Ok(id)
    }

    async fn get(&self, id: &str) -> Result<Bytes, BlobError> {
        self.blobs
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| BlobError::NotFound(id.to_string()))
    }
}
