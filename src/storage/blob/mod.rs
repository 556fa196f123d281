//! Raw document content storage. Ids are opaque to callers.

pub mod fs;
pub mod memory;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

pub use fs::FsBlobStore;
pub use memory::MemoryBlobStore;

pub type BlobId = String;

#[derive(Debug, Error)]
pub enum BlobError {
    #[error("blob '{0}' not found")]
    NotFound(BlobId),
    #[error("'{0}' is not a valid blob id")]
    InvalidId(String),
    #[error("blob store i/o error: {0}")]
    Io(#[from] std::io::Error),
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put(&self, content: Bytes) -> Result<BlobId, BlobError>;
    async fn get(&self, id: &str) -> Result<Bytes, BlobError>;
}
