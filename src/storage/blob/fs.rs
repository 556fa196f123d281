use super::{BlobError, BlobId, BlobStore};
use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Stores each blob as a file named by a random UUID.
///
/// Content is written to a dot-prefixed temporary file first and renamed into
/// place, so a reader never observes a partial blob.
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    dir: PathBuf,
}

impl FsBlobStore {
    pub async fn open(dir: impl AsRef<Path>) -> Result<Self, BlobError> {
        let dir = dir.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, id: &str) -> Result<PathBuf, BlobError> {
        let parsed = Uuid::parse_str(id).map_err(|_| BlobError::InvalidId(id.to_string()))?;
        Ok(self.dir.join(parsed.hyphenated().to_string()))
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn put(&self, content: Bytes) -> Result<BlobId, BlobError> {
        let id = Uuid::new_v4().hyphenated().to_string();
        let tmp = self.dir.join(format!(".{}.tmp", id));
        let target = self.dir.join(&id);

        tokio::fs::write(&tmp, &content).await?;
        if let Err(e) = tokio::fs::rename(&tmp, &target).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        tracing::debug!(blob_id = %id, bytes = content.len(), "blob stored");
        Ok(id)
    }

    async fn get(&self, id: &str) -> Result<Bytes, BlobError> {
        let path = self.path_for(id)?;
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(BlobError::NotFound(id.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}
