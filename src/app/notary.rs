//! Submit and verify documents by composing hashing, blob storage, the ledger
//! and the metadata store.

use crate::crypto::hashing::{owner_fingerprint, ContentHasher};
use crate::domain::document::{validate_email, DocumentMetadata, DocumentRecord, ValidationError};
use crate::infra::ledger::{Ledger, LedgerError};
use crate::storage::blob::{BlobError, BlobStore};
use crate::storage::documents::{DocumentStore, SaveOutcome};
use crate::storage::error::DbError;
use bytes::Bytes;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};

#[derive(Debug, Error)]
pub enum NotarizeError {
    #[error("invalid request: {0}")]
    Validation(#[from] ValidationError),
    #[error("failed to hash content: {0}")]
    Hash(#[source] std::io::Error),
    #[error("dedup lookup failed: {0}")]
    Lookup(#[source] DbError),
    #[error("blob store: {0}")]
    Blob(#[from] BlobError),
    #[error("ledger: {0}")]
    Ledger(#[from] LedgerError),
    /// The ledger holds a token with no application record. Needs operator reconciliation.
    #[error("token {token_id} minted for blob {blob_id} but its record was not saved: {source}")]
    PersistAfterMint {
        token_id: String,
        blob_id: String,
        #[source]
        source: DbError,
    },
}

pub struct Notary {
    hasher: Arc<dyn ContentHasher>,
    blobs: Arc<dyn BlobStore>,
    ledger: Arc<dyn Ledger>,
    store: Arc<dyn DocumentStore>,
}

impl Notary {
    pub fn new(
        hasher: Arc<dyn ContentHasher>,
        blobs: Arc<dyn BlobStore>,
        ledger: Arc<dyn Ledger>,
        store: Arc<dyn DocumentStore>,
    ) -> Self {
        Self {
            hasher,
            blobs,
            ledger,
            store,
        }
    }

    /// Notarizes `content`. Content that already has a record returns that record
    /// without storing or minting again.
    pub async fn submit(
        &self,
        content: Bytes,
        metadata: DocumentMetadata,
    ) -> Result<DocumentRecord, NotarizeError> {
        metadata.validate()?;
        if content.is_empty() {
            return Err(ValidationError::EmptyContent.into());
        }

        let fingerprint = self
            .hasher
            .hash_bytes(&content)
            .map_err(NotarizeError::Hash)?;
        let owner_hash = owner_fingerprint(self.hasher.as_ref(), &metadata.owner_email)
            .map_err(NotarizeError::Hash)?;

        if let Some(existing) = self
            .store
            .get_doc_meta_by_hash(&fingerprint)
            .await
            .map_err(NotarizeError::Lookup)?
        {
            info!(
                fingerprint = %fingerprint,
                doc_id = %existing.doc_id,
                "content already notarized"
            );
            return Ok(existing);
        }

        let size = content.len();
        let blob_id = self.blobs.put(content).await?;
        info!(doc_id = %blob_id, fingerprint = %fingerprint, bytes = size, "content stored");

        // An orphaned blob is harmless if the mint fails.
        let token_id = self.ledger.mint(&blob_id, &fingerprint, &owner_hash).await?;

        let record = metadata.into_record(blob_id.clone(), fingerprint.clone(), token_id.clone());
        match self.store.save_doc_meta(&record).await {
            Ok(SaveOutcome::Inserted(saved)) => {
                info!(doc_id = %saved.doc_id, token_id = %token_id, "document notarized");
                Ok(saved)
            }
            Ok(SaveOutcome::AlreadyPresent(existing)) => {
                warn!(
                    fingerprint = %fingerprint,
                    orphaned_token_id = %token_id,
                    orphaned_doc_id = %blob_id,
                    existing_doc_id = %existing.doc_id,
                    "content was notarized concurrently; minted token has no record"
                );
                Ok(existing)
            }
            Err(source) => {
                error!(
                    token_id = %token_id,
                    doc_id = %blob_id,
                    fingerprint = %fingerprint,
                    error = %source,
                    "mint succeeded but persisting the record failed"
                );
                Err(NotarizeError::PersistAfterMint {
                    token_id,
                    blob_id,
                    source,
                })
            }
        }
    }

    /// `Ok(false)` means the ledger holds different fingerprints for the token.
    pub async fn verify(
        &self,
        token_id: &str,
        content: &[u8],
        owner_email: &str,
    ) -> Result<bool, NotarizeError> {
        if token_id.trim().is_empty() {
            return Err(ValidationError::Missing("token id").into());
        }
        validate_email(owner_email)?;

        let fingerprint = self
            .hasher
            .hash_bytes(content)
            .map_err(NotarizeError::Hash)?;
        let owner_hash =
            owner_fingerprint(self.hasher.as_ref(), owner_email).map_err(NotarizeError::Hash)?;

        match self.ledger.verify(token_id, &fingerprint, &owner_hash).await {
            Ok(()) => {
                info!(token_id, "document verified");
                Ok(true)
            }
            Err(LedgerError::VerificationFailed { reason, .. }) => {
                info!(token_id, reason = %reason, "document did not verify");
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Returns the stored content for a document id.
    pub async fn fetch(&self, doc_id: &str) -> Result<Bytes, NotarizeError> {
        Ok(self.blobs.get(doc_id).await?)
    }
}
