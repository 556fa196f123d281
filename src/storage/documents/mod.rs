//! Persistence of owners and notarized document metadata.

pub mod memory;
pub mod postgres;

use crate::domain::document::DocumentRecord;
use crate::storage::error::DbError;
use async_trait::async_trait;

pub use memory::MemoryDocumentStore;
pub use postgres::PgDocumentStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    Inserted(DocumentRecord),
    /// A record with the same fingerprint was already committed; it is returned unchanged.
    AlreadyPresent(DocumentRecord),
}

impl SaveOutcome {
    pub fn into_record(self) -> DocumentRecord {
        match self {
            SaveOutcome::Inserted(r) | SaveOutcome::AlreadyPresent(r) => r,
        }
    }
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get_doc_meta_by_hash(&self, fingerprint: &str)
        -> Result<Option<DocumentRecord>, DbError>;

    /// Creates the owner if its email is new and inserts the record, atomically.
    async fn save_doc_meta(&self, record: &DocumentRecord) -> Result<SaveOutcome, DbError>;
}
