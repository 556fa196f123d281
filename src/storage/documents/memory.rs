use super::{DocumentStore, SaveOutcome};
use crate::domain::document::{DocumentRecord, Owner};
use crate::storage::error::DbError;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::Mutex;

#[derive(Debug, Default)]
struct Tables {
    owners: HashMap<String, Owner>,
    documents: HashMap<String, DocumentRecord>,
}

/// Single-lock store with the same semantics as the Postgres one: the first
/// owner row for an email wins, fingerprints are unique.
#[derive(Debug, Default)]
pub struct MemoryDocumentStore {
    tables: Mutex<Tables>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.tables.lock().await.documents.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn get_doc_meta_by_hash(
        &self,
        fingerprint: &str,
    ) -> Result<Option<DocumentRecord>, DbError> {
        Ok(self.tables.lock().await.documents.get(fingerprint).cloned())
    }

    async fn save_doc_meta(&self, record: &DocumentRecord) -> Result<SaveOutcome, DbError> {
        let mut tables = self.tables.lock().await;
        if let Some(existing) = tables.documents.get(&record.fingerprint) {
            return Ok(SaveOutcome::AlreadyPresent(existing.clone()));
        }
        let owner = tables
            .owners
            .entry(record.owner.email.clone())
            .or_insert_with(|| record.owner.clone())
            .clone();
        let stored = DocumentRecord {
            owner,
            ..record.clone()
        };
        tables
            .documents
            .insert(stored.fingerprint.clone(), stored.clone());
        Ok(SaveOutcome::Inserted(stored))
    }
}
