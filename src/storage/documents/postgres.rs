//! Document metadata store backed by PostgreSQL.

use super::{DocumentStore, SaveOutcome};
use crate::app::tx_executor::RetryingTxExecutor;
use crate::domain::document::{DocumentRecord, Owner, OwnerStatus};
use crate::storage::error::{DbError, DOC_HASH_CONSTRAINT};
use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgConnection, Row};
use std::sync::Arc;

const SELECT_BY_HASH: &str = "SELECT d.doc_id, d.title, d.description, d.file_name, d.doc_hash,
        d.doc_minted_id, u.email, u.first_name, u.last_name, u.status
 FROM documents d
 JOIN users u ON u.id = d.user_id
 WHERE d.doc_hash = $1";

/// Every operation runs as one serializable transaction through the executor.
#[derive(Clone)]
pub struct PgDocumentStore {
    executor: Arc<RetryingTxExecutor>,
}

impl PgDocumentStore {
    pub fn new(executor: Arc<RetryingTxExecutor>) -> Self {
        Self { executor }
    }

    /// Creates the `users` and `documents` tables if they don't exist.
    pub async fn ensure_schema(&self) -> Result<(), DbError> {
        let pool = self.executor.pool();
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS users (
                id          BIGSERIAL PRIMARY KEY,
                email       TEXT NOT NULL,
                first_name  TEXT NOT NULL,
                last_name   TEXT NOT NULL,
                status      TEXT NOT NULL DEFAULT 'ACTIVE',
                created_at  TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                CONSTRAINT users_email_key UNIQUE (email)
            )",
        )
        .execute(pool)
        .await?;

        let documents = format!(
            "CREATE TABLE IF NOT EXISTS documents (
                id             BIGSERIAL PRIMARY KEY,
                doc_id         TEXT NOT NULL,
                title          TEXT NOT NULL,
                description    TEXT,
                file_name      TEXT NOT NULL,
                doc_hash       TEXT NOT NULL,
                doc_minted_id  TEXT,
                user_id        BIGINT NOT NULL REFERENCES users(id),
                created_at     TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                CONSTRAINT {} UNIQUE (doc_hash)
            )",
            DOC_HASH_CONSTRAINT
        );
        sqlx::query(&documents).execute(pool).await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS documents_user_id_idx ON documents (user_id)")
            .execute(pool)
            .await?;
        tracing::info!("document schema ready");
        Ok(())
    }
}

async fn find_by_hash(
    conn: &mut PgConnection,
    fingerprint: &str,
) -> Result<Option<DocumentRecord>, DbError> {
    let row = sqlx::query(SELECT_BY_HASH)
        .bind(fingerprint)
        .fetch_optional(&mut *conn)
        .await?;
    row.as_ref().map(record_from_row).transpose()
}

fn record_from_row(row: &PgRow) -> Result<DocumentRecord, DbError> {
    let status: String = row.try_get("status")?;
    let status = status.parse::<OwnerStatus>().map_err(DbError::Corrupt)?;
    Ok(DocumentRecord {
        doc_id: row.try_get("doc_id")?,
        owner: Owner {
            email: row.try_get("email")?,
            first_name: row.try_get("first_name")?,
            last_name: row.try_get("last_name")?,
            status,
        },
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        file_name: row.try_get("file_name")?,
        fingerprint: row.try_get("doc_hash")?,
        token_id: row.try_get("doc_minted_id")?,
    })
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    async fn get_doc_meta_by_hash(
        &self,
        fingerprint: &str,
    ) -> Result<Option<DocumentRecord>, DbError> {
        let fingerprint = fingerprint.to_string();
        self.executor
            .execute_with_retry("get_doc_meta_by_hash", move |conn| {
                let fingerprint = fingerprint.clone();
                Box::pin(async move { find_by_hash(conn, &fingerprint).await })
            })
            .await
    }

    async fn save_doc_meta(&self, record: &DocumentRecord) -> Result<SaveOutcome, DbError> {
        let record = record.clone();
        self.executor
            .execute_with_retry("save_doc_meta", move |conn| {
                let record = record.clone();
                Box::pin(async move {
                    // A concurrent submitter may have committed this content since the dedup check.
                    if let Some(existing) = find_by_hash(&mut *conn, &record.fingerprint).await? {
                        return Ok(SaveOutcome::AlreadyPresent(existing));
                    }

                    sqlx::query(
                        "INSERT INTO users (email, first_name, last_name, status)
                         VALUES ($1, $2, $3, $4)
                         ON CONFLICT (email) DO NOTHING",
                    )
                    .bind(&record.owner.email)
                    .bind(&record.owner.first_name)
                    .bind(&record.owner.last_name)
                    .bind(record.owner.status.as_str())
                    .execute(&mut *conn)
                    .await?;

                    let user_id: i64 = sqlx::query_scalar("SELECT id FROM users WHERE email = $1")
                        .bind(&record.owner.email)
                        .fetch_one(&mut *conn)
                        .await?;

                    sqlx::query(
                        "INSERT INTO documents
                            (doc_id, title, description, file_name, doc_hash, doc_minted_id, user_id)
                         VALUES ($1, $2, $3, $4, $5, $6, $7)",
                    )
                    .bind(&record.doc_id)
                    .bind(&record.title)
                    .bind(record.description.as_deref())
                    .bind(&record.file_name)
                    .bind(&record.fingerprint)
                    .bind(record.token_id.as_deref())
                    .bind(user_id)
                    .execute(&mut *conn)
                    .await?;

                    // Re-read so the returned owner reflects the stored row.
                    match find_by_hash(&mut *conn, &record.fingerprint).await? {
                        Some(stored) => Ok(SaveOutcome::Inserted(stored)),
                        None => Err(DbError::Corrupt(format!(
                            "document {} missing right after insert",
                            record.fingerprint
                        ))),
                    }
                })
            })
            .await
    }
}
