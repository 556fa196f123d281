use std::time::Duration;
use thiserror::Error;

/// Unique constraint guarding the dedup key. A violation means a concurrent
/// submitter committed the same content first.
pub const DOC_HASH_CONSTRAINT: &str = "documents_doc_hash_key";

/// Relational failures, classified at the driver boundary so retry loops never
/// inspect raw driver errors.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("transaction exceeded its {}ms budget", .0.as_millis())]
    Timeout(Duration),
    #[error("statement cancelled by server timeout: {0}")]
    StatementTimeout(String),
    #[error("serialization conflict: {0}")]
    WriteConflict(String),
    #[error("constraint violation: {0}")]
    Constraint(String),
    #[error("database connection error: {0}")]
    Connection(String),
    #[error("query failed: {0}")]
    Query(String),
    #[error("stored row is malformed: {0}")]
    Corrupt(String),
    #[error("transaction failed after {attempts} attempts, last error: {last}")]
    RetriesExhausted { attempts: u32, last: Box<DbError> },
}

impl DbError {
    /// Only serialization aborts and dedup-key races are worth another attempt.
    pub fn is_write_conflict(&self) -> bool {
        matches!(self, DbError::WriteConflict(_))
    }
}

/// Maps a SQLSTATE (and the violated constraint, if any) onto the taxonomy.
pub fn classify_sqlstate(code: &str, constraint: Option<&str>, message: &str) -> DbError {
    let message = message.to_string();
    if code.starts_with("40") {
        return DbError::WriteConflict(message);
    }
    if code == "23505" && constraint == Some(DOC_HASH_CONSTRAINT) {
        return DbError::WriteConflict(message);
    }
    if code == "57014" {
        return DbError::StatementTimeout(message);
    }
    if code.starts_with("23") {
        return DbError::Constraint(message);
    }
    if code.starts_with("08") || code.starts_with("53") || code.starts_with("57P") {
        return DbError::Connection(message);
    }
    DbError::Query(format!("[{}] {}", code, message))
}

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db) => {
                let code = db.code().map(|c| c.into_owned()).unwrap_or_default();
                classify_sqlstate(&code, db.constraint(), db.message())
            }
            sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed
            | sqlx::Error::Io(_)
            | sqlx::Error::Tls(_) => DbError::Connection(err.to_string()),
            sqlx::Error::ColumnDecode { .. }
            | sqlx::Error::Decode(_)
            | sqlx::Error::ColumnNotFound(_) => DbError::Corrupt(err.to_string()),
            other => DbError::Query(other.to_string()),
        }
    }
}
