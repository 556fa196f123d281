//! Serializable transactions with a wall-clock budget and conflict retry.
//!
//! Every attempt opens its own transaction at `SERIALIZABLE`, sets a server-side
//! `statement_timeout` scoped to that transaction, and runs under
//! `tokio::time::timeout`. When the budget expires the attempt future is dropped:
//! the pooled connection goes back with its transaction rolled back and the
//! server-side timeout cancels any statement still executing.

use crate::infra::config::DatabaseConfig;
use crate::storage::error::DbError;
use rand::Rng;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgConnection, PgPool};
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use tracing::{debug, warn};

/// Future returned by a unit of work. It borrows the transaction's connection.
pub type TxFuture<'c, T> = Pin<Box<dyn Future<Output = Result<T, DbError>> + Send + 'c>>;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// Retry `k` sleeps a uniform `1..=5` multiple of this unit.
    pub jitter_unit: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            jitter_unit: Duration::from_millis(30),
        }
    }
}

impl RetryPolicy {
    fn jitter(&self) -> Duration {
        let factor: u32 = rand::thread_rng().gen_range(1..6);
        self.jitter_unit * factor
    }

    /// Drives `attempt` until it succeeds, fails with anything other than a write
    /// conflict, or the attempt budget runs out.
    pub async fn run<T, F, Fut>(&self, op: &str, mut attempt: F) -> Result<T, DbError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, DbError>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut n = 1;
        loop {
            match attempt(n).await {
                Ok(value) => {
                    if n > 1 {
                        debug!(op, attempt = n, "transaction succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(err) if err.is_write_conflict() && n < max_attempts => {
                    let delay = self.jitter();
                    warn!(
                        op,
                        attempt = n,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "write conflict, retrying transaction"
                    );
                    tokio::time::sleep(delay).await;
                    n += 1;
                }
                Err(err) if err.is_write_conflict() => {
                    warn!(op, attempts = n, error = %err, "transaction retries exhausted");
                    return Err(DbError::RetriesExhausted {
                        attempts: n,
                        last: Box::new(err),
                    });
                }
                Err(err) => return Err(err),
            }
        }
    }
}

/// Resolves `fut` or fails with [`DbError::Timeout`] once `limit` elapses. The
/// future is dropped on expiry.
pub async fn with_deadline<T, Fut>(limit: Duration, fut: Fut) -> Result<T, DbError>
where
    Fut: Future<Output = Result<T, DbError>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(DbError::Timeout(limit)),
    }
}

/// Owns the connection pool. Units of work only ever see a connection that is
/// already inside a serializable transaction.
pub struct RetryingTxExecutor {
    pool: PgPool,
    policy: RetryPolicy,
    tx_timeout: Duration,
    statement_timeout: Duration,
}

impl RetryingTxExecutor {
    pub fn new(
        pool: PgPool,
        policy: RetryPolicy,
        tx_timeout: Duration,
        statement_timeout: Duration,
    ) -> Self {
        Self {
            pool,
            policy,
            tx_timeout,
            statement_timeout,
        }
    }

    pub async fn connect(cfg: &DatabaseConfig) -> Result<Self, DbError> {
        let pool = PgPoolOptions::new()
            .max_connections(cfg.max_open_conns)
            .min_connections(cfg.max_idle_conns.min(cfg.max_open_conns))
            .max_lifetime(Some(cfg.conn_max_lifetime))
            .idle_timeout(Some(cfg.idle_timeout))
            .connect(&cfg.url)
            .await?;
        debug!(
            max_connections = cfg.max_open_conns,
            min_connections = cfg.max_idle_conns,
            "database pool ready"
        );
        Ok(Self::new(
            pool,
            RetryPolicy {
                max_attempts: cfg.tx_retry_attempts,
                jitter_unit: cfg.tx_retry_jitter,
            },
            cfg.tx_timeout,
            cfg.statement_timeout,
        ))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// One attempt: begin, run `work`, commit on success, roll back on error.
    pub async fn execute<T, F>(&self, work: &F) -> Result<T, DbError>
    where
        F: for<'c> Fn(&'c mut PgConnection) -> TxFuture<'c, T> + Sync,
        T: Send,
    {
        with_deadline(self.tx_timeout, self.run_in_transaction(work)).await
    }

    /// Repeats [`execute`](Self::execute) while it fails with a write conflict.
    pub async fn execute_with_retry<T, F>(&self, op: &str, work: F) -> Result<T, DbError>
    where
        F: for<'c> Fn(&'c mut PgConnection) -> TxFuture<'c, T> + Sync,
        T: Send,
    {
        let work = &work;
        self.policy.run(op, move |_| self.execute(work)).await
    }

    async fn run_in_transaction<T, F>(&self, work: &F) -> Result<T, DbError>
    where
        F: for<'c> Fn(&'c mut PgConnection) -> TxFuture<'c, T> + Sync,
        T: Send,
    {
        let mut transaction = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE")
            .execute(&mut *transaction)
            .await?;
        // SET does not take bind parameters.
        let set_timeout = format!(
            "SET LOCAL statement_timeout = {}",
            self.statement_timeout.as_millis()
        );
        sqlx::query(&set_timeout).execute(&mut *transaction).await?;

        match work(&mut *transaction).await {
            Ok(value) => {
                transaction.commit().await?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = transaction.rollback().await {
                    warn!(error = %rollback_err, "rollback failed");
                }
                Err(err)
            }
        }
    }
}
