//! Backoff for rate-limited RPC calls.
//!
//! Delay before retry `n` (0-based) is `initial_backoff * 2^n`, capped at
//! `max_backoff`, plus 0-50% random jitter. Only [`RpcError::RateLimited`] is
//! retried; everything else surfaces on first occurrence.

use super::rpc::RpcError;
use crate::domain::mint::MintStage;
use rand::Rng;
use std::future::Future;
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub struct RpcRetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RpcRetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(5),
        }
    }
}

impl RpcRetryPolicy {
    pub fn with_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            ..Self::default()
        }
    }

    pub fn backoff(&self, retry: u32) -> Duration {
        let base = self
            .initial_backoff
            .saturating_mul(1u32.checked_shl(retry).unwrap_or(u32::MAX));
        let capped = base.min(self.max_backoff);
        let jitter_range = capped.as_millis() as u64 / 2;
        if jitter_range > 0 {
            let jitter = rand::thread_rng().gen_range(0..=jitter_range);
            capped + Duration::from_millis(jitter)
        } else {
            capped
        }
    }

    pub async fn run<T, F, Fut>(&self, method: &str, mut call: F) -> Result<T, RpcError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, RpcError>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match call().await {
                Err(err) if err.is_rate_limited() && attempt < max_attempts => {
                    let delay = self.backoff(attempt - 1);
                    tracing::debug!(
                        method,
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        stage = %MintStage::RateLimited,
                        "rate limited, retrying after backoff"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) if err.is_rate_limited() => {
                    tracing::warn!(method, attempts = attempt, "rate limit retries exhausted");
                    return Err(err);
                }
                other => return other,
            }
        }
    }
}
