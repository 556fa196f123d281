//! JSON-RPC plumbing for the ledger node.

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, StatusCode, Url};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use thiserror::Error;
use tracing::trace;

/// JSON-RPC error code many providers use for request-rate limits.
const LIMIT_EXCEEDED: i64 = -32005;

#[derive(Debug, Clone, Error)]
pub enum RpcError {
    #[error("rate limited: {0}")]
    RateLimited(String),
    #[error("rpc error {code}: {message}")]
    Rpc {
        code: i64,
        message: String,
        data: Option<Value>,
    },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("malformed rpc response: {0}")]
    Decode(String),
}

impl RpcError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, RpcError::RateLimited(_))
    }

    /// Receipt lookups on some nodes answer "not found" instead of `null`.
    pub fn is_not_found(&self) -> bool {
        match self {
            RpcError::Rpc { message, .. } => message.to_ascii_lowercase().contains("not found"),
            _ => false,
        }
    }

    /// The node executed the call and the contract reverted.
    pub fn is_revert(&self) -> bool {
        match self {
            RpcError::Rpc { code, message, .. } => {
                *code == 3 || message.to_ascii_lowercase().contains("revert")
            }
            _ => false,
        }
    }

    /// A definite rejection from the node, as opposed to an ambiguous transport failure.
    pub fn is_rejection(&self) -> bool {
        matches!(self, RpcError::Rpc { .. })
    }
}

/// Sends one JSON-RPC call and returns its `result`.
#[async_trait]
pub trait RpcTransport: Send + Sync {
    async fn call(&self, method: &str, params: Value) -> Result<Value, RpcError>;
}

#[derive(Debug, Serialize)]
pub struct JsonRpcRequest<'a> {
    pub jsonrpc: &'static str,
    pub method: &'a str,
    pub params: Value,
    pub id: u64,
}

#[derive(Debug, Deserialize)]
pub struct JsonRpcResponse {
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<JsonRpcErrorObject>,
}

#[derive(Debug, Deserialize)]
pub struct JsonRpcErrorObject {
    pub code: i64,
    pub message: String,
    #[serde(default)]
    pub data: Option<Value>,
}

/// HTTP transport backed by a pooled `reqwest` client.
pub struct HttpTransport {
    client: Client,
    url: Url,
    next_id: AtomicU64,
}

impl HttpTransport {
    pub fn new(url: Url, timeout: Duration) -> Result<Self, RpcError> {
        let client = Client::builder()
            .timeout(timeout)
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(|e| RpcError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            url,
            next_id: AtomicU64::new(1),
        })
    }
}

#[async_trait]
impl RpcTransport for HttpTransport {
    async fn call(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = JsonRpcRequest {
            jsonrpc: "2.0",
            method,
            params,
            id,
        };
        let response = self
            .client
            .post(self.url.clone())
            .header(CONTENT_TYPE, "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| RpcError::Transport(e.to_string()))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| RpcError::Transport(e.to_string()))?;
        trace!(method, id, status = status.as_u16(), "rpc response");
        classify_response(status, &text)
    }
}

/// Turns an HTTP status plus body into the call's result or a classified error.
pub fn classify_response(status: StatusCode, body: &str) -> Result<Value, RpcError> {
    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(RpcError::RateLimited(format!("HTTP 429: {}", truncate(body))));
    }
    let parsed: JsonRpcResponse = match serde_json::from_str(body) {
        Ok(parsed) => parsed,
        Err(e) if status.is_success() => return Err(RpcError::Decode(e.to_string())),
        Err(_) => {
            return Err(RpcError::Transport(format!(
                "HTTP {}: {}",
                status.as_u16(),
                truncate(body)
            )))
        }
    };
    if let Some(err) = parsed.error {
        if is_rate_limit(err.code, &err.message) {
            return Err(RpcError::RateLimited(err.message));
        }
        return Err(RpcError::Rpc {
            code: err.code,
            message: err.message,
            data: err.data,
        });
    }
    Ok(parsed.result.unwrap_or(Value::Null))
}

fn is_rate_limit(code: i64, message: &str) -> bool {
    let message = message.to_ascii_lowercase();
    code == LIMIT_EXCEEDED
        || code == 429
        || message.contains("429")
        || message.contains("rate limit")
        || message.contains("too many requests")
}

fn truncate(body: &str) -> &str {
    match body.char_indices().nth(200) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}
