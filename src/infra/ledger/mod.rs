//! Ledger access: signing, submission, confirmation and read-back of notary mints.

pub mod client;
pub mod contract;
pub mod nonce;
pub mod receipt;
pub mod retry;
pub mod rpc;

#[cfg(test)]
mod mock;

use async_trait::async_trait;

pub use client::{LedgerClient, LedgerError, LedgerSettings};
pub use rpc::{HttpTransport, RpcError, RpcTransport};

/// What the orchestrator needs from the ledger. Token ids are decimal strings.
#[async_trait]
pub trait Ledger: Send + Sync {
    async fn mint(
        &self,
        doc_id: &str,
        content_fingerprint: &str,
        owner_fingerprint: &str,
    ) -> Result<String, LedgerError>;

    async fn verify(
        &self,
        token_id: &str,
        content_fingerprint: &str,
        owner_fingerprint: &str,
    ) -> Result<(), LedgerError>;
}
