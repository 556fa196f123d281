pub mod app;
pub mod crypto;
pub mod domain;
pub mod infra;
pub mod storage;

// Convenience re-exports (keeps call-sites clean)
pub use app::notary::{NotarizeError, Notary};
pub use app::tx_executor::RetryingTxExecutor;
pub use crypto::hashing::{ContentHasher, Sha256Hasher};
pub use domain::document::{DocumentMetadata, DocumentRecord, Owner, OwnerStatus};
pub use infra::config::AppConfig;
pub use infra::ledger::{Ledger, LedgerClient, LedgerError};
