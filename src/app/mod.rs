pub mod notary;
pub mod tx_executor;

pub use notary::{NotarizeError, Notary};
pub use tx_executor::{RetryPolicy, RetryingTxExecutor, TxFuture};
