//! In-flight and confirmed mint state.

use alloy_primitives::{B256, U256};
use chrono::{DateTime, Utc};
use std::fmt;

/// Lifecycle stages of a single mint, used as a structured log field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MintStage {
    Allocated,
    Signed,
    Submitted,
    RateLimited,
    Pending,
    Mined,
    TimedOut,
}

impl fmt::Display for MintStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MintStage::Allocated => "allocated",
            MintStage::Signed => "signed",
            MintStage::Submitted => "submitted",
            MintStage::RateLimited => "rate_limited",
            MintStage::Pending => "pending",
            MintStage::Mined => "mined",
            MintStage::TimedOut => "timed_out",
        };
        f.write_str(s)
    }
}

/// State held while one mint transaction is in flight. Dropped when the mint
/// call returns.
#[derive(Debug, Clone)]
pub struct PendingMint {
    pub doc_id: String,
    pub nonce: u64,
    pub tx_hash: B256,
    pub submitted_at: DateTime<Utc>,
}

/// Payload of the contract's mint-completion event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MintedEvent {
    pub token_id: U256,
    pub doc_hash: String,
    pub owner_hash: String,
}

/// Ledger-confirmed outcome of a mint transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MintReceipt {
    pub tx_hash: B256,
    pub block_number: u64,
    /// `None` means the transaction was mined but emitted no recognizable event.
    pub event: Option<MintedEvent>,
}
