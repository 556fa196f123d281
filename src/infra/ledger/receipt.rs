use super::contract::DocumentMinted;
use crate::domain::mint::{MintReceipt, MintedEvent};
use alloy_primitives::{Address, Bytes, B256, U64};
use alloy_sol_types::SolEvent;
use serde::Deserialize;

/// The subset of `eth_getTransactionReceipt` the client reads.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionReceipt {
    pub transaction_hash: B256,
    #[serde(default)]
    pub block_number: Option<U64>,
    #[serde(default)]
    pub status: Option<U64>,
    #[serde(default)]
    pub contract_address: Option<Address>,
    #[serde(default)]
    pub logs: Vec<ReceiptLog>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReceiptLog {
    pub address: Address,
    #[serde(default)]
    pub topics: Vec<B256>,
    #[serde(default)]
    pub data: Bytes,
}

impl TransactionReceipt {
    /// Block that included the transaction, once it has one.
    pub fn mined_in(&self) -> Option<u64> {
        self.block_number.map(|b| b.to::<u64>()).filter(|b| *b > 0)
    }

    pub fn succeeded(&self) -> bool {
        self.status.map(|s| s == U64::from(1)).unwrap_or(true)
    }

    /// Looks for a `DocumentMinted` event emitted by `contract` for `doc_hash`.
    pub fn minted_event(&self, contract: Address, doc_hash: &str) -> Option<MintedEvent> {
        self.logs
            .iter()
            .filter(|log| log.address == contract)
            .filter(|log| log.topics.first() == Some(&DocumentMinted::SIGNATURE_HASH))
            .filter_map(|log| DocumentMinted::decode_raw_log(log.topics.iter().copied(), &log.data).ok())
            .find(|ev| ev.docHash == doc_hash)
            .map(|ev| MintedEvent {
                token_id: ev.tokenId,
                doc_hash: ev.docHash,
                owner_hash: ev.ownerHash,
            })
    }

    pub fn to_mint_receipt(&self, contract: Address, doc_hash: &str) -> Option<MintReceipt> {
        let block_number = self.mined_in()?;
        Some(MintReceipt {
            tx_hash: self.transaction_hash,
            block_number,
            event: self.minted_event(contract, doc_hash),
        })
    }
}
