// Responsible for all communication with the notary contract.

use super::contract::{getDocumentContentCall, getDocumentOwnerCall, mintDocumentCall};
use super::nonce::NonceAllocator;
use super::receipt::TransactionReceipt;
use super::retry::RpcRetryPolicy;
use super::rpc::{RpcError, RpcTransport};
use super::Ledger;
use crate::domain::mint::{MintStage, PendingMint};
use crate::infra::config::{ContractSource, LedgerConfig};
use alloy_consensus::{SignableTransaction, TxEnvelope, TxLegacy};
use alloy_network::eip2718::Encodable2718;
use alloy_network::TxSigner;
use alloy_primitives::{hex, Address, Bytes, TxKind, B256, U128, U256, U64};
use alloy_signer_local::PrivateKeySigner;
use alloy_sol_types::{SolCall, SolValue};
use async_trait::async_trait;
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("signed transaction recovers to {recovered}, expected {expected}")]
    SigningMismatch { expected: Address, recovered: Address },
    #[error("signing failed: {0}")]
    Signing(String),
    #[error("could not read account nonce: {0}")]
    Nonce(#[source] RpcError),
    #[error("transaction submission failed: {0}")]
    SubmissionFailed(#[source] RpcError),
    #[error("transaction {tx_hash} not mined after {}ms", .waited.as_millis())]
    MintTimeout { tx_hash: B256, waited: Duration },
    #[error("receipt query for {tx_hash} failed: {source}")]
    MintQueryFailed {
        tx_hash: B256,
        #[source]
        source: RpcError,
    },
    #[error("transaction {tx_hash} mined in block {block_number} without a DocumentMinted event (reverted: {reverted})")]
    MintIncomplete {
        tx_hash: B256,
        block_number: u64,
        reverted: bool,
    },
    #[error("token {token_id} failed verification: {reason}")]
    VerificationFailed { token_id: String, reason: String },
    #[error("ledger unavailable: {0}")]
    ChainUnavailable(#[source] RpcError),
    #[error("'{0}' is not a valid token id")]
    InvalidTokenId(String),
    #[error("contract deployment failed: {0}")]
    DeploymentFailed(String),
}

/// Transaction and confirmation parameters.
#[derive(Debug, Clone, Copy)]
pub struct LedgerSettings {
    pub gas_price: u128,
    pub gas_limit: u64,
    /// Grace period after submission before the first receipt poll.
    pub min_wait: Duration,
    /// Overall confirmation budget, measured from submission.
    pub max_wait: Duration,
    pub poll_interval: Duration,
    pub retry: RpcRetryPolicy,
}

impl LedgerSettings {
    fn from_config(cfg: &LedgerConfig, gas_price: u128) -> Self {
        Self {
            gas_price,
            gas_limit: cfg.gas_limit,
            min_wait: cfg.mint_min_wait,
            max_wait: cfg.mint_max_wait,
            poll_interval: cfg.receipt_poll,
            retry: RpcRetryPolicy::with_attempts(cfg.rpc_retry_attempts),
        }
    }
}

/// Owns the signing key and the account nonce. Shared by reference across
/// callers; concurrent transactions are serialized through the nonce allocator.
pub struct LedgerClient {
    transport: Arc<dyn RpcTransport>,
    signer: PrivateKeySigner,
    account: Address,
    chain_id: u64,
    contract: Address,
    settings: LedgerSettings,
    nonces: NonceAllocator,
}

impl LedgerClient {
    pub fn new(
        transport: Arc<dyn RpcTransport>,
        signer: PrivateKeySigner,
        chain_id: u64,
        contract: Address,
        settings: LedgerSettings,
    ) -> Self {
        let account = signer.address();
        Self {
            transport,
            signer,
            account,
            chain_id,
            contract,
            settings,
            nonces: NonceAllocator::new(),
        }
    }

    /// Sender every signed transaction must recover to.
    pub fn with_account(mut self, account: Address) -> Self {
        self.account = account;
        self
    }

    pub fn attach(mut self, contract: Address) -> Self {
        self.contract = contract;
        self
    }

    /// Resolves the signer, chain id, gas price and contract from configuration,
    /// deploying the contract first when configured with bytecode.
    pub async fn connect(
        cfg: &LedgerConfig,
        transport: Arc<dyn RpcTransport>,
    ) -> Result<Self, LedgerError> {
        let key = cfg
            .signer
            .load()
            .map_err(|e| LedgerError::Signing(format!("{:#}", e)))?;
        let signer = PrivateKeySigner::from_str(&key)
            .map_err(|e| LedgerError::Signing(format!("invalid signer key: {}", e)))?;

        let retry = RpcRetryPolicy::with_attempts(cfg.rpc_retry_attempts);
        let chain_id = match cfg.chain_id {
            Some(id) => id,
            None => {
                let id: U64 = fetch(transport.as_ref(), &retry, "eth_chainId", json!([]))
                    .await
                    .map_err(LedgerError::ChainUnavailable)?;
                id.to::<u64>()
            }
        };
        let gas_price = match cfg.gas_price {
            Some(price) => price,
            None => {
                let price: U128 = fetch(transport.as_ref(), &retry, "eth_gasPrice", json!([]))
                    .await
                    .map_err(LedgerError::ChainUnavailable)?;
                price.to::<u128>()
            }
        };

        let settings = LedgerSettings::from_config(cfg, gas_price);
        let mut client = Self::new(transport, signer, chain_id, Address::ZERO, settings);
        if let Some(account) = cfg.account {
            client = client.with_account(account);
        }

        let contract = match &cfg.contract {
            ContractSource::Attached(address) => *address,
            ContractSource::Deploy(path) => {
                let raw = std::fs::read_to_string(path).map_err(|e| {
                    LedgerError::DeploymentFailed(format!("reading {}: {}", path.display(), e))
                })?;
                let bytecode = hex::decode(raw.trim()).map_err(|e| {
                    LedgerError::DeploymentFailed(format!("{} is not hex bytecode: {}", path.display(), e))
                })?;
                client.deploy_contract(bytecode.into()).await?
            }
        };

        info!(
            account = %client.account,
            chain_id,
            contract = %contract,
            gas_price,
            "ledger client ready"
        );
        Ok(client.attach(contract))
    }

    pub fn account(&self) -> Address {
        self.account
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    pub fn contract(&self) -> Address {
        self.contract
    }

    /// Submits a contract-creation transaction and returns the new contract's address.
    pub async fn deploy_contract(&self, bytecode: Bytes) -> Result<Address, LedgerError> {
        let receipt = self
            .send_and_confirm("contract-deploy", TxKind::Create, bytecode)
            .await?;
        if !receipt.succeeded() {
            return Err(LedgerError::DeploymentFailed(format!(
                "deployment transaction {} reverted",
                receipt.transaction_hash
            )));
        }
        let address = receipt.contract_address.ok_or_else(|| {
            LedgerError::DeploymentFailed(format!(
                "receipt for {} carries no contract address",
                receipt.transaction_hash
            ))
        })?;
        info!(contract = %address, tx_hash = %receipt.transaction_hash, "contract deployed");
        Ok(address)
    }

    /// Mints a token recording `content_fingerprint` and `owner_fingerprint` for
    /// `doc_id`. Returns the token id from the confirmed mint event.
    pub async fn mint(
        &self,
        doc_id: &str,
        content_fingerprint: &str,
        owner_fingerprint: &str,
    ) -> Result<U256, LedgerError> {
        let input = mintDocumentCall {
            docId: doc_id.to_string(),
            docHash: content_fingerprint.to_string(),
            ownerHash: owner_fingerprint.to_string(),
        }
        .abi_encode();

        let receipt = self
            .send_and_confirm(doc_id, TxKind::Call(self.contract), input.into())
            .await?;
        let block_number = receipt.mined_in().unwrap_or_default();

        match receipt
            .to_mint_receipt(self.contract, content_fingerprint)
            .and_then(|r| r.event)
        {
            Some(event) => {
                info!(
                    doc_id,
                    token_id = %event.token_id,
                    tx_hash = %receipt.transaction_hash,
                    block_number,
                    "document minted"
                );
                Ok(event.token_id)
            }
            None => {
                // The chain may hold a mint we cannot see; resubmitting could double-mint.
                error!(
                    doc_id,
                    tx_hash = %receipt.transaction_hash,
                    block_number,
                    reverted = !receipt.succeeded(),
                    "mint mined without a DocumentMinted event"
                );
                Err(LedgerError::MintIncomplete {
                    tx_hash: receipt.transaction_hash,
                    block_number,
                    reverted: !receipt.succeeded(),
                })
            }
        }
    }

    /// Checks both stored fingerprints of `token_id`, read from the same block.
    pub async fn verify(
        &self,
        token_id: &str,
        content_fingerprint: &str,
        owner_fingerprint: &str,
    ) -> Result<(), LedgerError> {
        let token = parse_token_id(token_id)?;
        let block: U64 = self
            .rpc("eth_blockNumber", json!([]))
            .await
            .map_err(LedgerError::ChainUnavailable)?;

        let content_call = getDocumentContentCall { tokenId: token }.abi_encode();
        let owner_call = getDocumentOwnerCall { tokenId: token }.abi_encode();
        let (stored_content, stored_owner) = tokio::try_join!(
            self.read_string(token_id, content_call, block),
            self.read_string(token_id, owner_call, block),
        )?;

        debug!(token_id, block = %block, "read stored fingerprints");
        if stored_content != content_fingerprint {
            return Err(LedgerError::VerificationFailed {
                token_id: token_id.to_string(),
                reason: "content fingerprint differs".to_string(),
            });
        }
        if stored_owner != owner_fingerprint {
            return Err(LedgerError::VerificationFailed {
                token_id: token_id.to_string(),
                reason: "owner fingerprint differs".to_string(),
            });
        }
        Ok(())
    }

    async fn read_string(
        &self,
        token_id: &str,
        calldata: Vec<u8>,
        block: U64,
    ) -> Result<String, LedgerError> {
        let params = json!([
            { "to": self.contract, "data": hex::encode_prefixed(&calldata) },
            block,
        ]);
        let raw: Bytes = self.rpc("eth_call", params).await.map_err(|e| {
            if e.is_revert() {
                LedgerError::VerificationFailed {
                    token_id: token_id.to_string(),
                    reason: format!("read reverted: {}", e),
                }
            } else {
                LedgerError::ChainUnavailable(e)
            }
        })?;
        String::abi_decode(&raw)
            .map_err(|e| LedgerError::ChainUnavailable(RpcError::Decode(e.to_string())))
    }

    /// Allocates a nonce, signs, submits and waits for the receipt. The nonce
    /// lock is released once the node has answered the submission.
    async fn send_and_confirm(
        &self,
        label: &str,
        to: TxKind,
        input: Bytes,
    ) -> Result<TransactionReceipt, LedgerError> {
        let mut nonces = self.nonces.lock().await;
        let pending: U64 = self
            .rpc("eth_getTransactionCount", json!([self.account, "pending"]))
            .await
            .map_err(LedgerError::Nonce)?;
        let nonce = nonces.reserve(pending.to::<u64>());
        debug!(label, nonce, stage = %MintStage::Allocated, "nonce allocated");

        let mut tx = TxLegacy {
            chain_id: Some(self.chain_id),
            nonce,
            gas_price: self.settings.gas_price,
            gas_limit: self.settings.gas_limit,
            to,
            value: U256::ZERO,
            input,
        };
        let signature = self
            .signer
            .sign_transaction(&mut tx)
            .await
            .map_err(|e| LedgerError::Signing(e.to_string()))?;
        let recovered = signature
            .recover_address_from_prehash(&tx.signature_hash())
            .map_err(|e| LedgerError::Signing(e.to_string()))?;
        if recovered != self.account {
            return Err(LedgerError::SigningMismatch {
                expected: self.account,
                recovered,
            });
        }
        let signed = tx.into_signed(signature);
        let tx_hash = *signed.hash();
        let raw = TxEnvelope::from(signed).encoded_2718();
        debug!(label, nonce, tx_hash = %tx_hash, stage = %MintStage::Signed, "transaction signed");

        let submitted: Result<Value, RpcError> = self
            .rpc("eth_sendRawTransaction", json!([hex::encode_prefixed(&raw)]))
            .await;
        match submitted {
            Ok(_) => nonces.confirm(nonce),
            // A rate-limited attempt may have reached the pool before the retry.
            Err(RpcError::Rpc { ref message, .. }) if message.contains("already known") => {
                nonces.confirm(nonce)
            }
            Err(err) => {
                if err.is_rejection() {
                    nonces.reset();
                }
                warn!(label, nonce, tx_hash = %tx_hash, error = %err, "submission failed");
                return Err(LedgerError::SubmissionFailed(err));
            }
        }
        drop(nonces);

        let pending = PendingMint {
            doc_id: label.to_string(),
            nonce,
            tx_hash,
            submitted_at: Utc::now(),
        };
        info!(
            doc_id = %pending.doc_id,
            nonce,
            tx_hash = %tx_hash,
            submitted_at = %pending.submitted_at,
            stage = %MintStage::Submitted,
            "transaction submitted"
        );
        self.wait_until_mined(&pending, Instant::now()).await
    }

    async fn wait_until_mined(
        &self,
        pending: &PendingMint,
        submitted: Instant,
    ) -> Result<TransactionReceipt, LedgerError> {
        let deadline = submitted + self.settings.max_wait;
        let grace = self.settings.min_wait.min(self.settings.max_wait);
        tokio::time::sleep_until(submitted + grace).await;

        let mut polls: u32 = 0;
        loop {
            polls += 1;
            // Backoff inside the poll counts against the same deadline.
            let poll = self.rpc::<Option<TransactionReceipt>>(
                "eth_getTransactionReceipt",
                json!([pending.tx_hash]),
            );
            let queried = match tokio::time::timeout_at(deadline, poll).await {
                Ok(queried) => queried,
                Err(_) => return Err(self.mint_timed_out(pending, submitted, polls)),
            };
            match queried {
                Ok(Some(receipt)) if receipt.mined_in().is_some() => {
                    debug!(
                        tx_hash = %pending.tx_hash,
                        polls,
                        elapsed_ms = submitted.elapsed().as_millis() as u64,
                        stage = %MintStage::Mined,
                        "transaction mined"
                    );
                    return Ok(receipt);
                }
                Ok(_) => {}
                Err(err) if err.is_not_found() => {}
                Err(err) => {
                    return Err(LedgerError::MintQueryFailed {
                        tx_hash: pending.tx_hash,
                        source: err,
                    })
                }
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(self.mint_timed_out(pending, submitted, polls));
            }
            debug!(tx_hash = %pending.tx_hash, polls, stage = %MintStage::Pending, "receipt pending");
            tokio::time::sleep_until((now + self.settings.poll_interval).min(deadline)).await;
        }
    }

    fn mint_timed_out(&self, pending: &PendingMint, submitted: Instant, polls: u32) -> LedgerError {
        let waited = submitted.elapsed();
        warn!(
            tx_hash = %pending.tx_hash,
            nonce = pending.nonce,
            polls,
            elapsed_ms = waited.as_millis() as u64,
            stage = %MintStage::TimedOut,
            "gave up waiting for receipt"
        );
        LedgerError::MintTimeout {
            tx_hash: pending.tx_hash,
            waited,
        }
    }

    async fn rpc<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T, RpcError> {
        fetch(self.transport.as_ref(), &self.settings.retry, method, params).await
    }
}

async fn fetch<T: DeserializeOwned>(
    transport: &dyn RpcTransport,
    retry: &RpcRetryPolicy,
    method: &str,
    params: Value,
) -> Result<T, RpcError> {
    let value = retry
        .run(method, || transport.call(method, params.clone()))
        .await?;
    serde_json::from_value(value).map_err(|e| RpcError::Decode(format!("{}: {}", method, e)))
}

/// Token ids travel as decimal strings.
pub fn parse_token_id(token_id: &str) -> Result<U256, LedgerError> {
    let trimmed = token_id.trim();
    if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return Err(LedgerError::InvalidTokenId(token_id.to_string()));
    }
    U256::from_str_radix(trimmed, 10).map_err(|_| LedgerError::InvalidTokenId(token_id.to_string()))
}

#[async_trait]
impl Ledger for LedgerClient {
    async fn mint(
        &self,
        doc_id: &str,
        content_fingerprint: &str,
        owner_fingerprint: &str,
    ) -> Result<String, LedgerError> {
        LedgerClient::mint(self, doc_id, content_fingerprint, owner_fingerprint)
            .await
            .map(|token| token.to_string())
    }

    async fn verify(
        &self,
        token_id: &str,
        content_fingerprint: &str,
        owner_fingerprint: &str,
    ) -> Result<(), LedgerError> {
        LedgerClient::verify(self, token_id, content_fingerprint, owner_fingerprint).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::ledger::contract::DocumentMinted;
    use crate::infra::ledger::mock::ScriptedTransport;
    use alloy_primitives::address;
    use alloy_sol_types::SolEvent;
    use std::sync::atomic::{AtomicU32, Ordering};

    const CONTRACT: Address = address!("5fbdb2315678afecb367f032d93f642f64180aa3");
    const TEST_KEY: &str = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    fn settings() -> LedgerSettings {
        LedgerSettings {
            gas_price: 1_000_000_000,
            gas_limit: 3_000_000,
            min_wait: Duration::from_millis(10),
            max_wait: Duration::from_millis(100),
            poll_interval: Duration::from_millis(10),
            retry: RpcRetryPolicy {
                max_attempts: 10,
                initial_backoff: Duration::from_millis(1),
                max_backoff: Duration::from_millis(5),
            },
        }
    }

    fn client(transport: Arc<ScriptedTransport>) -> LedgerClient {
        let signer = PrivateKeySigner::from_str(TEST_KEY).unwrap();
        LedgerClient::new(transport, signer, 1337, CONTRACT, settings())
    }

    fn mined_receipt(token: u64, doc_hash: &str) -> Value {
        let ev = DocumentMinted {
            tokenId: U256::from(token),
            docHash: doc_hash.to_string(),
            ownerHash: "o1".to_string(),
        };
        json!({
            "transactionHash": B256::repeat_byte(0x11),
            "blockNumber": "0x2a",
            "status": "0x1",
            "logs": [{
                "address": CONTRACT,
                "topics": [DocumentMinted::SIGNATURE_HASH, B256::from(U256::from(token))],
                "data": Bytes::from(ev.encode_data()),
            }],
        })
    }

    fn base_answer(method: &str) -> Option<Result<Value, RpcError>> {
        match method {
            "eth_getTransactionCount" => Some(Ok(json!("0x0"))),
            "eth_sendRawTransaction" => Some(Ok(json!(B256::repeat_byte(0x11)))),
            "eth_blockNumber" => Some(Ok(json!("0x2a"))),
            _ => None,
        }
    }

    fn encoded_string(s: &str) -> Value {
        json!(hex::encode_prefixed(s.to_string().abi_encode()))
    }

    #[tokio::test(start_paused = true)]
    async fn mint_returns_token_from_event() {
        let transport = Arc::new(ScriptedTransport::new(|method, _| {
            base_answer(method).unwrap_or_else(|| match method {
                "eth_getTransactionReceipt" => Ok(mined_receipt(100, "h1")),
                other => panic!("unexpected call {}", other),
            })
        }));
        let token = client(transport.clone()).mint("d1", "h1", "o1").await.unwrap();
        assert_eq!(token, U256::from(100));
        assert_eq!(transport.count("eth_sendRawTransaction"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn mint_times_out_when_never_mined() {
        let transport = Arc::new(ScriptedTransport::new(|method, _| {
            base_answer(method).unwrap_or_else(|| match method {
                "eth_getTransactionReceipt" => Ok(Value::Null),
                other => panic!("unexpected call {}", other),
            })
        }));
        let start = Instant::now();
        let err = client(transport.clone()).mint("d1", "h1", "o1").await.unwrap_err();
        let elapsed = start.elapsed();

        assert!(matches!(err, LedgerError::MintTimeout { .. }), "{:?}", err);
        assert!(elapsed >= Duration::from_millis(100), "{:?}", elapsed);
        assert!(elapsed <= Duration::from_millis(150), "{:?}", elapsed);
        assert!(transport.count("eth_getTransactionReceipt") >= 5);
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limited_receipt_polls_stop_at_the_deadline() {
        let transport = Arc::new(ScriptedTransport::new(|method, _| {
            base_answer(method).unwrap_or_else(|| match method {
                "eth_getTransactionReceipt" => Err(RpcError::RateLimited("HTTP 429".into())),
                other => panic!("unexpected call {}", other),
            })
        }));
        let mut settings = settings();
        settings.retry = RpcRetryPolicy::with_attempts(10);
        let signer = PrivateKeySigner::from_str(TEST_KEY).unwrap();
        let client = LedgerClient::new(transport.clone(), signer, 1337, CONTRACT, settings);

        let start = Instant::now();
        let err = client.mint("d1", "h1", "o1").await.unwrap_err();
        let elapsed = start.elapsed();

        assert!(matches!(err, LedgerError::MintTimeout { .. }), "{:?}", err);
        assert!(elapsed >= Duration::from_millis(100), "{:?}", elapsed);
        assert!(elapsed <= Duration::from_millis(150), "{:?}", elapsed);
        assert_eq!(transport.count("eth_sendRawTransaction"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn receipt_query_errors_fail_the_mint() {
        let transport = Arc::new(ScriptedTransport::new(|method, _| {
            base_answer(method).unwrap_or_else(|| match method {
                "eth_getTransactionReceipt" => Err(RpcError::Rpc {
                    code: -32603,
                    message: "internal error".into(),
                    data: None,
                }),
                other => panic!("unexpected call {}", other),
            })
        }));
        let err = client(transport.clone()).mint("d1", "h1", "o1").await.unwrap_err();
        assert!(
            matches!(
                err,
                LedgerError::MintQueryFailed {
                    source: RpcError::Rpc { code: -32603, .. },
                    ..
                }
            ),
            "{:?}",
            err
        );
        assert_eq!(transport.count("eth_sendRawTransaction"), 1);
        assert_eq!(transport.count("eth_getTransactionReceipt"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn not_found_receipts_count_as_pending() {
        let polls = AtomicU32::new(0);
        let transport = Arc::new(ScriptedTransport::new(move |method, _| {
            base_answer(method).unwrap_or_else(|| match method {
                "eth_getTransactionReceipt" if polls.fetch_add(1, Ordering::SeqCst) < 2 => {
                    Err(RpcError::Rpc {
                        code: -32000,
                        message: "transaction not found".into(),
                        data: None,
                    })
                }
                "eth_getTransactionReceipt" => Ok(mined_receipt(5, "h1")),
                other => panic!("unexpected call {}", other),
            })
        }));
        let token = client(transport.clone()).mint("d1", "h1", "o1").await.unwrap();
        assert_eq!(token, U256::from(5));
        assert_eq!(transport.count("eth_getTransactionReceipt"), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limited_submissions_are_retried() {
        let sends = AtomicU32::new(0);
        let transport = Arc::new(ScriptedTransport::new(move |method, _| match method {
            "eth_sendRawTransaction" => {
                if sends.fetch_add(1, Ordering::SeqCst) < 3 {
                    Err(RpcError::RateLimited("HTTP 429".into()))
                } else {
                    Ok(json!(B256::repeat_byte(0x11)))
                }
            }
            "eth_getTransactionReceipt" => Ok(mined_receipt(100, "h1")),
            other => base_answer(other).unwrap_or_else(|| panic!("unexpected call {}", other)),
        }));
        let token = client(transport.clone()).mint("d1", "h1", "o1").await.unwrap();
        assert_eq!(token, U256::from(100));
        assert_eq!(transport.count("eth_sendRawTransaction"), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn mined_without_event_is_incomplete() {
        let transport = Arc::new(ScriptedTransport::new(|method, _| {
            base_answer(method).unwrap_or_else(|| match method {
                "eth_getTransactionReceipt" => Ok(json!({
                    "transactionHash": B256::repeat_byte(0x11),
                    "blockNumber": "0x2a",
                    "status": "0x1",
                    "logs": [],
                })),
                other => panic!("unexpected call {}", other),
            })
        }));
        let err = client(transport.clone()).mint("d1", "h1", "o1").await.unwrap_err();
        assert!(matches!(err, LedgerError::MintIncomplete { block_number: 42, .. }), "{:?}", err);
        assert_eq!(transport.count("eth_sendRawTransaction"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn wrong_account_is_a_signing_mismatch_and_sends_nothing() {
        let transport = Arc::new(ScriptedTransport::new(|method, _| {
            base_answer(method).unwrap_or_else(|| panic!("unexpected call {}", method))
        }));
        let other = address!("00000000000000000000000000000000000000aa");
        let err = client(transport.clone())
            .with_account(other)
            .mint("d1", "h1", "o1")
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::SigningMismatch { expected, .. } if expected == other));
        assert_eq!(transport.count("eth_sendRawTransaction"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn node_rejection_clears_the_local_nonce() {
        let transport = Arc::new(ScriptedTransport::new(|method, _| match method {
            "eth_sendRawTransaction" => Err(RpcError::Rpc {
                code: -32000,
                message: "nonce too low".into(),
                data: None,
            }),
            other => base_answer(other).unwrap_or_else(|| panic!("unexpected call {}", other)),
        }));
        let client = client(transport);
        client.nonces.lock().await.confirm(9);
        let err = client.mint("d1", "h1", "o1").await.unwrap_err();
        assert!(matches!(err, LedgerError::SubmissionFailed(_)));
        assert_eq!(client.nonces.lock().await.local(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_mints_use_distinct_nonces() {
        // The node lags and keeps reporting zero pending transactions.
        let transport = Arc::new(ScriptedTransport::new(|method, _| {
            base_answer(method).unwrap_or_else(|| match method {
                "eth_getTransactionReceipt" => Ok(mined_receipt(1, "h1")),
                other => panic!("unexpected call {}", other),
            })
        }));
        let client = Arc::new(client(transport.clone()));
        let (a, b) = tokio::join!(
            client.mint("d1", "h1", "o1"),
            client.mint("d1", "h1", "o1")
        );
        a.unwrap();
        b.unwrap();

        let raws = transport.params_of("eth_sendRawTransaction");
        assert_eq!(raws.len(), 2);
        assert_ne!(raws[0], raws[1]);
        assert_eq!(client.nonces.lock().await.local(), Some(2));
    }

    #[tokio::test]
    async fn verify_accepts_matching_fingerprints() {
        let owner_selector = hex::encode_prefixed(getDocumentOwnerCall::SELECTOR);
        let transport = Arc::new(ScriptedTransport::new(move |method, params| {
            base_answer(method).unwrap_or_else(|| match method {
                "eth_call" => {
                    assert_eq!(params[1], json!("0x2a"));
                    let data = params[0]["data"].as_str().unwrap_or_default();
                    if data.starts_with(&owner_selector) {
                        Ok(encoded_string("B"))
                    } else {
                        Ok(encoded_string("A"))
                    }
                }
                other => panic!("unexpected call {}", other),
            })
        }));
        let client = client(transport.clone());
        client.verify("100", "A", "B").await.unwrap();
        assert_eq!(transport.count("eth_blockNumber"), 1);
        assert_eq!(transport.count("eth_call"), 2);

        let err = client.verify("100", "A", "C").await.unwrap_err();
        assert!(matches!(err, LedgerError::VerificationFailed { .. }), "{:?}", err);
        let err = client.verify("100", "X", "B").await.unwrap_err();
        assert!(matches!(err, LedgerError::VerificationFailed { .. }), "{:?}", err);
    }

    #[tokio::test]
    async fn verify_maps_read_failures() {
        let transport = Arc::new(ScriptedTransport::new(|method, _| {
            base_answer(method).unwrap_or_else(|| match method {
                "eth_call" => Err(RpcError::Transport("connection reset".into())),
                other => panic!("unexpected call {}", other),
            })
        }));
        let err = client(transport).verify("100", "A", "B").await.unwrap_err();
        assert!(matches!(err, LedgerError::ChainUnavailable(_)), "{:?}", err);

        let transport = Arc::new(ScriptedTransport::new(|method, _| {
            base_answer(method).unwrap_or_else(|| match method {
                "eth_call" => Err(RpcError::Rpc {
                    code: 3,
                    message: "execution reverted: unknown token".into(),
                    data: None,
                }),
                other => panic!("unexpected call {}", other),
            })
        }));
        let err = client(transport).verify("100", "A", "B").await.unwrap_err();
        assert!(matches!(err, LedgerError::VerificationFailed { .. }), "{:?}", err);
    }

    #[tokio::test(start_paused = true)]
    async fn deployment_returns_the_created_contract() {
        let deployed = address!("e7f1725e7734ce288f8367e1bb143e90bb3f0512");
        let transport = Arc::new(ScriptedTransport::new(move |method, _| {
            base_answer(method).unwrap_or_else(|| match method {
                "eth_getTransactionReceipt" => Ok(json!({
                    "transactionHash": B256::repeat_byte(0x22),
                    "blockNumber": "0x1",
                    "status": "0x1",
                    "contractAddress": deployed,
                    "logs": [],
                })),
                other => panic!("unexpected call {}", other),
            })
        }));
        let client = client(transport.clone()).attach(Address::ZERO);
        let address = client
            .deploy_contract(Bytes::from_static(&[0x60, 0x80, 0x60, 0x40]))
            .await
            .unwrap();
        assert_eq!(address, deployed);
        assert_eq!(client.attach(address).contract(), deployed);
    }

    #[tokio::test(start_paused = true)]
    async fn deployment_without_contract_address_fails() {
        let transport = Arc::new(ScriptedTransport::new(|method, _| {
            base_answer(method).unwrap_or_else(|| match method {
                "eth_getTransactionReceipt" => Ok(json!({
                    "transactionHash": B256::repeat_byte(0x22),
                    "blockNumber": "0x1",
                    "status": "0x1",
                    "logs": [],
                })),
                other => panic!("unexpected call {}", other),
            })
        }));
        let err = client(transport)
            .deploy_contract(Bytes::from_static(&[0x60, 0x80]))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::DeploymentFailed(_)), "{:?}", err);
    }

    #[test]
    fn token_ids_must_be_decimal() {
        assert_eq!(parse_token_id("100").unwrap(), U256::from(100));
        for bad in ["", "0x64", "-1", "1e3"] {
            assert!(matches!(parse_token_id(bad), Err(LedgerError::InvalidTokenId(_))));
        }
    }
}
