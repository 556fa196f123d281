use alloy_primitives::{U256, U64};
use alloy_signer_local::PrivateKeySigner;
use serde_json::{json, Value};
use std::str::FromStr;
use std::sync::Arc;

use doc_notary::app::tx_executor::RetryingTxExecutor;
use doc_notary::infra::config::{redact_url, AppConfig, ContractSource};
use doc_notary::infra::ledger::{HttpTransport, RpcTransport};
use doc_notary::storage::documents::PgDocumentStore;

fn usage_and_exit() -> ! {
    eprintln!(
        "Usage: cargo run --bin preflight -- [--init-schema]\n\
         \n\
         Requires env vars:\n\
           LEDGER_RPC_URL, LEDGER_SIGNER_KEY (or LEDGER_SIGNER_KEY_FILE),\n\
           LEDGER_CONTRACT_ADDRESS (or LEDGER_CONTRACT_BYTECODE_FILE), DATABASE_URL\n"
    );
    std::process::exit(2);
}

fn quantity(value: Value, what: &str) -> anyhow::Result<U256> {
    serde_json::from_value(value).map_err(|e| anyhow::anyhow!("{} is not a quantity: {}", what, e))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.iter().any(|a| a == "-h" || a == "--help") {
        usage_and_exit();
    }
    let init_schema = args.iter().any(|a| a == "--init-schema");

    let cfg = AppConfig::from_env()?;
    let ledger = &cfg.ledger;

    println!("> Preflight:");
    println!("  LEDGER_RPC_URL={}", ledger.rpc_url);
    match &ledger.contract {
        ContractSource::Attached(address) => println!("  LEDGER_CONTRACT_ADDRESS={}", address),
        ContractSource::Deploy(path) => {
            println!("  LEDGER_CONTRACT_BYTECODE_FILE={}", path.display())
        }
    }
    println!("  LEDGER_GAS_LIMIT={}", ledger.gas_limit);
    println!(
        "  mint wait: min {}ms, max {}ms, poll {}ms",
        ledger.mint_min_wait.as_millis(),
        ledger.mint_max_wait.as_millis(),
        ledger.receipt_poll.as_millis()
    );
    println!("  DATABASE_URL={}", redact_url(&cfg.database.url));
    println!("  BLOB_STORE_DIR={}", cfg.blob.dir.display());

    let key = ledger.signer.load()?;
    let signer = PrivateKeySigner::from_str(&key)
        .map_err(|e| anyhow::anyhow!("signer key is invalid: {}", e))?;
    let account = ledger.account.unwrap_or_else(|| signer.address());
    println!("  Signer: {}", signer.address());
    if account != signer.address() {
        return Err(anyhow::anyhow!(
            "LEDGER_ACCOUNT {} does not match the signer key address {}",
            account,
            signer.address()
        ));
    }

    // Basic RPC connectivity
    let transport = HttpTransport::new(ledger.rpc_url.clone(), ledger.rpc_timeout)?;
    let chain_id: U64 = serde_json::from_value(transport.call("eth_chainId", json!([])).await?)?;
    println!("  Chain id: {}", chain_id);
    if let Some(expected) = ledger.chain_id {
        if chain_id.to::<u64>() != expected {
            return Err(anyhow::anyhow!(
                "LEDGER_CHAIN_ID={} but the node reports {}",
                expected,
                chain_id
            ));
        }
    }

    // Signer balance and nonce
    let balance = quantity(
        transport
            .call("eth_getBalance", json!([account, "latest"]))
            .await?,
        "balance",
    )?;
    println!("  Signer balance: {} wei", balance);
    if balance.is_zero() {
        eprintln!("  Warning: signer has no funds; mint transactions will fail.");
    }
    let nonce = quantity(
        transport
            .call("eth_getTransactionCount", json!([account, "pending"]))
            .await?,
        "nonce",
    )?;
    println!("  Pending nonce: {}", nonce);

    // Contract code
    if let ContractSource::Attached(address) = &ledger.contract {
        let code: String = serde_json::from_value(
            transport
                .call("eth_getCode", json!([address, "latest"]))
                .await?,
        )?;
        if code == "0x" || code.is_empty() {
            return Err(anyhow::anyhow!("no contract code at {}", address));
        }
        println!("  Contract deployed ({} bytes of code).", code.len().saturating_sub(2) / 2);
    }

    // Database connectivity
    let executor = Arc::new(RetryingTxExecutor::connect(&cfg.database).await?);
    let one: i32 = sqlx::query_scalar("SELECT 1")
        .fetch_one(executor.pool())
        .await?;
    println!("  Database reachable (SELECT 1 -> {}).", one);

    if init_schema {
        PgDocumentStore::new(executor.clone()).ensure_schema().await?;
        println!("  Schema ensured (users, documents).");
    }

    println!("> Preflight OK.");
    Ok(())
}
