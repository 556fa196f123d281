use anyhow::Context;
use bytes::Bytes;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use doc_notary::app::notary::Notary;
use doc_notary::app::tx_executor::RetryingTxExecutor;
use doc_notary::crypto::hashing::Sha256Hasher;
use doc_notary::domain::document::DocumentMetadata;
use doc_notary::infra::config::AppConfig;
use doc_notary::infra::ledger::{HttpTransport, LedgerClient};
use doc_notary::infra::logging;
use doc_notary::storage::blob::FsBlobStore;
use doc_notary::storage::documents::PgDocumentStore;

#[derive(Debug, Parser)]
#[command(name = "doc-notary", about = "Notarize documents on a ledger and verify them later")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Store a document, mint its fingerprint and record its metadata.
    Submit {
        #[arg(long)]
        file: PathBuf,
        #[arg(long)]
        email: String,
        #[arg(long)]
        first_name: String,
        #[arg(long)]
        last_name: String,
        #[arg(long)]
        title: String,
        #[arg(long)]
        description: Option<String>,
        /// Display name; defaults to the file's own name.
        #[arg(long)]
        file_name: Option<String>,
    },
    /// Check a document and owner email against a minted token.
    Verify {
        #[arg(long)]
        token_id: String,
        #[arg(long)]
        file: PathBuf,
        #[arg(long)]
        email: String,
    },
    /// Write stored document content to a file.
    Fetch {
        #[arg(long)]
        doc_id: String,
        #[arg(long)]
        out: PathBuf,
    },
}

async fn build_notary(cfg: &AppConfig) -> anyhow::Result<Notary> {
    let transport = Arc::new(HttpTransport::new(
        cfg.ledger.rpc_url.clone(),
        cfg.ledger.rpc_timeout,
    )?);
    let ledger = LedgerClient::connect(&cfg.ledger, transport)
        .await
        .context("ledger setup failed")?;
    let executor = RetryingTxExecutor::connect(&cfg.database)
        .await
        .context("database setup failed")?;
    let store = PgDocumentStore::new(Arc::new(executor));
    let blobs = FsBlobStore::open(&cfg.blob.dir)
        .await
        .with_context(|| format!("cannot open blob store at {}", cfg.blob.dir.display()))?;

    Ok(Notary::new(
        Arc::new(Sha256Hasher),
        Arc::new(blobs),
        Arc::new(ledger),
        Arc::new(store),
    ))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = AppConfig::from_env()?;
    logging::init(&cfg.log)?;
    tracing::debug!(?cfg, "configuration loaded");

    let notary = build_notary(&cfg).await?;

    match cli.command {
        Command::Submit {
            file,
            email,
            first_name,
            last_name,
            title,
            description,
            file_name,
        } => {
            let content = tokio::fs::read(&file)
                .await
                .with_context(|| format!("cannot read {}", file.display()))?;
            let file_name = file_name
                .or_else(|| file.file_name().map(|n| n.to_string_lossy().into_owned()))
                .unwrap_or_default();
            let metadata = DocumentMetadata {
                owner_email: email,
                owner_first_name: first_name,
                owner_last_name: last_name,
                title,
                description,
                file_name,
            };
            let record = notary.submit(Bytes::from(content), metadata).await?;
            println!("{}", serde_json::to_string_pretty(&record)?);
        }
        Command::Verify {
            token_id,
            file,
            email,
        } => {
            let content = tokio::fs::read(&file)
                .await
                .with_context(|| format!("cannot read {}", file.display()))?;
            let verified = notary.verify(&token_id, &content, &email).await?;
            println!("verified: {}", verified);
            if !verified {
                std::process::exit(1);
            }
        }
        Command::Fetch { doc_id, out } => {
            let content = notary.fetch(&doc_id).await?;
            tokio::fs::write(&out, &content)
                .await
                .with_context(|| format!("cannot write {}", out.display()))?;
            println!("wrote {} bytes to {}", content.len(), out.display());
        }
    }
    Ok(())
}
