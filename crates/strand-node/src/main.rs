//! strand-node, the Strand full-node binary.
//!
//! Startup sequence:
//!   1. Open (or initialise) the sled database and its stores
//!   2. Connect the ledger sidecar client
//!   3. Start the Observer loop (ledger → operation store)
//!   4. Start the Batch Writer loop (queue → content store → ledger)
//!   5. Start the JSON-RPC 2.0 server (resolve / submit / status)

mod ledger_client;

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::info;

use strand_batch::{BatchWriter, BatchWriterConfig};
use strand_core::ProtocolVersioning;
use strand_observer::{DownloadManager, Observer, TransactionProcessor};
use strand_resolver::Resolver;
use strand_rpc::{RpcServer, RpcServerState};
use strand_store::{
    SledContentStore, SledOperationQueue, SledOperationStore, SledTransactionStore,
};

use crate::ledger_client::HttpLedgerClient;

#[derive(Parser, Debug)]
#[command(
    name = "strand-node",
    version,
    about = "Strand node — a Sidetree-protocol DID network node"
)]
struct Args {
    /// Directory for the persistent databases.
    #[arg(long, default_value = "~/.strand/data")]
    data_dir: PathBuf,

    /// JSON-RPC listen address.
    #[arg(long, default_value = "127.0.0.1:3000")]
    rpc_addr: SocketAddr,

    /// Base URL of the ledger sidecar.
    #[arg(long, default_value = "http://127.0.0.1:3009")]
    ledger_url: String,

    /// Observer polling interval in seconds.
    #[arg(long, default_value_t = 60)]
    polling_interval_secs: u64,

    /// Batch writer tick interval in seconds.
    #[arg(long, default_value_t = 600)]
    batch_interval_secs: u64,

    /// Retries before an unresolvable transaction is abandoned.
    #[arg(long, default_value_t = 8)]
    max_retry_attempts: u32,

    /// Base back-off unit for unresolvable retries, in seconds.
    #[arg(long, default_value_t = 60)]
    retry_base_secs: i64,

    /// This writer's value-time-lock identifier, if it holds one.
    #[arg(long)]
    writer_lock_id: Option<String>,

    /// Per-operation anchoring fee floor when no lock supplies one.
    #[arg(long, default_value_t = 1)]
    base_fee: u64,

    /// Per-call timeout for ledger requests, in seconds.
    #[arg(long, default_value_t = 30)]
    ledger_timeout_secs: u64,

    /// Path to a protocol-parameter generation table JSON (defaults built in).
    #[arg(long)]
    protocol_versions: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,strand=debug".parse().unwrap()),
        )
        .init();

    let args = Args::parse();
    info!("Strand node starting");

    // ── Databases ─────────────────────────────────────────────────────────────
    let data_dir = expand_tilde(&args.data_dir);
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("creating data dir {}", data_dir.display()))?;
    let db = sled::open(&data_dir).context("opening database")?;

    let operation_store = Arc::new(SledOperationStore::open(&db)?);
    let transaction_store = Arc::new(SledTransactionStore::open(&db, args.retry_base_secs)?);
    let content_store = Arc::new(SledContentStore::open(&db)?);
    let queue = Arc::new(SledOperationQueue::open(&db)?);

    // ── Protocol parameters ───────────────────────────────────────────────────
    let versioning = Arc::new(load_protocol_versions(args.protocol_versions.as_deref())?);

    // ── Ledger sidecar ────────────────────────────────────────────────────────
    let ledger = Arc::new(HttpLedgerClient::new(
        &args.ledger_url,
        Duration::from_secs(args.ledger_timeout_secs),
    )?);
    info!(url = %args.ledger_url, "ledger sidecar configured");

    // ── Observer ──────────────────────────────────────────────────────────────
    let max_concurrent = versioning.parameters_at(u64::MAX).max_concurrent_downloads;
    let downloads = Arc::new(DownloadManager::new(content_store.clone(), max_concurrent));
    let processor = TransactionProcessor::new(
        downloads,
        operation_store.clone(),
        ledger.clone(),
        versioning.clone(),
    );
    let observer = Observer::new(
        ledger.clone(),
        transaction_store.clone(),
        operation_store.clone(),
        processor,
        Duration::from_secs(args.polling_interval_secs),
        args.max_retry_attempts,
    );
    let observer_stop = observer.stop_handle();
    tokio::spawn(observer.run());

    // ── Batch writer ──────────────────────────────────────────────────────────
    let batch_writer = BatchWriter::new(
        queue.clone(),
        content_store.clone(),
        ledger.clone(),
        versioning.clone(),
        BatchWriterConfig {
            batch_interval: Duration::from_secs(args.batch_interval_secs),
            writer_lock_id: args.writer_lock_id.clone(),
            base_fee_per_operation: args.base_fee,
        },
    );
    let batch_stop = batch_writer.stop_handle();
    tokio::spawn(batch_writer.run());

    // ── RPC server ────────────────────────────────────────────────────────────
    let resolver = Arc::new(Resolver::new(operation_store.clone(), versioning.clone()));
    let rpc_state = Arc::new(RpcServerState {
        resolver,
        queue,
        transaction_store,
        versioning,
    });
    let rpc_handle = RpcServer::new(rpc_state)
        .start(args.rpc_addr)
        .await
        .context("starting RPC server")?;

    info!("node ready");
    tokio::signal::ctrl_c().await.context("waiting for shutdown signal")?;

    // ── Shutdown: loops finish in-flight work, no new work is scheduled. ─────
    info!("shutting down");
    observer_stop.store(false, Ordering::SeqCst);
    batch_stop.store(false, Ordering::SeqCst);
    let _ = rpc_handle.stop();
    db.flush().context("flushing database")?;
    Ok(())
}

/// Load a generation table from JSON, or fall back to the built-in single
/// generation starting at time 0.
fn load_protocol_versions(path: Option<&Path>) -> anyhow::Result<ProtocolVersioning> {
    match path {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("reading protocol versions from {}", path.display()))?;
            let versions: Vec<strand_core::params::ProtocolVersion> =
                serde_json::from_str(&json).context("parsing protocol versions JSON")?;
            Ok(ProtocolVersioning::new(versions)?)
        }
        None => Ok(ProtocolVersioning::default()),
    }
}

/// Expand a leading `~` to the user's home directory (`HOME` or `USERPROFILE`).
fn expand_tilde(path: &Path) -> PathBuf {
    if let Ok(stripped) = path.strip_prefix("~") {
        if let Ok(home) = std::env::var("HOME").or_else(|_| std::env::var("USERPROFILE")) {
            return PathBuf::from(home).join(stripped);
        }
    }
    path.to_path_buf()
}
