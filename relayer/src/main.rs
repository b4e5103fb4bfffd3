use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context};
use clap::Parser;
use solana_sdk::signature::read_keypair_file;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::EnvFilter;

use fairqueue_relayer::config::{parse_pubkey, RelayerConfig};
use fairqueue_relayer::engine::{EngineConfig, ExecutionEngine};
use fairqueue_relayer::ledger::{RpcLedger, SequencerLedger};
use fairqueue_relayer::server::{self, AppState};
use fairqueue_relayer::status::StatusStore;

#[derive(Parser)]
#[command(name = "fairqueue-relayer", about = "FIFO execution relayer")]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, default_value = "relayer.toml")]
    config: PathBuf,

    /// Override the configured RPC endpoint.
    #[arg(long)]
    rpc_url: Option<String>,

    /// Override the configured HTTP bind address.
    #[arg(long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let mut cfg = RelayerConfig::load(&cli.config)
        .with_context(|| format!("loading config from {}", cli.config.display()))?;
    if let Some(rpc_url) = cli.rpc_url {
        cfg.rpc_url = rpc_url;
    }
    if let Some(bind) = cli.bind {
        cfg.http_bind = bind;
    }

    let keypair = Arc::new(
        read_keypair_file(&cfg.keypair_path)
            .map_err(|e| anyhow!("reading keypair {}: {e}", cfg.keypair_path.display()))?,
    );
    let program_id = parse_pubkey(&cfg.program_id, "program_id")?;

    let ledger: Arc<dyn SequencerLedger> = Arc::new(RpcLedger::new(&cfg, keypair)?);
    let store = Arc::new(StatusStore::new());
    let cfg = Arc::new(cfg);

    info!(
        identity = %ledger.identity(),
        rpc = %cfg.rpc_url,
        pools = cfg.pools.len(),
        "relayer starting"
    );

    let engine = ExecutionEngine::new(
        ledger.clone(),
        store.clone(),
        EngineConfig::from_relayer_config(&cfg),
    );
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let engine_task = tokio::spawn(async move { engine.run(shutdown_rx).await });

    let state = AppState {
        store,
        ledger,
        cfg: cfg.clone(),
        program_id,
    };

    tokio::select! {
        result = server::serve(state, cfg.http_bind.clone()) => result?,
        _ = tokio::signal::ctrl_c() => info!("shutdown signal received"),
    }

    let _ = shutdown_tx.send(true);
    let _ = engine_task.await;
    Ok(())
}
