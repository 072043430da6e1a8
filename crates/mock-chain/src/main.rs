//! Mock chain server for local testing of the sealed-bid auction system.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use parking_lot::RwLock;
use tracing::info;

use sealbid_mock_chain::spawn;
use sealbid_program::{GenesisConfig, ProgramRuntime};

#[derive(Parser)]
#[command(name = "sealbid-mock-chain")]
#[command(about = "JSON-RPC mock ledger for sealed-bid auctions")]
struct Args {
    /// Listen address
    #[arg(long, default_value = "127.0.0.1:9944")]
    listen: SocketAddr,

    /// Genesis file (JSON). Defaults apply when omitted.
    #[arg(long)]
    genesis: Option<PathBuf>,
}

fn load_genesis(path: Option<&PathBuf>) -> Result<GenesisConfig> {
    match path {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("reading genesis file {}", path.display()))?;
            serde_json::from_str(&raw).with_context(|| format!("parsing genesis file {}", path.display()))
        }
        None => Ok(GenesisConfig::default()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("sealbid_mock_chain=info".parse()?)
                .add_directive("sealbid_program=info".parse()?)
                .add_directive("jsonrpsee=warn".parse()?),
        )
        .init();

    let args = Args::parse();
    let genesis = load_genesis(args.genesis.as_ref())?;
    let runtime = ProgramRuntime::from_genesis(genesis).context("invalid genesis configuration")?;

    info!(
        now = runtime.now(),
        attestor = %hex::encode(runtime.confidential().attestor()),
        "Genesis loaded"
    );

    let (addr, handle) = spawn(args.listen, Arc::new(RwLock::new(runtime))).await?;
    info!("Mock chain server running on {}. Press Ctrl+C to stop.", addr);

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;

    info!("Shutting down...");
    handle.stop()?;
    handle.stopped().await;

    Ok(())
}
