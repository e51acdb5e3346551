mod rpc;

use clap::Parser;
use helium_core::{Engine, HttpPropagator, LoggingPropagator, Propagator};
use shared::NodeConfig;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "helium-node")]
#[command(about = "Helium node: a minimal proof-of-work UTXO cryptocurrency")]
#[command(version)]
struct Cli {
    /// Root directory holding the chainstate store, block index store, and block files
    #[arg(long, default_value = "./data")]
    data_dir: String,

    /// Address the JSON-RPC dispatch surface binds to
    #[arg(long, default_value = "127.0.0.1")]
    rpc_bind_address: String,

    /// Port the JSON-RPC dispatch surface binds to
    #[arg(long, default_value_t = 8332)]
    rpc_port: u16,

    /// Known peer addresses (`ip:port`), comma-separated
    #[arg(long, value_delimiter = ',')]
    bootstrap_peers: Vec<String>,

    /// Disable the background mining loop
    #[arg(long)]
    no_mine: bool,

    /// Propagate transactions and blocks to peers over HTTP instead of
    /// only logging the fan-out
    #[arg(long)]
    propagate: bool,
}

#[tokio::main]
async fn main() -> shared::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let node_config = NodeConfig {
        data_dir: cli.data_dir,
        rpc_bind_address: cli.rpc_bind_address,
        rpc_port: cli.rpc_port,
        bootstrap_peers: cli.bootstrap_peers,
    };

    let propagator: Box<dyn Propagator> = if cli.propagate {
        Box::new(HttpPropagator::new())
    } else {
        Box::new(LoggingPropagator)
    };

    let engine = Arc::new(Engine::open(&node_config, propagator)?);
    info!(data_dir = %node_config.data_dir, "chainstate and block index opened");

    if !cli.no_mine {
        spawn_mining_loop(Arc::clone(&engine));
    }

    let addr = format!("{}:{}", node_config.rpc_bind_address, node_config.rpc_port);
    let handle = rpc::start_server(&addr, Arc::clone(&engine)).await?;
    info!(%addr, "listening for JSON-RPC requests");

    tokio::signal::ctrl_c().await.ok();
    info!("shutting down");
    let _ = handle.stop();

    Ok(())
}

/// Runs the mining loop on a dedicated OS thread: assembles a candidate
/// from the mempool (crediting a fresh miner keypair each round) and
/// searches for a solving nonce, sleeping briefly whenever there is
/// nothing to mine.
fn spawn_mining_loop(engine: Arc<Engine>) {
    std::thread::spawn(move || loop {
        let now = chrono::Utc::now().timestamp();
        match engine.mine_once(now) {
            Ok(Some(block)) => info!(height = block.height(), "mined block"),
            Ok(None) => std::thread::sleep(std::time::Duration::from_secs(1)),
            Err(err) => {
                warn!(error = %err, "mining attempt failed");
                std::thread::sleep(std::time::Duration::from_secs(1));
            }
        }
    });
}
