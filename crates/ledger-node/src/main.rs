use anyhow::Context;
use clap::Parser;
use ledger_core::chain::load_or_genesis;
use ledger_node::{constants::*, http, load_peers, Ledger, NodeConfig, NodeServer, TransportConfig};
use ledger_storage::SledStore;
use std::{net::SocketAddr, path::PathBuf, sync::Arc, time::Duration};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "ledger-node", about = "Single-chain ledger node with peer sync")]
struct Args {
    /// Interface to accept peer connections on
    #[arg(long, default_value = DEFAULT_HOST)]
    host: String,

    /// Port to listen on; also the port assumed for peers that do not name one
    #[arg(long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// File listing peer hosts, one per line
    #[arg(long, default_value = DEFAULT_PEERS_FILE)]
    peers_file: PathBuf,

    /// Data directory for sled
    #[arg(long, default_value = DEFAULT_DATA_DIR)]
    data_dir: PathBuf,

    /// Leading zero characters required in an inbound block hash
    #[arg(long, default_value_t = ledger_core::constants::DEFAULT_DIFFICULTY)]
    difficulty: u32,

    /// Timeout for connecting to and writing to peers
    #[arg(long, default_value_t = DEFAULT_PEER_TIMEOUT_SECS)]
    peer_timeout_secs: u64,

    /// Upper bound on reading a peer's chain response
    #[arg(long, default_value_t = DEFAULT_CHAIN_READ_TIMEOUT_SECS)]
    chain_read_timeout_secs: u64,

    /// Maximum inbound connections handled at once
    #[arg(long, default_value_t = DEFAULT_MAX_CONNECTIONS)]
    max_connections: usize,

    /// Maximum size of an inbound request
    #[arg(long, default_value_t = DEFAULT_MAX_MESSAGE_BYTES)]
    max_message_bytes: usize,

    /// Maximum size of a peer's chain response
    #[arg(long, default_value_t = DEFAULT_MAX_CHAIN_BYTES)]
    max_chain_bytes: usize,

    /// Serve the read-only status API on this address, e.g. 127.0.0.1:8080
    #[arg(long)]
    http_listen: Option<SocketAddr>,
}

impl Args {
    fn node_config(&self) -> NodeConfig {
        NodeConfig {
            host: self.host.clone(),
            port: self.port,
            difficulty: self.difficulty,
            max_connections: self.max_connections,
            max_message_bytes: self.max_message_bytes,
            transport: TransportConfig {
                port: self.port,
                timeout: Duration::from_secs(self.peer_timeout_secs),
                chain_read_timeout: Duration::from_secs(self.chain_read_timeout_secs),
                max_chain_bytes: self.max_chain_bytes,
            },
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let store = Arc::new(SledStore::open(&args.data_dir)?);
    let chain = load_or_genesis(store.as_ref()).context("loading chain")?;
    let ledger = Arc::new(Ledger::new(chain, store));
    let peers = load_peers(&args.peers_file);

    let server = Arc::new(NodeServer::new(args.node_config(), ledger.clone(), peers));
    let listener = server
        .bind()
        .await
        .with_context(|| format!("binding {}:{}", args.host, args.port))?;

    if let Some(addr) = args.http_listen {
        let listener = http::bind(addr)
            .await
            .with_context(|| format!("binding status api on {addr}"))?;
        tokio::spawn(async move {
            if let Err(err) = http::serve(listener, ledger).await {
                error!(%err, "status api stopped");
            }
        });
    }

    tokio::select! {
        _ = server.serve(listener) => {}
        res = tokio::signal::ctrl_c() => {
            res?;
            info!("shutting down");
        }
    }
    Ok(())
}
