use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use ledger_core::{cumulative_difficulty, mine::mine_block_parallel, Transaction};
use ledger_node::{PeerAddress, PeerTransport, TransportConfig};
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "ledger-cli")]
#[command(about = "CLI client for the minimal ledger node")]
struct Cli {
    #[command(flatten)]
    conn: Connection,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Args, Debug)]
struct Connection {
    /// Port for nodes given without one
    #[arg(long, global = true, default_value_t = ledger_node::constants::DEFAULT_PORT)]
    port: u16,

    /// Connect/write timeout in seconds
    #[arg(long, global = true, default_value_t = ledger_node::constants::DEFAULT_PEER_TIMEOUT_SECS)]
    timeout_secs: u64,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Send a transaction to one or more nodes
    SubmitTx {
        /// Node address (host or host:port); repeat to broadcast
        #[arg(long = "node", required = true)]
        nodes: Vec<String>,
        /// Transaction payload as JSON
        #[arg(long)]
        json: String,
    },
    /// Fetch and print a node's chain
    GetChain {
        /// Node address (host or host:port)
        #[arg(long)]
        node: String,
    },
    /// Mine a block on top of the first node's chain and broadcast it
    Mine {
        /// Node address (host or host:port); repeat to broadcast
        #[arg(long = "node", required = true)]
        nodes: Vec<String>,
        /// Leading zero characters required in the block hash
        #[arg(long, default_value_t = ledger_core::constants::DEFAULT_DIFFICULTY)]
        difficulty: u32,
        /// Transaction payloads as JSON; may repeat
        #[arg(long = "tx-json")]
        txs: Vec<String>,
    },
}

fn parse_tx(raw: &str) -> Result<Transaction> {
    let payload: serde_json::Value =
        serde_json::from_str(raw).with_context(|| format!("invalid transaction JSON: {raw}"))?;
    Ok(Transaction::new(payload))
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let transport = PeerTransport::new(TransportConfig {
        port: cli.conn.port,
        timeout: Duration::from_secs(cli.conn.timeout_secs),
        ..TransportConfig::default()
    });

    match cli.cmd {
        Command::SubmitTx { nodes, json } => {
            let tx = parse_tx(&json)?;
            let peers: Vec<PeerAddress> = nodes.into_iter().map(PeerAddress::new).collect();
            let delivered = transport.broadcast_transaction(&peers, &tx).await;
            println!("delivered to {delivered}/{} nodes", peers.len());
        }
        Command::GetChain { node } => {
            let peer = PeerAddress::new(node);
            let chain = transport
                .fetch_chain(&peer)
                .await
                .with_context(|| format!("fetching chain from {peer}"))?;
            println!("{}", serde_json::to_string_pretty(&chain)?);
            println!(
                "blocks: {}, cumulative difficulty: {}",
                chain.len(),
                cumulative_difficulty(&chain)
            );
        }
        Command::Mine {
            nodes,
            difficulty,
            txs,
        } => {
            let txs = txs.iter().map(|raw| parse_tx(raw)).collect::<Result<Vec<_>>>()?;
            let peers: Vec<PeerAddress> = nodes.into_iter().map(PeerAddress::new).collect();
            let chain = transport
                .fetch_chain(&peers[0])
                .await
                .with_context(|| format!("fetching chain from {}", peers[0]))?;
            let Some(tip) = chain.last() else {
                bail!("{} returned an empty chain", peers[0]);
            };
            info!(height = tip.index, difficulty, "mining next block");
            let block = mine_block_parallel(tip, txs, difficulty);
            let delivered = transport.broadcast_block(&peers, &block).await;
            println!("mined block {} ({})", block.index, block.hash);
            println!("delivered to {delivered}/{} nodes", peers.len());
        }
    }
    Ok(())
}
