#![allow(dead_code)]

use std::{future::Future, net::SocketAddr, sync::Arc, time::Duration};

use ledger_core::{chain::genesis_block, pow::mine_block, Block, Transaction};
use ledger_node::{Ledger, NodeConfig, NodeServer, PeerAddress, PeerTransport, TransportConfig};
use ledger_storage::MemoryStore;
use serde_json::json;
use tokio::{
    io::AsyncWriteExt,
    net::TcpListener,
    task::JoinHandle,
    time::{sleep, Instant},
};

pub const DIFFICULTY: u32 = 1;

pub fn transport_config() -> TransportConfig {
    TransportConfig {
        // Every test peer names its own port.
        port: 1,
        timeout: Duration::from_secs(2),
        chain_read_timeout: Duration::from_millis(500),
        ..TransportConfig::default()
    }
}

pub fn node_config() -> NodeConfig {
    NodeConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        difficulty: DIFFICULTY,
        transport: transport_config(),
        ..NodeConfig::default()
    }
}

pub fn transport() -> PeerTransport {
    PeerTransport::new(transport_config())
}

/// A chain of `len` blocks from the shared genesis; `tag` keeps forks apart.
pub fn build_chain(len: usize, tag: &str) -> Vec<Block> {
    let mut chain = vec![genesis_block()];
    extend_chain(&mut chain, len - 1, tag);
    chain
}

pub fn extend_chain(chain: &mut Vec<Block>, n: usize, tag: &str) {
    for _ in 0..n {
        let prev = &chain[chain.len() - 1];
        let tx = Transaction::new(json!({ "tag": tag, "height": chain.len() }));
        let block = Block::with_timestamp(prev.index + 1, prev.hash.clone(), vec![tx], 1_700_000_000);
        chain.push(mine_block(block, DIFFICULTY));
    }
}

pub struct TestNode {
    pub addr: SocketAddr,
    pub server: Arc<NodeServer>,
    pub store: Arc<MemoryStore>,
    handle: JoinHandle<()>,
}

impl TestNode {
    pub fn peer(&self) -> PeerAddress {
        PeerAddress::from(self.addr)
    }

    pub fn ledger(&self) -> &Arc<Ledger> {
        self.server.ledger()
    }
}

impl Drop for TestNode {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

pub async fn spawn_node(chain: Vec<Block>, peers: Vec<PeerAddress>) -> TestNode {
    let store = Arc::new(MemoryStore::new());
    let ledger = Arc::new(Ledger::new(chain, store.clone()));
    let server = Arc::new(NodeServer::new(node_config(), ledger, peers));
    let listener = server.bind().await.expect("bind test node");
    let addr = listener.local_addr().expect("local addr");
    let handle = tokio::spawn(Arc::clone(&server).serve(listener));
    TestNode {
        addr,
        server,
        store,
        handle,
    }
}

/// An address nothing listens on.
pub async fn dead_peer() -> PeerAddress {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    PeerAddress::from(addr)
}

/// Accepts connections and never answers.
pub async fn stalled_peer() -> (PeerAddress, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((stream, _)) = listener.accept().await {
            held.push(stream);
        }
    });
    (PeerAddress::from(addr), handle)
}

/// Answers every connection with `reply` and closes.
pub async fn scripted_peer(reply: &'static [u8]) -> (PeerAddress, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            let _ = stream.write_all(reply).await;
            let _ = stream.shutdown().await;
        }
    });
    (PeerAddress::from(addr), handle)
}

/// Poll `check` until it holds or five seconds pass.
pub async fn eventually<F, Fut>(mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if check().await {
            return true;
        }
        sleep(Duration::from_millis(20)).await;
    }
    false
}

/// Wait for `ledger` to hold exactly `len` blocks.
pub async fn wait_for_len(ledger: &Arc<Ledger>, len: usize) -> bool {
    eventually(|| {
        let ledger = Arc::clone(ledger);
        async move { ledger.len().await == len }
    })
    .await
}
