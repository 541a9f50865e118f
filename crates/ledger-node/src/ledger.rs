use ledger_core::{chain::ChainStore, should_reorganize, Block, Transaction};
use std::sync::Arc;
use tokio::{
    sync::{Mutex, RwLock},
    task,
};
use tracing::error;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AppendOutcome {
    Appended { index: u64 },
    /// The block does not extend the current tip.
    NotLinked { index: u64, expected: u64 },
}

/// The node's canonical chain and transaction pool.
///
/// Appends and reorganizations take the chain's write lock and persist before
/// releasing it, so the store always sees mutations in memory order.
pub struct Ledger {
    chain: RwLock<Vec<Block>>,
    mempool: Mutex<Vec<Transaction>>,
    store: Arc<dyn ChainStore>,
}

impl Ledger {
    pub fn new(chain: Vec<Block>, store: Arc<dyn ChainStore>) -> Self {
        Self {
            chain: RwLock::new(chain),
            mempool: Mutex::new(Vec::new()),
            store,
        }
    }

    pub async fn snapshot(&self) -> Vec<Block> {
        self.chain.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.chain.read().await.len()
    }

    pub async fn tip(&self) -> Option<Block> {
        self.chain.read().await.last().cloned()
    }

    /// Append `block` if it links onto the tip. Work and hash checks are the caller's.
    pub async fn try_append(&self, block: Block) -> AppendOutcome {
        let mut chain = self.chain.write().await;
        let expected = chain.len() as u64;
        let links = chain.last().is_some_and(|tip| tip.hash == block.prev_hash);
        if !links || block.index != expected {
            return AppendOutcome::NotLinked {
                index: block.index,
                expected,
            };
        }
        let index = block.index;
        chain.push(block);
        self.persist(&chain).await;
        AppendOutcome::Appended { index }
    }

    /// Replace the chain with `candidate` if fork choice prefers it over the chain
    /// held at the moment the write lock is taken. Returns the replaced length.
    pub async fn reorganize(&self, candidate: Vec<Block>) -> Option<usize> {
        let mut chain = self.chain.write().await;
        if !should_reorganize(&chain, &candidate) {
            return None;
        }
        let previous = chain.len();
        chain.clear();
        chain.extend(candidate);
        self.persist(&chain).await;
        Some(previous)
    }

    /// Add a transaction unless an equal one is already pooled.
    pub async fn add_transaction(&self, tx: Transaction) -> bool {
        let mut pool = self.mempool.lock().await;
        if pool.contains(&tx) {
            return false;
        }
        pool.push(tx);
        true
    }

    pub async fn transactions(&self) -> Vec<Transaction> {
        self.mempool.lock().await.clone()
    }

    /// Store writes end in a disk flush, so they run on the blocking pool.
    async fn persist(&self, chain: &[Block]) {
        let store = Arc::clone(&self.store);
        let snapshot = chain.to_vec();
        let len = snapshot.len();
        match task::spawn_blocking(move || store.persist(&snapshot)).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => error!(len, error = ?err, "failed to persist chain"),
            Err(err) => error!(len, %err, "persist task failed"),
        }
    }
}
