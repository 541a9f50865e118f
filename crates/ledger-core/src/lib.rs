pub mod consensus;
pub mod constants;
pub mod mine;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::time::{SystemTime, UNIX_EPOCH};

pub use consensus::{
    compare_chains, cumulative_difficulty, find_fork_point, is_valid_chain, should_reorganize,
    validate_block, validate_chain, BlockError, ChainError,
};

pub type Hash = [u8; 32];

/// Opaque transaction payload. The node only ever compares these for equality.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Transaction(pub serde_json::Value);

impl Transaction {
    pub fn new(payload: serde_json::Value) -> Self {
        Self(payload)
    }

    pub fn payload(&self) -> &serde_json::Value {
        &self.0
    }
}

impl From<serde_json::Value> for Transaction {
    fn from(payload: serde_json::Value) -> Self {
        Self(payload)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub index: u64,
    pub timestamp: u64,
    pub transactions: Vec<Transaction>,
    pub prev_hash: String,
    pub nonce: u64,
    pub hash: String,
}

impl Block {
    /// Build a block stamped with the current time and nonce 0, with `hash` filled in.
    pub fn new(index: u64, prev_hash: impl Into<String>, transactions: Vec<Transaction>) -> Self {
        Self::with_timestamp(index, prev_hash, transactions, unix_now())
    }

    pub fn with_timestamp(
        index: u64,
        prev_hash: impl Into<String>,
        transactions: Vec<Transaction>,
        timestamp: u64,
    ) -> Self {
        let mut block = Self {
            index,
            timestamp,
            transactions,
            prev_hash: prev_hash.into(),
            nonce: 0,
            hash: String::new(),
        };
        block.seal();
        block
    }

    /// Bytes the block hash commits to: index, prev hash, merkle root, timestamp, nonce.
    pub fn hash_bytes(&self) -> Vec<u8> {
        let root = merkle_root(&self.transactions);
        let mut bytes = Vec::with_capacity(8 + self.prev_hash.len() + 32 + 8 + 8);
        bytes.extend_from_slice(&self.index.to_le_bytes());
        bytes.extend_from_slice(self.prev_hash.as_bytes());
        bytes.extend_from_slice(&root);
        bytes.extend_from_slice(&self.timestamp.to_le_bytes());
        bytes.extend_from_slice(&self.nonce.to_le_bytes());
        bytes
    }

    /// Recompute and store the hash after the content changed.
    pub fn seal(&mut self) {
        self.hash = hash_block(self);
    }
}

/// Recompute a block's hash from its content, ignoring the stored `hash` field.
pub fn hash_block(block: &Block) -> String {
    hex::encode(sha256(&block.hash_bytes()))
}

fn sha256(bytes: &[u8]) -> Hash {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest[..]);
    out
}

pub(crate) fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

pub fn merkle_root(txs: &[Transaction]) -> Hash {
    if txs.is_empty() {
        return [0u8; 32];
    }
    let mut level: Vec<Hash> = txs
        .iter()
        .map(|t| sha256(t.0.to_string().as_bytes()))
        .collect();

    while level.len() > 1 {
        let mut next = Vec::with_capacity(level.len().div_ceil(2));
        for pair in level.chunks(2) {
            let (a, b) = if pair.len() == 2 {
                (pair[0], pair[1])
            } else {
                (pair[0], pair[0])
            };
            let mut joined = [0u8; 64];
            joined[..32].copy_from_slice(&a);
            joined[32..].copy_from_slice(&b);
            next.push(sha256(&joined));
        }
        level = next;
    }
    level[0]
}

pub mod pow {
    use super::{hash_block, Block};

    /// Number of leading `'0'` characters in a textual hash digest.
    pub fn leading_zero_chars(hash: &str) -> u32 {
        (hash.len() - hash.trim_start_matches('0').len()) as u32
    }

    pub fn meets_difficulty(hash: &str, difficulty: u32) -> bool {
        leading_zero_chars(hash) >= difficulty
    }

    /// Mine the block by incrementing nonce until its hash starts with at least
    /// `difficulty` zero characters. The returned block carries the winning hash.
    pub fn mine_block(mut block: Block, difficulty: u32) -> Block {
        loop {
            let hash = hash_block(&block);
            if meets_difficulty(&hash, difficulty) {
                block.hash = hash;
                return block;
            }
            block.nonce = block.nonce.wrapping_add(1);
        }
    }
}

pub mod chain {
    use super::*;
    use anyhow::{bail, Result};
    use tracing::info;

    /// Persistence hook for the canonical chain. Implementations own their path.
    ///
    /// `persist` receives the whole chain after every append or reorganization
    /// and must finish before the triggering operation returns.
    pub trait ChainStore: Send + Sync {
        fn persist(&self, chain: &[Block]) -> Result<()>;
        fn load(&self) -> Result<Vec<Block>>;
    }

    /// The fixed genesis block every node starts from.
    pub fn genesis_block() -> Block {
        Block::with_timestamp(0, crate::constants::GENESIS_PREV_HASH, vec![], 0)
    }

    /// Load the persisted chain, bootstrapping it with the genesis block when empty.
    pub fn load_or_genesis(store: &dyn ChainStore) -> Result<Vec<Block>> {
        let chain = store.load()?;
        if chain.is_empty() {
            let chain = vec![genesis_block()];
            store.persist(&chain)?;
            info!("initialised chain with genesis block");
            return Ok(chain);
        }
        if let Err(err) = validate_chain(&chain) {
            bail!("persisted chain is invalid: {err}");
        }
        info!(height = chain.len() - 1, "loaded persisted chain");
        Ok(chain)
    }

    /// Tip hash, or the empty string for an empty chain.
    pub fn tip_hash(chain: &[Block]) -> &str {
        chain.last().map(|b| b.hash.as_str()).unwrap_or("")
    }
}
