use crate::{hash_block, pow::meets_difficulty, unix_now, Block, Transaction};
use rayon::prelude::*;
use tracing::info;

/// Mines the block following `prev` by searching nonces in parallel until the hash
/// starts with at least `difficulty` zero characters.
pub fn mine_block_parallel(prev: &Block, txs: Vec<Transaction>, difficulty: u32) -> Block {
    // Only the nonce varies per attempt.
    let template = Block {
        index: prev.index + 1,
        timestamp: unix_now(),
        transactions: txs,
        prev_hash: prev.hash.clone(),
        nonce: 0,
        hash: String::new(),
    };

    let found = (0u64..u64::MAX).into_par_iter().find_any(|nonce| {
        let mut candidate = template.clone();
        candidate.nonce = *nonce;
        meets_difficulty(&hash_block(&candidate), difficulty)
    });

    let mut block = template;
    block.nonce = found.expect("nonce space exhausted (practically impossible)");
    block.seal();

    info!(
        index = block.index,
        nonce = block.nonce,
        hash = %block.hash,
        "mined block"
    );
    block
}
