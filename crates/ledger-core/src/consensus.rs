//! Chain validity and fork choice.
//!
//! Weight is measured in leading zero *characters* of the hex digest, each worth a
//! factor of two. Persisted chains were scored this way, so it must not change to
//! a bit count.

use crate::{chain::tip_hash, hash_block, pow, Block};
use std::cmp::Ordering;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChainError {
    #[error("chain is empty")]
    Empty,
    #[error("genesis block has index {0}, expected 0")]
    BadGenesisIndex(u64),
    #[error("block at position {position} has index {found}, expected {expected}")]
    IndexGap {
        position: usize,
        expected: u64,
        found: u64,
    },
    #[error("block {index} does not link to its predecessor")]
    BrokenLink { index: u64 },
    #[error("block {index} hash does not match its content")]
    HashMismatch { index: u64 },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BlockError {
    #[error("block {index} hash has {found} leading zeros, difficulty requires {required}")]
    InsufficientWork {
        index: u64,
        found: u32,
        required: u32,
    },
    #[error("block {index} hash does not match its content")]
    HashMismatch { index: u64 },
}

/// Check structure and hash linkage, reporting the first rule that fails.
pub fn validate_chain(chain: &[Block]) -> Result<(), ChainError> {
    let genesis = chain.first().ok_or(ChainError::Empty)?;
    if genesis.index != 0 {
        return Err(ChainError::BadGenesisIndex(genesis.index));
    }

    for (position, pair) in chain.windows(2).enumerate() {
        let (prev, block) = (&pair[0], &pair[1]);
        let expected = prev.index.wrapping_add(1);
        if block.index != expected {
            return Err(ChainError::IndexGap {
                position: position + 1,
                expected,
                found: block.index,
            });
        }
        if block.prev_hash != prev.hash {
            return Err(ChainError::BrokenLink { index: block.index });
        }
        if block.hash != hash_block(block) {
            return Err(ChainError::HashMismatch { index: block.index });
        }
    }
    Ok(())
}

pub fn is_valid_chain(chain: &[Block]) -> bool {
    validate_chain(chain).is_ok()
}

/// Proof-of-work and tamper checks for a single inbound block.
pub fn validate_block(block: &Block, difficulty: u32) -> Result<(), BlockError> {
    let found = pow::leading_zero_chars(&block.hash);
    if found < difficulty {
        return Err(BlockError::InsufficientWork {
            index: block.index,
            found,
            required: difficulty,
        });
    }
    if block.hash != hash_block(block) {
        return Err(BlockError::HashMismatch { index: block.index });
    }
    Ok(())
}

fn block_weight(block: &Block) -> u128 {
    1u128
        .checked_shl(pow::leading_zero_chars(&block.hash))
        .unwrap_or(u128::MAX)
}

/// Sum of `2^leading_zero_chars(hash)` over the chain, saturating.
pub fn cumulative_difficulty(chain: &[Block]) -> u128 {
    chain
        .iter()
        .fold(0u128, |total, block| total.saturating_add(block_weight(block)))
}

/// Order two chains by fork-choice preference; `Greater` means `a` is preferred.
///
/// Heavier wins, then longer, then the lexicographically smaller tip hash.
pub fn compare_chains(a: &[Block], b: &[Block]) -> Ordering {
    cumulative_difficulty(a)
        .cmp(&cumulative_difficulty(b))
        .then_with(|| a.len().cmp(&b.len()))
        .then_with(|| tip_hash(b).cmp(tip_hash(a)))
}

/// Whether `candidate` should replace `current`.
///
/// A valid candidate that is strictly longer is always accepted, whatever its
/// weight. Otherwise it has to win `compare_chains` outright.
pub fn should_reorganize(current: &[Block], candidate: &[Block]) -> bool {
    if !is_valid_chain(candidate) {
        return false;
    }
    if candidate.len() <= current.len() {
        return compare_chains(candidate, current) == Ordering::Greater;
    }
    true
}

/// Last position where both chains carry the same block hash, scanning from
/// genesis and stopping at the first mismatch. Never signals "no common point":
/// a mismatch at position 0 also yields 0.
pub fn find_fork_point(a: &[Block], b: &[Block]) -> usize {
    a.iter()
        .zip(b)
        .take_while(|(x, y)| x.hash == y.hash)
        .count()
        .saturating_sub(1)
}
