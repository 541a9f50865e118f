use std::fs;

use ledger_core::{chain::genesis_block, Block, Transaction};
use ledger_storage::SledStore;
use serde_json::json;
use tempfile::{tempdir, TempDir};

pub fn create_temp_store() -> (TempDir, SledStore) {
    // Create a temporary directory for the sled database
    let temp_dir = tempdir().expect("Failed to create temp dir");
    let db_path = temp_dir.path().to_path_buf();
    (
        temp_dir,
        SledStore::open(&db_path).expect("Failed to open SledStore"),
    )
}

pub fn teardown_store(temp_dir: TempDir, store: SledStore) {
    let db_path = temp_dir.path().to_path_buf();
    store.clear().expect("Failed to clear the store");
    drop(store);
    temp_dir.close().expect("Failed to delete temp dir");
    let _ = fs::remove_dir_all(&db_path);
    assert!(!db_path.exists(), "Database directory should be removed");
}

/// A linked chain of `len` blocks starting at genesis; `tag` makes forks distinct.
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
        chain.push(block);
    }
}
