use anyhow::{anyhow, Result};
use ledger_core::{chain::ChainStore, Block};
use std::sync::{
  atomic::{AtomicUsize, Ordering},
  Mutex,
};

/// In-memory `ChainStore` that also counts persist calls.
#[derive(Default)]
pub struct MemoryStore {
  chain: Mutex<Vec<Block>>,
  persists: AtomicUsize,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_chain(chain: Vec<Block>) -> Self {
    Self {
      chain: Mutex::new(chain),
      persists: AtomicUsize::new(0),
    }
  }

  /// How many times `persist` has been called.
  pub fn persist_count(&self) -> usize {
    self.persists.load(Ordering::SeqCst)
  }

  pub fn snapshot(&self) -> Vec<Block> {
    self
      .chain
      .lock()
      .map(|chain| chain.clone())
      .unwrap_or_default()
  }
}

impl ChainStore for MemoryStore {
  fn persist(&self, chain: &[Block]) -> Result<()> {
    let mut stored = self
      .chain
      .lock()
      .map_err(|_| anyhow!("memory store lock poisoned"))?;
    *stored = chain.to_vec();
    self.persists.fetch_add(1, Ordering::SeqCst);
    Ok(())
  }

  fn load(&self) -> Result<Vec<Block>> {
    self
      .chain
      .lock()
      .map(|chain| chain.clone())
      .map_err(|_| anyhow!("memory store lock poisoned"))
  }
}
