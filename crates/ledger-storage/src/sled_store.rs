use anyhow::{Context, Result};
use ledger_core::{chain::ChainStore, Block};
use sled::{
  transaction::{ConflictableTransactionError, TransactionError},
  Db, IVec, Transactional, Tree,
};
use std::{convert::Infallible, path::Path};
use tracing::{debug, info};

const TREE_BLOCKS: &str = "blocks";
const TREE_HASHES: &str = "hashes";
const KEY_TIP_HEIGHT: &[u8] = b"tip_height";
const KEY_TIP_HASH: &[u8] = b"tip_hash";

/// Chain persistence on sled. Blocks are stored as JSON keyed by big-endian index,
/// so tree iteration order is chain order.
#[derive(Clone)]
pub struct SledStore {
  db: Db,
  blocks: Tree,
  hashes: Tree,
}

impl SledStore {
  pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
    let path = path.as_ref();
    let db = sled::open(path).with_context(|| format!("opening sled store at {}", path.display()))?;
    let blocks = db.open_tree(TREE_BLOCKS)?;
    let hashes = db.open_tree(TREE_HASHES)?;
    info!(path = %path.display(), "sled store opened");
    Ok(Self { db, blocks, hashes })
  }

  pub fn get_block(&self, index: u64) -> Result<Option<Block>> {
    self
      .blocks
      .get(index.to_be_bytes())?
      .map(|ivec: IVec| decode_block(index, &ivec))
      .transpose()
  }

  pub fn tip_height(&self) -> Result<Option<u64>> {
    Ok(self.db.get(KEY_TIP_HEIGHT)?.map(|v| {
      let mut arr = [0u8; 8];
      arr.copy_from_slice(&v);
      u64::from_be_bytes(arr)
    }))
  }

  pub fn tip_hash(&self) -> Result<Option<String>> {
    Ok(
      self
        .db
        .get(KEY_TIP_HASH)?
        .map(|v| String::from_utf8_lossy(&v).into_owned()),
    )
  }

  /// Drop every stored block and the tip markers.
  pub fn clear(&self) -> Result<()> {
    self.blocks.clear()?;
    self.hashes.clear()?;
    self.db.remove(KEY_TIP_HEIGHT)?;
    self.db.remove(KEY_TIP_HASH)?;
    self.db.flush()?;
    Ok(())
  }
}

fn decode_block(index: u64, bytes: &[u8]) -> Result<Block> {
  serde_json::from_slice(bytes).with_context(|| format!("decoding stored block {index}"))
}

impl ChainStore for SledStore {
  /// Write only the positions whose hash changed, drop anything past the new tip
  /// and move the tip markers, all in one sled transaction.
  fn persist(&self, chain: &[Block]) -> Result<()> {
    let mut changed = Vec::new();
    for block in chain {
      let key = block.index.to_be_bytes();
      let stored = self.hashes.get(key)?;
      if stored.as_deref() != Some(block.hash.as_bytes()) {
        changed.push((key, serde_json::to_vec(block)?, block.hash.as_bytes()));
      }
    }

    let stale_from = (chain.len() as u64).to_be_bytes();
    let stale: Vec<IVec> = self
      .hashes
      .range(stale_from..)
      .keys()
      .collect::<Result<_, _>>()?;

    let tip = chain.last().map(|tip| (tip.index.to_be_bytes(), tip.hash.as_bytes()));
    let default_tree: &Tree = &self.db;

    (&self.blocks, &self.hashes, default_tree)
      .transaction(|(blocks, hashes, meta)| {
        for (key, encoded, hash) in &changed {
          blocks.insert(&key[..], encoded.as_slice())?;
          hashes.insert(&key[..], *hash)?;
        }
        for key in &stale {
          blocks.remove(&key[..])?;
          hashes.remove(&key[..])?;
        }
        match tip {
          Some((height, hash)) => {
            meta.insert(KEY_TIP_HEIGHT, &height[..])?;
            meta.insert(KEY_TIP_HASH, hash)?;
          }
          None => {
            meta.remove(KEY_TIP_HEIGHT)?;
            meta.remove(KEY_TIP_HASH)?;
          }
        }
        Ok::<_, ConflictableTransactionError<Infallible>>(())
      })
      .map_err(|err| match err {
        TransactionError::Abort(never) => match never {},
        TransactionError::Storage(err) => anyhow::Error::from(err),
      })
      .context("writing chain")?;

    self.db.flush()?;
    debug!(
      len = chain.len(),
      written = changed.len(),
      removed = stale.len(),
      "chain persisted"
    );
    Ok(())
  }

  /// Blocks up to the tip marker, in index order. Anything stored past the
  /// marker is not part of the chain.
  fn load(&self) -> Result<Vec<Block>> {
    let entries = match self.tip_height()? {
      Some(height) => self.blocks.range(..=height.to_be_bytes()),
      None => self.blocks.range::<&[u8], _>(..),
    };
    let mut chain = Vec::new();
    for entry in entries {
      let (key, value) = entry?;
      let mut arr = [0u8; 8];
      arr.copy_from_slice(&key);
      chain.push(decode_block(u64::from_be_bytes(arr), &value)?);
    }
    Ok(chain)
  }
}
