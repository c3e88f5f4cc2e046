//! Durable storage behind the ledger facade.
//!
//! The facade talks to a [`Persistence`] trait so the chain logic never
//! depends on sled directly; tests swap in [`InMemoryStore`].

use crate::consensus::Stake;
use crate::core::Block;
use crate::error::{LedgerError, Result};
use crate::utils::{deserialize, serialize};
use log::info;
use std::path::Path;
use std::sync::RwLock;

const BLOCKS_TREE: &str = "blocks";
const STAKES_TREE: &str = "stakes";
const TIP_HEIGHT_KEY: &str = "tip_height";
const STAKES_KEY: &str = "all_stakes";

/// Durable block and stake storage.
pub trait Persistence: Send + Sync {
    /// Append a block. Must be atomic: the block record and the tip pointer
    /// move together or not at all.
    fn append_block(&self, block: &Block) -> Result<()>;

    /// Load all persisted blocks in index order. Empty when no chain exists.
    fn load_blocks(&self) -> Result<Vec<Block>>;

    fn save_stakes(&self, stakes: &[Stake]) -> Result<()>;

    fn load_stakes(&self) -> Result<Vec<Stake>>;
}

/// Sled-backed store. Blocks live in their own tree keyed by big-endian
/// index so iteration yields chain order; the tip height is updated in the
/// same sled transaction as the block insert.
pub struct SledStore {
    db: sled::Db,
}

impl SledStore {
    pub fn open(path: &Path) -> Result<SledStore> {
        let db = sled::open(path)
            .map_err(|e| LedgerError::Database(format!("Failed to open database: {e}")))?;
        info!("Opened ledger database at {}", path.display());
        Ok(SledStore { db })
    }

    fn blocks_tree(&self) -> Result<sled::Tree> {
        self.db
            .open_tree(BLOCKS_TREE)
            .map_err(|e| LedgerError::Database(format!("Failed to open blocks tree: {e}")))
    }

    fn stakes_tree(&self) -> Result<sled::Tree> {
        self.db
            .open_tree(STAKES_TREE)
            .map_err(|e| LedgerError::Database(format!("Failed to open stakes tree: {e}")))
    }
}

impl Persistence for SledStore {
    fn append_block(&self, block: &Block) -> Result<()> {
        let tree = self.blocks_tree()?;
        let key = block.get_index().to_be_bytes();
        let data = serialize(block)?;

        tree.transaction(|tx_db| {
            tx_db.insert(&key, data.as_slice())?;
            tx_db.insert(TIP_HEIGHT_KEY, &key)?;
            Ok(())
        })
        .map_err(|e: sled::transaction::TransactionError| {
            LedgerError::Database(format!("Failed to update blocks tree: {e}"))
        })?;

        Ok(())
    }

    fn load_blocks(&self) -> Result<Vec<Block>> {
        let tree = self.blocks_tree()?;
        let mut blocks = Vec::new();

        for entry in tree.iter() {
            let (key, value) =
                entry.map_err(|e| LedgerError::Database(format!("Failed to scan blocks: {e}")))?;
            if key.as_ref() == TIP_HEIGHT_KEY.as_bytes() {
                continue;
            }
            blocks.push(deserialize::<Block>(&value)?);
        }

        // Keys are big-endian indices, but the tip pointer shares the tree,
        // so sort by index rather than trusting scan order.
        blocks.sort_by_key(|b| b.get_index());
        Ok(blocks)
    }

    fn save_stakes(&self, stakes: &[Stake]) -> Result<()> {
        let tree = self.stakes_tree()?;
        let data = serialize(&stakes.to_vec())?;
        tree.insert(STAKES_KEY, data)
            .map_err(|e| LedgerError::Database(format!("Failed to save stakes: {e}")))?;
        Ok(())
    }

    fn load_stakes(&self) -> Result<Vec<Stake>> {
        let tree = self.stakes_tree()?;
        match tree
            .get(STAKES_KEY)
            .map_err(|e| LedgerError::Database(format!("Failed to load stakes: {e}")))?
        {
            Some(data) => deserialize::<Vec<Stake>>(&data),
            None => Ok(Vec::new()),
        }
    }
}

/// Process-local store for tests and throwaway chains.
#[derive(Default)]
pub struct InMemoryStore {
    blocks: RwLock<Vec<Block>>,
    stakes: RwLock<Vec<Stake>>,
}

impl InMemoryStore {
    pub fn new() -> InMemoryStore {
        InMemoryStore::default()
    }
}

impl Persistence for InMemoryStore {
    fn append_block(&self, block: &Block) -> Result<()> {
        match self.blocks.write() {
            Ok(mut blocks) => {
                blocks.push(block.clone());
                Ok(())
            }
            Err(_) => Err(LedgerError::Database(
                "in-memory block store lock poisoned".to_string(),
            )),
        }
    }

    fn load_blocks(&self) -> Result<Vec<Block>> {
        match self.blocks.read() {
            Ok(blocks) => Ok(blocks.clone()),
            Err(_) => Err(LedgerError::Database(
                "in-memory block store lock poisoned".to_string(),
            )),
        }
    }

    fn save_stakes(&self, stakes: &[Stake]) -> Result<()> {
        match self.stakes.write() {
            Ok(mut slot) => {
                *slot = stakes.to_vec();
                Ok(())
            }
            Err(_) => Err(LedgerError::Database(
                "in-memory stake store lock poisoned".to_string(),
            )),
        }
    }

    fn load_stakes(&self) -> Result<Vec<Stake>> {
        match self.stakes.read() {
            Ok(stakes) => Ok(stakes.clone()),
            Err(_) => Err(LedgerError::Database(
                "in-memory stake store lock poisoned".to_string(),
            )),
        }
    }
}
