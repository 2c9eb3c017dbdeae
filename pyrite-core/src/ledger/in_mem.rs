use std::collections::HashMap;
use std::sync::RwLock;

use crate::block::Block;
use crate::error::Result;
use crate::ledger::BlockStore;
use crate::Hash;

/// An in-memory `BlockStore` for tests and ephemeral chains.
///
/// The `RwLock` gives the same atomicity the contract demands of a durable
/// backend: `commit` holds the write lock across both the block insert and
/// the tip update.
#[derive(Default, Debug)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

#[derive(Default, Debug)]
struct Inner {
    blocks: HashMap<Hash, Block>,
    tip: Option<Hash>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops a stored block, simulating storage tampering. Test support.
    pub fn forget(&self, hash: &Hash) {
        self.inner.write().unwrap().blocks.remove(hash);
    }
}

impl BlockStore for MemoryStore {
    fn tip(&self) -> Result<Option<Hash>> {
        Ok(self.inner.read().unwrap().tip)
    }

    fn block(&self, hash: &Hash) -> Result<Option<Block>> {
        Ok(self.inner.read().unwrap().blocks.get(hash).cloned())
    }

    fn commit(&self, block: &Block) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        inner.blocks.insert(block.hash, block.clone());
        inner.tip = Some(block.hash);
        Ok(())
    }
}
