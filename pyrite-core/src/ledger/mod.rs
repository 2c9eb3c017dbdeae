/*! The chain store: durable, hash-indexed block storage with a tracked tip.

[`BlockStore`] is the contract a storage backend must satisfy: durable
key-to-bytes storage with atomic reads and an atomic block+tip commit. [`Chain`] layers
the ledger semantics (genesis creation, tip-linked appends, lazy backward
traversal) on top without caring which backend it runs on.
*/

mod in_mem;
mod iter;

pub use in_mem::MemoryStore;
pub use iter::BlockIter;

use tracing::info;

use crate::block::Block;
use crate::error::{ChainError, Result};
use crate::pow::ProofOfWork;
use crate::transaction::Transaction;
use crate::{Hash, GENESIS_MARKER};

/// Durable block storage.
///
/// `commit` must persist the block entry and overwrite the tip pointer as a
/// single atomic unit, so a reader can never observe a tip whose block is
/// not yet readable.
pub trait BlockStore {
    /// The current tip hash, or `None` when no chain exists yet.
    fn tip(&self) -> Result<Option<Hash>>;

    /// Loads a block by hash. `Ok(None)` means the hash is unknown.
    fn block(&self, hash: &Hash) -> Result<Option<Block>>;

    /// Persists `block` and moves the tip to it, atomically.
    fn commit(&self, block: &Block) -> Result<()>;
}

impl<S: BlockStore + ?Sized> BlockStore for &S {
    fn tip(&self) -> Result<Option<Hash>> {
        (**self).tip()
    }

    fn block(&self, hash: &Hash) -> Result<Option<Block>> {
        (**self).block(hash)
    }

    fn commit(&self, block: &Block) -> Result<()> {
        (**self).commit(block)
    }
}

/// A handle to one ledger instance.
///
/// Appends go through `&mut self`, which is the single-writer discipline:
/// two appends can never read the same tip and both succeed. Reads take
/// `&self` and are snapshot-consistent per call.
#[derive(Debug)]
pub struct Chain<S> {
    store: S,
    tip: Hash,
    pow: ProofOfWork,
}

impl<S: BlockStore> Chain<S> {
    /// Initializes a new chain in `store`: mines a genesis block (height 1,
    /// no predecessor) holding only the coinbase transaction for `address`.
    ///
    /// Fails with `ChainAlreadyExists` if the store already has a tip.
    pub fn create_genesis(store: S, address: &str, pow: ProofOfWork) -> Result<Self> {
        if store.tip()?.is_some() {
            return Err(ChainError::ChainAlreadyExists);
        }
        let coinbase = Transaction::coinbase(address);
        let genesis = Block::forge(1, GENESIS_MARKER, vec![coinbase], &pow)?;
        store.commit(&genesis)?;
        info!(hash = %hex::encode(genesis.hash), "genesis block committed");
        Ok(Chain {
            tip: genesis.hash,
            store,
            pow,
        })
    }

    /// Opens an existing chain, loading only the tip pointer. Blocks load
    /// lazily during traversal.
    ///
    /// Fails with `ChainNotFound` if the store holds no chain.
    pub fn open(store: S, pow: ProofOfWork) -> Result<Self> {
        let tip = store.tip()?.ok_or(ChainError::ChainNotFound)?;
        Ok(Chain { store, tip, pow })
    }

    pub fn tip_hash(&self) -> Hash {
        self.tip
    }

    /// Resolves the tip block, failing with `CorruptChain` if the tip hash
    /// does not resolve.
    pub fn tip_block(&self) -> Result<Block> {
        self.store
            .block(&self.tip)?
            .ok_or_else(|| ChainError::corrupt(&self.tip))
    }

    /// Mines `transactions` into a new block on top of the current tip and
    /// commits it. The proof-of-work search runs before the write
    /// transaction begins, so the store is never locked during the search.
    ///
    /// The new block holds exactly the supplied transactions; no coinbase
    /// is added here.
    pub fn append(&mut self, transactions: Vec<Transaction>) -> Result<Block> {
        let tip = self.tip_block()?;
        let block = Block::forge(tip.height + 1, tip.hash, transactions, &self.pow)?;
        self.store.commit(&block)?;
        self.tip = block.hash;
        info!(
            height = block.height,
            hash = %hex::encode(block.hash),
            txs = block.transactions.len(),
            "block appended"
        );
        Ok(block)
    }

    /// A fresh traversal from the tip down to genesis. Each call starts
    /// over; concurrent traversals are independent.
    pub fn iter(&self) -> BlockIter<'_, S> {
        BlockIter::new(&self.store, self.tip)
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn pow(&self) -> &ProofOfWork {
        &self.pow
    }
}
