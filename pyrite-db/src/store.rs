use std::path::Path;

use pyrite_core::block::Block;
use pyrite_core::error::{ChainError, Result};
use pyrite_core::ledger::BlockStore;
use pyrite_core::Hash;
use redb::{
    backends::InMemoryBackend, Database, ReadableTable, TableDefinition, TableError, TypeName,
    Value,
};

const CHAIN_TIP_KEY: &str = "chain_tip";

/// Reserved single-key table holding the current tip hash.
const STATE_TABLE: TableDefinition<&str, Vec<u8>> = TableDefinition::new("chain_state");
/// Block hash to serialized block.
const BLOCK_TABLE: TableDefinition<Hash, BlockValue> = TableDefinition::new("blocks");

#[derive(Debug)]
struct BlockValue;

impl Value for BlockValue {
    type SelfType<'a>
        = Block
    where
        Self: 'a;
    type AsBytes<'a>
        = Vec<u8>
    where
        Self: 'a;
    fn as_bytes<'a, 'b: 'a>(value: &'a Self::SelfType<'b>) -> Self::AsBytes<'a>
    where
        Self: 'b,
    {
        postcard::to_allocvec(value).unwrap()
    }
    fn from_bytes<'a>(data: &'a [u8]) -> Self::SelfType<'a>
    where
        Self: 'a,
    {
        postcard::from_bytes(data).unwrap()
    }
    fn fixed_width() -> Option<usize> {
        None
    }
    fn type_name() -> TypeName {
        TypeName::new("pyrite::Block")
    }
}

/// A durable `BlockStore` on redb.
///
/// The schema is exactly two tables: block hash to postcard-serialized
/// block, and a reserved key holding the tip hash. Block and tip land in
/// the same write transaction, so a published tip always resolves.
pub struct RedbStore {
    db: Database,
}

impl RedbStore {
    /// Opens (or creates) the database file at `path`. A fresh file holds
    /// no chain; `Chain::open` reports that as `ChainNotFound`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let db = Database::create(path).map_err(ChainError::storage)?;
        Ok(RedbStore { db })
    }

    /// A store backed by process memory. Test support.
    pub fn in_memory() -> Result<Self> {
        let db = Database::builder()
            .create_with_backend(InMemoryBackend::new())
            .map_err(ChainError::storage)?;
        Ok(RedbStore { db })
    }
}

impl BlockStore for RedbStore {
    fn tip(&self) -> Result<Option<Hash>> {
        let read_tx = self.db.begin_read().map_err(ChainError::storage)?;
        let table = match read_tx.open_table(STATE_TABLE) {
            Ok(table) => table,
            Err(TableError::TableDoesNotExist(_)) => return Ok(None),
            Err(err) => return Err(ChainError::storage(err)),
        };
        let tip = table
            .get(CHAIN_TIP_KEY)
            .map_err(ChainError::storage)?
            .and_then(|guard| guard.value().try_into().ok());
        Ok(tip)
    }

    fn block(&self, hash: &Hash) -> Result<Option<Block>> {
        let read_tx = self.db.begin_read().map_err(ChainError::storage)?;
        let table = match read_tx.open_table(BLOCK_TABLE) {
            Ok(table) => table,
            Err(TableError::TableDoesNotExist(_)) => return Ok(None),
            Err(err) => return Err(ChainError::storage(err)),
        };
        let block = table
            .get(hash)
            .map_err(ChainError::storage)?
            .map(|guard| guard.value());
        Ok(block)
    }

    fn commit(&self, block: &Block) -> Result<()> {
        let write_tx = self.db.begin_write().map_err(ChainError::storage)?;
        {
            let mut blocks = write_tx
                .open_table(BLOCK_TABLE)
                .map_err(ChainError::storage)?;
            blocks
                .insert(&block.hash, block)
                .map_err(ChainError::storage)?;

            let mut state = write_tx
                .open_table(STATE_TABLE)
                .map_err(ChainError::storage)?;
            state
                .insert(CHAIN_TIP_KEY, block.hash.to_vec())
                .map_err(ChainError::storage)?;
        }
        write_tx.commit().map_err(ChainError::storage)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pyrite_core::ledger::Chain;
    use pyrite_core::miner;
    use pyrite_core::pow::ProofOfWork;
    use pyrite_core::transaction::Transaction;
    use pyrite_core::GENESIS_MARKER;
    use std::path::PathBuf;
    use std::{env, fs};

    fn temp_path(name: &str) -> PathBuf {
        let mut path = env::temp_dir();
        path.push(format!("pyrite_db_store_test_{name}.redb"));
        // ensure clean file
        let _ = fs::remove_file(&path);
        path
    }

    fn sealed_block(height: u64, prev_hash: Hash) -> Block {
        Block::forge(
            height,
            prev_hash,
            vec![Transaction::coinbase("alice")],
            &ProofOfWork::new(8),
        )
        .expect("forge")
    }

    #[test]
    fn fresh_store_has_no_tip() {
        let store = RedbStore::in_memory().expect("create store");
        assert_eq!(store.tip().unwrap(), None);
        assert_eq!(store.block(&[1; 32]).unwrap(), None);
    }

    #[test]
    fn commit_then_read_back() {
        let store = RedbStore::in_memory().expect("create store");
        let block = sealed_block(1, GENESIS_MARKER);

        store.commit(&block).expect("commit");

        assert_eq!(store.tip().unwrap(), Some(block.hash));
        let read = store.block(&block.hash).unwrap().expect("stored block");
        assert_eq!(read, block);
    }

    #[test]
    fn second_commit_moves_the_tip() {
        let store = RedbStore::in_memory().expect("create store");
        let genesis = sealed_block(1, GENESIS_MARKER);
        store.commit(&genesis).expect("commit genesis");

        let next = sealed_block(2, genesis.hash);
        store.commit(&next).expect("commit next");

        assert_eq!(store.tip().unwrap(), Some(next.hash));
        // The previous block stays readable.
        assert!(store.block(&genesis.hash).unwrap().is_some());
    }

    #[test]
    fn serialization_round_trips_varied_blocks() {
        let store = RedbStore::in_memory().expect("create store");
        let empty = Block::forge(1, GENESIS_MARKER, vec![], &ProofOfWork::new(8)).unwrap();
        let single = sealed_block(2, empty.hash);
        let many = Block::forge(
            3,
            single.hash,
            vec![
                Transaction::coinbase("alice"),
                Transaction::coinbase("bob"),
                Transaction::coinbase("carol"),
            ],
            &ProofOfWork::new(8),
        )
        .unwrap();

        for block in [&empty, &single, &many] {
            store.commit(block).expect("commit");
            assert_eq!(store.block(&block.hash).unwrap().as_ref(), Some(block));
        }
    }

    #[test]
    fn chain_state_survives_reopen() {
        let path = temp_path("reopen");

        let tip = {
            let store = RedbStore::open(&path).expect("create store");
            let mut chain =
                Chain::create_genesis(store, "alice", ProofOfWork::new(8)).expect("genesis");
            miner::transfer_batch(&mut chain, &["alice".into()], &["bob".into()], &[4])
                .expect("send");
            chain.tip_hash()
        };

        let store = RedbStore::open(&path).expect("reopen store");
        let chain = Chain::open(store, ProofOfWork::new(8)).expect("open chain");
        assert_eq!(chain.tip_hash(), tip);
        assert_eq!(chain.balance("alice").unwrap(), 6);
        assert_eq!(chain.balance("bob").unwrap(), 4);

        let _ = fs::remove_file(&path);
    }
}
