use crate::block::Block;
use crate::error::{ChainError, Result};
use crate::ledger::BlockStore;
use crate::{is_genesis_marker, Hash};

/// Lazy backward traversal of the chain, tip to genesis.
///
/// Yields one block per step by following `prev_hash`, and terminates
/// exactly after the block whose `prev_hash` is the genesis marker; the
/// all-zero hash never has to resolve, so the walk cannot loop. A link that
/// fails to resolve mid-walk yields `CorruptChain` and ends the traversal.
pub struct BlockIter<'a, S> {
    store: &'a S,
    next: Option<Hash>,
}

impl<'a, S> BlockIter<'a, S> {
    pub(crate) fn new(store: &'a S, tip: Hash) -> Self {
        BlockIter {
            store,
            next: Some(tip),
        }
    }
}

impl<'a, S: BlockStore> Iterator for BlockIter<'a, S> {
    type Item = Result<Block>;

    fn next(&mut self) -> Option<Self::Item> {
        let hash = self.next.take()?;
        match self.store.block(&hash) {
            Ok(Some(block)) => {
                if !is_genesis_marker(&block.prev_hash) {
                    self.next = Some(block.prev_hash);
                }
                Some(Ok(block))
            }
            Ok(None) => Some(Err(ChainError::corrupt(&hash))),
            Err(err) => Some(Err(err)),
        }
    }
}
