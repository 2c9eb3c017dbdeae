use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use blake2::{Blake2s256, Digest};
use serde::{Deserialize, Serialize};

use crate::pow::{PowError, ProofOfWork};
use crate::transaction::Transaction;
use crate::{is_genesis_marker, Hash};

/// A hash-linked container of transactions plus the proof-of-work that
/// admitted it. Sealed blocks are never mutated; the only constructor that
/// escapes this module is [`Block::forge`], which returns a block already
/// carrying a winning `(hash, nonce)` pair.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// Chain position; genesis is height 1.
    pub height: u64,
    /// Unix seconds at draft time.
    pub timestamp: i64,
    /// Hash of the predecessor; the genesis marker for the first block.
    pub prev_hash: Hash,
    /// The winning proof-of-work digest.
    pub hash: Hash,
    /// The nonce that produced `hash`.
    pub nonce: u64,
    pub transactions: Vec<Transaction>,
}

impl fmt::Debug for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Block")
            .field("height", &self.height)
            .field("timestamp", &self.timestamp)
            .field("prev_hash", &hex::encode(self.prev_hash))
            .field("hash", &hex::encode(self.hash))
            .field("nonce", &self.nonce)
            .field("transactions", &self.transactions)
            .finish()
    }
}

impl Block {
    /// Drafts a block and runs the proof-of-work search until it seals.
    ///
    /// This is unbounded CPU work unless the engine carries a cancellation
    /// flag or an iteration cap; it must run outside any storage
    /// transaction.
    pub fn forge(
        height: u64,
        prev_hash: Hash,
        transactions: Vec<Transaction>,
        pow: &ProofOfWork,
    ) -> Result<Self, PowError> {
        let mut block = Block {
            height,
            timestamp: unix_now(),
            prev_hash,
            hash: [0; 32],
            nonce: 0,
            transactions,
        };
        let (hash, nonce) = pow.solve(&block)?;
        block.hash = hash;
        block.nonce = nonce;
        Ok(block)
    }

    /// Digest of all transaction ids concatenated in order. Feeds the
    /// proof-of-work byte string.
    pub fn tx_digest(&self) -> Hash {
        let mut hasher = Blake2s256::new();
        for tx in &self.transactions {
            hasher.update(tx.id);
        }
        hasher.finalize().into()
    }

    pub fn is_genesis(&self) -> bool {
        is_genesis_marker(&self.prev_hash)
    }
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs() as i64)
        .unwrap_or_default()
}
