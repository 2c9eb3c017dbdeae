/*! Proof-of-work search.

A candidate block is admitted once a nonce is found whose digest, read as a
big-endian 256-bit integer, falls strictly below `2^(256 - difficulty_bits)`.
The search iterates the nonce from 0 upward with no parallelism, so the
returned nonce is always the smallest satisfying one for the given block
bytes. The search is unbounded CPU work; callers needing an escape hatch can
attach a cancellation flag (checked cooperatively) or an iteration cap.
*/

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use blake2::{Blake2s256, Digest};
use ethnum::U256;
use thiserror::Error;
use tracing::debug;

use crate::block::Block;
use crate::{int_be_bytes, Hash};

/// Difficulty used when none is configured explicitly.
pub const DEFAULT_DIFFICULTY: u32 = 16;

/// How many nonces are tried between cancellation-flag checks.
const CANCEL_CHECK_INTERVAL: u64 = 1024;

/// Why a search ended without a solution.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PowError {
    #[error("search cancelled after {attempts} attempts")]
    Cancelled { attempts: u64 },

    #[error("no solution within the {cap}-iteration cap")]
    CapExhausted { cap: u64 },
}

/// The proof-of-work engine. Difficulty is fixed for the lifetime of the
/// engine; there is no retargeting.
#[derive(Clone, Debug)]
pub struct ProofOfWork {
    difficulty: u32,
    target: U256,
    cancel: Option<Arc<AtomicBool>>,
    iteration_cap: Option<u64>,
}

impl Default for ProofOfWork {
    fn default() -> Self {
        Self::new(DEFAULT_DIFFICULTY)
    }
}

impl ProofOfWork {
    /// Creates an engine with the given difficulty. `difficulty_bits` must
    /// be in `1..=255` so the target `2^(256 - bits)` is representable.
    pub fn new(difficulty_bits: u32) -> Self {
        assert!(
            (1..=255).contains(&difficulty_bits),
            "difficulty must be in 1..=255"
        );
        Self {
            difficulty: difficulty_bits,
            target: U256::ONE << (256 - difficulty_bits),
            cancel: None,
            iteration_cap: None,
        }
    }

    /// Attaches a flag that aborts an in-flight search when set.
    pub fn with_cancel(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    /// Bounds the search to `cap` nonces. Intended for tests that must not
    /// hang on an unlucky block.
    pub fn with_iteration_cap(mut self, cap: u64) -> Self {
        self.iteration_cap = Some(cap);
        self
    }

    pub fn difficulty(&self) -> u32 {
        self.difficulty
    }

    /// Searches for the smallest nonce whose digest meets the target.
    ///
    /// The block's own `hash` and `nonce` fields are ignored; only the
    /// draft fields (timestamp, height, prev_hash, transactions) feed the
    /// hashed byte string.
    pub fn solve(&self, block: &Block) -> Result<(Hash, u64), PowError> {
        let mut nonce = 0u64;
        loop {
            if let Some(cap) = self.iteration_cap {
                if nonce >= cap {
                    return Err(PowError::CapExhausted { cap });
                }
            }
            if nonce % CANCEL_CHECK_INTERVAL == 0 {
                if let Some(flag) = &self.cancel {
                    if flag.load(Ordering::Relaxed) {
                        return Err(PowError::Cancelled { attempts: nonce });
                    }
                }
            }

            let hash = self.digest(block, nonce);
            if U256::from_be_bytes(hash) < self.target {
                debug!(nonce, height = block.height, "proof-of-work solved");
                return Ok((hash, nonce));
            }
            nonce += 1;
        }
    }

    /// Re-checks a sealed block: its stored hash must be the digest of its
    /// stored nonce and must meet the target.
    pub fn validate(&self, block: &Block) -> bool {
        let hash = self.digest(block, block.nonce);
        hash == block.hash && U256::from_be_bytes(hash) < self.target
    }

    /// The deterministic byte string for one nonce trial, hashed.
    fn digest(&self, block: &Block, nonce: u64) -> Hash {
        let mut data = Vec::with_capacity(96);
        data.extend_from_slice(&int_be_bytes(block.timestamp));
        data.extend_from_slice(&int_be_bytes(block.height as i64));
        data.extend_from_slice(&block.prev_hash);
        data.extend_from_slice(&block.tx_digest());
        data.extend_from_slice(&int_be_bytes(self.difficulty as i64));
        data.extend_from_slice(&int_be_bytes(nonce as i64));

        let mut hasher = Blake2s256::new();
        hasher.update(&data);
        hasher.finalize().into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::Transaction;
    use crate::GENESIS_MARKER;

    fn draft() -> Block {
        Block {
            height: 1,
            timestamp: 1_700_000_000,
            prev_hash: GENESIS_MARKER,
            hash: [0; 32],
            nonce: 0,
            transactions: vec![Transaction::coinbase("alice")],
        }
    }

    #[test]
    fn solution_meets_target() {
        for bits in [1, 4, 8] {
            let pow = ProofOfWork::new(bits);
            let (hash, _) = pow.solve(&draft()).unwrap();
            assert!(U256::from_be_bytes(hash) < U256::ONE << (256 - bits));
        }
    }

    #[test]
    fn solution_nonce_is_minimal() {
        let pow = ProofOfWork::new(8);
        let block = draft();
        let (_, nonce) = pow.solve(&block).unwrap();
        for earlier in 0..nonce {
            let hash = pow.digest(&block, earlier);
            assert!(U256::from_be_bytes(hash) >= pow.target);
        }
    }

    #[test]
    fn search_is_deterministic() {
        let pow = ProofOfWork::new(8);
        let block = draft();
        assert_eq!(pow.solve(&block).unwrap(), pow.solve(&block).unwrap());
    }

    #[test]
    fn sealed_block_validates() {
        let pow = ProofOfWork::new(8);
        let mut block = draft();
        let (hash, nonce) = pow.solve(&block).unwrap();
        block.hash = hash;
        block.nonce = nonce;
        assert!(pow.validate(&block));

        // Any tamper invalidates the seal.
        block.timestamp += 1;
        assert!(!pow.validate(&block));
    }

    #[test]
    fn preset_cancel_flag_aborts_the_search() {
        let flag = Arc::new(AtomicBool::new(true));
        let pow = ProofOfWork::new(255).with_cancel(flag);
        match pow.solve(&draft()) {
            Err(PowError::Cancelled { attempts: 0 }) => {}
            other => panic!("expected immediate cancellation, got {other:?}"),
        }
    }

    #[test]
    fn iteration_cap_bounds_the_search() {
        // 255 leading zero bits will not be found in one attempt.
        let pow = ProofOfWork::new(255).with_iteration_cap(1);
        assert_eq!(pow.solve(&draft()), Err(PowError::CapExhausted { cap: 1 }));
    }

    #[test]
    fn trivial_difficulty_solves_almost_immediately() {
        // A 1-bit difficulty halves the space per nonce.
        let pow = ProofOfWork::new(1);
        let (_, nonce) = pow.solve(&draft()).unwrap();
        assert!(nonce < 1024);
    }
}
