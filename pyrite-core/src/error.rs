use thiserror::Error;

use crate::pow::PowError;
use crate::Hash;

/// Top-level error type for chain operations.
///
/// Storage and corruption failures are fatal for the calling operation;
/// `InsufficientFunds` and `InvalidArguments` are expected, recoverable
/// conditions a caller can react to programmatically.
#[derive(Debug, Error)]
pub enum ChainError {
    /// The underlying store could not be opened, read or written.
    #[error("storage failure: {0}")]
    Storage(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("a chain already exists in this store")]
    ChainAlreadyExists,

    #[error("no chain exists in this store")]
    ChainNotFound,

    /// The tip or a `prev_hash` link does not resolve to a stored block.
    #[error("corrupt chain: block {hash} does not resolve")]
    CorruptChain { hash: String },

    #[error("address [{address}] holds {available}, transfer requires {requested}")]
    InsufficientFunds {
        address: String,
        available: u64,
        requested: u64,
    },

    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("mining aborted: {0}")]
    Mining(#[from] PowError),
}

impl ChainError {
    /// Wrap a low-level storage error without masking its source.
    pub fn storage(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        ChainError::Storage(Box::new(err))
    }

    pub fn corrupt(hash: &Hash) -> Self {
        ChainError::CorruptChain {
            hash: hex::encode(hash),
        }
    }
}

/// Result type alias using ChainError.
pub type Result<T> = std::result::Result<T, ChainError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insufficient_funds_carries_context() {
        let err = ChainError::InsufficientFunds {
            address: "bob".into(),
            available: 4,
            requested: 100,
        };
        let message = err.to_string();
        assert!(message.contains("bob"));
        assert!(message.contains('4'));
        assert!(message.contains("100"));
    }

    #[test]
    fn corrupt_chain_names_the_missing_hash() {
        let err = ChainError::corrupt(&[0xAB; 32]);
        assert!(err.to_string().contains(&"ab".repeat(32)));
    }
}
