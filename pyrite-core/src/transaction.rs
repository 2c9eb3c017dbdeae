use std::fmt;

use blake2::{Blake2s256, Digest};
use serde::{Deserialize, Serialize};

use crate::{int_be_bytes, is_genesis_marker, Hash, GENESIS_MARKER};

/// Value minted by the genesis coinbase transaction.
pub const COINBASE_REWARD: u64 = 10;

/// Authorization tag carried by the synthetic coinbase input.
pub const COINBASE_TAG: &str = "block reward";

/// Output-index sentinel marking a coinbase input.
pub const COINBASE_VOUT: i32 = -1;

/// A value-transfer record. Immutable once built; `id` is the content hash
/// of the encoded inputs and outputs (the id itself is not hashed).
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Hash,
    pub inputs: Vec<TxInput>,
    pub outputs: Vec<TxOutput>,
}

/// A reference to a previous output, plus the authorization tag of the
/// spender. The tag is a plain string standing in for a real signature.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxInput {
    pub tx_id: Hash,
    pub vout: i32,
    pub signature: String,
}

/// An amount payable to an opaque string address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOutput {
    pub amount: u64,
    pub owner: String,
}

impl TxInput {
    /// Whether this input was authorized by `address`.
    pub fn authorized_by(&self, address: &str) -> bool {
        self.signature == address
    }
}

impl TxOutput {
    /// Whether this output is payable to `address`.
    pub fn owned_by(&self, address: &str) -> bool {
        self.owner == address
    }
}

impl fmt::Debug for TxInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TxInput")
            .field("tx_id", &hex::encode(self.tx_id))
            .field("vout", &self.vout)
            .field("signature", &self.signature)
            .finish()
    }
}

impl fmt::Debug for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transaction")
            .field("id", &hex::encode(self.id))
            .field("inputs", &self.inputs)
            .field("outputs", &self.outputs)
            .finish()
    }
}

impl Transaction {
    /// Creates a new transaction, computing its id from the finished
    /// input and output lists.
    pub fn new(inputs: Vec<TxInput>, outputs: Vec<TxOutput>) -> Self {
        let id = Self::compute_id(&inputs, &outputs);
        Self {
            id,
            inputs,
            outputs,
        }
    }

    /// Creates the reward transaction minting `COINBASE_REWARD` to `address`.
    ///
    /// The single input references no output (zero hash, vout -1) and its
    /// tag is never matched against an address during resolution.
    pub fn coinbase(address: &str) -> Self {
        let input = TxInput {
            tx_id: GENESIS_MARKER,
            vout: COINBASE_VOUT,
            signature: COINBASE_TAG.to_string(),
        };
        let output = TxOutput {
            amount: COINBASE_REWARD,
            owner: address.to_string(),
        };
        Self::new(vec![input], vec![output])
    }

    /// A transaction is a coinbase iff it has exactly one input referencing
    /// no previous output.
    pub fn is_coinbase(&self) -> bool {
        self.inputs.len() == 1
            && self.inputs[0].vout == COINBASE_VOUT
            && is_genesis_marker(&self.inputs[0].tx_id)
    }

    fn compute_id(inputs: &[TxInput], outputs: &[TxOutput]) -> Hash {
        let mut hasher = Blake2s256::new();
        hasher.update(int_be_bytes(inputs.len() as i64));
        for input in inputs {
            hasher.update(input.tx_id);
            hasher.update(int_be_bytes(input.vout as i64));
            hasher.update(input.signature.as_bytes());
        }
        hasher.update(int_be_bytes(outputs.len() as i64));
        for output in outputs {
            hasher.update(int_be_bytes(output.amount as i64));
            hasher.update(output.owner.as_bytes());
        }
        hasher.finalize().into()
    }
}
