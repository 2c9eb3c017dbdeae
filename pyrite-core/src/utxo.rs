/*! Unspent-output resolution.

Nothing here is persisted: the spendable view of an address is recomputed by
walking the chain and cross-referencing an in-flight transaction set. The
result order (pending-batch outputs first, then committed blocks from tip to
genesis, transactions and outputs in stored order) drives output selection,
so it is fixed and deterministic.
*/

use std::collections::{BTreeMap, HashMap};

use crate::error::{ChainError, Result};
use crate::ledger::{BlockStore, Chain};
use crate::transaction::{Transaction, TxOutput};
use crate::Hash;

/// A spendable transaction output together with its location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Utxo {
    pub tx_id: Hash,
    pub vout: i32,
    pub output: TxOutput,
}

/// Outputs already consumed, indexed by the transaction that created them.
pub type SpentMap = HashMap<Hash, Vec<i32>>;

/// Outputs chosen to fund a transfer, in deterministic (sorted) order.
pub type Selection = BTreeMap<Hash, Vec<i32>>;

impl<S: BlockStore> Chain<S> {
    /// The committed-chain spent set for `address`: every `(tx_id, vout)`
    /// referenced by an input of `address` anywhere in the chain.
    ///
    /// Coinbase transactions have no real input and never mark anything
    /// spent.
    pub fn spent_outputs(&self, address: &str) -> Result<SpentMap> {
        let mut spent = SpentMap::new();
        for block in self.iter() {
            let block = block?;
            for tx in &block.transactions {
                record_spent(&mut spent, tx, address);
            }
        }
        Ok(spent)
    }

    /// All outputs payable to `address` and not referenced by any input,
    /// committed or pending.
    ///
    /// `pending` is the in-flight transaction set (e.g. the batch being
    /// assembled into the current block). Its inputs are folded into the
    /// spent set so an output consumed by one pending transaction is never
    /// offered to the next, and its outputs are offered first.
    pub fn spendable_outputs(&self, address: &str, pending: &[Transaction]) -> Result<Vec<Utxo>> {
        let mut spent = self.spent_outputs(address)?;
        for tx in pending {
            record_spent(&mut spent, tx, address);
        }

        let mut utxos = Vec::new();

        // In-flight outputs first.
        for tx in pending {
            collect_unspent(&mut utxos, tx, address, &spent);
        }

        // Then the committed chain, tip to genesis.
        for block in self.iter() {
            let block = block?;
            for tx in &block.transactions {
                collect_unspent(&mut utxos, tx, address, &spent);
            }
        }

        Ok(utxos)
    }

    /// Walks the spendable outputs in their defined order, accumulating
    /// value until `amount` is covered.
    ///
    /// Fails with `InsufficientFunds`, carrying the address, the total
    /// actually available and the requested amount, when the full scan
    /// cannot cover `amount`.
    pub fn spendable_selection(
        &self,
        address: &str,
        amount: u64,
        pending: &[Transaction],
    ) -> Result<(u64, Selection)> {
        let mut selected = Selection::new();
        let mut total = 0u64;
        for utxo in self.spendable_outputs(address, pending)? {
            total += utxo.output.amount;
            selected.entry(utxo.tx_id).or_default().push(utxo.vout);
            if total >= amount {
                return Ok((total, selected));
            }
        }
        Err(ChainError::InsufficientFunds {
            address: address.to_string(),
            available: total,
            requested: amount,
        })
    }

    /// Sum of all spendable outputs owned by `address`.
    pub fn balance(&self, address: &str) -> Result<u64> {
        Ok(self
            .spendable_outputs(address, &[])?
            .iter()
            .map(|utxo| utxo.output.amount)
            .sum())
    }
}

fn record_spent(spent: &mut SpentMap, tx: &Transaction, address: &str) {
    if tx.is_coinbase() {
        return;
    }
    for input in &tx.inputs {
        if input.authorized_by(address) {
            spent.entry(input.tx_id).or_default().push(input.vout);
        }
    }
}

fn collect_unspent(utxos: &mut Vec<Utxo>, tx: &Transaction, address: &str, spent: &SpentMap) {
    for (index, output) in tx.outputs.iter().enumerate() {
        let vout = index as i32;
        if output.owned_by(address) && !is_spent(spent, &tx.id, vout) {
            utxos.push(Utxo {
                tx_id: tx.id,
                vout,
                output: output.clone(),
            });
        }
    }
}

fn is_spent(spent: &SpentMap, tx_id: &Hash, vout: i32) -> bool {
    spent
        .get(tx_id)
        .map(|vouts| vouts.contains(&vout))
        .unwrap_or(false)
}
