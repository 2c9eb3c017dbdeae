/*! Transaction building and mining orchestration.

Builds transfer transactions out of the spendable-output view and drives the
chain's append path. A mined block holds exactly the transactions handed to
it; only genesis auto-generates a coinbase.
*/

use tracing::debug;

use crate::block::Block;
use crate::error::{ChainError, Result};
use crate::ledger::{BlockStore, Chain};
use crate::transaction::{Transaction, TxInput, TxOutput};

/// Builds one transfer of `amount` from `from` to `to`.
///
/// Selection walks the spendable outputs of `from`, treating `pending` as
/// already in flight, and funds the transfer with one input per selected
/// output. Any surplus over `amount` comes back to `from` as a change
/// output; it is never destroyed.
pub fn build_transfer<S: BlockStore>(
    chain: &Chain<S>,
    from: &str,
    to: &str,
    amount: u64,
    pending: &[Transaction],
) -> Result<Transaction> {
    let (total, selection) = chain.spendable_selection(from, amount, pending)?;
    debug!(from, to, amount, total, "funding transfer");

    let mut inputs = Vec::new();
    for (tx_id, vouts) in &selection {
        for &vout in vouts {
            inputs.push(TxInput {
                tx_id: *tx_id,
                vout,
                signature: from.to_string(),
            });
        }
    }

    let mut outputs = vec![TxOutput {
        amount,
        owner: to.to_string(),
    }];
    if total > amount {
        outputs.push(TxOutput {
            amount: total - amount,
            owner: from.to_string(),
        });
    }

    Ok(Transaction::new(inputs, outputs))
}

/// Mines `transactions` into the next block and commits it.
pub fn mine<S: BlockStore>(chain: &mut Chain<S>, transactions: Vec<Transaction>) -> Result<Block> {
    chain.append(transactions)
}

/// Builds one transfer per `(from[i], to[i], amount[i])` triple and mines
/// them all into a single block.
///
/// The lists are parallel and must be non-empty, of equal length and free
/// of empty addresses (`InvalidArguments` otherwise). Earlier transfers in
/// the batch are passed as the pending set of later ones, so one output
/// cannot fund two of them.
pub fn transfer_batch<S: BlockStore>(
    chain: &mut Chain<S>,
    from: &[String],
    to: &[String],
    amounts: &[u64],
) -> Result<Block> {
    if from.is_empty() {
        return Err(ChainError::InvalidArguments(
            "at least one transfer is required".into(),
        ));
    }
    if from.len() != to.len() || from.len() != amounts.len() {
        return Err(ChainError::InvalidArguments(format!(
            "parallel lists differ in length: {} from, {} to, {} amount",
            from.len(),
            to.len(),
            amounts.len()
        )));
    }

    let mut transactions = Vec::with_capacity(from.len());
    for ((from, to), &amount) in from.iter().zip(to).zip(amounts) {
        if from.is_empty() || to.is_empty() {
            return Err(ChainError::InvalidArguments(
                "addresses must not be empty".into(),
            ));
        }
        let tx = build_transfer(chain, from, to, amount, &transactions)?;
        transactions.push(tx);
    }
    chain.append(transactions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::MemoryStore;
    use crate::pow::ProofOfWork;
    use crate::transaction::COINBASE_REWARD;

    fn new_chain() -> Chain<MemoryStore> {
        Chain::create_genesis(MemoryStore::new(), "alice", ProofOfWork::new(8)).unwrap()
    }

    #[test]
    fn transfer_pays_recipient_and_returns_change() {
        let chain = new_chain();
        let tx = build_transfer(&chain, "alice", "bob", 4, &[]).unwrap();

        assert!(!tx.is_coinbase());
        assert_eq!(tx.inputs.len(), 1);
        assert!(tx.inputs[0].authorized_by("alice"));
        assert_eq!(tx.outputs.len(), 2);
        assert_eq!(tx.outputs[0].amount, 4);
        assert!(tx.outputs[0].owned_by("bob"));
        assert_eq!(tx.outputs[1].amount, COINBASE_REWARD - 4);
        assert!(tx.outputs[1].owned_by("alice"));
    }

    #[test]
    fn exact_transfer_has_no_change_output() {
        let chain = new_chain();
        let tx = build_transfer(&chain, "alice", "bob", COINBASE_REWARD, &[]).unwrap();
        assert_eq!(tx.outputs.len(), 1);
        assert_eq!(tx.outputs[0].amount, COINBASE_REWARD);
    }

    #[test]
    fn underfunded_transfer_fails_before_mining() {
        let chain = new_chain();
        assert!(matches!(
            build_transfer(&chain, "bob", "alice", 1, &[]),
            Err(ChainError::InsufficientFunds { .. })
        ));
    }

    #[test]
    fn mined_block_holds_exactly_the_given_transactions() {
        let mut chain = new_chain();
        let tx = build_transfer(&chain, "alice", "bob", 4, &[]).unwrap();
        let block = mine(&mut chain, vec![tx.clone()]).unwrap();
        assert_eq!(block.transactions, vec![tx]);
    }

    #[test]
    fn batch_chains_transfers_through_the_pending_set() {
        let mut chain = new_chain();
        let block = transfer_batch(
            &mut chain,
            &["alice".into(), "alice".into()],
            &["bob".into(), "carol".into()],
            &[3, 2],
        )
        .unwrap();

        assert_eq!(block.transactions.len(), 2);
        assert_eq!(chain.balance("alice").unwrap(), COINBASE_REWARD - 5);
        assert_eq!(chain.balance("bob").unwrap(), 3);
        assert_eq!(chain.balance("carol").unwrap(), 2);
    }

    #[test]
    fn batch_rejects_mismatched_lists() {
        let mut chain = new_chain();
        let err = transfer_batch(
            &mut chain,
            &["alice".into()],
            &["bob".into(), "carol".into()],
            &[1],
        )
        .unwrap_err();
        assert!(matches!(err, ChainError::InvalidArguments(_)));
    }

    #[test]
    fn batch_rejects_empty_lists_and_empty_addresses() {
        let mut chain = new_chain();
        assert!(matches!(
            transfer_batch(&mut chain, &[], &[], &[]),
            Err(ChainError::InvalidArguments(_))
        ));
        assert!(matches!(
            transfer_batch(&mut chain, &["".into()], &["bob".into()], &[1]),
            Err(ChainError::InvalidArguments(_))
        ));
    }

    #[test]
    fn failed_batch_appends_no_block() {
        let mut chain = new_chain();
        let tip = chain.tip_hash();
        let err = transfer_batch(
            &mut chain,
            &["alice".into(), "alice".into()],
            &["bob".into(), "carol".into()],
            &[COINBASE_REWARD, 1],
        )
        .unwrap_err();
        assert!(matches!(err, ChainError::InsufficientFunds { .. }));
        assert_eq!(chain.tip_hash(), tip);
    }
}
