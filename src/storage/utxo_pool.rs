use crate::core::{Transaction, UnspentOutput};
use crate::error::{BlockchainError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Every unspent output the ledger knows about, keyed by output id.
///
/// Iteration is in ascending id order, which makes covering selection
/// deterministic. The pool is a plain value; the ledger lock guards it.
#[derive(
    Debug,
    Clone,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    bincode::Encode,
    bincode::Decode,
)]
pub struct UtxoPool {
    outputs: BTreeMap<String, UnspentOutput>,
}

impl UtxoPool {
    pub fn new() -> UtxoPool {
        UtxoPool::default()
    }

    /// Upsert by id
    pub fn insert_all(&mut self, outputs: &[UnspentOutput]) {
        for output in outputs {
            self.outputs
                .insert(output.get_id().to_string(), output.clone());
        }
    }

    pub fn remove_all(&mut self, outputs: &[UnspentOutput]) {
        for output in outputs {
            self.outputs.remove(output.get_id());
        }
    }

    /// Snapshot of the outputs matching `predicate`
    pub fn select<P>(&self, predicate: P) -> UtxoPool
    where
        P: Fn(&UnspentOutput) -> bool,
    {
        UtxoPool {
            outputs: self
                .outputs
                .iter()
                .filter(|(_, output)| predicate(output))
                .map(|(id, output)| (id.clone(), output.clone()))
                .collect(),
        }
    }

    /// Sum of every amount in the pool, saturating at `u64::MAX`
    pub fn total_value(&self) -> u64 {
        self.outputs
            .values()
            .fold(0u64, |total, output| total.saturating_add(output.get_amount()))
    }

    /// First-fit selection in id order. Takes outputs until the running total
    /// is strictly greater than `amount`, or every output if it never is.
    /// May select more than needed; the surplus becomes change.
    pub fn select_covering(&self, amount: u64) -> Vec<UnspentOutput> {
        let mut selected = vec![];
        let mut total: u64 = 0;
        for output in self.outputs.values() {
            selected.push(output.clone());
            total = total.saturating_add(output.get_amount());
            if total > amount {
                break;
            }
        }
        selected
    }

    /// Rebuild a pool from recorded transactions, oldest first. Fails when a
    /// transaction spends an output that was not unspent at that point.
    pub fn replay<'a, I>(transactions: I) -> Result<UtxoPool>
    where
        I: IntoIterator<Item = &'a Transaction>,
    {
        let mut pool = UtxoPool::new();
        for transaction in transactions {
            if let Some(spent) = transaction
                .get_inputs()
                .iter()
                .find(|input| pool.get(input.get_id()) != Some(*input))
            {
                return Err(BlockchainError::InvalidBlock(format!(
                    "Transaction {} spends unavailable output {}",
                    transaction.get_id(),
                    spent.get_id()
                )));
            }
            pool.remove_all(transaction.get_inputs());
            pool.insert_all(transaction.get_outputs());
        }
        Ok(pool)
    }

    pub fn balance_of(&self, address: &str) -> u64 {
        self.select(|output| output.is_owned_by(address))
            .total_value()
    }

    pub fn outputs_owned_by(&self, address: &str) -> Vec<UnspentOutput> {
        self.outputs
            .values()
            .filter(|output| output.is_owned_by(address))
            .cloned()
            .collect()
    }

    pub fn get(&self, id: &str) -> Option<&UnspentOutput> {
        self.outputs.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.outputs.contains_key(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &UnspentOutput> {
        self.outputs.values()
    }

    pub fn len(&self) -> usize {
        self.outputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }
}
