//! Wallet-local pool of submitted-but-unconfirmed transactions.
//!
//! Every transaction the wallet submits is saved here before network
//! acceptance is known. The pool keeps a spent-input index for O(1)
//! conflict detection and exposes the set of inputs locked by pending
//! transactions, which the input-selection policy consults to avoid
//! double-spending them.

use std::collections::{BTreeSet, HashMap, HashSet};

use tracing::warn;

use beck_core::types::{Tx, TxAux, TxId, TxIn};

/// Pool of the wallet's own unconfirmed transactions.
#[derive(Default)]
pub struct PendingPool {
    /// Primary storage: txid → transaction.
    entries: HashMap<TxId, TxAux>,
    /// Spent input → txid of the pending transaction that spends it.
    by_input: HashMap<TxIn, TxId>,
}

impl PendingPool {
    /// Create an empty pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Save a submitted transaction.
    ///
    /// At most once per hash: a transaction already present is left
    /// untouched and `false` is returned. A new transaction evicts any
    /// pending entries it conflicts with (the newer spend of an input
    /// replaces the older one).
    pub fn save_tx(&mut self, txid: TxId, tx: TxAux) -> bool {
        if self.entries.contains_key(&txid) {
            return false;
        }
        for conflicting in self.conflicting_txids(&tx.tx) {
            warn!(replaced = %conflicting, replacement = %txid, "pending transaction replaced");
            self.remove(&conflicting);
        }
        for input in &tx.tx.inputs {
            self.by_input.insert(input.clone(), txid);
        }
        self.entries.insert(txid, tx);
        true
    }

    /// Remove a transaction (confirmed, reverted, or abandoned).
    pub fn remove(&mut self, txid: &TxId) -> Option<TxAux> {
        let entry = self.entries.remove(txid)?;
        for input in &entry.tx.inputs {
            self.by_input.remove(input);
        }
        Some(entry)
    }

    /// Whether a transaction with the given id is pending.
    pub fn contains(&self, txid: &TxId) -> bool {
        self.entries.contains_key(txid)
    }

    /// Look up a pending transaction.
    pub fn get(&self, txid: &TxId) -> Option<&TxAux> {
        self.entries.get(txid)
    }

    /// Number of pending transactions.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the pool is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The inputs currently locked by pending transactions.
    pub fn locked_inputs(&self) -> BTreeSet<TxIn> {
        self.by_input.keys().cloned().collect()
    }

    /// Txids of pending entries whose inputs overlap with `tx`,
    /// deduplicated.
    pub fn conflicting_txids(&self, tx: &Tx) -> Vec<TxId> {
        let mut seen = HashSet::new();
        tx.inputs
            .iter()
            .filter_map(|input| self.by_input.get(input).copied())
            .filter(|txid| seen.insert(*txid))
            .collect()
    }
}
