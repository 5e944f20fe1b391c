//! Composable deltas over wallet state.
//!
//! [`WalletModifier`] is a plain value accumulating the effect of applying
//! or rolling back blocks: address insertions, history changes, used and
//! change address pairs, UTXO changes, and pending-transaction updates.
//! Modifiers compose associatively with the empty modifier as identity;
//! the whole accumulated value is committed to the wallet store in one
//! atomic write.
//!
//! Composition semantics per container:
//! - maps: for the same key the later operation wins; a deletion shadows a
//!   pending insertion by cancelling it, and an insertion cancels a
//!   pending deletion, so a rollback delta is the exact inverse of the
//!   apply delta it reverts;
//! - sets: insertions union; removing an element cancels a pending
//!   insertion of it, otherwise records the removal;
//! - address lists additionally preserve insertion order.
//!
//! The cancellation rule assumes a key is never deleted and then
//! re-inserted with a value other than the one the store already holds.
//! Block processing satisfies this: an outpoint is created once and spent
//! once, and a rollback restores exactly the value its apply deleted.

use std::collections::{BTreeMap, BTreeSet};

use beck_core::slotting::{SlotId, Timestamp};
use beck_core::types::{HeaderHash, TxId, TxIn, TxOut};

use crate::creds::AddressMeta;
use crate::extract::HistoryEntry;

/// A delta over a map: per-key insertion or deletion, later wins.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MapModifier<K: Ord, V> {
    entries: BTreeMap<K, Option<V>>,
}

impl<K: Ord, V> Default for MapModifier<K, V> {
    fn default() -> Self {
        Self { entries: BTreeMap::new() }
    }
}

impl<K: Ord + Clone, V: Clone> MapModifier<K, V> {
    /// The empty delta.
    pub fn new() -> Self {
        Self { entries: BTreeMap::new() }
    }

    /// Whether the delta contains no operations.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Record an insertion, cancelling a pending deletion of the key.
    pub fn insert(&mut self, key: K, value: V) {
        match self.entries.get(&key) {
            Some(None) => {
                self.entries.remove(&key);
            }
            _ => {
                self.entries.insert(key, Some(value));
            }
        }
    }

    /// Record a deletion, cancelling a pending insertion of the key.
    pub fn delete(&mut self, key: K) {
        match self.entries.get(&key) {
            Some(Some(_)) => {
                self.entries.remove(&key);
            }
            _ => {
                self.entries.insert(key, None);
            }
        }
    }

    /// The pending operation for a key, if any: `Some(Some(_))` insertion,
    /// `Some(None)` deletion.
    pub fn get(&self, key: &K) -> Option<&Option<V>> {
        self.entries.get(key)
    }

    /// Iterate pending insertions.
    pub fn insertions(&self) -> impl Iterator<Item = (&K, &V)> {
        self.entries
            .iter()
            .filter_map(|(k, v)| v.as_ref().map(|v| (k, v)))
    }

    /// Iterate pending deletions.
    pub fn deletions(&self) -> impl Iterator<Item = &K> {
        self.entries
            .iter()
            .filter_map(|(k, v)| v.is_none().then_some(k))
    }

    /// Compose with a later delta: its operations win per key, with the
    /// same cancellation rules as [`insert`](Self::insert) and
    /// [`delete`](Self::delete).
    pub fn merge(&mut self, later: Self) {
        for (key, op) in later.entries {
            match op {
                Some(value) => self.insert(key, value),
                None => self.delete(key),
            }
        }
    }

    /// Apply the delta to a concrete map.
    pub fn apply_to(&self, target: &mut BTreeMap<K, V>) {
        for (key, op) in &self.entries {
            match op {
                Some(value) => {
                    target.insert(key.clone(), value.clone());
                }
                None => {
                    target.remove(key);
                }
            }
        }
    }
}

/// A delta over a set: unioned insertions and removals.
///
/// Removing an element that this delta itself inserted cancels the
/// insertion instead of recording a removal.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SetModifier<T: Ord> {
    added: BTreeSet<T>,
    removed: BTreeSet<T>,
}

impl<T: Ord> Default for SetModifier<T> {
    fn default() -> Self {
        Self { added: BTreeSet::new(), removed: BTreeSet::new() }
    }
}

impl<T: Ord + Clone> SetModifier<T> {
    /// The empty delta.
    pub fn new() -> Self {
        Self { added: BTreeSet::new(), removed: BTreeSet::new() }
    }

    /// Whether the delta contains no operations.
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }

    /// Record an insertion.
    pub fn insert(&mut self, value: T) {
        self.removed.remove(&value);
        self.added.insert(value);
    }

    /// Record a removal.
    pub fn remove(&mut self, value: T) {
        if !self.added.remove(&value) {
            self.removed.insert(value);
        }
    }

    /// The pending insertions.
    pub fn additions(&self) -> &BTreeSet<T> {
        &self.added
    }

    /// The pending removals.
    pub fn removals(&self) -> &BTreeSet<T> {
        &self.removed
    }

    /// Compose with a later delta.
    pub fn merge(&mut self, later: Self) {
        for value in later.removed {
            self.remove(value);
        }
        for value in later.added {
            self.insert(value);
        }
    }

    /// Apply the delta to a concrete set.
    pub fn apply_to(&self, target: &mut BTreeSet<T>) {
        for value in &self.removed {
            target.remove(value);
        }
        for value in &self.added {
            target.insert(value.clone());
        }
    }
}

/// A set delta that additionally preserves insertion order.
///
/// Used for the owned-address list, where discovery order is part of the
/// wallet state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SeqModifier<T: Ord> {
    order: Vec<T>,
    added: BTreeSet<T>,
    removed: BTreeSet<T>,
}

impl<T: Ord> Default for SeqModifier<T> {
    fn default() -> Self {
        Self { order: Vec::new(), added: BTreeSet::new(), removed: BTreeSet::new() }
    }
}

impl<T: Ord + Clone> SeqModifier<T> {
    /// The empty delta.
    pub fn new() -> Self {
        Self { order: Vec::new(), added: BTreeSet::new(), removed: BTreeSet::new() }
    }

    /// Whether the delta contains no operations.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty() && self.removed.is_empty()
    }

    /// Record an insertion; repeats keep their first position.
    pub fn insert(&mut self, value: T) {
        self.removed.remove(&value);
        if self.added.insert(value.clone()) {
            self.order.push(value);
        }
    }

    /// Record a removal, cancelling a pending insertion of the same value.
    pub fn remove(&mut self, value: T) {
        if self.added.remove(&value) {
            self.order.retain(|v| v != &value);
        } else {
            self.removed.insert(value);
        }
    }

    /// Pending insertions in insertion order.
    pub fn items(&self) -> &[T] {
        &self.order
    }

    /// Pending removals.
    pub fn removals(&self) -> &BTreeSet<T> {
        &self.removed
    }

    /// Compose with a later delta.
    pub fn merge(&mut self, later: Self) {
        for value in later.removed {
            self.remove(value);
        }
        for value in later.order {
            self.insert(value);
        }
    }
}

/// Block context attached to a pending transaction when it is confirmed.
#[derive(
    Clone, Debug, PartialEq, Eq,
    serde::Serialize, serde::Deserialize, bincode::Encode, bincode::Decode,
)]
pub struct PtxBlockInfo {
    /// Chain difficulty of the confirming block.
    pub difficulty: u64,
    /// Wall-clock timestamp of the confirming slot, when computable.
    pub timestamp: Option<Timestamp>,
    /// Hash of the confirming header.
    pub header: HeaderHash,
}

/// One pending-transaction candidate update.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PtxUpdate {
    /// The transaction was seen in a block.
    Confirmed(PtxBlockInfo),
    /// The confirming block was rolled back; carries the history entry and
    /// the slot at which the rollback was observed.
    Reverted {
        /// History entry of the reverted transaction.
        entry: HistoryEntry,
        /// Current slot when the rollback ran.
        slot: SlotId,
    },
}

/// The accumulated delta over one wallet's state.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct WalletModifier {
    /// Owned addresses discovered (or un-discovered on rollback).
    pub addresses: SeqModifier<AddressMeta>,
    /// History entries keyed by transaction id.
    pub history: MapModifier<TxId, HistoryEntry>,
    /// Addresses observed on chain, keyed with the observing header.
    pub used: SetModifier<(beck_core::address::AddressId, HeaderHash)>,
    /// Wallet-chosen change addresses, keyed with the observing header.
    pub change: SetModifier<(beck_core::address::AddressId, HeaderHash)>,
    /// UTXO delta for this wallet.
    pub utxo: MapModifier<TxIn, TxOut>,
    /// Pending-transaction candidate updates keyed by transaction id.
    pub ptx_candidates: MapModifier<TxId, PtxUpdate>,
}

impl WalletModifier {
    /// The empty modifier (composition identity).
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether nothing has been accumulated.
    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
            && self.history.is_empty()
            && self.used.is_empty()
            && self.change.is_empty()
            && self.utxo.is_empty()
            && self.ptx_candidates.is_empty()
    }

    /// Compose with a later modifier, field by field.
    pub fn merge(&mut self, later: Self) {
        self.addresses.merge(later.addresses);
        self.history.merge(later.history);
        self.used.merge(later.used);
        self.change.merge(later.change);
        self.utxo.merge(later.utxo);
        self.ptx_candidates.merge(later.ptx_candidates);
    }

    /// The modifier with pending-transaction updates projected out.
    ///
    /// Apply followed by rollback cancels every field except
    /// `ptx_candidates`, whose rollback entry is a distinct delete token
    /// by design; equality checks of round trips compare this projection.
    pub fn without_ptx(mut self) -> Self {
        self.ptx_candidates = MapModifier::new();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // --- MapModifier ---

    #[test]
    fn map_later_insert_wins() {
        let mut m: MapModifier<u32, &str> = MapModifier::new();
        m.insert(1, "a");
        let mut later = MapModifier::new();
        later.insert(1, "b");
        m.merge(later);
        assert_eq!(m.get(&1), Some(&Some("b")));
    }

    #[test]
    fn map_deletion_cancels_pending_insertion() {
        let mut m: MapModifier<u32, &str> = MapModifier::new();
        m.insert(1, "a");
        let mut later = MapModifier::new();
        later.delete(1);
        m.merge(later);
        assert!(m.is_empty());
    }

    #[test]
    fn map_deletion_of_foreign_key_is_recorded() {
        let mut m: MapModifier<u32, &str> = MapModifier::new();
        m.delete(1);
        assert_eq!(m.get(&1), Some(&None));
        assert_eq!(m.insertions().count(), 0);
        assert_eq!(m.deletions().count(), 1);
    }

    #[test]
    fn map_insertion_cancels_pending_deletion() {
        let mut m: MapModifier<u32, &str> = MapModifier::new();
        m.delete(1);
        m.insert(1, "restored");
        assert!(m.is_empty());
    }

    #[test]
    fn map_apply_to_inserts_and_removes() {
        let mut target = BTreeMap::from([(1u32, "x"), (2, "y")]);
        let mut m = MapModifier::new();
        m.insert(3, "z");
        m.delete(1);
        m.apply_to(&mut target);
        assert_eq!(target, BTreeMap::from([(2, "y"), (3, "z")]));
    }

    #[test]
    fn map_merge_equals_sequential_operations() {
        // Composing per-block deltas and then applying must match applying
        // the operations one by one.
        let mut combined: MapModifier<u32, u32> = MapModifier::new();
        combined.insert(1, 10);
        combined.insert(2, 20);
        let mut later = MapModifier::new();
        later.delete(1);
        later.insert(3, 30);
        combined.merge(later);

        let mut sequential: MapModifier<u32, u32> = MapModifier::new();
        sequential.insert(1, 10);
        sequential.insert(2, 20);
        sequential.delete(1);
        sequential.insert(3, 30);

        assert_eq!(combined, sequential);

        let mut target = BTreeMap::new();
        combined.apply_to(&mut target);
        assert_eq!(target, BTreeMap::from([(2, 20), (3, 30)]));
    }

    // --- SetModifier ---

    #[test]
    fn set_insert_then_remove_cancels() {
        let mut m: SetModifier<u32> = SetModifier::new();
        m.insert(1);
        m.remove(1);
        assert!(m.is_empty());
    }

    #[test]
    fn set_remove_of_foreign_element_is_recorded() {
        let mut m: SetModifier<u32> = SetModifier::new();
        m.remove(1);
        assert_eq!(m.removals().len(), 1);
        let mut target = BTreeSet::from([1u32, 2]);
        m.apply_to(&mut target);
        assert_eq!(target, BTreeSet::from([2]));
    }

    #[test]
    fn set_remove_then_insert_reinstates() {
        let mut m: SetModifier<u32> = SetModifier::new();
        m.remove(1);
        m.insert(1);
        assert_eq!(m.additions().len(), 1);
        assert!(m.removals().is_empty());
    }

    #[test]
    fn set_merge_applies_later_operations() {
        let mut apply: SetModifier<u32> = SetModifier::new();
        apply.insert(1);
        apply.insert(2);
        let mut rollback = SetModifier::new();
        rollback.remove(1);
        rollback.remove(2);
        apply.merge(rollback);
        assert!(apply.is_empty());
    }

    // --- SeqModifier ---

    #[test]
    fn seq_preserves_insertion_order() {
        let mut m: SeqModifier<&str> = SeqModifier::new();
        m.insert("b");
        m.insert("a");
        m.insert("b");
        assert_eq!(m.items(), &["b", "a"]);
    }

    #[test]
    fn seq_remove_cancels_pending_insert() {
        let mut m: SeqModifier<&str> = SeqModifier::new();
        m.insert("a");
        m.insert("b");
        m.remove("a");
        assert_eq!(m.items(), &["b"]);
        assert!(m.removals().is_empty());
    }

    #[test]
    fn seq_merge_keeps_order_across_deltas() {
        let mut first: SeqModifier<&str> = SeqModifier::new();
        first.insert("a");
        let mut second = SeqModifier::new();
        second.insert("c");
        second.insert("b");
        first.merge(second);
        assert_eq!(first.items(), &["a", "c", "b"]);
    }

    // --- WalletModifier ---

    #[test]
    fn empty_is_identity_for_merge() {
        let mut m = WalletModifier::new();
        m.history.insert(beck_core::types::Hash256([1; 32]), sample_entry());
        let snapshot = m.clone();
        m.merge(WalletModifier::new());
        assert_eq!(m, snapshot);

        let mut empty = WalletModifier::new();
        empty.merge(snapshot.clone());
        assert_eq!(empty, snapshot);
    }

    #[test]
    fn without_ptx_clears_only_candidates() {
        let mut m = WalletModifier::new();
        m.history.insert(beck_core::types::Hash256([1; 32]), sample_entry());
        m.ptx_candidates.insert(
            beck_core::types::Hash256([1; 32]),
            PtxUpdate::Confirmed(PtxBlockInfo {
                difficulty: 1,
                timestamp: None,
                header: beck_core::types::Hash256([2; 32]),
            }),
        );
        let projected = m.clone().without_ptx();
        assert!(projected.ptx_candidates.is_empty());
        assert!(!projected.history.is_empty());
    }

    fn sample_entry() -> HistoryEntry {
        use crate::extract::TxDirection;
        use beck_core::types::Coin;
        HistoryEntry {
            txid: beck_core::types::Hash256([1; 32]),
            direction: TxDirection::Incoming,
            spent: Coin::ZERO,
            received: Coin::new(5).unwrap(),
            total_output: Coin::new(5).unwrap(),
            difficulty: None,
            timestamp: None,
        }
    }
}
