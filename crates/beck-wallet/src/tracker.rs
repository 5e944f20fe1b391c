//! Incremental wallet-state modification under block apply and rollback.
//!
//! Each transaction in a block is folded into a [`WalletModifier`] by
//! [`apply_tx_to_modifier`]; [`rollback_tx_from_modifier`] is its exact
//! inverse, so rolling back a block erases precisely what applying it
//! accumulated. The change-address heuristic ([`eval_change`]) runs
//! identically in both directions.

use std::collections::BTreeSet;

use beck_core::address::AddressId;
use beck_core::slotting::{SlotId, Timestamp};
use beck_core::types::{BlockHeader, HeaderHash, OutPoint, TxAux, TxIn, TxUndo};

use crate::creds::{AddressMeta, DecryptionCredentials};
use crate::extract::extract_tx;
use crate::modifier::{PtxBlockInfo, PtxUpdate, WalletModifier};

/// Block context supplied by the sync engine for each header.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct BlockInfo {
    /// Chain difficulty of the block, when known.
    pub difficulty: Option<u64>,
    /// Wall-clock timestamp of the block's slot, when computable.
    pub timestamp: Option<Timestamp>,
    /// Context recorded for pending-transaction confirmation, when the
    /// caller wants candidates tracked.
    pub ptx: Option<PtxBlockInfo>,
}

/// A transaction with its undo data and containing header, as fed to the
/// batch operations.
pub type TrackedTx = (TxAux, TxUndo, BlockHeader);

/// Materialize the set of addresses observed on chain: the stored pairs
/// plus the in-flight modifier's insertions, minus its removals.
///
/// Correctness only requires set equality with this materialized form; an
/// implementation is free to keep it incrementally.
pub fn all_used(
    db_used: &[(AddressId, HeaderHash)],
    modifier: &WalletModifier,
) -> BTreeSet<AddressId> {
    let mut set: BTreeSet<AddressId> = db_used
        .iter()
        .filter(|pair| !modifier.used.removals().contains(pair))
        .map(|(cid, _)| *cid)
        .collect();
    set.extend(modifier.used.additions().iter().map(|(cid, _)| *cid));
    set
}

/// Decide which own outputs of a transaction are change.
///
/// Rules, in order:
/// 1. no own inputs: incoming transaction, no change;
/// 2. candidates are the own outputs whose account matches the first own
///    input's account;
/// 3. of those, only addresses not yet observed on chain qualify;
/// 4. a full self-transfer whose every own output qualifies marks none of
///    them (the heuristic cannot tell payment from change there);
/// 5. otherwise all qualifying candidates are change.
pub fn eval_change(
    all_used: &BTreeSet<AddressId>,
    own_input_metas: &[AddressMeta],
    own_output_metas: &[AddressMeta],
    all_outputs_ours: bool,
) -> Vec<AddressId> {
    let Some(first_input) = own_input_metas.first() else {
        return Vec::new();
    };
    let src_account = first_input.account_ref();

    let potential: Vec<AddressId> = own_output_metas
        .iter()
        .filter(|meta| meta.account_ref() == src_account)
        .map(|meta| meta.address_id)
        .filter(|cid| !all_used.contains(cid))
        .collect();

    let own_output_ids: BTreeSet<AddressId> =
        own_output_metas.iter().map(|meta| meta.address_id).collect();
    let potential_set: BTreeSet<AddressId> = potential.iter().copied().collect();
    if all_outputs_ours && potential_set == own_output_ids {
        return Vec::new();
    }
    potential
}

/// Fold one applied transaction into the modifier.
///
/// `db_used` is the stored used-address snapshot for the wallet; the
/// change heuristic sees it combined with the modifier as passed in,
/// before this transaction's own insertions.
pub fn apply_tx_to_modifier(
    creds: &DecryptionCredentials,
    db_used: &[(AddressId, HeaderHash)],
    info: &BlockInfo,
    mut modifier: WalletModifier,
    tx_aux: &TxAux,
    undo: &TxUndo,
    header: &BlockHeader,
) -> WalletModifier {
    let txid = tx_aux.tx.txid();
    let view = extract_tx(creds, &tx_aux.tx, txid, undo, info.difficulty, info.timestamp);
    let header_hash = header.hash();

    // The change heuristic must not see this transaction's own output
    // addresses as already used.
    let used_before = all_used(db_used, &modifier);

    for ((input, _), _) in &view.own_inputs {
        modifier.utxo.delete(input.clone());
    }
    for ((index, out), _) in &view.own_outputs {
        modifier
            .utxo
            .insert(TxIn::Utxo(OutPoint { txid, index: *index }), out.clone());
    }

    for cid in observed_addresses(tx_aux) {
        modifier.used.insert((cid, header_hash));
    }

    let change = eval_change(
        &used_before,
        &view.own_input_metas(),
        &view.own_output_metas(),
        view.own_outputs.len() == tx_aux.tx.outputs.len(),
    );
    for cid in dedup(change) {
        modifier.change.insert((cid, header_hash));
    }

    if view.is_interesting() {
        modifier.history.insert(txid, view.entry.clone());
    }

    if let Some(ptx) = &info.ptx {
        modifier.ptx_candidates.insert(txid, PtxUpdate::Confirmed(ptx.clone()));
    }

    for meta in dedup(view.own_output_metas()) {
        modifier.addresses.insert(meta);
    }

    modifier
}

/// Fold one rolled-back transaction into the modifier; the inverse of
/// [`apply_tx_to_modifier`].
///
/// The used pairs are removed before the change heuristic runs so it sees
/// the same observed-address set it saw at apply time. `current_slot` tags
/// the pending-candidate delete token.
pub fn rollback_tx_from_modifier(
    creds: &DecryptionCredentials,
    db_used: &[(AddressId, HeaderHash)],
    current_slot: SlotId,
    info: &BlockInfo,
    mut modifier: WalletModifier,
    tx_aux: &TxAux,
    undo: &TxUndo,
    header: &BlockHeader,
) -> WalletModifier {
    let txid = tx_aux.tx.txid();
    let view = extract_tx(creds, &tx_aux.tx, txid, undo, info.difficulty, info.timestamp);
    let header_hash = header.hash();

    for cid in observed_addresses(tx_aux) {
        modifier.used.remove((cid, header_hash));
    }

    let used_now = all_used(db_used, &modifier);
    let change = eval_change(
        &used_now,
        &view.own_input_metas(),
        &view.own_output_metas(),
        view.own_outputs.len() == tx_aux.tx.outputs.len(),
    );
    for cid in dedup(change) {
        modifier.change.remove((cid, header_hash));
    }

    for ((input, out), _) in &view.own_inputs {
        modifier.utxo.insert(input.clone(), out.clone());
    }
    for ((index, _), _) in &view.own_outputs {
        modifier.utxo.delete(TxIn::Utxo(OutPoint { txid, index: *index }));
    }

    if view.is_interesting() {
        modifier.history.delete(txid);
    }

    modifier.ptx_candidates.insert(
        txid,
        PtxUpdate::Reverted { entry: view.entry.clone(), slot: current_slot },
    );

    for meta in dedup(view.own_output_metas()) {
        modifier.addresses.remove(meta);
    }

    modifier
}

/// The distinct output addresses of a transaction, in order.
///
/// A transaction may pay the same address in several outputs; the
/// observed-address bookkeeping is per address, so insert and remove must
/// each touch a pair exactly once for rollback to invert apply.
fn observed_addresses(tx_aux: &TxAux) -> Vec<AddressId> {
    dedup(tx_aux.tx.outputs.iter().map(|out| out.address.id()).collect())
}

/// Drop repeated elements, keeping first occurrences in order.
fn dedup<T: Ord + Clone>(items: Vec<T>) -> Vec<T> {
    let mut seen = BTreeSet::new();
    items.into_iter().filter(|item| seen.insert(item.clone())).collect()
}

/// Left-fold [`apply_tx_to_modifier`] over a block-ordered transaction
/// sequence, starting from `base`.
pub fn apply_txs(
    creds: &DecryptionCredentials,
    db_used: &[(AddressId, HeaderHash)],
    info: &dyn Fn(&BlockHeader) -> BlockInfo,
    base: WalletModifier,
    txs: &[TrackedTx],
) -> WalletModifier {
    txs.iter().fold(base, |modifier, (tx_aux, undo, header)| {
        apply_tx_to_modifier(creds, db_used, &info(header), modifier, tx_aux, undo, header)
    })
}

/// Left-fold [`rollback_tx_from_modifier`] over a newest-first
/// transaction sequence, starting from `base`.
///
/// Callers supply transactions in reverse block order (last transaction
/// of the newest block first).
pub fn rollback_txs(
    creds: &DecryptionCredentials,
    db_used: &[(AddressId, HeaderHash)],
    current_slot: SlotId,
    info: &dyn Fn(&BlockHeader) -> BlockInfo,
    base: WalletModifier,
    txs: &[TrackedTx],
) -> WalletModifier {
    txs.iter().fold(base, |modifier, (tx_aux, undo, header)| {
        rollback_tx_from_modifier(
            creds, db_used, current_slot, &info(header), modifier, tx_aux, undo, header,
        )
    })
}
