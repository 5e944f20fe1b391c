//! Wallet-relevant projection of a processed transaction.
//!
//! Given a transaction plus its undo data, [`extract_tx`] selects the
//! wallet-owned inputs and outputs and produces the normalized history
//! entry. A transaction is *interesting* to the wallet iff at least one
//! own input or own output exists.

use beck_core::slotting::Timestamp;
use beck_core::types::{sum_coins, Coin, Tx, TxId, TxIn, TxOut, TxUndo};

use crate::creds::{AddressMeta, DecryptionCredentials};

/// Direction of a transaction from the wallet's point of view.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash,
    serde::Serialize, serde::Deserialize, bincode::Encode, bincode::Decode,
)]
pub enum TxDirection {
    /// The wallet spends at least one input.
    Outgoing,
    /// The wallet only receives.
    Incoming,
}

/// Normalized history entry for one transaction.
#[derive(
    Clone, Debug, PartialEq, Eq,
    serde::Serialize, serde::Deserialize, bincode::Encode, bincode::Decode,
)]
pub struct HistoryEntry {
    /// Transaction id.
    pub txid: TxId,
    /// Direction from the wallet's point of view.
    pub direction: TxDirection,
    /// Total of wallet-owned inputs.
    pub spent: Coin,
    /// Total of wallet-owned outputs.
    pub received: Coin,
    /// Total of all transaction outputs.
    pub total_output: Coin,
    /// Chain difficulty of the containing block, when known.
    pub difficulty: Option<u64>,
    /// Wall-clock timestamp of the containing slot, when computable.
    pub timestamp: Option<Timestamp>,
}

impl HistoryEntry {
    /// Signed effect on the wallet balance in motes.
    pub fn balance_delta(&self) -> i64 {
        (self.received.motes() as i128 - self.spent.motes() as i128) as i64
    }
}

/// The wallet-relevant parts of one processed transaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TxExtract {
    /// Wallet-owned inputs: the spent `(input, consumed output)` pairs.
    pub own_inputs: Vec<((TxIn, TxOut), AddressMeta)>,
    /// Wallet-owned outputs: `(output index, output)` pairs.
    pub own_outputs: Vec<((u32, TxOut), AddressMeta)>,
    /// The normalized history entry.
    pub entry: HistoryEntry,
}

impl TxExtract {
    /// Whether the wallet is involved at all.
    pub fn is_interesting(&self) -> bool {
        !self.own_inputs.is_empty() || !self.own_outputs.is_empty()
    }

    /// Metadata of the own inputs, in input order.
    pub fn own_input_metas(&self) -> Vec<AddressMeta> {
        self.own_inputs.iter().map(|(_, meta)| meta.clone()).collect()
    }

    /// Metadata of the own outputs, in output order.
    pub fn own_output_metas(&self) -> Vec<AddressMeta> {
        self.own_outputs.iter().map(|(_, meta)| meta.clone()).collect()
    }
}

/// Compute the wallet-relevant projection of a transaction.
///
/// `undo` lists the output consumed by each input, in input order;
/// unresolvable (extension) inputs are `None`.
///
/// # Panics
///
/// Panics if `undo` does not cover every input, or on coin-arithmetic
/// overflow. Both are programmer errors: the node hands the tracker
/// matching undo data, and on-chain values never exceed the supply bound.
pub fn extract_tx(
    creds: &DecryptionCredentials,
    tx: &Tx,
    txid: TxId,
    undo: &TxUndo,
    difficulty: Option<u64>,
    timestamp: Option<Timestamp>,
) -> TxExtract {
    assert_eq!(
        undo.len(),
        tx.inputs.len(),
        "transaction undo must cover every input",
    );

    let resolved: Vec<(TxIn, TxOut)> = tx
        .inputs
        .iter()
        .zip(undo)
        .filter_map(|(input, spent)| Some((input.clone(), spent.clone()?)))
        .collect();
    let own_inputs = creds.select_own(resolved, |(_, out)| &out.address);

    let indexed: Vec<(u32, TxOut)> = tx
        .outputs
        .iter()
        .enumerate()
        .map(|(i, out)| (i as u32, out.clone()))
        .collect();
    let own_outputs = creds.select_own(indexed, |(_, out)| &out.address);

    let spent = sum_coins(own_inputs.iter().map(|((_, out), _)| out.value))
        .expect("own input total exceeds the supply bound");
    let received = sum_coins(own_outputs.iter().map(|((_, out), _)| out.value))
        .expect("own output total exceeds the supply bound");
    let total_output = sum_coins(tx.outputs.iter().map(|out| out.value))
        .expect("output total exceeds the supply bound");

    let direction = if own_inputs.is_empty() {
        TxDirection::Incoming
    } else {
        TxDirection::Outgoing
    };

    TxExtract {
        own_inputs,
        own_outputs,
        entry: HistoryEntry {
            txid,
            direction,
            spent,
            received,
            total_output,
            difficulty,
            timestamp,
        },
    }
}
