//! Transaction submission: hash, log, enqueue, save.
//!
//! The network is behind the [`TxDispatcher`] seam: the node's relay layer
//! implements it by queueing an inventory-or-data announcement to peers
//! and reporting whether at least one peer accepted it.

use tracing::info;

use beck_core::types::{TxAux, TxId};

use crate::error::TxError;
use crate::pool::PendingPool;

/// The outbound relay message: a transaction announced by id, with the
/// full contents available on request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TxRelayMessage {
    /// Transaction id.
    pub txid: TxId,
    /// The full transaction with witnesses.
    pub tx: TxAux,
}

/// Outbound transaction dispatch seam.
pub trait TxDispatcher: Send + Sync {
    /// Enqueue the message for propagation. Returns `true` iff at least
    /// one peer accepted it.
    fn enqueue(&self, msg: TxRelayMessage) -> bool;
}

/// Static description of the submission path's outbound capability.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RelaySpec {
    /// Protocol identifier.
    pub protocol: &'static str,
    /// Shape of the carried message.
    pub message: &'static str,
}

/// The outbound capability the submission path requires of the relay
/// layer.
pub fn tx_relay_spec() -> RelaySpec {
    RelaySpec { protocol: "beck/tx/1", message: "inv-or-data(txid, tx-contents)" }
}

/// Hash, log, and enqueue a fully-formed transaction.
///
/// Returns the acceptance reported by the dispatcher.
pub fn submit_tx_raw(dispatcher: &dyn TxDispatcher, tx_aux: &TxAux) -> bool {
    let txid = tx_aux.tx.txid();
    info!(
        inputs = tx_aux.tx.inputs.len(),
        outputs = tx_aux.tx.outputs.len(),
        total = %tx_aux.tx.outputs.iter().map(|o| o.value.motes()).sum::<u64>(),
        "submitting transaction",
    );
    info!(%txid, "transaction id");
    dispatcher.enqueue(TxRelayMessage { txid, tx: tx_aux.clone() })
}

/// Submit and then save into the pending pool.
///
/// The save happens regardless of network acceptance: the transaction is
/// durable locally first and can be re-announced later.
pub fn submit_and_save(
    pool: &mut PendingPool,
    dispatcher: &dyn TxDispatcher,
    tx_aux: &TxAux,
) -> bool {
    let accepted = submit_tx_raw(dispatcher, tx_aux);
    pool.save_tx(tx_aux.tx.txid(), tx_aux.clone());
    accepted
}

/// Decode an externally signed transaction from base16-encoded bincode.
pub fn decode_signed_tx(encoded: &str) -> Result<TxAux, TxError> {
    let bytes = hex::decode(encoded.trim())
        .map_err(|e| TxError::SignedTxNotBase16(e.to_string()))?;
    let (tx_aux, _): (TxAux, usize) =
        bincode::decode_from_slice(&bytes, bincode::config::standard())
            .map_err(|e| TxError::General(format!("signed transaction does not decode: {e}")))?;
    if !tx_aux.tx.is_well_formed() {
        return Err(TxError::General("signed transaction has no inputs or outputs".into()));
    }
    Ok(tx_aux)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use beck_core::address::{Address, Network};
    use beck_core::types::{Coin, Hash256, OutPoint, Tx, TxIn, TxOut};

    struct RecordingDispatcher {
        accept: bool,
        sent: Mutex<Vec<TxRelayMessage>>,
    }

    impl RecordingDispatcher {
        fn new(accept: bool) -> Self {
            Self { accept, sent: Mutex::new(Vec::new()) }
        }
    }

    impl TxDispatcher for RecordingDispatcher {
        fn enqueue(&self, msg: TxRelayMessage) -> bool {
            self.sent.lock().unwrap().push(msg);
            self.accept
        }
    }

    fn sample_aux() -> TxAux {
        TxAux {
            tx: Tx {
                inputs: vec![TxIn::Utxo(OutPoint { txid: Hash256([1; 32]), index: 0 })],
                outputs: vec![TxOut {
                    address: Address::from_pubkey_hash(Network::Testnet, Hash256([2; 32])),
                    value: Coin::new(10).unwrap(),
                }],
            },
            witnesses: vec![],
        }
    }

    #[test]
    fn raw_submit_enqueues_with_txid() {
        let dispatcher = RecordingDispatcher::new(true);
        let aux = sample_aux();
        assert!(submit_tx_raw(&dispatcher, &aux));
        let sent = dispatcher.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].txid, aux.tx.txid());
        assert_eq!(sent[0].tx, aux);
    }

    #[test]
    fn raw_submit_reports_rejection() {
        let dispatcher = RecordingDispatcher::new(false);
        assert!(!submit_tx_raw(&dispatcher, &sample_aux()));
    }

    #[test]
    fn save_happens_even_when_no_peer_accepts() {
        let dispatcher = RecordingDispatcher::new(false);
        let mut pool = PendingPool::new();
        let aux = sample_aux();
        let accepted = submit_and_save(&mut pool, &dispatcher, &aux);
        assert!(!accepted);
        assert!(pool.contains(&aux.tx.txid()));
    }

    #[test]
    fn decode_signed_tx_round_trips() {
        let aux = sample_aux();
        let bytes = bincode::encode_to_vec(&aux, bincode::config::standard()).unwrap();
        let decoded = decode_signed_tx(&hex::encode(bytes)).unwrap();
        assert_eq!(decoded, aux);
    }

    #[test]
    fn decode_rejects_bad_base16() {
        let err = decode_signed_tx("zz-not-hex").unwrap_err();
        assert!(matches!(err, TxError::SignedTxNotBase16(_)));
    }

    #[test]
    fn decode_rejects_bad_payload() {
        let err = decode_signed_tx("deadbeef").unwrap_err();
        assert!(matches!(err, TxError::General(_)));
    }

    #[test]
    fn relay_spec_names_the_inv_or_data_shape() {
        let spec = tx_relay_spec();
        assert_eq!(spec.protocol, "beck/tx/1");
        assert!(spec.message.contains("txid"));
    }
}
