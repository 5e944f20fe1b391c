//! Transaction construction from owned UTXO.
//!
//! Three entry points: [`prepare_multi_tx`] (multi-owner spend under an
//! input-selection policy), [`submit_tx`] (single-owner build-and-submit),
//! and [`prepare_redemption_tx`] (drain a redemption address). All are
//! pure over their seams: UTXO lookup, signing, and change-address
//! allocation come in as parameters.

use beck_core::address::{Address, AddressId};
use beck_core::crypto::{sign_tx, sign_tx_redeem, KeyPair, RedeemSecretKey};
use beck_core::types::{sum_coins, utxo_balance, Coin, Tx, TxAux, TxOut, Utxo};

use crate::creds::credentials;
use crate::db::WalletStore;
use crate::error::TxError;
use crate::keys::{address_keypair, RootSeed, WalletId};
use crate::pool::PendingPool;
use crate::selection::{select_inputs, InputSelection, InputSelectionPolicy};
use crate::submit::{submit_and_save, TxDispatcher};

/// Source of a wallet's owned UTXO.
pub trait UtxoSource {
    /// The owned UTXO restricted to the given addresses.
    fn utxo_for(&self, addrs: &[AddressId]) -> Result<Utxo, TxError>;

    /// The owner's whole UTXO.
    fn all_utxo(&self) -> Result<Utxo, TxError>;
}

/// [`UtxoSource`] backed by a wallet store.
pub struct StoreUtxoSource<'a> {
    /// The wallet store.
    pub store: &'a dyn WalletStore,
    /// The wallet whose UTXO is read.
    pub wallet: WalletId,
}

impl UtxoSource for StoreUtxoSource<'_> {
    fn utxo_for(&self, addrs: &[AddressId]) -> Result<Utxo, TxError> {
        let utxo = self.all_utxo()?;
        Ok(utxo
            .into_iter()
            .filter(|(_, out)| addrs.contains(&out.address.id()))
            .collect())
    }

    fn all_utxo(&self) -> Result<Utxo, TxError> {
        self.store
            .wallet_utxo(&self.wallet)
            .map_err(|e| TxError::General(format!("wallet store: {e}")))
    }
}

/// Resolves the signing key for an address the wallet spends.
pub trait AddressSigner {
    /// The keypair controlling `address`, or `None` if this signer does
    /// not own it.
    fn signer_for(&self, address: &Address) -> Option<KeyPair>;
}

/// [`AddressSigner`] deriving keys from a root seed via classification.
pub struct RootSigner {
    seed: RootSeed,
}

impl RootSigner {
    /// Build a signer for the given root seed.
    pub fn new(seed: RootSeed) -> Self {
        Self { seed }
    }
}

impl AddressSigner for RootSigner {
    fn signer_for(&self, address: &Address) -> Option<KeyPair> {
        let meta = credentials(&self.seed).classify(address)?;
        Some(address_keypair(&self.seed, meta.account, meta.index))
    }
}

/// Allocates a fresh change address for the given change amount.
pub type ChangeAddressSource<'a> = &'a mut dyn FnMut(Coin) -> Result<Address, TxError>;

/// Build a multi-owner transaction.
///
/// Fetches the UTXO owned by `sources`, selects inputs under `policy`
/// (consulting `pending` to avoid inputs locked by unconfirmed
/// transactions), signs each input with the key `signer` resolves for its
/// source address, and allocates a change address through `change` when
/// needed. Returns the signed transaction and its final output list.
pub fn prepare_multi_tx(
    utxos: &dyn UtxoSource,
    signer: &dyn AddressSigner,
    pending: &std::collections::BTreeSet<beck_core::types::TxIn>,
    policy: InputSelectionPolicy,
    sources: &[Address],
    outputs: &[TxOut],
    change: ChangeAddressSource<'_>,
) -> Result<(TxAux, Vec<TxOut>), TxError> {
    let source_ids: Vec<AddressId> = sources.iter().map(|a| a.id()).collect();
    let utxo = utxos.utxo_for(&source_ids)?;
    build_signed_tx(&utxo, signer, pending, policy, outputs, change)
}

/// Build a single-owner transaction and hand it to the submission path.
///
/// Resolves the owner's whole UTXO, builds under the configured policy
/// with the pool's locked inputs, then submits and saves the transaction
/// into the supplied pool. The save happens regardless of network
/// acceptance.
pub fn submit_tx(
    dispatcher: &dyn TxDispatcher,
    utxos: &dyn UtxoSource,
    pool: &mut PendingPool,
    policy: InputSelectionPolicy,
    signer: &dyn AddressSigner,
    outputs: &[TxOut],
    change: ChangeAddressSource<'_>,
) -> Result<(TxAux, Vec<TxOut>), TxError> {
    let utxo = utxos.all_utxo()?;
    let locked = pool.locked_inputs();
    let (tx_aux, outs) = build_signed_tx(&utxo, signer, &locked, policy, outputs, change)?;
    submit_and_save(pool, dispatcher, &tx_aux);
    Ok((tx_aux, outs))
}

/// Build a redemption transaction paying a redemption address's whole
/// balance to `dest`.
///
/// Returns the signed transaction, the redemption address, and the
/// redeemed amount. Fails with [`TxError::RedemptionDepleted`] when the
/// address holds nothing.
pub fn prepare_redemption_tx(
    utxos: &dyn UtxoSource,
    redeem: &RedeemSecretKey,
    dest: &Address,
) -> Result<(TxAux, Address, Coin), TxError> {
    let redeem_addr = redeem.public().to_address(dest.network);
    let utxo = utxos.utxo_for(&[redeem_addr.id()])?;
    let total = utxo_balance(&utxo)
        .map_err(|e| TxError::General(format!("coin arithmetic: {e}")))?;
    if total.is_zero() {
        return Err(TxError::RedemptionDepleted);
    }

    let inputs: Vec<_> = utxo.keys().cloned().collect();
    let tx = Tx {
        inputs,
        outputs: vec![TxOut { address: dest.clone(), value: total }],
    };
    let txid = tx.txid();
    let witnesses = tx.inputs.iter().map(|_| sign_tx_redeem(redeem, &txid)).collect();
    Ok((TxAux { tx, witnesses }, redeem_addr, total))
}

/// Shared core: validate outputs, select inputs, assemble, sign.
fn build_signed_tx(
    utxo: &Utxo,
    signer: &dyn AddressSigner,
    pending: &std::collections::BTreeSet<beck_core::types::TxIn>,
    policy: InputSelectionPolicy,
    outputs: &[TxOut],
    change: ChangeAddressSource<'_>,
) -> Result<(TxAux, Vec<TxOut>), TxError> {
    if outputs.is_empty() {
        return Err(TxError::General("transaction must have at least one output".into()));
    }
    for out in outputs {
        if out.address.is_redeem() {
            return Err(TxError::OutputIsRedeem);
        }
        if out.value.is_zero() {
            return Err(TxError::General("output value must be non-zero".into()));
        }
    }
    let target = sum_coins(outputs.iter().map(|o| o.value))
        .map_err(|e| TxError::General(format!("coin arithmetic: {e}")))?;

    let selection: InputSelection = select_inputs(policy, utxo, pending, target)?;

    let mut final_outputs = outputs.to_vec();
    if !selection.change.is_zero() {
        let change_addr = change(selection.change)?;
        final_outputs.push(TxOut { address: change_addr, value: selection.change });
    }

    let inputs: Vec<_> = selection.inputs.iter().map(|(txin, _)| txin.clone()).collect();
    let tx = Tx { inputs, outputs: final_outputs.clone() };
    let txid = tx.txid();

    let mut witnesses = Vec::with_capacity(selection.inputs.len());
    for (_, spent) in &selection.inputs {
        let keypair = signer
            .signer_for(&spent.address)
            .ok_or_else(|| TxError::SafeSignerNotFound(spent.address.encode()))?;
        witnesses.push(sign_tx(&keypair, &txid));
    }

    Ok((TxAux { tx, witnesses }, final_outputs))
}
