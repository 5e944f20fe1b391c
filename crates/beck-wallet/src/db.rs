//! The wallet store abstraction and an in-memory implementation.
//!
//! The tracker talks to wallet persistence through [`WalletStore`]. The
//! one non-negotiable contract is [`WalletStore::apply_modifier`]: a whole
//! accumulated [`WalletModifier`] plus the new sync tip commit in a single
//! atomic write, so readers never observe a half-applied block.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use parking_lot::RwLock;

use beck_core::address::AddressId;
use beck_core::types::{utxo_balance, Coin, HeaderHash, TxId, Utxo};

use crate::creds::AddressMeta;
use crate::error::WalletStoreError;
use crate::extract::HistoryEntry;
use crate::keys::WalletId;
use crate::modifier::{PtxBlockInfo, PtxUpdate, WalletModifier};

/// Which custom-address set to read.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AddressKind {
    /// Addresses observed on chain.
    Used,
    /// Wallet-chosen change addresses.
    Change,
}

/// How far a wallet's view has been reconciled with the chain.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum WalletTip {
    /// Never synchronized; genesis seeding pending.
    #[default]
    NotSynced,
    /// Reconciled up to and including this header.
    SyncedWith(HeaderHash),
}

/// Transactional wallet persistence consumed by the tracker.
pub trait WalletStore: Send + Sync {
    /// Create an empty record for a wallet. Idempotent.
    fn register_wallet(&self, wallet: WalletId) -> Result<(), WalletStoreError>;

    /// The wallet's last committed sync tip.
    fn sync_tip(&self, wallet: &WalletId) -> Result<WalletTip, WalletStoreError>;

    /// The stored used or change address pairs for a wallet.
    fn custom_addresses(
        &self,
        wallet: &WalletId,
        kind: AddressKind,
    ) -> Result<Vec<(AddressId, HeaderHash)>, WalletStoreError>;

    /// Record a single owned address outside a modifier commit.
    fn add_address(&self, meta: &AddressMeta) -> Result<(), WalletStoreError>;

    /// Owned addresses in discovery order.
    fn wallet_addresses(&self, wallet: &WalletId) -> Result<Vec<AddressMeta>, WalletStoreError>;

    /// The wallet's committed UTXO.
    fn wallet_utxo(&self, wallet: &WalletId) -> Result<Utxo, WalletStoreError>;

    /// The wallet's committed balance.
    fn balance(&self, wallet: &WalletId) -> Result<Coin, WalletStoreError>;

    /// Committed history entries, ordered by transaction id.
    fn history(&self, wallet: &WalletId) -> Result<Vec<HistoryEntry>, WalletStoreError>;

    /// Confirmed pending-transaction candidates.
    fn ptx_confirmations(
        &self,
        wallet: &WalletId,
    ) -> Result<BTreeMap<TxId, PtxBlockInfo>, WalletStoreError>;

    /// Atomically apply a whole modifier and advance the sync tip.
    fn apply_modifier(
        &self,
        wallet: &WalletId,
        new_tip: HeaderHash,
        modifier: &WalletModifier,
    ) -> Result<(), WalletStoreError>;

    /// Flag whether the wallet is ready to serve queries.
    fn set_wallet_ready(&self, wallet: &WalletId, ready: bool) -> Result<(), WalletStoreError>;

    /// Whether the wallet is ready to serve queries.
    fn is_wallet_ready(&self, wallet: &WalletId) -> Result<bool, WalletStoreError>;
}

#[derive(Default)]
struct WalletRecord {
    tip: WalletTip,
    ready: bool,
    addresses: Vec<AddressMeta>,
    used: BTreeSet<(AddressId, HeaderHash)>,
    change: BTreeSet<(AddressId, HeaderHash)>,
    utxo: Utxo,
    balance: Coin,
    history: BTreeMap<TxId, HistoryEntry>,
    ptx_confirmations: BTreeMap<TxId, PtxBlockInfo>,
}

/// In-memory wallet store for tests.
///
/// One `RwLock` over all wallets; `apply_modifier` holds the write lock
/// for the whole commit, which provides the required atomicity.
#[derive(Default)]
pub struct MemoryWalletStore {
    wallets: RwLock<HashMap<WalletId, WalletRecord>>,
}

impl MemoryWalletStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn with_record<R>(
        &self,
        wallet: &WalletId,
        f: impl FnOnce(&WalletRecord) -> R,
    ) -> Result<R, WalletStoreError> {
        let wallets = self.wallets.read();
        let record = wallets
            .get(wallet)
            .ok_or_else(|| WalletStoreError::UnknownWallet(wallet.to_string()))?;
        Ok(f(record))
    }

    fn with_record_mut<R>(
        &self,
        wallet: &WalletId,
        f: impl FnOnce(&mut WalletRecord) -> R,
    ) -> Result<R, WalletStoreError> {
        let mut wallets = self.wallets.write();
        let record = wallets
            .get_mut(wallet)
            .ok_or_else(|| WalletStoreError::UnknownWallet(wallet.to_string()))?;
        Ok(f(record))
    }
}

impl WalletStore for MemoryWalletStore {
    fn register_wallet(&self, wallet: WalletId) -> Result<(), WalletStoreError> {
        self.wallets.write().entry(wallet).or_default();
        Ok(())
    }

    fn sync_tip(&self, wallet: &WalletId) -> Result<WalletTip, WalletStoreError> {
        self.with_record(wallet, |r| r.tip)
    }

    fn custom_addresses(
        &self,
        wallet: &WalletId,
        kind: AddressKind,
    ) -> Result<Vec<(AddressId, HeaderHash)>, WalletStoreError> {
        self.with_record(wallet, |r| {
            let set = match kind {
                AddressKind::Used => &r.used,
                AddressKind::Change => &r.change,
            };
            set.iter().cloned().collect()
        })
    }

    fn add_address(&self, meta: &AddressMeta) -> Result<(), WalletStoreError> {
        self.with_record_mut(&meta.wallet, |r| {
            if !r.addresses.contains(meta) {
                r.addresses.push(meta.clone());
            }
        })
    }

    fn wallet_addresses(&self, wallet: &WalletId) -> Result<Vec<AddressMeta>, WalletStoreError> {
        self.with_record(wallet, |r| r.addresses.clone())
    }

    fn wallet_utxo(&self, wallet: &WalletId) -> Result<Utxo, WalletStoreError> {
        self.with_record(wallet, |r| r.utxo.clone())
    }

    fn balance(&self, wallet: &WalletId) -> Result<Coin, WalletStoreError> {
        self.with_record(wallet, |r| r.balance)
    }

    fn history(&self, wallet: &WalletId) -> Result<Vec<HistoryEntry>, WalletStoreError> {
        self.with_record(wallet, |r| r.history.values().cloned().collect())
    }

    fn ptx_confirmations(
        &self,
        wallet: &WalletId,
    ) -> Result<BTreeMap<TxId, PtxBlockInfo>, WalletStoreError> {
        self.with_record(wallet, |r| r.ptx_confirmations.clone())
    }

    fn apply_modifier(
        &self,
        wallet: &WalletId,
        new_tip: HeaderHash,
        modifier: &WalletModifier,
    ) -> Result<(), WalletStoreError> {
        self.with_record_mut(wallet, |r| {
            for meta in modifier.addresses.removals() {
                r.addresses.retain(|a| a != meta);
            }
            for meta in modifier.addresses.items() {
                if !r.addresses.contains(meta) {
                    r.addresses.push(meta.clone());
                }
            }
            modifier.history.apply_to(&mut r.history);
            modifier.used.apply_to(&mut r.used);
            modifier.change.apply_to(&mut r.change);
            modifier.utxo.apply_to(&mut r.utxo);
            for (txid, update) in modifier.ptx_candidates.insertions() {
                match update {
                    PtxUpdate::Confirmed(info) => {
                        r.ptx_confirmations.insert(*txid, info.clone());
                    }
                    PtxUpdate::Reverted { .. } => {
                        r.ptx_confirmations.remove(txid);
                    }
                }
            }
            r.balance = utxo_balance(&r.utxo).unwrap_or(Coin::ZERO);
            r.tip = WalletTip::SyncedWith(new_tip);
        })
    }

    fn set_wallet_ready(&self, wallet: &WalletId, ready: bool) -> Result<(), WalletStoreError> {
        self.with_record_mut(wallet, |r| r.ready = ready)
    }

    fn is_wallet_ready(&self, wallet: &WalletId) -> Result<bool, WalletStoreError> {
        self.with_record(wallet, |r| r.ready)
    }
}
