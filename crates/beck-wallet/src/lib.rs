//! # beck-wallet — the chain-tracked HD wallet core.
//!
//! Keeps a wallet's view of the chain (address set, balances, UTXO,
//! history, pending candidates) coherent with the node's chain state as
//! blocks are applied and rolled back, and builds signed transactions
//! from the tracked UTXO.
//!
//! # Modules
//!
//! - [`error`] — `TxError`, `WalletStoreError`, `SyncError`
//! - [`keys`] — root seed, wallet id, spending-key derivation
//! - [`mnemonic`] — BIP-39 backup of the root seed
//! - [`creds`] — decryption credentials and address classification
//! - [`extract`] — wallet-relevant transaction projection
//! - [`modifier`] — composable wallet-state deltas
//! - [`tracker`] — block apply/rollback and the change heuristic
//! - [`sync`] — reconciliation with the chain tip
//! - [`db`] — wallet persistence seam and in-memory store
//! - [`pool`] — pending-transaction pool
//! - [`selection`] — input-selection policies
//! - [`builder`] — transaction construction and signing
//! - [`submit`] — hash, log, enqueue, save

pub mod builder;
pub mod creds;
pub mod db;
pub mod error;
pub mod extract;
pub mod keys;
pub mod mnemonic;
pub mod modifier;
pub mod pool;
pub mod selection;
pub mod submit;
pub mod sync;
pub mod tracker;

// Re-exports for convenient access
pub use builder::{
    prepare_multi_tx, prepare_redemption_tx, submit_tx, AddressSigner, RootSigner,
    StoreUtxoSource, UtxoSource,
};
pub use creds::{credentials, derive_address, AccountRef, AddressMeta, DecryptionCredentials};
pub use db::{AddressKind, MemoryWalletStore, WalletStore, WalletTip};
pub use error::{SyncError, TxError, WalletStoreError};
pub use extract::{extract_tx, HistoryEntry, TxDirection, TxExtract};
pub use keys::{wallet_id, RootSeed, WalletId};
pub use modifier::{MapModifier, PtxBlockInfo, PtxUpdate, SeqModifier, SetModifier, WalletModifier};
pub use pool::PendingPool;
pub use selection::{select_inputs, InputSelection, InputSelectionPolicy};
pub use submit::{
    decode_signed_tx, submit_and_save, submit_tx_raw, tx_relay_spec, TxDispatcher, TxRelayMessage,
};
pub use sync::SyncContext;
pub use tracker::{
    all_used, apply_tx_to_modifier, apply_txs, eval_change, rollback_tx_from_modifier,
    rollback_txs, BlockInfo,
};
