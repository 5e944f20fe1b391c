//! Wallet error types.

use beck_core::types::Coin;
use thiserror::Error;

/// Errors from the transaction builder and submission path.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TxError {
    /// Not enough funds in the wallet's UTXO to cover outputs plus fee.
    #[error("not enough funds: have {have}, need {need}")]
    NotEnoughFunds {
        /// Available balance in motes.
        have: Coin,
        /// Required amount in motes.
        need: Coin,
    },

    /// Enough funds exist, but the rest is locked by pending transactions.
    #[error("not enough unlocked funds: {available} available, {required} required")]
    NotEnoughAllowedMoney {
        /// Spendable (not pending-locked) balance in motes.
        available: Coin,
        /// Required amount in motes.
        required: Coin,
    },

    /// Fee estimation did not converge.
    #[error("fee estimation failed to stabilize after {0} rounds")]
    FailedToStabilize(u32),

    /// Outputs paying to redemption addresses are prohibited.
    #[error("output pays to a redemption address")]
    OutputIsRedeem,

    /// The redemption address holds no funds.
    #[error("redemption address is already depleted")]
    RedemptionDepleted,

    /// No signer is available for an address the transaction must spend.
    #[error("no signer found for address {0}")]
    SafeSignerNotFound(String),

    /// An externally signed transaction was not valid base16.
    #[error("signed transaction is not base16: {0}")]
    SignedTxNotBase16(String),

    /// An address string did not parse.
    #[error("invalid address format: {0}")]
    InvalidAddressFormat(String),

    /// Any other failure while building or submitting.
    #[error("transaction error: {0}")]
    General(String),
}

/// Errors from the wallet store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WalletStoreError {
    /// The store holds no record for the wallet.
    #[error("unknown wallet: {0}")]
    UnknownWallet(String),

    /// Underlying storage failure.
    #[error("wallet storage: {0}")]
    Storage(String),
}

/// Errors from the sync engine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// The wallet store references chain state the chain does not know.
    /// The wallet database is inconsistent with the chain database.
    #[error("internal error: {0}")]
    Internal(String),

    /// Cooperative cancellation was requested.
    #[error("sync interrupted")]
    Interrupted,

    /// Wallet store failure.
    #[error(transparent)]
    Store(#[from] WalletStoreError),

    /// Chain read failure.
    #[error("chain: {0}")]
    Chain(#[from] beck_core::error::ChainError),
}
