//! Error types for the Beck protocol.
use thiserror::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoinError {
    #[error("coin value overflow")] Overflow,
    #[error("coin value underflow")] Underflow,
    #[error("coin value exceeds maximum supply")] AboveMaxSupply,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("invalid base58: {0}")] Base58(String),
    #[error("address too short: {0} bytes")] TooShort(usize),
    #[error("bad checksum")] BadChecksum,
    #[error("unknown network byte: {0}")] UnknownNetwork(u8),
    #[error("unknown address kind: {0}")] UnknownKind(u8),
    #[error("truncated attribute payload")] TruncatedPayload,
    #[error("trailing bytes after address")] TrailingBytes,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    #[error("invalid public key bytes")] InvalidPublicKey,
    #[error("invalid signature bytes")] InvalidSignature,
    #[error("signature verification failed")] VerificationFailed,
    #[error("witness key does not match the source address")] AddressMismatch,
    #[error("witness kind does not match the source address kind")] WitnessKindMismatch,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChainError {
    #[error("header not found: {0}")] HeaderNotFound(String),
    #[error("block data not found: {0}")] BlundNotFound(String),
    #[error("broken forward link at {0}")] BrokenForwardLink(String),
    #[error("missing UTXO: {0}")] MissingUtxo(String),
    #[error("block {got} does not extend the tip {tip}")] NotExtendingTip { got: String, tip: String },
    #[error("difficulty mismatch: expected {expected}, got {got}")] DifficultyMismatch { expected: u64, got: u64 },
    #[error("duplicate block: {0}")] DuplicateBlock(String),
    #[error("empty chain: nothing to disconnect")] EmptyChain,
    #[error("undo data does not match block {0}")] UndoMismatch(String),
    #[error(transparent)] Coin(#[from] CoinError),
}
