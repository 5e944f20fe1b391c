//! Core protocol types: coins, transactions, blocks, undo data.
//!
//! All monetary values are in motes (1 BECK = 10^8 motes). Transaction ids
//! and body hashes use BLAKE3; block header hashes use double SHA-256 over
//! an explicit little-endian layout.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::address::Address;
use crate::error::CoinError;
use crate::slotting::SlotId;

/// A 32-byte hash value.
///
/// Used for transaction ids, address ids (BLAKE3) and block header hashes
/// (double SHA-256).
#[derive(
    Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default,
    bincode::Encode, bincode::Decode,
)]
pub struct Hash256(pub [u8; 32]);

impl Hash256 {
    /// The zero hash (32 zero bytes).
    pub const ZERO: Self = Self([0u8; 32]);

    /// Create a Hash256 from a byte array.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Return the underlying bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Check if this is the zero hash.
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }

    /// Abbreviated hex form (first eight hex digits) for log lines.
    pub fn short(&self) -> String {
        let mut s = String::with_capacity(8);
        for byte in &self.0[..4] {
            s.push_str(&format!("{byte:02x}"));
        }
        s
    }
}

impl fmt::Display for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl From<[u8; 32]> for Hash256 {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for Hash256 {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Content-addressed identifier of a transaction.
pub type TxId = Hash256;

/// Content-addressed identifier of a block header.
pub type HeaderHash = Hash256;

/// Number of motes in one BECK.
pub const COIN: u64 = 100_000_000;

/// Maximum total supply in motes. Coin arithmetic treats any sum above
/// this bound as overflow.
pub const MAX_SUPPLY: u64 = 45_000_000_000 * COIN;

/// A monetary amount in motes.
///
/// Construction and arithmetic are checked against [`MAX_SUPPLY`]. Zero is
/// a valid amount.
#[derive(
    Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default,
    bincode::Encode, bincode::Decode,
)]
pub struct Coin(u64);

impl Coin {
    /// The zero amount.
    pub const ZERO: Self = Self(0);

    /// Create a coin amount, rejecting values above [`MAX_SUPPLY`].
    pub fn new(motes: u64) -> Result<Self, CoinError> {
        if motes > MAX_SUPPLY {
            return Err(CoinError::AboveMaxSupply);
        }
        Ok(Self(motes))
    }

    /// The raw amount in motes.
    pub fn motes(&self) -> u64 {
        self.0
    }

    /// Whether this is the zero amount.
    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checked addition; errors when the sum exceeds [`MAX_SUPPLY`].
    pub fn checked_add(self, rhs: Coin) -> Result<Coin, CoinError> {
        let sum = self.0.checked_add(rhs.0).ok_or(CoinError::Overflow)?;
        if sum > MAX_SUPPLY {
            return Err(CoinError::Overflow);
        }
        Ok(Coin(sum))
    }

    /// Checked subtraction; errors when `rhs` exceeds `self`.
    pub fn checked_sub(self, rhs: Coin) -> Result<Coin, CoinError> {
        self.0.checked_sub(rhs.0).map(Coin).ok_or(CoinError::Underflow)
    }

    /// Display helper, not for protocol arithmetic.
    pub fn to_beck(&self) -> f64 {
        self.0 as f64 / COIN as f64
    }
}

impl fmt::Display for Coin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Sum the values of a coin iterator, erroring on overflow.
pub fn sum_coins<I: IntoIterator<Item = Coin>>(coins: I) -> Result<Coin, CoinError> {
    coins
        .into_iter()
        .try_fold(Coin::ZERO, |acc, c| acc.checked_add(c))
}

/// Reference to a specific output of a previous transaction.
#[derive(
    Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord,
    bincode::Encode, bincode::Decode,
)]
pub struct OutPoint {
    /// Transaction id containing the referenced output.
    pub txid: TxId,
    /// Index of the output within the transaction.
    pub index: u32,
}

impl fmt::Display for OutPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.txid, self.index)
    }
}

/// A transaction input.
///
/// The `Unknown` variant carries an unparsed extension input verbatim so
/// that transactions produced by newer software still round-trip.
#[derive(
    Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord,
    bincode::Encode, bincode::Decode,
)]
pub enum TxIn {
    /// Spend of a previous transaction output.
    Utxo(OutPoint),
    /// Unrecognized input kind, kept as an opaque tag plus payload.
    Unknown {
        /// Extension tag byte.
        tag: u8,
        /// Raw undecoded payload.
        payload: Vec<u8>,
    },
}

impl fmt::Display for TxIn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TxIn::Utxo(op) => write!(f, "{op}"),
            TxIn::Unknown { tag, payload } => write!(f, "unknown<{tag}>[{} bytes]", payload.len()),
        }
    }
}

/// A transaction output, creating a new UTXO.
#[derive(
    Serialize, Deserialize, Clone, Debug, PartialEq, Eq, PartialOrd, Ord,
    bincode::Encode, bincode::Decode,
)]
pub struct TxOut {
    /// Recipient address.
    pub address: Address,
    /// Amount in motes.
    pub value: Coin,
}

/// A transaction transferring value between addresses.
///
/// Witnesses live outside the transaction (see [`TxAux`]) so the id is
/// stable across signing.
#[derive(
    Serialize, Deserialize, Clone, Debug, PartialEq, Eq,
    bincode::Encode, bincode::Decode,
)]
pub struct Tx {
    /// Inputs consuming previous outputs. Must be non-empty.
    pub inputs: Vec<TxIn>,
    /// New outputs created by this transaction. Must be non-empty.
    pub outputs: Vec<TxOut>,
}

impl Tx {
    /// Compute the transaction id.
    ///
    /// BLAKE3 over an explicit domain-tagged layout: every field is
    /// length-prefixed, so the encoding is injective.
    pub fn txid(&self) -> TxId {
        let mut hasher = blake3::Hasher::new();
        hasher.update(b"beck-tx-v1");
        hasher.update(&(self.inputs.len() as u32).to_le_bytes());
        for input in &self.inputs {
            match input {
                TxIn::Utxo(op) => {
                    hasher.update(&[0u8]);
                    hasher.update(op.txid.as_bytes());
                    hasher.update(&op.index.to_le_bytes());
                }
                TxIn::Unknown { tag, payload } => {
                    hasher.update(&[1u8, *tag]);
                    hasher.update(&(payload.len() as u32).to_le_bytes());
                    hasher.update(payload);
                }
            }
        }
        hasher.update(&(self.outputs.len() as u32).to_le_bytes());
        for output in &self.outputs {
            let addr = output.address.to_bytes();
            hasher.update(&(addr.len() as u32).to_le_bytes());
            hasher.update(&addr);
            hasher.update(&output.value.motes().to_le_bytes());
        }
        Hash256(hasher.finalize().into())
    }

    /// Whether the transaction has the required non-empty input and output
    /// lists.
    pub fn is_well_formed(&self) -> bool {
        !self.inputs.is_empty() && !self.outputs.is_empty()
    }
}

/// A witness authorizing one transaction input.
///
/// Raw key and signature bytes; [`crate::crypto`] provides the typed
/// construction and verification helpers.
#[derive(
    Serialize, Deserialize, Clone, Debug, PartialEq, Eq,
    bincode::Encode, bincode::Decode,
)]
pub enum TxWitness {
    /// Ordinary spend, signed with an address spending key.
    Pk {
        /// Ed25519 public key (32 bytes).
        key: Vec<u8>,
        /// Ed25519 signature (64 bytes) over the domain-tagged txid.
        signature: Vec<u8>,
    },
    /// Redemption spend, signed with a redemption key.
    Redeem {
        /// Ed25519 public key (32 bytes).
        key: Vec<u8>,
        /// Ed25519 signature (64 bytes) over the domain-tagged txid.
        signature: Vec<u8>,
    },
}

/// A transaction bundled with its input witnesses, one per input.
#[derive(
    Serialize, Deserialize, Clone, Debug, PartialEq, Eq,
    bincode::Encode, bincode::Decode,
)]
pub struct TxAux {
    /// The transaction.
    pub tx: Tx,
    /// Witnesses in input order.
    pub witnesses: Vec<TxWitness>,
}

/// Per-input undo record: the output each input consumed, in input order.
///
/// `None` marks an input the node could not resolve (extension inputs).
pub type TxUndo = Vec<Option<TxOut>>;

/// Undo data for a whole block, parallel to its transaction list.
#[derive(
    Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Default,
    bincode::Encode, bincode::Decode,
)]
pub struct Undo {
    /// One [`TxUndo`] per transaction, in block order.
    pub tx_undos: Vec<TxUndo>,
}

/// The unspent-output set: spendable input reference to the output it
/// would consume.
pub type Utxo = BTreeMap<TxIn, TxOut>;

/// Total value held in a UTXO set.
pub fn utxo_balance(utxo: &Utxo) -> Result<Coin, CoinError> {
    sum_coins(utxo.values().map(|out| out.value))
}

/// Block header.
///
/// `difficulty` is the cumulative main-chain length up to and including
/// this block; the genesis header has difficulty 0. Headers form the
/// backward chain via `prev_hash`; the chain store maintains the matching
/// forward-link map for the main chain.
#[derive(
    Serialize, Deserialize, Clone, Debug, PartialEq, Eq,
    bincode::Encode, bincode::Decode,
)]
pub struct BlockHeader {
    /// Protocol version.
    pub version: u32,
    /// Hash of the previous block header.
    pub prev_hash: HeaderHash,
    /// BLAKE3 hash over the block's transaction ids.
    pub body_hash: Hash256,
    /// Slot in which the block was minted.
    pub slot: SlotId,
    /// Cumulative chain difficulty (number of blocks after genesis).
    pub difficulty: u64,
}

impl BlockHeader {
    /// Header size in bytes when serialized for hashing.
    const HASH_SIZE: usize = 4 + 2 * 32 + 3 * 8;

    /// Compute the block header hash (double SHA-256).
    ///
    /// Explicit fixed byte layout: version || prev_hash || body_hash ||
    /// epoch || slot || difficulty, all little-endian.
    pub fn hash(&self) -> HeaderHash {
        let mut data = Vec::with_capacity(Self::HASH_SIZE);
        data.extend_from_slice(&self.version.to_le_bytes());
        data.extend_from_slice(self.prev_hash.as_bytes());
        data.extend_from_slice(self.body_hash.as_bytes());
        data.extend_from_slice(&self.slot.epoch.to_le_bytes());
        data.extend_from_slice(&self.slot.slot.to_le_bytes());
        data.extend_from_slice(&self.difficulty.to_le_bytes());
        let first = Sha256::digest(&data);
        Hash256(Sha256::digest(first).into())
    }

    /// Whether this is the genesis header.
    pub fn is_genesis(&self) -> bool {
        self.difficulty == 0 && self.prev_hash.is_zero()
    }
}

/// Compute the body hash committed by a header: BLAKE3 over the
/// concatenated transaction ids.
pub fn body_hash(txids: &[TxId]) -> Hash256 {
    let mut hasher = blake3::Hasher::new();
    hasher.update(b"beck-body-v1");
    for txid in txids {
        hasher.update(txid.as_bytes());
    }
    Hash256(hasher.finalize().into())
}

/// A complete block: header plus witnessed transactions.
#[derive(
    Serialize, Deserialize, Clone, Debug, PartialEq, Eq,
    bincode::Encode, bincode::Decode,
)]
pub struct Block {
    /// Block header.
    pub header: BlockHeader,
    /// Ordered list of transactions with witnesses.
    pub transactions: Vec<TxAux>,
}

/// A block paired with the undo data needed to reverse its application.
pub type Blund = (Block, Undo);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::{Address, Network};

    fn addr(seed: u8) -> Address {
        Address::from_pubkey_hash(Network::Testnet, Hash256([seed; 32]))
    }

    fn sample_tx() -> Tx {
        Tx {
            inputs: vec![TxIn::Utxo(OutPoint { txid: Hash256([0x11; 32]), index: 0 })],
            outputs: vec![TxOut { address: addr(0xAA), value: Coin::new(50 * COIN).unwrap() }],
        }
    }

    fn sample_header() -> BlockHeader {
        BlockHeader {
            version: 1,
            prev_hash: Hash256::ZERO,
            body_hash: Hash256::ZERO,
            slot: SlotId { epoch: 0, slot: 3 },
            difficulty: 1,
        }
    }

    // --- Hash256 ---

    #[test]
    fn hash256_zero_is_zero() {
        assert!(Hash256::ZERO.is_zero());
        assert_eq!(Hash256::ZERO, Hash256::default());
        assert!(!Hash256([1; 32]).is_zero());
    }

    #[test]
    fn hash256_display_hex() {
        let h = Hash256([0xAB; 32]);
        let s = format!("{h}");
        assert_eq!(s.len(), 64);
        assert!(s.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(h.short(), "abababab");
    }

    // --- Coin ---

    #[test]
    fn coin_new_rejects_above_max_supply() {
        assert!(Coin::new(MAX_SUPPLY).is_ok());
        assert_eq!(Coin::new(MAX_SUPPLY + 1), Err(CoinError::AboveMaxSupply));
    }

    #[test]
    fn coin_checked_add() {
        let a = Coin::new(3).unwrap();
        let b = Coin::new(4).unwrap();
        assert_eq!(a.checked_add(b).unwrap().motes(), 7);
    }

    #[test]
    fn coin_add_overflow_at_max_supply() {
        let max = Coin::new(MAX_SUPPLY).unwrap();
        let one = Coin::new(1).unwrap();
        assert_eq!(max.checked_add(one), Err(CoinError::Overflow));
    }

    #[test]
    fn coin_checked_sub_underflow() {
        let a = Coin::new(3).unwrap();
        let b = Coin::new(4).unwrap();
        assert_eq!(a.checked_sub(b), Err(CoinError::Underflow));
        assert_eq!(b.checked_sub(a).unwrap().motes(), 1);
    }

    #[test]
    fn sum_coins_over_empty_is_zero() {
        assert_eq!(sum_coins([]).unwrap(), Coin::ZERO);
    }

    // --- Tx ---

    #[test]
    fn txid_deterministic() {
        let tx = sample_tx();
        assert_eq!(tx.txid(), tx.txid());
    }

    #[test]
    fn txid_changes_with_data() {
        let tx1 = sample_tx();
        let mut tx2 = sample_tx();
        tx2.outputs[0].value = Coin::new(1).unwrap();
        assert_ne!(tx1.txid(), tx2.txid());
    }

    #[test]
    fn txid_distinguishes_input_kinds() {
        let utxo_in = Tx {
            inputs: vec![TxIn::Utxo(OutPoint { txid: Hash256::ZERO, index: 0 })],
            outputs: sample_tx().outputs,
        };
        let unknown_in = Tx {
            inputs: vec![TxIn::Unknown { tag: 0, payload: vec![0; 36] }],
            outputs: utxo_in.outputs.clone(),
        };
        assert_ne!(utxo_in.txid(), unknown_in.txid());
    }

    #[test]
    fn well_formed_requires_inputs_and_outputs() {
        assert!(sample_tx().is_well_formed());
        let no_outputs = Tx { inputs: sample_tx().inputs, outputs: vec![] };
        assert!(!no_outputs.is_well_formed());
        let no_inputs = Tx { inputs: vec![], outputs: sample_tx().outputs };
        assert!(!no_inputs.is_well_formed());
    }

    // --- BlockHeader ---

    #[test]
    fn header_hash_deterministic() {
        let h = sample_header();
        assert_eq!(h.hash(), h.hash());
    }

    #[test]
    fn header_hash_changes_with_slot() {
        let h1 = sample_header();
        let mut h2 = h1.clone();
        h2.slot.slot = 4;
        assert_ne!(h1.hash(), h2.hash());
    }

    #[test]
    fn header_hash_fixed_size_input() {
        let h = sample_header();
        let mut data = Vec::new();
        data.extend_from_slice(&h.version.to_le_bytes());
        data.extend_from_slice(h.prev_hash.as_bytes());
        data.extend_from_slice(h.body_hash.as_bytes());
        data.extend_from_slice(&h.slot.epoch.to_le_bytes());
        data.extend_from_slice(&h.slot.slot.to_le_bytes());
        data.extend_from_slice(&h.difficulty.to_le_bytes());
        assert_eq!(data.len(), BlockHeader::HASH_SIZE);
    }

    #[test]
    fn genesis_detection() {
        let mut h = sample_header();
        assert!(!h.is_genesis());
        h.difficulty = 0;
        assert!(h.is_genesis());
    }

    // --- Utxo ---

    #[test]
    fn utxo_balance_sums_outputs() {
        let mut utxo = Utxo::new();
        utxo.insert(
            TxIn::Utxo(OutPoint { txid: Hash256([1; 32]), index: 0 }),
            TxOut { address: addr(1), value: Coin::new(100).unwrap() },
        );
        utxo.insert(
            TxIn::Utxo(OutPoint { txid: Hash256([2; 32]), index: 1 }),
            TxOut { address: addr(2), value: Coin::new(200).unwrap() },
        );
        assert_eq!(utxo_balance(&utxo).unwrap().motes(), 300);
    }

    // --- Codec round trips ---

    #[test]
    fn bincode_round_trip_tx_aux() {
        let aux = TxAux {
            tx: sample_tx(),
            witnesses: vec![TxWitness::Pk { key: vec![0u8; 32], signature: vec![0u8; 64] }],
        };
        let encoded = bincode::encode_to_vec(&aux, bincode::config::standard()).unwrap();
        let (decoded, _): (TxAux, usize) =
            bincode::decode_from_slice(&encoded, bincode::config::standard()).unwrap();
        assert_eq!(aux, decoded);
    }

    #[test]
    fn bincode_round_trip_blund() {
        let block = Block { header: sample_header(), transactions: vec![] };
        let undo = Undo { tx_undos: vec![vec![Some(sample_tx().outputs[0].clone()), None]] };
        let blund: Blund = (block, undo);
        let encoded = bincode::encode_to_vec(&blund, bincode::config::standard()).unwrap();
        let (decoded, _): (Blund, usize) =
            bincode::decode_from_slice(&encoded, bincode::config::standard()).unwrap();
        assert_eq!(blund, decoded);
    }
}
