//! Address encoding for the Beck network.
//!
//! An address names a spending-key hash plus optional attributes. Wallet
//! software embeds an encrypted derivation-path payload in the attributes
//! so it can recognize its own addresses on chain without scanning the key
//! space; the payload is opaque to everyone else.
//!
//! The textual form is base58 over an explicit byte layout with a 4-byte
//! BLAKE3 checksum:
//!
//! ```text
//! network (1) || kind (1) || root (32) || payload_len (2 LE) || payload || checksum (4)
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::AddressError;
use crate::types::Hash256;

/// Length of the trailing checksum in the serialized form.
const CHECKSUM_LEN: usize = 4;

/// Fixed portion of the serialized form: network, kind, root, payload length.
const FIXED_LEN: usize = 1 + 1 + 32 + 2;

/// Network identifier determining the address prefix byte.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
    bincode::Encode, bincode::Decode,
)]
pub enum Network {
    /// Mainnet (prefix byte 0x42).
    Mainnet,
    /// Testnet (prefix byte 0x62).
    Testnet,
}

impl Network {
    /// Serialized prefix byte for this network.
    pub fn as_byte(&self) -> u8 {
        match self {
            Network::Mainnet => 0x42,
            Network::Testnet => 0x62,
        }
    }

    /// Look up a network from its prefix byte.
    pub fn from_byte(byte: u8) -> Result<Self, AddressError> {
        match byte {
            0x42 => Ok(Network::Mainnet),
            0x62 => Ok(Network::Testnet),
            other => Err(AddressError::UnknownNetwork(other)),
        }
    }
}

/// What kind of key an address is bound to.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
    bincode::Encode, bincode::Decode,
)]
pub enum AddressKind {
    /// Ordinary spending address (hash of an Ed25519 spending key).
    Pubkey,
    /// Redemption address (hash of an Ed25519 redemption key).
    Redeem,
}

impl AddressKind {
    fn as_byte(&self) -> u8 {
        match self {
            AddressKind::Pubkey => 0x00,
            AddressKind::Redeem => 0x01,
        }
    }

    fn from_byte(byte: u8) -> Result<Self, AddressError> {
        match byte {
            0x00 => Ok(AddressKind::Pubkey),
            0x01 => Ok(AddressKind::Redeem),
            other => Err(AddressError::UnknownKind(other)),
        }
    }
}

/// Opaque attribute payload carried by an address.
///
/// For wallet-derived addresses this is the AES-GCM ciphertext of the HD
/// derivation path; nothing in the core interprets it.
#[derive(
    Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
    bincode::Encode, bincode::Decode,
)]
pub struct HdPayload(pub Vec<u8>);

/// Content-addressed identifier of an address as it appears in indexes:
/// BLAKE3 of the serialized form.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
    bincode::Encode, bincode::Decode,
)]
pub struct AddressId(pub Hash256);

impl fmt::Display for AddressId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A Beck network address.
#[derive(
    Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
    bincode::Encode, bincode::Decode,
)]
pub struct Address {
    /// Network the address belongs to.
    pub network: Network,
    /// Key kind the address is bound to.
    pub kind: AddressKind,
    /// BLAKE3 hash of the controlling public key.
    pub root: Hash256,
    /// Optional opaque attribute payload.
    pub payload: Option<HdPayload>,
}

impl Address {
    /// Ordinary spending address with no attributes.
    pub fn from_pubkey_hash(network: Network, root: Hash256) -> Self {
        Self { network, kind: AddressKind::Pubkey, root, payload: None }
    }

    /// Ordinary spending address carrying an attribute payload.
    pub fn with_payload(network: Network, root: Hash256, payload: HdPayload) -> Self {
        Self { network, kind: AddressKind::Pubkey, root, payload: Some(payload) }
    }

    /// Redemption address for the given redemption-key hash.
    pub fn redeem(network: Network, root: Hash256) -> Self {
        Self { network, kind: AddressKind::Redeem, root, payload: None }
    }

    /// Whether this is a redemption address.
    pub fn is_redeem(&self) -> bool {
        self.kind == AddressKind::Redeem
    }

    /// Serialize to the explicit byte layout (without checksum).
    pub fn to_bytes(&self) -> Vec<u8> {
        let payload = self.payload.as_ref().map(|p| p.0.as_slice()).unwrap_or(&[]);
        let mut bytes = Vec::with_capacity(FIXED_LEN + payload.len());
        bytes.push(self.network.as_byte());
        bytes.push(self.kind.as_byte());
        bytes.extend_from_slice(self.root.as_bytes());
        bytes.extend_from_slice(&(payload.len() as u16).to_le_bytes());
        bytes.extend_from_slice(payload);
        bytes
    }

    /// Parse the explicit byte layout (without checksum).
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, AddressError> {
        if bytes.len() < FIXED_LEN {
            return Err(AddressError::TooShort(bytes.len()));
        }
        let network = Network::from_byte(bytes[0])?;
        let kind = AddressKind::from_byte(bytes[1])?;
        let mut root = [0u8; 32];
        root.copy_from_slice(&bytes[2..34]);
        let payload_len = u16::from_le_bytes([bytes[34], bytes[35]]) as usize;
        let rest = &bytes[FIXED_LEN..];
        if rest.len() < payload_len {
            return Err(AddressError::TruncatedPayload);
        }
        if rest.len() > payload_len {
            return Err(AddressError::TrailingBytes);
        }
        let payload = if payload_len == 0 {
            None
        } else {
            Some(HdPayload(rest.to_vec()))
        };
        Ok(Self { network, kind, root: Hash256(root), payload })
    }

    /// The on-chain identifier of this address.
    pub fn id(&self) -> AddressId {
        AddressId(Hash256(blake3::hash(&self.to_bytes()).into()))
    }

    /// Encode as base58 with a 4-byte BLAKE3 checksum.
    pub fn encode(&self) -> String {
        let mut bytes = self.to_bytes();
        let check = checksum(&bytes);
        bytes.extend_from_slice(&check);
        bs58::encode(bytes).into_string()
    }

    /// Decode the base58 form, verifying the checksum.
    pub fn decode(s: &str) -> Result<Self, AddressError> {
        let bytes = bs58::decode(s)
            .into_vec()
            .map_err(|e| AddressError::Base58(e.to_string()))?;
        if bytes.len() < FIXED_LEN + CHECKSUM_LEN {
            return Err(AddressError::TooShort(bytes.len()));
        }
        let (body, check) = bytes.split_at(bytes.len() - CHECKSUM_LEN);
        if checksum(body) != check {
            return Err(AddressError::BadChecksum);
        }
        Self::from_bytes(body)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.encode())
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::decode(s)
    }
}

/// First four bytes of the BLAKE3 hash of the serialized form.
fn checksum(bytes: &[u8]) -> [u8; CHECKSUM_LEN] {
    let digest = blake3::hash(bytes);
    let mut out = [0u8; CHECKSUM_LEN];
    out.copy_from_slice(&digest.as_bytes()[..CHECKSUM_LEN]);
    out
}
