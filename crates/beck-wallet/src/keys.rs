//! Root seed management and deterministic key derivation.
//!
//! A wallet is rooted in a 32-byte seed. BLAKE3 keyed derivation produces
//! the wallet's identity key, the per-address Ed25519 spending keys (from
//! the HD coordinates `(account, index)`), and the attribute-payload key
//! used by [`crate::creds`].

use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

use beck_core::crypto::KeyPair;
use beck_core::types::Hash256;

/// BLAKE3 KDF context for the wallet identity key.
const ROOT_KEY_CONTEXT: &str = "beck-wallet-root-key-v1";

/// BLAKE3 KDF context for address spending keys.
const SPEND_KDF_CONTEXT: &str = "beck-wallet-spend-key-v1";

/// BLAKE3 KDF context for the attribute-payload key.
const PAYLOAD_KDF_CONTEXT: &str = "beck-wallet-payload-key-v1";

/// A 32-byte wallet root seed.
///
/// Secret material is zeroized on drop to prevent leaking key material in
/// freed memory.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct RootSeed {
    bytes: [u8; 32],
}

impl RootSeed {
    /// Generate a random seed from the OS cryptographic RNG.
    pub fn generate() -> Self {
        use rand::RngCore;
        let mut bytes = [0u8; 32];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        Self { bytes }
    }

    /// Create a seed from raw bytes.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self { bytes }
    }

    /// Get the raw seed bytes. Handle with care.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.bytes
    }
}

impl Clone for RootSeed {
    fn clone(&self) -> Self {
        Self { bytes: self.bytes }
    }
}

impl fmt::Debug for RootSeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RootSeed").field("bytes", &"[REDACTED]").finish()
    }
}

/// Content-addressed wallet identifier: BLAKE3 of the root public key.
///
/// Stable across restarts and shared between devices holding the same
/// seed.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord,
    serde::Serialize, serde::Deserialize, bincode::Encode, bincode::Decode,
)]
pub struct WalletId(pub Hash256);

impl fmt::Display for WalletId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.short())
    }
}

/// The wallet's identity keypair. Never spends; only names the wallet.
pub fn root_keypair(seed: &RootSeed) -> KeyPair {
    KeyPair::from_secret_bytes(blake3::derive_key(ROOT_KEY_CONTEXT, seed.as_bytes()))
}

/// Derive the wallet identifier for a seed.
pub fn wallet_id(seed: &RootSeed) -> WalletId {
    let public = root_keypair(seed).public_key();
    WalletId(Hash256(blake3::hash(&public.to_bytes()).into()))
}

/// Derive the spending keypair at HD coordinates `(account, index)`.
pub fn address_keypair(seed: &RootSeed, account: u32, index: u32) -> KeyPair {
    let mut ikm = Vec::with_capacity(40);
    ikm.extend_from_slice(seed.as_bytes());
    ikm.extend_from_slice(&account.to_le_bytes());
    ikm.extend_from_slice(&index.to_le_bytes());
    KeyPair::from_secret_bytes(blake3::derive_key(SPEND_KDF_CONTEXT, &ikm))
}

/// Derive the 256-bit attribute-payload key for a seed.
pub fn payload_key(seed: &RootSeed) -> [u8; 32] {
    blake3::derive_key(PAYLOAD_KDF_CONTEXT, seed.as_bytes())
}
