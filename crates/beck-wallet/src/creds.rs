//! Decryption credentials and address classification.
//!
//! Wallet-derived addresses embed their HD coordinates `(account, index)`
//! as an AES-256-GCM ciphertext in the address attribute payload, keyed by
//! a per-wallet payload key. Classifying an on-chain address is then a
//! single decryption attempt: success recovers the coordinates, failure
//! means the address belongs to someone else. No key-space scanning.
//!
//! Encryption is deterministic — fixed per-wallet nonce — so the same
//! coordinates always produce the same address on every device holding the
//! seed. Each plaintext is unique per address (the coordinates), which is
//! what the fixed nonce relies on; the AEAD tag in turn authenticates the
//! payload as produced by this wallet.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use std::fmt;
use zeroize::Zeroize;

use beck_core::address::{Address, AddressId, AddressKind, HdPayload, Network};

use crate::keys::{address_keypair, payload_key, wallet_id, RootSeed, WalletId};

/// AES-GCM nonce length in bytes.
const NONCE_LEN: usize = 12;

/// Serialized HD coordinates: two little-endian u32s.
const COORDS_LEN: usize = 8;

/// Domain tag for deriving the per-wallet payload nonce.
const NONCE_CONTEXT: &str = "beck-wallet-payload-nonce-v1";

/// An owned address with its HD coordinates.
#[derive(
    Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord,
    serde::Serialize, serde::Deserialize, bincode::Encode, bincode::Decode,
)]
pub struct AddressMeta {
    /// Owning wallet.
    pub wallet: WalletId,
    /// Account index within the wallet.
    pub account: u32,
    /// Address index within the account.
    pub index: u32,
    /// The chain-visible identifier of the address.
    pub address_id: AddressId,
}

impl AddressMeta {
    /// Project the account coordinates.
    pub fn account_ref(&self) -> AccountRef {
        AccountRef { wallet: self.wallet, account: self.account }
    }
}

/// An account coordinate: wallet plus account index.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord,
    serde::Serialize, serde::Deserialize, bincode::Encode, bincode::Decode,
)]
pub struct AccountRef {
    /// Owning wallet.
    pub wallet: WalletId,
    /// Account index within the wallet.
    pub account: u32,
}

/// Credentials sufficient to recognize a wallet's addresses on chain.
///
/// A pure function of the root seed (see [`credentials`]); holds no
/// spending capability.
#[derive(Clone)]
pub struct DecryptionCredentials {
    wallet: WalletId,
    payload_key: [u8; 32],
    nonce: [u8; NONCE_LEN],
}

impl DecryptionCredentials {
    /// The wallet these credentials belong to.
    pub fn wallet(&self) -> WalletId {
        self.wallet
    }

    /// Test whether an address belongs to this wallet and recover its HD
    /// coordinates.
    ///
    /// Classification failure is `None`, not an error.
    pub fn classify(&self, address: &Address) -> Option<AddressMeta> {
        if address.kind != AddressKind::Pubkey {
            return None;
        }
        let payload = address.payload.as_ref()?;
        let (account, index) = decrypt_coords(&self.payload_key, &self.nonce, payload)?;
        Some(AddressMeta {
            wallet: self.wallet,
            account,
            index,
            address_id: address.id(),
        })
    }

    /// Filter-map a collection down to the wallet-owned entries, pairing
    /// each with its recovered metadata.
    pub fn select_own<T>(
        &self,
        items: impl IntoIterator<Item = T>,
        addr_of: impl Fn(&T) -> &Address,
    ) -> Vec<(T, AddressMeta)> {
        items
            .into_iter()
            .filter_map(|item| {
                let meta = self.classify(addr_of(&item))?;
                Some((item, meta))
            })
            .collect()
    }
}

impl Drop for DecryptionCredentials {
    fn drop(&mut self) {
        self.payload_key.zeroize();
    }
}

impl fmt::Debug for DecryptionCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecryptionCredentials")
            .field("wallet", &self.wallet)
            .field("payload_key", &"[REDACTED]")
            .finish()
    }
}

/// Derive the decryption credentials for a root seed.
///
/// Pure and stable across restarts.
pub fn credentials(seed: &RootSeed) -> DecryptionCredentials {
    let wallet = wallet_id(seed);
    DecryptionCredentials {
        wallet,
        payload_key: payload_key(seed),
        nonce: payload_nonce(&wallet),
    }
}

/// Derive the wallet address at HD coordinates `(account, index)`.
///
/// The address root is the hash of the spending key at those coordinates;
/// the attribute payload carries the encrypted coordinates.
pub fn derive_address(seed: &RootSeed, network: Network, account: u32, index: u32) -> Address {
    let creds = credentials(seed);
    let spending_key = address_keypair(seed, account, index);
    let root = spending_key.public_key().pubkey_hash();
    let payload = encrypt_coords(&creds.payload_key, &creds.nonce, account, index);
    Address::with_payload(network, root, payload)
}

/// Fixed per-wallet nonce for the deterministic payload encryption.
fn payload_nonce(wallet: &WalletId) -> [u8; NONCE_LEN] {
    let digest = blake3::derive_key(NONCE_CONTEXT, wallet.0.as_bytes());
    let mut nonce = [0u8; NONCE_LEN];
    nonce.copy_from_slice(&digest[..NONCE_LEN]);
    nonce
}

fn encrypt_coords(key: &[u8; 32], nonce: &[u8; NONCE_LEN], account: u32, index: u32) -> HdPayload {
    let mut plaintext = [0u8; COORDS_LEN];
    plaintext[..4].copy_from_slice(&account.to_le_bytes());
    plaintext[4..].copy_from_slice(&index.to_le_bytes());
    let cipher = Aes256Gcm::new_from_slice(key).expect("payload key is 32 bytes");
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(nonce), plaintext.as_slice())
        .expect("AES-GCM encryption of an 8-byte payload cannot fail");
    HdPayload(ciphertext)
}

fn decrypt_coords(
    key: &[u8; 32],
    nonce: &[u8; NONCE_LEN],
    payload: &HdPayload,
) -> Option<(u32, u32)> {
    let cipher = Aes256Gcm::new_from_slice(key).ok()?;
    let plaintext = cipher.decrypt(Nonce::from_slice(nonce), payload.0.as_slice()).ok()?;
    if plaintext.len() != COORDS_LEN {
        return None;
    }
    let account = u32::from_le_bytes(plaintext[..4].try_into().ok()?);
    let index = u32::from_le_bytes(plaintext[4..].try_into().ok()?);
    Some((account, index))
}
