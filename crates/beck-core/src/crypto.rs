//! Ed25519 cryptographic operations for the Beck protocol.
//!
//! Provides key generation, transaction witness construction, and witness
//! verification. Uses ed25519-dalek for the underlying Ed25519
//! implementation and BLAKE3 for public-key hashing.
//!
//! # Signing scheme
//!
//! A witness signs the transaction id under a domain-separation tag.
//! Witnesses live outside the transaction (see
//! [`TxAux`](crate::types::TxAux)), so the id is stable and every input
//! owner signs the same message independently.

use ed25519_dalek::{Signer, Verifier};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use crate::address::{Address, AddressKind};
use crate::error::CryptoError;
use crate::types::{Hash256, TxId, TxWitness};

/// Domain-separation tag prepended to the txid before signing.
const TX_SIG_TAG: &[u8] = b"beck-tx-witness-v1";

/// Ed25519 keypair for signing transaction inputs.
///
/// Wraps [`ed25519_dalek::SigningKey`]; the secret key is zeroized on drop
/// by the underlying library.
pub struct KeyPair {
    signing_key: ed25519_dalek::SigningKey,
}

impl KeyPair {
    /// Generate a random keypair using the OS cryptographic RNG.
    pub fn generate() -> Self {
        let mut csprng = rand::rngs::OsRng;
        Self { signing_key: ed25519_dalek::SigningKey::generate(&mut csprng) }
    }

    /// Create a keypair from 32-byte secret key material.
    pub fn from_secret_bytes(bytes: [u8; 32]) -> Self {
        Self { signing_key: ed25519_dalek::SigningKey::from_bytes(&bytes) }
    }

    /// Derive the public key from this keypair.
    pub fn public_key(&self) -> PublicKey {
        PublicKey { verifying_key: self.signing_key.verifying_key() }
    }

    /// Get the raw secret key bytes (32 bytes). Handle with care.
    pub fn secret_bytes(&self) -> [u8; 32] {
        self.signing_key.to_bytes()
    }

    /// Sign a message, returning the raw 64-byte Ed25519 signature.
    pub fn sign(&self, message: &[u8]) -> [u8; 64] {
        self.signing_key.sign(message).to_bytes()
    }
}

impl Clone for KeyPair {
    fn clone(&self) -> Self {
        Self::from_secret_bytes(self.secret_bytes())
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_key", &self.public_key())
            .finish_non_exhaustive()
    }
}

/// Ed25519 public key for verifying witnesses and deriving addresses.
///
/// The pubkey hash (BLAKE3 of the raw 32-byte key) is the `root` of
/// ordinary spending addresses.
#[derive(Clone)]
pub struct PublicKey {
    verifying_key: ed25519_dalek::VerifyingKey,
}

impl PublicKey {
    /// Create a public key from raw bytes (32 bytes).
    pub fn from_bytes(bytes: &[u8; 32]) -> Result<Self, CryptoError> {
        let vk = ed25519_dalek::VerifyingKey::from_bytes(bytes)
            .map_err(|_| CryptoError::InvalidPublicKey)?;
        Ok(Self { verifying_key: vk })
    }

    /// Get the raw public key bytes (32 bytes).
    pub fn to_bytes(&self) -> [u8; 32] {
        self.verifying_key.to_bytes()
    }

    /// Compute the BLAKE3 pubkey hash used as an address root.
    pub fn pubkey_hash(&self) -> Hash256 {
        Hash256(blake3::hash(&self.to_bytes()).into())
    }

    /// Verify an Ed25519 signature on a message.
    pub fn verify(&self, message: &[u8], signature: &[u8; 64]) -> Result<(), CryptoError> {
        let sig = ed25519_dalek::Signature::from_bytes(signature);
        self.verifying_key
            .verify(message, &sig)
            .map_err(|_| CryptoError::VerificationFailed)
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", hex::encode(self.to_bytes()))
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.to_bytes()))
    }
}

impl PartialEq for PublicKey {
    fn eq(&self, other: &Self) -> bool {
        self.to_bytes() == other.to_bytes()
    }
}

impl Eq for PublicKey {}

impl Serialize for PublicKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_bytes().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for PublicKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let bytes = <[u8; 32]>::deserialize(deserializer)?;
        Self::from_bytes(&bytes).map_err(serde::de::Error::custom)
    }
}

/// Secret key controlling a redemption address.
///
/// Mechanically an ordinary Ed25519 key; the distinct type keeps the
/// redemption path from mixing with wallet spending keys.
pub struct RedeemSecretKey(KeyPair);

impl RedeemSecretKey {
    /// Create a redemption key from 32-byte secret material.
    pub fn from_secret_bytes(bytes: [u8; 32]) -> Self {
        Self(KeyPair::from_secret_bytes(bytes))
    }

    /// The corresponding public key.
    pub fn public(&self) -> RedeemPublicKey {
        RedeemPublicKey(self.0.public_key())
    }

    /// Sign a message with the redemption key.
    pub fn sign(&self, message: &[u8]) -> [u8; 64] {
        self.0.sign(message)
    }
}

impl fmt::Debug for RedeemSecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedeemSecretKey")
            .field("public", &self.public())
            .finish_non_exhaustive()
    }
}

/// Public half of a redemption key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RedeemPublicKey(pub PublicKey);

impl RedeemPublicKey {
    /// The redemption address controlled by this key.
    pub fn to_address(&self, network: crate::address::Network) -> Address {
        Address::redeem(network, self.0.pubkey_hash())
    }
}

/// Message a witness signs: domain tag followed by the txid.
fn witness_message(txid: &TxId) -> Vec<u8> {
    let mut msg = Vec::with_capacity(TX_SIG_TAG.len() + 32);
    msg.extend_from_slice(TX_SIG_TAG);
    msg.extend_from_slice(txid.as_bytes());
    msg
}

/// Produce a spending witness for a transaction.
pub fn sign_tx(keypair: &KeyPair, txid: &TxId) -> TxWitness {
    TxWitness::Pk {
        key: keypair.public_key().to_bytes().to_vec(),
        signature: keypair.sign(&witness_message(txid)).to_vec(),
    }
}

/// Produce a redemption witness for a transaction.
pub fn sign_tx_redeem(secret: &RedeemSecretKey, txid: &TxId) -> TxWitness {
    TxWitness::Redeem {
        key: secret.public().0.to_bytes().to_vec(),
        signature: secret.sign(&witness_message(txid)).to_vec(),
    }
}

/// Verify a witness against a transaction id and the address whose output
/// it spends.
///
/// Checks that the witness kind matches the address kind, that the key
/// hashes to the address root, and that the signature verifies.
pub fn verify_witness(
    witness: &TxWitness,
    txid: &TxId,
    source: &Address,
) -> Result<(), CryptoError> {
    let (key_bytes, sig_bytes, expected_kind) = match witness {
        TxWitness::Pk { key, signature } => (key, signature, AddressKind::Pubkey),
        TxWitness::Redeem { key, signature } => (key, signature, AddressKind::Redeem),
    };
    if source.kind != expected_kind {
        return Err(CryptoError::WitnessKindMismatch);
    }
    let key: [u8; 32] = key_bytes
        .as_slice()
        .try_into()
        .map_err(|_| CryptoError::InvalidPublicKey)?;
    let sig: [u8; 64] = sig_bytes
        .as_slice()
        .try_into()
        .map_err(|_| CryptoError::InvalidSignature)?;
    let public = PublicKey::from_bytes(&key)?;
    if public.pubkey_hash() != source.root {
        return Err(CryptoError::AddressMismatch);
    }
    public.verify(&witness_message(txid), &sig)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::Network;

    fn txid() -> TxId {
        Hash256([0x3C; 32])
    }

    #[test]
    fn keypair_from_secret_deterministic() {
        let kp1 = KeyPair::from_secret_bytes([1; 32]);
        let kp2 = KeyPair::from_secret_bytes([1; 32]);
        assert_eq!(kp1.public_key(), kp2.public_key());
    }

    #[test]
    fn generated_keypairs_differ() {
        assert_ne!(KeyPair::generate().public_key(), KeyPair::generate().public_key());
    }

    #[test]
    fn sign_verify_round_trip() {
        let kp = KeyPair::from_secret_bytes([2; 32]);
        let sig = kp.sign(b"message");
        assert!(kp.public_key().verify(b"message", &sig).is_ok());
        assert_eq!(
            kp.public_key().verify(b"other", &sig),
            Err(CryptoError::VerificationFailed),
        );
    }

    #[test]
    fn witness_verifies_against_owned_address() {
        let kp = KeyPair::from_secret_bytes([3; 32]);
        let addr = Address::from_pubkey_hash(Network::Mainnet, kp.public_key().pubkey_hash());
        let witness = sign_tx(&kp, &txid());
        assert!(verify_witness(&witness, &txid(), &addr).is_ok());
    }

    #[test]
    fn witness_rejects_wrong_address() {
        let kp = KeyPair::from_secret_bytes([3; 32]);
        let other = Address::from_pubkey_hash(Network::Mainnet, Hash256([0xEE; 32]));
        let witness = sign_tx(&kp, &txid());
        assert_eq!(
            verify_witness(&witness, &txid(), &other),
            Err(CryptoError::AddressMismatch),
        );
    }

    #[test]
    fn witness_rejects_wrong_txid() {
        let kp = KeyPair::from_secret_bytes([4; 32]);
        let addr = Address::from_pubkey_hash(Network::Mainnet, kp.public_key().pubkey_hash());
        let witness = sign_tx(&kp, &txid());
        let other = Hash256([0x3D; 32]);
        assert_eq!(
            verify_witness(&witness, &other, &addr),
            Err(CryptoError::VerificationFailed),
        );
    }

    #[test]
    fn witness_kind_must_match_address_kind() {
        let kp = KeyPair::from_secret_bytes([5; 32]);
        let redeem_addr = Address::redeem(Network::Mainnet, kp.public_key().pubkey_hash());
        let witness = sign_tx(&kp, &txid());
        assert_eq!(
            verify_witness(&witness, &txid(), &redeem_addr),
            Err(CryptoError::WitnessKindMismatch),
        );
    }

    #[test]
    fn redeem_witness_round_trip() {
        let secret = RedeemSecretKey::from_secret_bytes([6; 32]);
        let addr = secret.public().to_address(Network::Testnet);
        assert!(addr.is_redeem());
        let witness = sign_tx_redeem(&secret, &txid());
        assert!(verify_witness(&witness, &txid(), &addr).is_ok());
    }

    #[test]
    fn malformed_witness_key_rejected() {
        let witness = TxWitness::Pk { key: vec![0; 31], signature: vec![0; 64] };
        let addr = Address::from_pubkey_hash(Network::Mainnet, Hash256([1; 32]));
        assert_eq!(
            verify_witness(&witness, &txid(), &addr),
            Err(CryptoError::InvalidPublicKey),
        );
    }

    #[test]
    fn keypair_debug_hides_secret() {
        let kp = KeyPair::from_secret_bytes([7; 32]);
        let debug = format!("{kp:?}");
        assert!(debug.contains("public_key"));
        assert!(!debug.contains(&hex::encode([7u8; 32])));
    }
}
