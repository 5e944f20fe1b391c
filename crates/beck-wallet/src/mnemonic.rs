//! BIP-39 mnemonic backup and restoration of the root seed.

use bip39::{Language, Mnemonic};

use crate::error::TxError;
use crate::keys::RootSeed;

/// Convert a 32-byte root seed to a 24-word BIP-39 mnemonic phrase.
pub fn seed_to_mnemonic(seed: &RootSeed) -> String {
    let m = Mnemonic::from_entropy_in(Language::English, seed.as_bytes())
        .expect("32 bytes always produces a valid mnemonic");
    m.to_string()
}

/// Parse a BIP-39 mnemonic phrase back into a root seed.
///
/// Normalizes whitespace and case before parsing.
pub fn mnemonic_to_seed(phrase: &str) -> Result<RootSeed, TxError> {
    let normalized = phrase
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();
    let m = Mnemonic::parse_in(Language::English, &normalized)
        .map_err(|e| TxError::General(format!("invalid mnemonic: {e}")))?;
    let entropy = m.to_entropy();
    if entropy.len() != 32 {
        return Err(TxError::General(format!(
            "invalid mnemonic: expected 32 bytes of entropy, got {}",
            entropy.len(),
        )));
    }
    let mut bytes = [0u8; 32];
    bytes.copy_from_slice(&entropy);
    Ok(RootSeed::from_bytes(bytes))
}
