//! Genesis data for a Beck chain.
//!
//! The chain starts from a genesis header (difficulty 0) plus an initial
//! UTXO distribution derived from a configured balance list. Everything is
//! deterministic: every node computes the identical genesis header and
//! UTXO set from the same configuration.

use crate::address::{Address, Network};
use crate::slotting::SlotId;
use crate::types::{BlockHeader, Coin, Hash256, OutPoint, TxIn, TxOut, Utxo};

/// Protocol version stamped on the genesis header.
pub const GENESIS_VERSION: u32 = 1;

/// Genesis configuration: the network and the initial balance list.
#[derive(Clone, Debug)]
pub struct GenesisConfig {
    /// Network this chain belongs to.
    pub network: Network,
    /// Initial distribution, one UTXO per entry.
    pub balances: Vec<(Address, Coin)>,
}

impl GenesisConfig {
    /// The genesis header. `prev_hash` is zero and difficulty is 0.
    pub fn header(&self) -> BlockHeader {
        BlockHeader {
            version: GENESIS_VERSION,
            prev_hash: Hash256::ZERO,
            body_hash: self.distribution_hash(),
            slot: SlotId { epoch: 0, slot: 0 },
            difficulty: 0,
        }
    }

    /// The genesis UTXO: one synthetic outpoint per balance entry.
    ///
    /// The outpoint txid commits to the entry index and address, so
    /// duplicate addresses in the distribution produce distinct UTXOs.
    pub fn utxo(&self) -> Utxo {
        let mut utxo = Utxo::new();
        for (index, (address, value)) in self.balances.iter().enumerate() {
            let mut hasher = blake3::Hasher::new();
            hasher.update(b"beck-genesis-v1");
            hasher.update(&(index as u32).to_le_bytes());
            hasher.update(&address.to_bytes());
            let txid = Hash256(hasher.finalize().into());
            utxo.insert(
                TxIn::Utxo(OutPoint { txid, index: 0 }),
                TxOut { address: address.clone(), value: *value },
            );
        }
        utxo
    }

    /// Hash of the initial distribution, committed by the genesis header.
    fn distribution_hash(&self) -> Hash256 {
        let mut hasher = blake3::Hasher::new();
        hasher.update(b"beck-genesis-distribution-v1");
        hasher.update(&[self.network.as_byte()]);
        for (address, value) in &self.balances {
            let bytes = address.to_bytes();
            hasher.update(&(bytes.len() as u32).to_le_bytes());
            hasher.update(&bytes);
            hasher.update(&value.motes().to_le_bytes());
        }
        Hash256(hasher.finalize().into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::COIN;

    fn config() -> GenesisConfig {
        GenesisConfig {
            network: Network::Testnet,
            balances: vec![
                (Address::from_pubkey_hash(Network::Testnet, Hash256([1; 32])), Coin::new(10 * COIN).unwrap()),
                (Address::from_pubkey_hash(Network::Testnet, Hash256([2; 32])), Coin::new(20 * COIN).unwrap()),
            ],
        }
    }

    #[test]
    fn genesis_header_is_genesis() {
        let header = config().header();
        assert!(header.is_genesis());
        assert_eq!(header.difficulty, 0);
    }

    #[test]
    fn genesis_is_deterministic() {
        let a = config();
        let b = config();
        assert_eq!(a.header().hash(), b.header().hash());
        assert_eq!(a.utxo(), b.utxo());
    }

    #[test]
    fn distribution_changes_the_header() {
        let a = config();
        let mut b = config();
        b.balances.pop();
        assert_ne!(a.header().hash(), b.header().hash());
    }

    #[test]
    fn utxo_has_one_entry_per_balance() {
        let cfg = config();
        let utxo = cfg.utxo();
        assert_eq!(utxo.len(), 2);
        let total: u64 = utxo.values().map(|o| o.value.motes()).sum();
        assert_eq!(total, 30 * COIN);
    }

    #[test]
    fn duplicate_addresses_get_distinct_outpoints() {
        let addr = Address::from_pubkey_hash(Network::Testnet, Hash256([1; 32]));
        let cfg = GenesisConfig {
            network: Network::Testnet,
            balances: vec![
                (addr.clone(), Coin::new(5).unwrap()),
                (addr, Coin::new(5).unwrap()),
            ],
        };
        assert_eq!(cfg.utxo().len(), 2);
    }
}
