//! Property-based tests for the core types.
//!
//! Randomized inputs with proptest shrinking: address codec round trips,
//! coin arithmetic bounds, slot arithmetic, and header hash sensitivity.

use proptest::prelude::*;

use beck_core::address::{Address, HdPayload, Network};
use beck_core::error::CoinError;
use beck_core::slotting::{slot_start, SlotId, SlottingData};
use beck_core::types::{sum_coins, BlockHeader, Coin, Hash256, MAX_SUPPLY};

fn network_strategy() -> impl Strategy<Value = Network> {
    prop_oneof![Just(Network::Mainnet), Just(Network::Testnet)]
}

fn address_strategy() -> impl Strategy<Value = Address> {
    (
        network_strategy(),
        any::<[u8; 32]>(),
        proptest::option::of(proptest::collection::vec(any::<u8>(), 1..40)),
        any::<bool>(),
    )
        .prop_map(|(network, root, payload, redeem)| {
            if redeem {
                Address::redeem(network, Hash256(root))
            } else {
                match payload {
                    Some(bytes) => Address::with_payload(network, Hash256(root), HdPayload(bytes)),
                    None => Address::from_pubkey_hash(network, Hash256(root)),
                }
            }
        })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn address_encode_decode_round_trips(addr in address_strategy()) {
        let encoded = addr.encode();
        let decoded = Address::decode(&encoded).unwrap();
        prop_assert_eq!(&decoded, &addr);
        prop_assert_eq!(decoded.id(), addr.id());
    }

    #[test]
    fn address_byte_layout_round_trips(addr in address_strategy()) {
        let bytes = addr.to_bytes();
        let parsed = Address::from_bytes(&bytes).unwrap();
        prop_assert_eq!(parsed, addr);
    }

    #[test]
    fn corrupting_one_encoded_byte_never_parses_silently(
        addr in address_strategy(),
        flip in any::<u8>(),
        pos in 0usize..32,
    ) {
        // Flip a byte of the serialized form and re-encode: either the
        // checksum catches it or decoding fails structurally. A silent
        // parse to a different address must not happen.
        let mut bytes = addr.to_bytes();
        let pos = pos % bytes.len();
        let flip = if flip == 0 { 1 } else { flip };
        bytes[pos] ^= flip;

        let mut with_old_checksum = bytes.clone();
        let digest = blake3::hash(&addr.to_bytes());
        with_old_checksum.extend_from_slice(&digest.as_bytes()[..4]);
        let encoded = bs58::encode(with_old_checksum).into_string();
        prop_assert!(Address::decode(&encoded).is_err());
    }

    #[test]
    fn coin_sum_never_exceeds_max_supply(values in proptest::collection::vec(0u64..=MAX_SUPPLY, 0..8)) {
        let coins: Vec<Coin> = values
            .iter()
            .map(|v| Coin::new(*v).unwrap())
            .collect();
        let expected: u128 = values.iter().map(|v| *v as u128).sum();
        match sum_coins(coins) {
            Ok(total) => {
                prop_assert_eq!(total.motes() as u128, expected);
                prop_assert!(total.motes() <= MAX_SUPPLY);
            }
            Err(e) => {
                prop_assert_eq!(e, CoinError::Overflow);
                prop_assert!(expected > MAX_SUPPLY as u128);
            }
        }
    }

    #[test]
    fn coin_add_is_commutative(a in 0u64..=MAX_SUPPLY, b in 0u64..=MAX_SUPPLY) {
        let ca = Coin::new(a).unwrap();
        let cb = Coin::new(b).unwrap();
        prop_assert_eq!(ca.checked_add(cb), cb.checked_add(ca));
    }

    #[test]
    fn slot_start_is_monotone(
        start in 0u64..1u64 << 40,
        epoch in 0u64..1_000,
        slot in 0u64..999,
    ) {
        let data = SlottingData { epoch_slots: 1_000, slot_duration_ms: 20_000 };
        let here = slot_start(start, SlotId { epoch, slot }, &data).unwrap();
        let next = slot_start(start, SlotId { epoch, slot: slot + 1 }, &data).unwrap();
        prop_assert!(next > here);
        prop_assert_eq!(next - here, data.slot_duration_ms);
    }

    #[test]
    fn header_hash_commits_to_every_field(
        prev in any::<[u8; 32]>(),
        slot in 0u64..1_000,
        difficulty in 1u64..1_000_000,
    ) {
        let header = BlockHeader {
            version: 1,
            prev_hash: Hash256(prev),
            body_hash: Hash256::ZERO,
            slot: SlotId { epoch: 0, slot },
            difficulty,
        };
        let mut bumped = header.clone();
        bumped.difficulty += 1;
        prop_assert_ne!(header.hash(), bumped.hash());
        let mut moved = header.clone();
        moved.slot.slot += 1;
        prop_assert_ne!(header.hash(), moved.hash());
    }
}
