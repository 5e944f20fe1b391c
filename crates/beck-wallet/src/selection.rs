//! Input selection for the transaction builder.
//!
//! The strategy is a configuration-selected enum, not a callback, so
//! behavior stays inspectable and testable. Fees are linear in the input
//! count; selection iterates until the selected set covers the target plus
//! the fee for exactly that many inputs.

use std::collections::BTreeSet;

use beck_core::types::{sum_coins, Coin, TxIn, TxOut, Utxo};

use crate::error::TxError;

/// Fixed portion of the fee, in motes.
pub const BASE_FEE: u64 = 1_000;

/// Additional fee per input, in motes.
pub const FEE_PER_INPUT: u64 = 500;

/// Bound on fee-stabilization rounds before giving up.
pub const MAX_FEE_ROUNDS: u32 = 5;

/// Configuration-selected input selection strategy.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize,
)]
pub enum InputSelectionPolicy {
    /// Prefer fewer, larger inputs.
    #[default]
    OptimizeForSecurity,
    /// Spend only inputs not referenced by pending transactions, so
    /// concurrent submissions do not contend for the same UTXOs.
    OptimizeForHighThroughput,
}

/// Result of input selection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InputSelection {
    /// Selected inputs with the outputs they consume.
    pub inputs: Vec<(TxIn, TxOut)>,
    /// Total value of the selected inputs.
    pub total: Coin,
    /// Fee for this input count.
    pub fee: Coin,
    /// Value returned to the wallet as change.
    pub change: Coin,
}

/// The fee for a transaction with `inputs` inputs, saturating at the
/// supply bound.
pub fn fee_for_inputs(inputs: usize) -> Coin {
    let motes = BASE_FEE.saturating_add(FEE_PER_INPUT.saturating_mul(inputs as u64));
    Coin::new(motes.min(beck_core::types::MAX_SUPPLY)).expect("capped at the supply bound")
}

/// Select inputs covering `target` plus the fee under the given policy.
///
/// `locked` is the set of inputs held by pending transactions; the
/// high-throughput policy refuses to spend them and reports
/// [`TxError::NotEnoughAllowedMoney`] when they would have sufficed.
pub fn select_inputs(
    policy: InputSelectionPolicy,
    utxo: &Utxo,
    locked: &BTreeSet<TxIn>,
    target: Coin,
) -> Result<InputSelection, TxError> {
    let mut spendable: Vec<(TxIn, TxOut)> = match policy {
        InputSelectionPolicy::OptimizeForSecurity => {
            utxo.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
        }
        InputSelectionPolicy::OptimizeForHighThroughput => utxo
            .iter()
            .filter(|(k, _)| !locked.contains(*k))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect(),
    };
    // Largest first: fewer inputs, smaller fee.
    spendable.sort_by(|a, b| b.1.value.cmp(&a.1.value));

    let spendable_total =
        sum_coins(spendable.iter().map(|(_, out)| out.value)).map_err(overflow)?;
    let wallet_total = sum_coins(utxo.values().map(|out| out.value)).map_err(overflow)?;

    // The fee depends on the input count, which depends on the fee.
    // Iterate with an assumed count until the greedy prefix size agrees.
    let mut assumed_inputs = 1usize;
    for _ in 0..MAX_FEE_ROUNDS {
        let fee = fee_for_inputs(assumed_inputs);
        let needed = target.checked_add(fee).map_err(overflow)?;

        let mut total = Coin::ZERO;
        let mut taken = 0usize;
        for (_, out) in &spendable {
            if total >= needed {
                break;
            }
            total = total.checked_add(out.value).map_err(overflow)?;
            taken += 1;
        }

        if total < needed {
            if policy == InputSelectionPolicy::OptimizeForHighThroughput
                && wallet_total >= needed
            {
                return Err(TxError::NotEnoughAllowedMoney {
                    available: spendable_total,
                    required: needed,
                });
            }
            return Err(TxError::NotEnoughFunds { have: wallet_total, need: needed });
        }

        if taken == assumed_inputs {
            let change = total.checked_sub(needed).map_err(overflow)?;
            spendable.truncate(taken);
            return Ok(InputSelection { inputs: spendable, total, fee, change });
        }
        assumed_inputs = taken;
    }

    Err(TxError::FailedToStabilize(MAX_FEE_ROUNDS))
}

fn overflow(e: beck_core::error::CoinError) -> TxError {
    TxError::General(format!("coin arithmetic: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use beck_core::address::{Address, Network};
    use beck_core::types::{Hash256, OutPoint};

    fn addr(tag: u8) -> Address {
        Address::from_pubkey_hash(Network::Testnet, Hash256([tag; 32]))
    }

    fn input(tag: u8) -> TxIn {
        TxIn::Utxo(OutPoint { txid: Hash256([tag; 32]), index: 0 })
    }

    fn utxo_of(entries: &[(u8, u64)]) -> Utxo {
        entries
            .iter()
            .map(|(tag, value)| {
                (input(*tag), TxOut { address: addr(*tag), value: Coin::new(*value).unwrap() })
            })
            .collect()
    }

    fn coin(motes: u64) -> Coin {
        Coin::new(motes).unwrap()
    }

    #[test]
    fn single_large_input_preferred() {
        let utxo = utxo_of(&[(1, 10_000), (2, 100_000)]);
        let sel = select_inputs(
            InputSelectionPolicy::OptimizeForSecurity,
            &utxo,
            &BTreeSet::new(),
            coin(50_000),
        )
        .unwrap();
        assert_eq!(sel.inputs.len(), 1);
        assert_eq!(sel.inputs[0].0, input(2));
        assert_eq!(sel.fee, fee_for_inputs(1));
        assert_eq!(sel.change, coin(100_000 - 50_000 - BASE_FEE - FEE_PER_INPUT));
    }

    #[test]
    fn accumulates_until_target_plus_fee() {
        let utxo = utxo_of(&[(1, 4_000), (2, 4_000), (3, 4_000)]);
        let sel = select_inputs(
            InputSelectionPolicy::OptimizeForSecurity,
            &utxo,
            &BTreeSet::new(),
            coin(6_000),
        )
        .unwrap();
        // 6000 + 1000 base + 2 * 500 = 8000, covered by two inputs.
        assert_eq!(sel.inputs.len(), 2);
        assert_eq!(sel.total, coin(8_000));
        assert_eq!(sel.change, Coin::ZERO);
    }

    #[test]
    fn fee_matches_final_input_count() {
        let utxo = utxo_of(&[(1, 2_000), (2, 2_000), (3, 2_000), (4, 2_000)]);
        let sel = select_inputs(
            InputSelectionPolicy::OptimizeForSecurity,
            &utxo,
            &BTreeSet::new(),
            coin(4_000),
        )
        .unwrap();
        assert_eq!(sel.fee, fee_for_inputs(sel.inputs.len()));
        assert!(sel.total >= coin(4_000).checked_add(sel.fee).unwrap());
    }

    #[test]
    fn not_enough_funds() {
        let utxo = utxo_of(&[(1, 1_000)]);
        let err = select_inputs(
            InputSelectionPolicy::OptimizeForSecurity,
            &utxo,
            &BTreeSet::new(),
            coin(5_000),
        )
        .unwrap_err();
        assert!(matches!(err, TxError::NotEnoughFunds { .. }));
    }

    #[test]
    fn throughput_policy_skips_locked_inputs() {
        let utxo = utxo_of(&[(1, 100_000), (2, 60_000)]);
        let locked = BTreeSet::from([input(1)]);
        let sel = select_inputs(
            InputSelectionPolicy::OptimizeForHighThroughput,
            &utxo,
            &locked,
            coin(10_000),
        )
        .unwrap();
        assert_eq!(sel.inputs.len(), 1);
        assert_eq!(sel.inputs[0].0, input(2));
    }

    #[test]
    fn throughput_policy_reports_locked_funds() {
        let utxo = utxo_of(&[(1, 100_000), (2, 1_000)]);
        let locked = BTreeSet::from([input(1)]);
        let err = select_inputs(
            InputSelectionPolicy::OptimizeForHighThroughput,
            &utxo,
            &locked,
            coin(50_000),
        )
        .unwrap_err();
        assert!(matches!(err, TxError::NotEnoughAllowedMoney { .. }));
    }

    #[test]
    fn security_policy_may_spend_locked_inputs() {
        let utxo = utxo_of(&[(1, 100_000)]);
        let locked = BTreeSet::from([input(1)]);
        let sel = select_inputs(
            InputSelectionPolicy::OptimizeForSecurity,
            &utxo,
            &locked,
            coin(10_000),
        )
        .unwrap();
        assert_eq!(sel.inputs.len(), 1);
    }

    #[test]
    fn empty_utxo_is_not_enough_funds() {
        let err = select_inputs(
            InputSelectionPolicy::OptimizeForSecurity,
            &Utxo::new(),
            &BTreeSet::new(),
            coin(1),
        )
        .unwrap_err();
        assert!(matches!(err, TxError::NotEnoughFunds { .. }));
    }

    #[test]
    fn selection_balances_add_up() {
        let utxo = utxo_of(&[(1, 7_777), (2, 3_333), (3, 9_999)]);
        let target = coin(12_000);
        let sel = select_inputs(
            InputSelectionPolicy::OptimizeForSecurity,
            &utxo,
            &BTreeSet::new(),
            target,
        )
        .unwrap();
        assert_eq!(
            sel.total,
            target.checked_add(sel.fee).unwrap().checked_add(sel.change).unwrap(),
        );
    }
}
