//! Slot arithmetic and the wall-clock seam.
//!
//! Time on the chain is measured in slots grouped into epochs. A block
//! header names the slot it was minted in; converting a slot back to a
//! wall-clock timestamp needs the system start and the slotting parameters,
//! both of which are supplied by the node through [`SlotClock`].

use serde::{Deserialize, Serialize};
use std::fmt;

/// Milliseconds since the Unix epoch.
pub type Timestamp = u64;

/// A slot coordinate: epoch plus the slot index within it.
#[derive(
    Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default,
    bincode::Encode, bincode::Decode,
)]
pub struct SlotId {
    /// Epoch index.
    pub epoch: u64,
    /// Slot index within the epoch, `0..epoch_slots`.
    pub slot: u64,
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.epoch, self.slot)
    }
}

/// Chain slotting parameters.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct SlottingData {
    /// Number of slots per epoch.
    pub epoch_slots: u64,
    /// Duration of one slot in milliseconds.
    pub slot_duration_ms: u64,
}

/// Absolute slot index from the start of the chain.
///
/// Returns `None` on arithmetic overflow.
pub fn flatten_slot(data: &SlottingData, slot: SlotId) -> Option<u64> {
    slot.epoch
        .checked_mul(data.epoch_slots)?
        .checked_add(slot.slot)
}

/// Wall-clock start of a slot, pure in its inputs.
///
/// Returns `None` when the slot is not representable (overflow).
pub fn slot_start(system_start: Timestamp, slot: SlotId, data: &SlottingData) -> Option<Timestamp> {
    let flat = flatten_slot(data, slot)?;
    let offset = flat.checked_mul(data.slot_duration_ms)?;
    system_start.checked_add(offset)
}

/// Node-supplied view of chain time.
pub trait SlotClock: Send + Sync {
    /// Wall-clock timestamp of slot 0/0.
    fn system_start(&self) -> Timestamp;

    /// The chain's slotting parameters.
    fn slotting_data(&self) -> SlottingData;

    /// The current slot.
    ///
    /// May lag the true slot by a little; callers must not use it for
    /// anything consensus-critical.
    fn current_slot(&self) -> SlotId;

    /// Wall-clock start of the given slot, or `None` if not representable.
    fn slot_start_of(&self, slot: SlotId) -> Option<Timestamp> {
        slot_start(self.system_start(), slot, &self.slotting_data())
    }
}

/// A frozen clock for tests and replay: fixed start, parameters, and
/// current slot.
#[derive(Clone, Copy, Debug)]
pub struct FixedSlotClock {
    /// Wall-clock timestamp of slot 0/0.
    pub start: Timestamp,
    /// Slotting parameters.
    pub data: SlottingData,
    /// The slot reported as current.
    pub now: SlotId,
}

impl SlotClock for FixedSlotClock {
    fn system_start(&self) -> Timestamp {
        self.start
    }

    fn slotting_data(&self) -> SlottingData {
        self.data
    }

    fn current_slot(&self) -> SlotId {
        self.now
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DATA: SlottingData = SlottingData { epoch_slots: 100, slot_duration_ms: 20_000 };

    #[test]
    fn flatten_slot_counts_across_epochs() {
        assert_eq!(flatten_slot(&DATA, SlotId { epoch: 0, slot: 0 }), Some(0));
        assert_eq!(flatten_slot(&DATA, SlotId { epoch: 0, slot: 99 }), Some(99));
        assert_eq!(flatten_slot(&DATA, SlotId { epoch: 2, slot: 5 }), Some(205));
    }

    #[test]
    fn flatten_slot_overflow_is_none() {
        let slot = SlotId { epoch: u64::MAX, slot: 0 };
        assert_eq!(flatten_slot(&DATA, slot), None);
    }

    #[test]
    fn slot_start_is_linear() {
        let start = 1_700_000_000_000;
        assert_eq!(slot_start(start, SlotId { epoch: 0, slot: 0 }, &DATA), Some(start));
        assert_eq!(
            slot_start(start, SlotId { epoch: 1, slot: 2 }, &DATA),
            Some(start + 102 * 20_000),
        );
    }

    #[test]
    fn slot_start_overflow_is_none() {
        let slot = SlotId { epoch: u64::MAX / 100, slot: 0 };
        assert_eq!(slot_start(0, slot, &DATA), None);
    }

    #[test]
    fn fixed_clock_reports_its_fields() {
        let clock = FixedSlotClock {
            start: 1_000,
            data: DATA,
            now: SlotId { epoch: 1, slot: 7 },
        };
        assert_eq!(clock.system_start(), 1_000);
        assert_eq!(clock.current_slot(), SlotId { epoch: 1, slot: 7 });
        assert_eq!(clock.slot_start_of(SlotId { epoch: 0, slot: 1 }), Some(21_000));
    }

    #[test]
    fn slot_display() {
        assert_eq!(SlotId { epoch: 3, slot: 14 }.to_string(), "3/14");
    }
}
