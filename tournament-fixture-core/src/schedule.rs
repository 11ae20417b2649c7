//! Placement of matches on courts.
//!
//! The availability windows of all courts of a tournament are cut into [`TimeSlot`]s of
//! equal length. [`allocate`] then walks over all pending matches in round order and hands
//! each one the first free slot, preferring the days the [`DayPlan`] picked for its round.
//! Nothing is ever moved once placed: a match that finds no free slot is reported back as
//! unscheduled.
use std::collections::HashSet;

use chrono::NaiveDate;

use crate::{CourtId, DayPlan, Error, Result, Round, TimeOfDay};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A period in which a court can be used by a tournament.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AvailabilityWindow {
    pub court: CourtId,
    pub date: NaiveDate,
    pub start: TimeOfDay,
    pub end: TimeOfDay,
}

/// The length of a time slot.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SlotLength {
    /// The time a match takes, in minutes.
    pub duration: u16,
    /// The break after every match, in minutes.
    pub buffer: u16,
}

impl SlotLength {
    #[inline]
    pub fn new(duration: u16, buffer: u16) -> Self {
        Self { duration, buffer }
    }

    /// Returns the distance between the start times of two consecutive slots.
    #[inline]
    pub fn step(&self) -> u16 {
        self.duration.saturating_add(self.buffer)
    }
}

/// Identifies a slot. No two matches of a tournament may have the same key.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SlotKey {
    pub court: CourtId,
    pub date: NaiveDate,
    pub start: TimeOfDay,
}

/// A court for the duration of a single match.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TimeSlot {
    pub court: CourtId,
    pub date: NaiveDate,
    pub start: TimeOfDay,
    pub end: TimeOfDay,
}

impl TimeSlot {
    #[inline]
    pub fn key(&self) -> SlotKey {
        SlotKey {
            court: self.court,
            date: self.date,
            start: self.start,
        }
    }
}

/// The slots already used by matches of a tournament.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OccupiedSlots {
    keys: HashSet<SlotKey>,
}

impl OccupiedSlots {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks `key` as occupied. Returns `false` if it already was.
    #[inline]
    pub fn insert(&mut self, key: SlotKey) -> bool {
        self.keys.insert(key)
    }

    #[inline]
    pub fn contains(&self, key: &SlotKey) -> bool {
        self.keys.contains(key)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl FromIterator<SlotKey> for OccupiedSlots {
    fn from_iter<T: IntoIterator<Item = SlotKey>>(iter: T) -> Self {
        Self {
            keys: iter.into_iter().collect(),
        }
    }
}

impl Extend<SlotKey> for OccupiedSlots {
    fn extend<T: IntoIterator<Item = SlotKey>>(&mut self, iter: T) {
        self.keys.extend(iter);
    }
}

/// A match waiting for a slot. `key` identifies the match for the caller.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PendingMatch<K> {
    pub key: K,
    pub round: Round,
    pub number: u32,
}

impl<K> PendingMatch<K> {
    #[inline]
    pub fn new(key: K, round: Round, number: u32) -> Self {
        Self { key, round, number }
    }
}

/// The result of [`allocate`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Allocation<K> {
    /// The matches that received a slot, in the order they were placed.
    pub assigned: Vec<(K, TimeSlot)>,
    /// The matches for which no slot was left.
    pub unscheduled: Vec<K>,
    /// The occupied slots including all slots assigned in this run.
    pub occupied: OccupiedSlots,
}

/// Cuts all `windows` into slots of `length`.
///
/// A slot is only created if the match fits into the window. The buffer of the last slot
/// may reach past the end of the window. The returned slots are ordered by date, start time
/// and court.
///
/// # Errors
///
/// Returns [`Error::InvalidWindow`] if a window does not start before it ends and
/// [`Error::InvalidSlotLength`] if `length` has a duration of zero.
pub fn generate_slots(
    windows: &[AvailabilityWindow],
    length: SlotLength,
) -> Result<Vec<TimeSlot>> {
    if length.duration == 0 {
        return Err(Error::InvalidSlotLength);
    }

    let mut slots = Vec::new();

    for window in windows {
        if window.start >= window.end {
            return Err(Error::InvalidWindow {
                court: window.court,
                date: window.date,
                start: window.start,
                end: window.end,
            });
        }

        let mut start = Some(window.start);
        while let Some(slot_start) = start {
            let end = match slot_start.end_time(length.duration) {
                Some(end) if end <= window.end => end,
                _ => break,
            };

            slots.push(TimeSlot {
                court: window.court,
                date: window.date,
                start: slot_start,
                end,
            });

            start = slot_start.checked_add(length.step());
        }
    }

    slots.sort_by_key(|slot| (slot.date, slot.start, slot.court));
    // Overlapping windows of the same court would produce the same slot twice.
    slots.dedup_by_key(|slot| slot.key());

    log::trace!(
        "Generated {} slots from {} windows",
        slots.len(),
        windows.len()
    );

    Ok(slots)
}

/// Assigns a slot from `slots` to every match in `pending`.
///
/// Matches are placed in round order, then by their number. Every match takes the first
/// slot that is not in `occupied`, looking at the preferred days of its round first, then
/// at its fallback days and finally at all other days. `slots` must be ordered as returned
/// by [`generate_slots`].
pub fn allocate<K>(
    mut pending: Vec<PendingMatch<K>>,
    slots: &[TimeSlot],
    plan: &DayPlan,
    mut occupied: OccupiedSlots,
) -> Allocation<K>
where
    K: Copy,
{
    pending.sort_by_key(|m| (m.round, m.number));

    let mut assigned = Vec::with_capacity(pending.len());
    let mut unscheduled = Vec::new();

    for m in pending {
        let preference = plan.days_for(&m.round);

        let slot = (0..=2).find_map(|tier| {
            slots.iter().find(|slot| {
                preference.tier(slot.date) == tier && !occupied.contains(&slot.key())
            })
        });

        match slot {
            Some(slot) => {
                occupied.insert(slot.key());
                assigned.push((m.key, *slot));
            }
            None => unscheduled.push(m.key),
        }
    }

    log::debug!(
        "Allocated {} matches, {} left unscheduled",
        assigned.len(),
        unscheduled.len()
    );

    Allocation {
        assigned,
        unscheduled,
        occupied,
    }
}
