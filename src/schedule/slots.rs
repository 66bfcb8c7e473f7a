use std::collections::BTreeSet;

use chrono::{FixedOffset, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::limits::MAX_SLOTS_PER_DAY;
use crate::model::*;

use super::ScheduleError;

/// A facility's daily operating window, in facility-local wall time.
///
/// An `end` of 00:00 closes the window at the following midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatingWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
    pub slot_ms: Ms,
}

impl OperatingWindow {
    pub fn new(start: NaiveTime, end: NaiveTime, slot_ms: Ms) -> Self {
        Self { start, end, slot_ms }
    }

    pub fn closes_at_midnight(&self) -> bool {
        self.end == NaiveTime::MIN
    }

    pub fn validate(&self) -> Result<(), ScheduleError> {
        if self.end <= self.start && !self.closes_at_midnight() {
            return Err(ScheduleError::InvalidWindow("window end must be after start"));
        }
        if self.slot_ms <= 0 {
            return Err(ScheduleError::InvalidWindow("slot duration must be positive"));
        }
        Ok(())
    }
}

/// Cut `[window.start, window.end)` on `date` into equal slots.
///
/// A trailing remainder shorter than one slot is dropped.
pub fn generate_slots(
    date: NaiveDate,
    window: &OperatingWindow,
    offset: &FixedOffset,
) -> Result<Vec<TimeSlot>, ScheduleError> {
    window.validate()?;
    let start = ms_from_local(date.and_time(window.start), offset);
    let end = if window.closes_at_midnight() {
        day_span(date, offset).end
    } else {
        ms_from_local(date.and_time(window.end), offset)
    };

    let count = ((end - start) / window.slot_ms) as usize;
    if count > MAX_SLOTS_PER_DAY {
        return Err(ScheduleError::InvalidWindow("too many slots in window"));
    }

    Ok((0..count as Ms)
        .map(|i| {
            let slot_start = start + i * window.slot_ms;
            Span::new(slot_start, slot_start + window.slot_ms)
        })
        .collect())
}

/// The ordered slot list for one day, with lookups by slot id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotGrid {
    slots: Vec<TimeSlot>,
}

impl SlotGrid {
    pub fn generate(
        date: NaiveDate,
        window: &OperatingWindow,
        offset: &FixedOffset,
    ) -> Result<Self, ScheduleError> {
        Ok(Self {
            slots: generate_slots(date, window, offset)?,
        })
    }

    pub fn slots(&self) -> &[TimeSlot] {
        &self.slots
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn first(&self) -> Option<&TimeSlot> {
        self.slots.first()
    }

    pub fn last(&self) -> Option<&TimeSlot> {
        self.slots.last()
    }

    pub fn position(&self, id: SlotId) -> Option<usize> {
        self.slots.binary_search_by_key(&id, |s| s.start).ok()
    }

    pub fn get(&self, id: SlotId) -> Option<&TimeSlot> {
        self.position(id).map(|i| &self.slots[i])
    }

    /// Inclusive run between two slots, in either temporal order.
    pub fn run(&self, a: SlotId, b: SlotId) -> Option<&[TimeSlot]> {
        let (ia, ib) = (self.position(a)?, self.position(b)?);
        Some(&self.slots[ia.min(ib)..=ia.max(ib)])
    }

    /// The slot and every later one.
    pub fn from_slot(&self, id: SlotId) -> Option<&[TimeSlot]> {
        self.position(id).map(|i| &self.slots[i..])
    }

    /// Every earlier slot and the slot itself.
    pub fn through_slot(&self, id: SlotId) -> Option<&[TimeSlot]> {
        self.position(id).map(|i| &self.slots[..=i])
    }

    /// The whole window covered by the grid.
    pub fn covering(&self) -> Option<Span> {
        Some(Span::new(self.first()?.start, self.last()?.end))
    }

    /// True if `ids` is empty or names an unbroken run of this grid.
    pub fn is_contiguous(&self, ids: &BTreeSet<SlotId>) -> bool {
        let (Some(&head), Some(&tail)) = (ids.first(), ids.last()) else {
            return true;
        };
        match (self.position(head), self.position(tail)) {
            (Some(h), Some(t)) => t - h + 1 == ids.len(),
            _ => false,
        }
    }
}
