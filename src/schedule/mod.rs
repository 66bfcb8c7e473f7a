//! Pure scheduling computations: slot generation, conflict checks,
//! selection, calendar indexing and recurrence scoping.
//!
//! Nothing in here suspends or touches shared state; callers thread values
//! through explicitly.

pub mod calendar;
pub mod conflict;
mod error;
pub mod recurrence;
pub mod selection;
pub mod slots;

pub use calendar::{by_resource, by_resource_and_date, days_touched, ResourceDayIndex, ResourceIndex};
pub use conflict::{find_conflicts, is_slot_selectable, overlaps, CommittedIntervals};
pub use error::ScheduleError;
pub use recurrence::{
    resolve, Frequency, ModificationScope, OccurrencePatch, RecurrenceSeries, ScopeResolution,
    SeriesEnd, SeriesTemplate,
};
pub use selection::{SelectionMode, SelectionState};
pub use slots::{generate_slots, OperatingWindow, SlotGrid};
