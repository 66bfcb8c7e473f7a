use crate::model::Ms;

/// Earliest instant accepted anywhere in the core (2000-01-01T00:00:00Z).
pub const MIN_VALID_TIMESTAMP_MS: Ms = 946_684_800_000;
/// Latest instant accepted anywhere in the core (2100-01-01T00:00:00Z).
pub const MAX_VALID_TIMESTAMP_MS: Ms = 4_102_444_800_000;

/// A single booking may not span more than 31 days.
pub const MAX_SPAN_DURATION_MS: Ms = 31 * 24 * 3_600_000;

/// One-minute slots over a full day.
pub const MAX_SLOTS_PER_DAY: usize = 1_440;

/// Upper bound on occurrences materialized from one series.
pub const MAX_OCCURRENCES: usize = 1_000;

pub const MAX_REF_LEN: usize = 256;
pub const MAX_BOOKINGS_PER_RESOURCE: usize = 100_000;
pub const MAX_RESOURCES_PER_QUERY: usize = 256;
