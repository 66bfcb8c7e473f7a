use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Unix milliseconds — the only instant type.
pub type Ms = i64;

/// Slots are identified by their start instant.
pub type SlotId = Ms;

pub const MINUTE_MS: Ms = 60_000;
pub const HOUR_MS: Ms = 3_600_000;
pub const DAY_MS: Ms = 86_400_000;

/// Half-open interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub start: Ms,
    pub end: Ms,
}

/// A generated, bookable slot. Never persisted.
pub type TimeSlot = Span;

impl Span {
    pub fn new(start: Ms, end: Ms) -> Self {
        debug_assert!(start <= end, "Span start must not be after end");
        Self { start, end }
    }

    pub fn duration_ms(&self) -> Ms {
        self.end - self.start
    }

    pub fn id(&self) -> SlotId {
        self.start
    }

    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn contains_instant(&self, t: Ms) -> bool {
        self.start <= t && t < self.end
    }

    /// Returns true if `self` fully contains `other`.
    pub fn contains_span(&self, other: &Span) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    /// Smallest span covering both.
    pub fn bounding(&self, other: &Span) -> Span {
        Span::new(self.start.min(other.start), self.end.max(other.end))
    }
}

/// A committed reservation against exactly one resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookedInterval {
    pub span: Span,
    pub resource_id: Ulid,
    pub booking_id: Ulid,
}

/// A committed booking as returned by the gateway.
///
/// `patient_ref`, `clinician_ref` and `booking_type_ref` are foreign
/// identifiers owned by other services; the core never interprets them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub id: Ulid,
    pub resource_id: Ulid,
    pub start: Ms,
    pub end: Ms,
    pub patient_ref: Option<String>,
    pub clinician_ref: Option<String>,
    pub booking_type_ref: Option<String>,
    /// Series this booking was generated from, if any.
    pub series_id: Option<Ulid>,
}

impl Booking {
    pub fn from_draft(id: Ulid, draft: BookingDraft) -> Self {
        Self {
            id,
            resource_id: draft.resource_id,
            start: draft.span.start,
            end: draft.span.end,
            patient_ref: draft.patient_ref,
            clinician_ref: draft.clinician_ref,
            booking_type_ref: draft.booking_type_ref,
            series_id: draft.series_id,
        }
    }

    pub fn span(&self) -> Span {
        Span::new(self.start, self.end)
    }

    pub fn interval(&self) -> BookedInterval {
        BookedInterval {
            span: self.span(),
            resource_id: self.resource_id,
            booking_id: self.id,
        }
    }
}

/// A booking not yet committed. The gateway assigns the id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingDraft {
    pub resource_id: Ulid,
    pub span: Span,
    pub patient_ref: Option<String>,
    pub clinician_ref: Option<String>,
    pub booking_type_ref: Option<String>,
    pub series_id: Option<Ulid>,
}

impl BookingDraft {
    pub fn new(resource_id: Ulid, span: Span) -> Self {
        Self {
            resource_id,
            span,
            patient_ref: None,
            clinician_ref: None,
            booking_type_ref: None,
            series_id: None,
        }
    }
}

/// All bookings on one resource, sorted by `start`.
#[derive(Debug, Clone)]
pub struct ResourceBookings {
    pub resource_id: Ulid,
    pub bookings: Vec<Booking>,
}

impl ResourceBookings {
    pub fn new(resource_id: Ulid) -> Self {
        Self {
            resource_id,
            bookings: Vec::new(),
        }
    }

    /// Insert booking maintaining sort order by start.
    pub fn insert(&mut self, booking: Booking) {
        let pos = self
            .bookings
            .binary_search_by_key(&booking.start, |b| b.start)
            .unwrap_or_else(|e| e);
        self.bookings.insert(pos, booking);
    }

    /// Remove booking by id.
    pub fn remove(&mut self, id: Ulid) -> Option<Booking> {
        let pos = self.bookings.iter().position(|b| b.id == id)?;
        Some(self.bookings.remove(pos))
    }

    /// Return only bookings whose span overlaps the query window.
    /// Uses binary search to skip bookings starting at or after `query.end`.
    pub fn overlapping(&self, query: &Span) -> impl Iterator<Item = &Booking> {
        let right_bound = self.bookings.partition_point(|b| b.start < query.end);
        self.bookings[..right_bound]
            .iter()
            .filter(move |b| b.end > query.start)
    }
}

/// Committed changes, broadcast per resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    BookingCreated { booking: Booking },
    BookingUpdated { previous: Span, booking: Booking },
    BookingCancelled { id: Ulid, resource_id: Ulid },
}

impl Event {
    pub fn resource_id(&self) -> Ulid {
        match self {
            Event::BookingCreated { booking } | Event::BookingUpdated { booking, .. } => {
                booking.resource_id
            }
            Event::BookingCancelled { resource_id, .. } => *resource_id,
        }
    }
}

// ── Local calendar conversions ────────────────────────────────────

/// Interpret a facility-local wall time as an instant.
pub fn ms_from_local(local: NaiveDateTime, offset: &FixedOffset) -> Ms {
    local.and_utc().timestamp_millis() - offset.local_minus_utc() as Ms * 1000
}

/// Wall time of an instant in facility-local time.
pub fn local_datetime(t: Ms, offset: &FixedOffset) -> Option<NaiveDateTime> {
    DateTime::from_timestamp_millis(t).map(|dt| dt.with_timezone(offset).naive_local())
}

/// Calendar date of an instant in facility-local time.
pub fn local_date(t: Ms, offset: &FixedOffset) -> Option<NaiveDate> {
    local_datetime(t, offset).map(|dt| dt.date())
}

/// The span covering a whole local calendar day.
pub fn day_span(date: NaiveDate, offset: &FixedOffset) -> Span {
    let start = ms_from_local(date.and_time(chrono::NaiveTime::MIN), offset);
    Span::new(start, start + DAY_MS)
}
