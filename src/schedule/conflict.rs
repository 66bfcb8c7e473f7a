use ulid::Ulid;

use crate::model::*;

/// Symmetric half-open overlap test. Adjacent spans do not overlap.
pub fn overlaps(a: &Span, b: &Span) -> bool {
    a.overlaps(b)
}

/// Committed intervals for one resource, sorted by `span.start`.
///
/// Client-side copy of what the gateway returned; advisory only.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommittedIntervals {
    intervals: Vec<BookedInterval>,
}

impl CommittedIntervals {
    pub fn new(mut intervals: Vec<BookedInterval>) -> Self {
        intervals.sort_by_key(|i| i.span.start);
        Self { intervals }
    }

    pub fn from_bookings<'a>(bookings: impl IntoIterator<Item = &'a Booking>) -> Self {
        Self::new(bookings.into_iter().map(Booking::interval).collect())
    }

    pub fn len(&self) -> usize {
        self.intervals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    pub fn as_slice(&self) -> &[BookedInterval] {
        &self.intervals
    }

    /// Copy without the given booking, used when editing it.
    pub fn without(&self, booking_id: Ulid) -> Self {
        Self {
            intervals: self
                .intervals
                .iter()
                .filter(|i| i.booking_id != booking_id)
                .copied()
                .collect(),
        }
    }

    /// Only intervals overlapping `query`.
    /// Everything at index >= right_bound starts at or after `query.end`.
    pub fn overlapping(&self, query: &Span) -> impl Iterator<Item = &BookedInterval> {
        let right_bound = self
            .intervals
            .partition_point(|i| i.span.start < query.end);
        self.intervals[..right_bound]
            .iter()
            .filter(move |i| i.span.end > query.start)
    }

    /// First committed booking colliding with `span`.
    pub fn conflicts_with(&self, span: &Span) -> Option<Ulid> {
        self.overlapping(span).next().map(|i| i.booking_id)
    }
}

/// Every committed interval colliding with `candidate`.
pub fn find_conflicts<'a>(candidate: &Span, committed: &'a [BookedInterval]) -> Vec<&'a BookedInterval> {
    committed
        .iter()
        .filter(|i| overlaps(candidate, &i.span))
        .collect()
}

/// Bounding interval of `selection` with `candidate` added.
pub fn hypothetical_span(candidate: &TimeSlot, selection: &[TimeSlot]) -> Span {
    selection
        .iter()
        .fold(*candidate, |acc, slot| acc.bounding(slot))
}

/// Whether adding `candidate` to `selection` keeps the bounding interval free.
///
/// `editing` excludes that booking's own prior interval from the test.
pub fn is_slot_selectable(
    candidate: &TimeSlot,
    selection: &[TimeSlot],
    committed: &CommittedIntervals,
    editing: Option<Ulid>,
) -> bool {
    let bounding = hypothetical_span(candidate, selection);
    !committed
        .overlapping(&bounding)
        .any(|i| Some(i.booking_id) != editing)
}
