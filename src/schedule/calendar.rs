use std::collections::{BTreeMap, HashMap};

use chrono::{FixedOffset, NaiveDate};
use ulid::Ulid;

use crate::model::*;

/// Bookings grouped by resource, then by local calendar date.
pub type ResourceDayIndex<'a> = HashMap<Ulid, BTreeMap<NaiveDate, Vec<&'a Booking>>>;

/// Bookings grouped by resource only.
pub type ResourceIndex<'a> = HashMap<Ulid, Vec<&'a Booking>>;

/// Every local date the half-open `span` touches.
///
/// A span ending exactly at midnight does not touch the next day; a
/// zero-length span touches the date it sits on.
pub fn days_touched(span: &Span, offset: &FixedOffset) -> Vec<NaiveDate> {
    let Some(first) = local_date(span.start, offset) else {
        return Vec::new();
    };
    let last = if span.end > span.start {
        local_date(span.end - 1, offset).unwrap_or(first)
    } else {
        first
    };
    first.iter_days().take_while(|d| *d <= last).collect()
}

/// Two-level index for day and week views: a booking spanning several days
/// is listed under each of them.
pub fn by_resource_and_date<'a>(bookings: &'a [Booking], offset: &FixedOffset) -> ResourceDayIndex<'a> {
    let mut index: ResourceDayIndex<'a> = HashMap::new();
    for booking in bookings {
        let days = days_touched(&booking.span(), offset);
        if days.is_empty() {
            tracing::debug!("booking {} outside calendar range, skipped", booking.id);
            continue;
        }
        let by_day = index.entry(booking.resource_id).or_default();
        for day in days {
            by_day.entry(day).or_default().push(booking);
        }
    }
    index
}

/// Single-level index for views that show one day only.
pub fn by_resource(bookings: &[Booking]) -> ResourceIndex<'_> {
    let mut index: ResourceIndex<'_> = HashMap::new();
    for booking in bookings {
        index.entry(booking.resource_id).or_default().push(booking);
    }
    index
}
