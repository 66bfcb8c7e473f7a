use std::collections::BTreeSet;
use std::num::NonZeroU32;

use chrono::{Datelike, Days, FixedOffset, Months, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::limits::MAX_OCCURRENCES;
use crate::model::*;

use super::ScheduleError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
}

/// When a series stops generating occurrences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SeriesEnd {
    Never,
    /// Last occurrence falls on or before this local date.
    OnDate(NaiveDate),
    /// Exactly this many occurrences, detached ones included.
    AfterCount(u32),
}

/// Attributes every generated occurrence carries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesTemplate {
    pub resource_id: Ulid,
    pub duration_ms: Ms,
    pub patient_ref: Option<String>,
    pub clinician_ref: Option<String>,
    pub booking_type_ref: Option<String>,
}

/// A booking repeated at a fixed cadence, in facility-local wall time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecurrenceSeries {
    pub id: Ulid,
    pub frequency: Frequency,
    pub interval: NonZeroU32,
    pub first: NaiveDateTime,
    pub end: SeriesEnd,
    pub template: SeriesTemplate,
    /// Occurrences that were modified individually and live on as
    /// standalone bookings. The series no longer generates them.
    pub detached: BTreeSet<NaiveDateTime>,
}

impl RecurrenceSeries {
    pub fn new(
        frequency: Frequency,
        interval: NonZeroU32,
        first: NaiveDateTime,
        end: SeriesEnd,
        template: SeriesTemplate,
    ) -> Self {
        Self {
            id: Ulid::new(),
            frequency,
            interval,
            first,
            end,
            template,
            detached: BTreeSet::new(),
        }
    }

    /// Wall time of the `k`-th generated occurrence, ignoring the end bound.
    pub fn nth(&self, k: u32) -> Option<NaiveDateTime> {
        let steps = k.checked_mul(self.interval.get())?;
        match self.frequency {
            Frequency::Daily => self.first.checked_add_days(Days::new(steps as u64)),
            Frequency::Weekly => self.first.checked_add_days(Days::new(steps as u64 * 7)),
            Frequency::Monthly => self.first.checked_add_months(Months::new(steps)),
        }
    }

    /// Position of `at` in the cadence, if it is one of the occurrences.
    pub fn index_of(&self, at: NaiveDateTime) -> Option<u32> {
        if at < self.first {
            return None;
        }
        let step = self.interval.get() as i64;
        let (from, to) = (self.first.date(), at.date());
        let k = match self.frequency {
            Frequency::Daily => exact_div((to - from).num_days(), step)?,
            Frequency::Weekly => exact_div((to - from).num_days(), step * 7)?,
            Frequency::Monthly => exact_div(months_between(from, to), step)?,
        };
        let k = u32::try_from(k).ok()?;
        (self.nth(k)? == at).then_some(k)
    }

    fn within_end(&self, k: u32, at: &NaiveDateTime) -> bool {
        match self.end {
            SeriesEnd::Never => true,
            SeriesEnd::OnDate(last) => at.date() <= last,
            SeriesEnd::AfterCount(n) => k < n,
        }
    }

    /// Whether `at` is an occurrence the series currently generates.
    pub fn generates(&self, at: NaiveDateTime) -> bool {
        self.index_of(at)
            .is_some_and(|k| self.within_end(k, &at) && !self.detached.contains(&at))
    }

    /// Generated occurrences in order, skipping detached ones.
    /// Open-ended series are capped at `MAX_OCCURRENCES`.
    pub fn occurrences(&self) -> impl Iterator<Item = NaiveDateTime> + '_ {
        self.generated_from(0).take(MAX_OCCURRENCES)
    }

    /// Index of the first cadence point at or after `from`, ignoring the end
    /// bound.
    pub fn first_index_from(&self, from: NaiveDateTime) -> Option<u32> {
        if from <= self.first {
            return Some(0);
        }
        let step = self.interval.get() as i64;
        let (a, b) = (self.first.date(), from.date());
        let estimate = match self.frequency {
            Frequency::Daily => (b - a).num_days() / step,
            Frequency::Weekly => (b - a).num_days() / (step * 7),
            Frequency::Monthly => months_between(a, b) / step,
        };
        // One step back is always before `from`; walk forward from there.
        let mut k = u32::try_from((estimate - 1).max(0)).ok()?;
        while self.nth(k)? < from {
            k = k.checked_add(1)?;
        }
        Some(k)
    }

    fn generated_from(&self, k0: u32) -> impl Iterator<Item = NaiveDateTime> + '_ {
        (k0..=u32::MAX)
            .map_while(move |k| {
                let at = self.nth(k)?;
                self.within_end(k, &at).then_some(at)
            })
            .filter(move |at| !self.detached.contains(at))
    }

    /// Wall times of the generated occurrences whose span overlaps `window`,
    /// however far into the series the window lies.
    pub fn occurrences_in(&self, window: &Span, offset: &FixedOffset) -> Vec<NaiveDateTime> {
        let earliest_start = window.start - self.template.duration_ms.max(0);
        let k0 = match local_datetime(earliest_start, offset) {
            Some(from) => self.first_index_from(from),
            None => Some(0),
        };
        let Some(k0) = k0 else {
            return Vec::new();
        };
        self.generated_from(k0)
            .take_while(|at| ms_from_local(*at, offset) < window.end)
            .filter(|at| self.occurrence_span(*at, offset).overlaps(window))
            .collect()
    }

    /// Negative durations collapse to an empty span; `validate` rejects them.
    pub fn occurrence_span(&self, at: NaiveDateTime, offset: &FixedOffset) -> Span {
        let start = ms_from_local(at, offset);
        Span::new(start, start + self.template.duration_ms.max(0))
    }

    /// Occurrence spans overlapping `window`.
    pub fn occurrences_between(&self, window: &Span, offset: &FixedOffset) -> Vec<Span> {
        self.occurrences_in(window, offset)
            .into_iter()
            .map(|at| self.occurrence_span(at, offset))
            .collect()
    }

    pub fn validate(&self) -> Result<(), ScheduleError> {
        if self.template.duration_ms <= 0 {
            return Err(ScheduleError::InvalidScope("occurrence duration must be positive"));
        }
        Ok(())
    }

    /// Booking draft for one occurrence, linked back to this series.
    pub fn draft_for(&self, at: NaiveDateTime, offset: &FixedOffset) -> BookingDraft {
        BookingDraft {
            resource_id: self.template.resource_id,
            span: self.occurrence_span(at, offset),
            patient_ref: self.template.patient_ref.clone(),
            clinician_ref: self.template.clinician_ref.clone(),
            booking_type_ref: self.template.booking_type_ref.clone(),
            series_id: Some(self.id),
        }
    }
}

fn months_between(from: NaiveDate, to: NaiveDate) -> i64 {
    (to.year() as i64 - from.year() as i64) * 12 + to.month0() as i64 - from.month0() as i64
}

fn exact_div(n: i64, d: i64) -> Option<i64> {
    (n >= 0 && n % d == 0).then(|| n / d)
}

/// Which occurrences a modification applies to. Always chosen by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModificationScope {
    ThisOccurrence,
    ThisAndFuture,
}

/// Attributes changed by a modification. `None` keeps the current value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OccurrencePatch {
    pub resource_id: Option<Ulid>,
    pub start_time: Option<NaiveTime>,
    pub duration_ms: Option<Ms>,
    pub patient_ref: Option<String>,
    pub clinician_ref: Option<String>,
    pub booking_type_ref: Option<String>,
}

impl OccurrencePatch {
    fn apply(&self, template: &SeriesTemplate) -> SeriesTemplate {
        SeriesTemplate {
            resource_id: self.resource_id.unwrap_or(template.resource_id),
            duration_ms: self.duration_ms.unwrap_or(template.duration_ms),
            patient_ref: self.patient_ref.clone().or_else(|| template.patient_ref.clone()),
            clinician_ref: self
                .clinician_ref
                .clone()
                .or_else(|| template.clinician_ref.clone()),
            booking_type_ref: self
                .booking_type_ref
                .clone()
                .or_else(|| template.booking_type_ref.clone()),
        }
    }

    fn moved(&self, at: NaiveDateTime) -> NaiveDateTime {
        self.start_time.map_or(at, |t| at.date().and_time(t))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScopeResolution {
    /// The target became a standalone booking; the series skips it from now on.
    Detached {
        series: RecurrenceSeries,
        booking: BookingDraft,
    },
    /// The series was cut before the target and a successor continues from it.
    /// `truncated` is `None` when the target was the first occurrence.
    Split {
        truncated: Option<RecurrenceSeries>,
        successor: RecurrenceSeries,
    },
}

/// Decide how a modification of the occurrence at `target` applies.
///
/// Nothing is mutated in place; the caller persists the returned series and
/// bookings through the gateway.
pub fn resolve(
    series: &RecurrenceSeries,
    target: NaiveDateTime,
    scope: ModificationScope,
    patch: &OccurrencePatch,
    offset: &FixedOffset,
) -> Result<ScopeResolution, ScheduleError> {
    series.validate()?;
    if patch.duration_ms.is_some_and(|d| d <= 0) {
        return Err(ScheduleError::InvalidScope("occurrence duration must be positive"));
    }
    if target < series.first {
        return Err(ScheduleError::InvalidScope("target predates series start"));
    }
    let k = series
        .index_of(target)
        .ok_or(ScheduleError::InvalidScope("target is not an occurrence of the series"))?;
    if !series.within_end(k, &target) {
        return Err(ScheduleError::InvalidScope("target lies beyond the series end"));
    }
    if series.detached.contains(&target) {
        return Err(ScheduleError::InvalidScope("occurrence already detached"));
    }

    match scope {
        ModificationScope::ThisOccurrence => Ok(detach(series, target, patch, offset)),
        ModificationScope::ThisAndFuture => Ok(split(series, target, k, patch)),
    }
}

fn detach(
    series: &RecurrenceSeries,
    target: NaiveDateTime,
    patch: &OccurrencePatch,
    offset: &FixedOffset,
) -> ScopeResolution {
    let mut remaining = series.clone();
    remaining.detached.insert(target);

    let template = patch.apply(&series.template);
    let start = ms_from_local(patch.moved(target), offset);
    let booking = BookingDraft {
        resource_id: template.resource_id,
        span: Span::new(start, start + template.duration_ms),
        patient_ref: template.patient_ref,
        clinician_ref: template.clinician_ref,
        booking_type_ref: template.booking_type_ref,
        series_id: None,
    };
    tracing::debug!("detached occurrence {target} from series {}", series.id);
    ScopeResolution::Detached {
        series: remaining,
        booking,
    }
}

fn split(series: &RecurrenceSeries, target: NaiveDateTime, k: u32, patch: &OccurrencePatch) -> ScopeResolution {
    let truncated = (k > 0).then(|| {
        let mut before = series.clone();
        before.end = match series.end {
            SeriesEnd::AfterCount(_) => SeriesEnd::AfterCount(k),
            SeriesEnd::Never | SeriesEnd::OnDate(_) => {
                // Occurrences are at least a day apart, so the previous date is free.
                SeriesEnd::OnDate(target.date().pred_opt().unwrap_or(target.date()))
            }
        };
        before.detached.retain(|at| *at < target);
        before
    });

    let first = patch.moved(target);
    let shift = first - target;
    let successor = RecurrenceSeries {
        id: Ulid::new(),
        frequency: series.frequency,
        interval: series.interval,
        first,
        end: match series.end {
            SeriesEnd::Never => SeriesEnd::Never,
            SeriesEnd::OnDate(last) => SeriesEnd::OnDate(last),
            SeriesEnd::AfterCount(n) => SeriesEnd::AfterCount(n - k),
        },
        template: patch.apply(&series.template),
        detached: series
            .detached
            .iter()
            .filter(|at| **at > target)
            .map(|at| *at + shift)
            .collect(),
    };
    tracing::debug!(
        "split series {} at {target}; successor {}",
        series.id,
        successor.id
    );
    ScopeResolution::Split { truncated, successor }
}
