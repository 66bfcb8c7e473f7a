//! Client-side state for one open booking form.
//!
//! The form owns an explicit [`SelectionState`] and threads it through the
//! pure reducer; nothing here is global. Availability is fetched through a
//! [`BookingGateway`] and guarded by a monotonic [`RequestToken`] so a late
//! response for a superseded resource or date is dropped.

use chrono::NaiveDate;
use thiserror::Error;
use tracing::{debug, info, warn};
use ulid::Ulid;

use crate::gateway::{BookingGateway, GatewayError};
use crate::model::*;
use crate::observability;
use crate::schedule::{
    is_slot_selectable, CommittedIntervals, ScheduleError, SelectionMode, SelectionState, SlotGrid,
};
use crate::settings::{SettingsProvider, SettingsState};

/// Raw date field contents, classified once.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum DateInput {
    #[default]
    Absent,
    Malformed(String),
    Valid(NaiveDate),
}

impl DateInput {
    /// Accepts `YYYY-MM-DD`. Blank input counts as absent.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            None | Some("") => DateInput::Absent,
            Some(s) => match NaiveDate::parse_from_str(s, "%Y-%m-%d") {
                Ok(d) => DateInput::Valid(d),
                Err(_) => DateInput::Malformed(s.to_string()),
            },
        }
    }

    pub fn date(&self) -> Option<NaiveDate> {
        match self {
            DateInput::Valid(d) => Some(*d),
            DateInput::Absent | DateInput::Malformed(_) => None,
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, DateInput::Valid(_))
    }
}

/// Identifies one availability query. Only the newest token may apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestToken(u64);

/// What the form needs the gateway to list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AvailabilityQuery {
    pub token: RequestToken,
    pub resource_id: Ulid,
    pub range: Span,
}

/// One row of the slot picker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotView {
    pub slot: TimeSlot,
    pub selected: bool,
    pub selectable: bool,
}

/// Foreign references attached to the booking on submit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookingRefs {
    pub patient_ref: Option<String>,
    pub clinician_ref: Option<String>,
    pub booking_type_ref: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmitError {
    #[error("booking incomplete: {0}")]
    Incomplete(&'static str),
    #[error("the selected time was just booked by someone else (booking {0})")]
    Conflict(Ulid),
    #[error("booking failed: {0}")]
    Gateway(GatewayError),
}

impl From<GatewayError> for SubmitError {
    fn from(e: GatewayError) -> Self {
        match e {
            GatewayError::Conflict(id) => SubmitError::Conflict(id),
            other => SubmitError::Gateway(other),
        }
    }
}

impl SubmitError {
    /// Message for the person at the form. Conflicts read differently from
    /// generic failures.
    pub fn user_message(&self) -> &'static str {
        match self {
            SubmitError::Incomplete(_) => "Choose a resource, a date and a time first.",
            SubmitError::Conflict(_) => {
                "That time is no longer available. Please choose another slot."
            }
            SubmitError::Gateway(_) => "The booking could not be saved. Please try again.",
        }
    }

    fn metric_label(&self) -> &'static str {
        match self {
            SubmitError::Incomplete(_) => "incomplete",
            SubmitError::Conflict(_) => "conflict",
            SubmitError::Gateway(e) => observability::error_label(e),
        }
    }
}

/// Why facility settings could not be put to use.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error(transparent)]
    Schedule(#[from] ScheduleError),
}

pub struct BookingForm {
    settings: SettingsState,
    resource_id: Option<Ulid>,
    date: DateInput,
    /// Booking being edited; its own interval never blocks a slot.
    editing: Option<Booking>,
    grid: Option<SlotGrid>,
    selection: SelectionState,
    committed: CommittedIntervals,
    latest: RequestToken,
    /// Token of the last query whose response was applied.
    loaded: Option<RequestToken>,
}

impl BookingForm {
    pub fn new(mode: SelectionMode) -> Self {
        Self {
            settings: SettingsState::Pending,
            resource_id: None,
            date: DateInput::Absent,
            editing: None,
            grid: None,
            selection: SelectionState::new(mode),
            committed: CommittedIntervals::default(),
            latest: RequestToken(0),
            loaded: None,
        }
    }

    /// Open the form on an existing booking.
    pub fn editing(booking: Booking, mode: SelectionMode) -> Self {
        let mut form = Self::new(mode);
        form.resource_id = Some(booking.resource_id);
        form.editing = Some(booking);
        form
    }

    pub fn settings(&self) -> &SettingsState {
        &self.settings
    }

    pub fn resource_id(&self) -> Option<Ulid> {
        self.resource_id
    }

    pub fn date(&self) -> &DateInput {
        &self.date
    }

    pub fn selection(&self) -> &SelectionState {
        &self.selection
    }

    pub fn committed(&self) -> &CommittedIntervals {
        &self.committed
    }

    pub fn grid(&self) -> Result<&SlotGrid, ScheduleError> {
        match (&self.grid, &self.settings) {
            (Some(grid), _) => Ok(grid),
            (None, SettingsState::Pending) => Err(ScheduleError::SettingsPending),
            (None, SettingsState::Ready(_)) => Err(ScheduleError::NoDate),
        }
    }

    /// True once the latest availability query has been applied.
    pub fn is_loaded(&self) -> bool {
        self.loaded == Some(self.latest)
    }

    pub fn apply_settings(&mut self, settings: SettingsState) -> Result<(), ScheduleError> {
        self.settings = settings;
        self.rebuild_grid()
    }

    pub async fn load_settings(&mut self, provider: &dyn SettingsProvider) -> Result<(), LoadError> {
        let state = provider.fetch().await?;
        Ok(self.apply_settings(state)?)
    }

    pub fn set_mode(&mut self, mode: SelectionMode) {
        self.selection = self.selection.with_mode(mode);
    }

    /// Switch resource. Any in-flight availability query becomes stale.
    pub fn set_resource(&mut self, resource_id: Ulid) -> RequestToken {
        self.resource_id = Some(resource_id);
        self.invalidate()
    }

    /// Switch date. Any in-flight availability query becomes stale.
    pub fn set_date(&mut self, date: DateInput) -> Result<RequestToken, ScheduleError> {
        self.date = date;
        self.rebuild_grid()?;
        Ok(self.invalidate())
    }

    fn rebuild_grid(&mut self) -> Result<(), ScheduleError> {
        self.grid = None;
        self.selection = self.selection.cleared();
        let (Some(date), Some(_)) = (self.date.date(), self.settings.ready()) else {
            return Ok(());
        };
        self.grid = Some(self.settings.grid(date)?);
        Ok(())
    }

    fn invalidate(&mut self) -> RequestToken {
        self.latest = RequestToken(self.latest.0 + 1);
        self.selection = self.selection.cleared();
        self.committed = CommittedIntervals::default();
        self.latest
    }

    /// The query to run for the current resource and date, tagged with the
    /// current token. `None` until both are chosen and settings are loaded.
    pub fn availability_query(&self) -> Option<AvailabilityQuery> {
        let resource_id = self.resource_id?;
        let settings = self.settings.ready()?;
        let date = self.date.date()?;
        Some(AvailabilityQuery {
            token: self.latest,
            resource_id,
            range: day_span(date, &settings.offset()),
        })
    }

    /// Apply a gateway response. Returns false, leaving state untouched, if
    /// the response belongs to a superseded query.
    pub fn apply_availability(&mut self, token: RequestToken, bookings: &[Booking]) -> bool {
        if token != self.latest {
            debug!("discarding stale availability response {token:?}, latest {:?}", self.latest);
            metrics::counter!(observability::STALE_RESPONSES_DISCARDED_TOTAL).increment(1);
            return false;
        }
        let resource_id = self.resource_id;
        self.committed = CommittedIntervals::from_bookings(
            bookings.iter().filter(|b| Some(b.resource_id) == resource_id),
        );
        self.loaded = Some(token);
        self.drop_blocked_selection();
        true
    }

    /// Fold a live booking change into the committed intervals without a
    /// refetch. Ignored until availability is loaded, and for other
    /// resources. Applying the same event twice is harmless.
    pub fn apply_event(&mut self, event: &Event) -> bool {
        let Some(query) = self.availability_query() else {
            return false;
        };
        if !self.is_loaded() || event.resource_id() != query.resource_id {
            return false;
        }
        let mut intervals = match event {
            Event::BookingCreated { booking } | Event::BookingUpdated { booking, .. } => {
                self.committed.without(booking.id)
            }
            Event::BookingCancelled { id, .. } => self.committed.without(*id),
        }
        .as_slice()
        .to_vec();
        if let Event::BookingCreated { booking } | Event::BookingUpdated { booking, .. } = event
            && booking.span().overlaps(&query.range)
        {
            intervals.push(booking.interval());
        }
        self.committed = CommittedIntervals::new(intervals);
        self.drop_blocked_selection();
        true
    }

    // Bookings may have landed under the current selection.
    fn drop_blocked_selection(&mut self) {
        if let Some(span) = self.candidate_span()
            && self.blocking(&span).is_some()
        {
            debug!("selection no longer free, cleared");
            self.selection = self.selection.cleared();
        }
    }

    /// Fetch and apply availability for the current resource and date.
    pub async fn refresh(&mut self, gateway: &dyn BookingGateway) -> Result<bool, GatewayError> {
        let Some(query) = self.availability_query() else {
            return Ok(false);
        };
        let bookings = gateway.list(&[query.resource_id], query.range).await?;
        Ok(self.apply_availability(query.token, &bookings))
    }

    fn blocking(&self, span: &Span) -> Option<Ulid> {
        let editing = self.editing.as_ref().map(|b| b.id);
        self.committed
            .overlapping(span)
            .map(|i| i.booking_id)
            .find(|id| Some(*id) != editing)
    }

    /// Whether toggling `slot` would keep the selection clear of committed
    /// bookings. Nothing is selectable until the latest availability query
    /// has been applied.
    pub fn is_selectable(&self, slot: SlotId) -> bool {
        if !self.is_loaded() {
            return false;
        }
        let Some(grid) = &self.grid else {
            return false;
        };
        let Some(candidate) = grid.get(slot) else {
            return false;
        };
        let editing = self.editing.as_ref().map(|b| b.id);
        match self.selection.mode() {
            SelectionMode::Range => is_slot_selectable(
                candidate,
                &self.selection.selected_slots(grid),
                &self.committed,
                editing,
            ),
            SelectionMode::StartOpen | SelectionMode::EndOpen => {
                // The toggle may pull in the rest of the day; test what it would select.
                let next = self.selection.toggle(grid, slot).selected_slots(grid);
                match next.first() {
                    Some(first) => is_slot_selectable(first, &next, &self.committed, editing),
                    None => true,
                }
            }
        }
    }

    /// Every slot with its selected/selectable flags.
    pub fn slot_views(&self) -> Result<Vec<SlotView>, ScheduleError> {
        let grid = self.grid()?;
        Ok(grid
            .slots()
            .iter()
            .map(|slot| SlotView {
                slot: *slot,
                selected: self.selection.selected().contains(&slot.id()),
                selectable: self.is_selectable(slot.id()),
            })
            .collect())
    }

    /// Toggle a slot. Unavailable slots are ignored.
    pub fn toggle(&mut self, slot: SlotId) -> &SelectionState {
        let Some(grid) = &self.grid else {
            return &self.selection;
        };
        if !self.is_selectable(slot) {
            debug!("toggle on unavailable slot {slot} ignored");
            metrics::counter!(observability::TOGGLES_REJECTED_TOTAL).increment(1);
            return &self.selection;
        }
        self.selection = self.selection.toggle(grid, slot);
        &self.selection
    }

    /// The interval that would be booked now.
    pub fn candidate_span(&self) -> Option<Span> {
        self.selection.span(self.grid.as_ref()?)
    }

    pub fn draft(&self, refs: &BookingRefs) -> Result<BookingDraft, SubmitError> {
        let resource_id = self
            .resource_id
            .ok_or(SubmitError::Incomplete("no resource chosen"))?;
        let span = self
            .candidate_span()
            .ok_or(SubmitError::Incomplete("no time selected"))?;
        Ok(BookingDraft {
            resource_id,
            span,
            patient_ref: refs.patient_ref.clone(),
            clinician_ref: refs.clinician_ref.clone(),
            booking_type_ref: refs.booking_type_ref.clone(),
            series_id: self.editing.as_ref().and_then(|b| b.series_id),
        })
    }

    /// Commit the selection through the gateway.
    ///
    /// The chosen interval is shown as taken while the call is in flight. On
    /// a conflict the optimistic interval and the selection are dropped and
    /// the form asks for a refresh; on any other failure the form returns to
    /// exactly where it was.
    pub async fn submit(
        &mut self,
        gateway: &dyn BookingGateway,
        refs: &BookingRefs,
    ) -> Result<Booking, SubmitError> {
        let draft = self.draft(refs)?;
        let snapshot_selection = self.selection.clone();
        let snapshot_committed = self.committed.clone();

        let mut optimistic = self.committed.as_slice().to_vec();
        optimistic.push(BookedInterval {
            span: draft.span,
            resource_id: draft.resource_id,
            booking_id: Ulid::nil(),
        });
        self.committed = CommittedIntervals::new(optimistic);
        self.selection = self.selection.cleared();

        let result = match &self.editing {
            Some(existing) => gateway.update(existing.id, draft).await,
            None => gateway.create(draft).await,
        };

        match result {
            Ok(booking) => {
                let mut committed = match &self.editing {
                    Some(existing) => snapshot_committed.without(existing.id),
                    None => snapshot_committed,
                };
                committed = CommittedIntervals::new(
                    committed
                        .as_slice()
                        .iter()
                        .copied()
                        .chain(std::iter::once(booking.interval()))
                        .collect(),
                );
                self.committed = committed;
                if self.editing.is_some() {
                    self.editing = Some(booking.clone());
                }
                info!("booking {} submitted", booking.id);
                Ok(booking)
            }
            Err(e) => {
                let err = SubmitError::from(e);
                metrics::counter!(observability::SUBMIT_FAILURES_TOTAL, "kind" => err.metric_label())
                    .increment(1);
                self.committed = snapshot_committed;
                match &err {
                    SubmitError::Conflict(id) => {
                        warn!("submit rolled back: conflicts with booking {id}");
                        self.invalidate();
                    }
                    _ => {
                        warn!("submit rolled back: {err}");
                        self.selection = snapshot_selection;
                    }
                }
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveTime;

    use super::*;
    use crate::gateway::InMemoryGateway;
    use crate::settings::FacilitySettings;

    fn settings() -> SettingsState {
        SettingsState::Ready(FacilitySettings {
            day_start: NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
            day_end: NaiveTime::from_hms_opt(17, 0, 0).unwrap(),
            slot_minutes: 30,
            utc_offset_minutes: 0,
        })
    }

    fn june_10() -> DateInput {
        DateInput::parse(Some("2024-06-10"))
    }

    fn at(h: u32, m: u32) -> Ms {
        ms_from_local(
            NaiveDate::from_ymd_opt(2024, 6, 10)
                .unwrap()
                .and_hms_opt(h, m, 0)
                .unwrap(),
            &chrono::FixedOffset::east_opt(0).unwrap(),
        )
    }

    fn ready_form(resource_id: Ulid) -> BookingForm {
        let mut form = BookingForm::new(SelectionMode::Range);
        form.apply_settings(settings()).unwrap();
        form.set_resource(resource_id);
        form.set_date(june_10()).unwrap();
        form
    }

    #[test]
    fn date_input_states() {
        assert_eq!(DateInput::parse(None), DateInput::Absent);
        assert_eq!(DateInput::parse(Some("  ")), DateInput::Absent);
        assert_eq!(
            DateInput::parse(Some("2024-13-01")),
            DateInput::Malformed("2024-13-01".into())
        );
        assert!(june_10().is_valid());
        assert_eq!(DateInput::Malformed("x".into()).date(), None);
    }

    #[test]
    fn pending_settings_have_no_grid() {
        let mut form = BookingForm::new(SelectionMode::Range);
        form.set_date(june_10()).unwrap();
        assert_eq!(form.slot_views(), Err(ScheduleError::SettingsPending));
        assert!(form.availability_query().is_none());
        form.apply_settings(settings()).unwrap();
        assert_eq!(form.slot_views().unwrap().len(), 18);
    }

    #[test]
    fn malformed_date_has_no_grid() {
        let mut form = ready_form(Ulid::new());
        form.set_date(DateInput::parse(Some("10/06/2024"))).unwrap();
        assert_eq!(form.grid(), Err(ScheduleError::NoDate));
        assert!(form.availability_query().is_none());
    }

    #[tokio::test]
    async fn bad_window_from_provider_passes_through() {
        let mut form = BookingForm::new(SelectionMode::Range);
        form.set_date(june_10()).unwrap();
        let SettingsState::Ready(mut inverted) = settings() else {
            unreachable!()
        };
        inverted.day_end = NaiveTime::from_hms_opt(7, 0, 0).unwrap();
        let provider = crate::settings::StaticSettings(SettingsState::Ready(inverted));
        let err = form.load_settings(&provider).await.unwrap_err();
        assert!(matches!(err, LoadError::Schedule(ScheduleError::InvalidWindow(_))));
    }

    #[test]
    fn toggles_wait_for_availability() {
        let r = Ulid::new();
        let mut form = ready_form(r);
        let existing = Booking::from_draft(
            Ulid::new(),
            BookingDraft::new(r, Span::new(at(10, 0), at(11, 0))),
        );
        let q = form.availability_query().unwrap();
        form.apply_availability(q.token, std::slice::from_ref(&existing));

        // Away and back: the earlier answer no longer counts.
        form.set_date(DateInput::parse(Some("2024-06-11"))).unwrap();
        form.set_date(june_10()).unwrap();
        assert!(!form.is_loaded());
        assert!(!form.is_selectable(at(10, 0)));
        assert!(!form.is_selectable(at(9, 0)));
        assert!(form.toggle(at(10, 0)).is_empty());
        assert!(form.slot_views().unwrap().iter().all(|v| !v.selectable));

        let q = form.availability_query().unwrap();
        form.apply_availability(q.token, &[existing]);
        assert!(!form.is_selectable(at(10, 0)));
        assert!(form.is_selectable(at(9, 0)));
        assert_eq!(form.toggle(at(9, 0)).len(), 1);
    }

    #[test]
    fn stale_response_discarded() {
        let mut form = ready_form(Ulid::new());
        let first = form.availability_query().unwrap();
        form.set_date(DateInput::parse(Some("2024-06-11"))).unwrap();
        let second = form.availability_query().unwrap();
        assert!(second.token > first.token);

        assert!(!form.apply_availability(first.token, &[]));
        assert!(!form.is_loaded());
        assert!(form.apply_availability(second.token, &[]));
        assert!(form.is_loaded());
    }

    #[test]
    fn booked_slot_toggle_is_noop() {
        let r = Ulid::new();
        let mut form = ready_form(r);
        let q = form.availability_query().unwrap();
        let existing = Booking::from_draft(
            Ulid::new(),
            BookingDraft::new(r, Span::new(at(10, 0), at(11, 0))),
        );
        form.apply_availability(q.token, &[existing]);

        assert!(!form.is_selectable(at(10, 30)));
        assert!(!form.is_selectable(at(7, 0))); // off grid
        assert!(form.toggle(at(10, 30)).is_empty());

        // A range reaching across the booking is refused too.
        form.toggle(at(9, 0));
        assert!(!form.is_selectable(at(11, 30)));
        assert_eq!(form.toggle(at(11, 30)).len(), 1);
    }

    #[test]
    fn start_open_refused_when_rest_of_day_is_taken() {
        let r = Ulid::new();
        let mut form = ready_form(r);
        form.set_mode(SelectionMode::StartOpen);
        let q = form.availability_query().unwrap();
        let existing = Booking::from_draft(
            Ulid::new(),
            BookingDraft::new(r, Span::new(at(15, 0), at(16, 0))),
        );
        form.apply_availability(q.token, &[existing]);
        assert!(!form.is_selectable(at(9, 0)));
        assert!(form.is_selectable(at(16, 0)));
        assert_eq!(form.toggle(at(16, 0)).len(), 2);
    }

    #[test]
    fn other_resources_ignored() {
        let r = Ulid::new();
        let mut form = ready_form(r);
        let q = form.availability_query().unwrap();
        let elsewhere = Booking::from_draft(
            Ulid::new(),
            BookingDraft::new(Ulid::new(), Span::new(at(10, 0), at(11, 0))),
        );
        form.apply_availability(q.token, &[elsewhere]);
        assert!(form.committed().is_empty());
        assert!(form.is_selectable(at(10, 0)));
    }

    #[test]
    fn live_events_update_availability() {
        let r = Ulid::new();
        let mut form = ready_form(r);
        let booking = Booking::from_draft(
            Ulid::new(),
            BookingDraft::new(r, Span::new(at(9, 0), at(10, 0))),
        );
        let created = Event::BookingCreated {
            booking: booking.clone(),
        };
        // Nothing loaded yet.
        assert!(!form.apply_event(&created));

        let q = form.availability_query().unwrap();
        form.apply_availability(q.token, &[]);
        form.toggle(at(9, 30));
        assert!(form.apply_event(&created));
        assert!(form.apply_event(&created));
        assert_eq!(form.committed().len(), 1);
        assert!(form.selection().is_empty());

        let mut moved = booking.clone();
        moved.start = at(12, 0);
        moved.end = at(13, 0);
        form.apply_event(&Event::BookingUpdated {
            previous: booking.span(),
            booking: moved,
        });
        assert!(form.is_selectable(at(9, 0)));
        assert!(!form.is_selectable(at(12, 30)));

        form.apply_event(&Event::BookingCancelled {
            id: booking.id,
            resource_id: r,
        });
        assert!(form.committed().is_empty());

        let elsewhere = Event::BookingCancelled {
            id: Ulid::new(),
            resource_id: Ulid::new(),
        };
        assert!(!form.apply_event(&elsewhere));
    }

    #[test]
    fn draft_requires_selection() {
        let form = ready_form(Ulid::new());
        assert_eq!(
            form.draft(&BookingRefs::default()),
            Err(SubmitError::Incomplete("no time selected"))
        );
    }

    #[tokio::test]
    async fn submit_commits_and_marks_taken() {
        let gw = InMemoryGateway::default();
        let r = Ulid::new();
        let mut form = ready_form(r);
        form.refresh(&gw).await.unwrap();
        form.toggle(at(9, 0));
        form.toggle(at(9, 30));

        let refs = BookingRefs {
            patient_ref: Some("patient-7".into()),
            ..Default::default()
        };
        let booking = form.submit(&gw, &refs).await.unwrap();
        assert_eq!(booking.span(), Span::new(at(9, 0), at(10, 0)));
        assert_eq!(booking.patient_ref.as_deref(), Some("patient-7"));
        assert!(form.selection().is_empty());
        assert!(!form.is_selectable(at(9, 30)));
    }

    #[tokio::test]
    async fn conflict_rolls_back_and_invalidates() {
        let gw = InMemoryGateway::default();
        let r = Ulid::new();
        let mut form = ready_form(r);
        form.refresh(&gw).await.unwrap();
        form.toggle(at(9, 0));
        let before = form.availability_query().unwrap().token;

        // Someone else commits the same slot in the meantime.
        let other = gw
            .create(BookingDraft::new(r, Span::new(at(9, 0), at(9, 30))))
            .await
            .unwrap();

        let err = form.submit(&gw, &BookingRefs::default()).await.unwrap_err();
        assert_eq!(err, SubmitError::Conflict(other.id));
        let generic = SubmitError::Gateway(GatewayError::Unavailable("down".into()));
        assert_ne!(err.user_message(), generic.user_message());
        assert!(form.selection().is_empty());
        assert!(form.committed().is_empty());
        assert!(form.availability_query().unwrap().token > before);

        form.refresh(&gw).await.unwrap();
        assert!(!form.is_selectable(at(9, 0)));
    }

    #[tokio::test]
    async fn editing_does_not_block_itself() {
        let gw = InMemoryGateway::default();
        let r = Ulid::new();
        let existing = gw
            .create(BookingDraft::new(r, Span::new(at(10, 0), at(11, 0))))
            .await
            .unwrap();

        let mut form = BookingForm::editing(existing.clone(), SelectionMode::Range);
        form.apply_settings(settings()).unwrap();
        form.set_date(june_10()).unwrap();
        form.refresh(&gw).await.unwrap();

        assert!(form.is_selectable(at(10, 30)));
        form.toggle(at(10, 30));
        form.toggle(at(11, 0));
        let updated = form.submit(&gw, &BookingRefs::default()).await.unwrap();
        assert_eq!(updated.id, existing.id);
        assert_eq!(updated.span(), Span::new(at(10, 30), at(11, 30)));
        assert_eq!(form.committed().len(), 1);
    }
}
