use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::RwLock;
use tracing::{info, warn};
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;
use crate::notify::NotifyHub;
use crate::observability;

use super::{BookingGateway, GatewayError};

pub type SharedResourceBookings = Arc<RwLock<ResourceBookings>>;

/// Process-local gateway. Each resource's bookings sit behind their own lock,
/// so the conflict check and the insert happen atomically per resource.
pub struct InMemoryGateway {
    resources: DashMap<Ulid, SharedResourceBookings>,
    /// Reverse lookup: booking id → resource id
    booking_to_resource: DashMap<Ulid, Ulid>,
    pub notify: Arc<NotifyHub>,
}

impl Default for InMemoryGateway {
    fn default() -> Self {
        Self::new(Arc::new(NotifyHub::new()))
    }
}

pub(crate) fn validate_draft(draft: &BookingDraft) -> Result<(), GatewayError> {
    let span = &draft.span;
    if span.end <= span.start {
        return Err(GatewayError::Invalid("booking must end after it starts"));
    }
    if span.start < MIN_VALID_TIMESTAMP_MS || span.end > MAX_VALID_TIMESTAMP_MS {
        return Err(GatewayError::LimitExceeded("timestamp out of range"));
    }
    if span.duration_ms() > MAX_SPAN_DURATION_MS {
        return Err(GatewayError::LimitExceeded("span too wide"));
    }
    let refs = [&draft.patient_ref, &draft.clinician_ref, &draft.booking_type_ref];
    if refs.iter().any(|r| r.as_ref().is_some_and(|r| r.len() > MAX_REF_LEN)) {
        return Err(GatewayError::LimitExceeded("reference too long"));
    }
    Ok(())
}

/// Any committed booking overlapping `span` is a conflict, except `exclude`.
pub(crate) fn check_no_conflict(
    rb: &ResourceBookings,
    span: &Span,
    exclude: Option<Ulid>,
) -> Result<(), GatewayError> {
    match rb.overlapping(span).find(|b| Some(b.id) != exclude) {
        Some(existing) => Err(GatewayError::Conflict(existing.id)),
        None => Ok(()),
    }
}

impl InMemoryGateway {
    pub fn new(notify: Arc<NotifyHub>) -> Self {
        Self {
            resources: DashMap::new(),
            booking_to_resource: DashMap::new(),
            notify,
        }
    }

    fn resource(&self, id: Ulid) -> SharedResourceBookings {
        self.resources
            .entry(id)
            .or_insert_with(|| Arc::new(RwLock::new(ResourceBookings::new(id))))
            .value()
            .clone()
    }

    pub fn get_resource_for_booking(&self, booking_id: &Ulid) -> Option<Ulid> {
        self.booking_to_resource.get(booking_id).map(|e| *e.value())
    }

    pub async fn get(&self, id: Ulid) -> Option<Booking> {
        let resource_id = self.get_resource_for_booking(&id)?;
        let rs = self.resources.get(&resource_id)?.value().clone();
        let guard = rs.read().await;
        guard.bookings.iter().find(|b| b.id == id).cloned()
    }

    fn record_conflict(&self, op: &'static str, err: &GatewayError) {
        if let GatewayError::Conflict(existing) = err {
            warn!("{op} rejected: conflicts with booking {existing}");
            metrics::counter!(observability::BOOKING_CONFLICTS_TOTAL, "op" => op).increment(1);
        }
    }

    fn committed(&self, op: &'static str, event: Event) {
        metrics::counter!(observability::BOOKINGS_COMMITTED_TOTAL, "op" => op).increment(1);
        self.notify.send(event.resource_id(), &event);
    }

    async fn create_inner(&self, draft: BookingDraft) -> Result<Booking, GatewayError> {
        validate_draft(&draft)?;
        let rs = self.resource(draft.resource_id);
        let mut guard = rs.write().await;
        if guard.bookings.len() >= MAX_BOOKINGS_PER_RESOURCE {
            return Err(GatewayError::LimitExceeded("too many bookings on resource"));
        }
        check_no_conflict(&guard, &draft.span, None)?;

        let booking = Booking::from_draft(Ulid::new(), draft);
        guard.insert(booking.clone());
        self.booking_to_resource.insert(booking.id, booking.resource_id);
        drop(guard);

        info!(
            "booking {} committed on {} [{}, {})",
            booking.id, booking.resource_id, booking.start, booking.end
        );
        self.committed("create", Event::BookingCreated { booking: booking.clone() });
        Ok(booking)
    }

    async fn update_inner(&self, id: Ulid, draft: BookingDraft) -> Result<Booking, GatewayError> {
        validate_draft(&draft)?;
        let old_rid = self
            .get_resource_for_booking(&id)
            .ok_or(GatewayError::NotFound(id))?;
        let new_rid = draft.resource_id;

        // Acquire write locks in sorted order to prevent deadlocks.
        let mut rids = vec![old_rid, new_rid];
        rids.sort();
        rids.dedup();
        let mut guards = Vec::with_capacity(rids.len());
        for rid in &rids {
            guards.push(self.resource(*rid).write_owned().await);
        }
        let old_idx = rids.iter().position(|r| *r == old_rid).unwrap_or(0);
        let new_idx = rids.iter().position(|r| *r == new_rid).unwrap_or(0);

        // The booking may have moved or gone while we waited for the locks.
        let previous = guards[old_idx]
            .bookings
            .iter()
            .find(|b| b.id == id)
            .map(Booking::span)
            .ok_or(GatewayError::NotFound(id))?;
        if old_rid != new_rid && guards[new_idx].bookings.len() >= MAX_BOOKINGS_PER_RESOURCE {
            return Err(GatewayError::LimitExceeded("too many bookings on resource"));
        }
        check_no_conflict(&guards[new_idx], &draft.span, Some(id))?;

        guards[old_idx].remove(id);
        let booking = Booking::from_draft(id, draft);
        guards[new_idx].insert(booking.clone());
        self.booking_to_resource.insert(id, new_rid);
        drop(guards);

        info!("booking {id} moved to {new_rid} [{}, {})", booking.start, booking.end);
        if old_rid != new_rid {
            self.notify.send(
                old_rid,
                &Event::BookingCancelled {
                    id,
                    resource_id: old_rid,
                },
            );
        }
        self.committed(
            "update",
            Event::BookingUpdated {
                previous,
                booking: booking.clone(),
            },
        );
        Ok(booking)
    }

    async fn create_batch_inner(&self, drafts: Vec<BookingDraft>) -> Result<Vec<Booking>, GatewayError> {
        if drafts.is_empty() {
            return Ok(Vec::new());
        }
        if drafts.len() > MAX_OCCURRENCES {
            return Err(GatewayError::LimitExceeded("batch too large"));
        }
        for draft in &drafts {
            validate_draft(draft)?;
        }

        let mut rids: Vec<Ulid> = drafts.iter().map(|d| d.resource_id).collect();
        rids.sort();
        rids.dedup();
        let mut guards = Vec::with_capacity(rids.len());
        let mut slot_of = HashMap::new();
        for rid in &rids {
            slot_of.insert(*rid, guards.len());
            guards.push(self.resource(*rid).write_owned().await);
        }

        // Phase 1: validate against committed state and within the batch.
        let bookings: Vec<Booking> = drafts
            .into_iter()
            .map(|d| Booking::from_draft(Ulid::new(), d))
            .collect();
        for (i, booking) in bookings.iter().enumerate() {
            let guard = &guards[slot_of[&booking.resource_id]];
            if guard.bookings.len() + bookings.len() > MAX_BOOKINGS_PER_RESOURCE {
                return Err(GatewayError::LimitExceeded("too many bookings on resource"));
            }
            check_no_conflict(guard, &booking.span(), None)?;
            if let Some(other) = bookings[..i]
                .iter()
                .find(|o| o.resource_id == booking.resource_id && o.span().overlaps(&booking.span()))
            {
                return Err(GatewayError::Conflict(other.id));
            }
        }

        // Phase 2: all validated — commit.
        for booking in &bookings {
            guards[slot_of[&booking.resource_id]].insert(booking.clone());
            self.booking_to_resource.insert(booking.id, booking.resource_id);
        }
        drop(guards);

        info!("batch of {} bookings committed", bookings.len());
        for booking in &bookings {
            self.committed("create_batch", Event::BookingCreated { booking: booking.clone() });
        }
        Ok(bookings)
    }
}

#[async_trait]
impl BookingGateway for InMemoryGateway {
    async fn create(&self, draft: BookingDraft) -> Result<Booking, GatewayError> {
        self.create_inner(draft)
            .await
            .inspect_err(|e| self.record_conflict("create", e))
    }

    async fn update(&self, id: Ulid, draft: BookingDraft) -> Result<Booking, GatewayError> {
        self.update_inner(id, draft)
            .await
            .inspect_err(|e| self.record_conflict("update", e))
    }

    async fn create_batch(&self, drafts: Vec<BookingDraft>) -> Result<Vec<Booking>, GatewayError> {
        self.create_batch_inner(drafts)
            .await
            .inspect_err(|e| self.record_conflict("create_batch", e))
    }

    async fn cancel(&self, id: Ulid) -> Result<Booking, GatewayError> {
        let (resource_id, booking) = loop {
            let resource_id = self
                .get_resource_for_booking(&id)
                .ok_or(GatewayError::NotFound(id))?;
            let rs = self.resource(resource_id);
            let mut guard = rs.write().await;
            if let Some(booking) = guard.remove(id) {
                self.booking_to_resource.remove(&id);
                break (resource_id, booking);
            }
            // An update may have moved it while we waited for the lock.
            if self.get_resource_for_booking(&id) == Some(resource_id) {
                return Err(GatewayError::NotFound(id));
            }
        };

        info!("booking {id} cancelled on {resource_id}");
        self.notify
            .send(resource_id, &Event::BookingCancelled { id, resource_id });
        Ok(booking)
    }

    async fn list(&self, resource_ids: &[Ulid], range: Span) -> Result<Vec<Booking>, GatewayError> {
        if resource_ids.len() > MAX_RESOURCES_PER_QUERY {
            return Err(GatewayError::LimitExceeded("too many resources in query"));
        }
        let started = std::time::Instant::now();
        let mut out = Vec::new();
        for rid in resource_ids {
            let Some(rs) = self.resources.get(rid).map(|e| e.value().clone()) else {
                continue;
            };
            let guard = rs.read().await;
            out.extend(guard.overlapping(&range).cloned());
        }
        metrics::histogram!(observability::GATEWAY_LIST_DURATION_SECONDS)
            .record(started.elapsed().as_secs_f64());
        Ok(out)
    }
}
