//! The authoritative booking store seen from the core.
//!
//! Client-side conflict checks are advisory; only a gateway's atomic
//! check-and-insert decides whether a booking commits.

mod memory;

pub use memory::InMemoryGateway;

use async_trait::async_trait;
use chrono::FixedOffset;
use thiserror::Error;
use ulid::Ulid;

use crate::model::*;
use crate::schedule::RecurrenceSeries;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    #[error("conflict with booking {0}")]
    Conflict(Ulid),
    #[error("not found: {0}")]
    NotFound(Ulid),
    #[error("invalid booking: {0}")]
    Invalid(&'static str),
    #[error("limit exceeded: {0}")]
    LimitExceeded(&'static str),
    #[error("booking service unavailable: {0}")]
    Unavailable(String),
}

impl GatewayError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, GatewayError::Conflict(_))
    }
}

#[async_trait]
pub trait BookingGateway: Send + Sync {
    /// Commit a new booking. Fails with `Conflict` if the resource is taken
    /// anywhere in the span.
    async fn create(&self, draft: BookingDraft) -> Result<Booking, GatewayError>;

    /// Replace an existing booking. The booking's own prior interval never
    /// conflicts with its new one.
    async fn update(&self, id: Ulid, draft: BookingDraft) -> Result<Booking, GatewayError>;

    /// Commit several bookings, all or nothing.
    async fn create_batch(&self, drafts: Vec<BookingDraft>) -> Result<Vec<Booking>, GatewayError>;

    async fn cancel(&self, id: Ulid) -> Result<Booking, GatewayError>;

    /// Bookings on any of `resource_ids` overlapping `range`.
    async fn list(&self, resource_ids: &[Ulid], range: Span) -> Result<Vec<Booking>, GatewayError>;
}

/// Commit every occurrence of `series` inside `window` in one batch.
pub async fn commit_series(
    gateway: &dyn BookingGateway,
    series: &RecurrenceSeries,
    window: &Span,
    offset: &FixedOffset,
) -> Result<Vec<Booking>, GatewayError> {
    if series.validate().is_err() {
        return Err(GatewayError::Invalid("occurrence duration must be positive"));
    }
    let drafts: Vec<BookingDraft> = series
        .occurrences_in(window, offset)
        .into_iter()
        .map(|at| series.draft_for(at, offset))
        .collect();
    if drafts.is_empty() {
        return Ok(Vec::new());
    }
    tracing::info!("committing {} occurrences of series {}", drafts.len(), series.id);
    gateway.create_batch(drafts).await
}
