use crate::gateway::GatewayError;

/// Counter: bookings committed by a gateway. Labels: op.
pub const BOOKINGS_COMMITTED_TOTAL: &str = "slotbook_bookings_committed_total";

/// Counter: commits rejected because the interval was taken. Labels: op.
pub const BOOKING_CONFLICTS_TOTAL: &str = "slotbook_booking_conflicts_total";

/// Histogram: gateway list latency in seconds.
pub const GATEWAY_LIST_DURATION_SECONDS: &str = "slotbook_gateway_list_duration_seconds";

/// Counter: availability responses dropped because a newer query superseded them.
pub const STALE_RESPONSES_DISCARDED_TOTAL: &str = "slotbook_stale_responses_discarded_total";

/// Counter: form submissions that failed and were rolled back. Labels: kind.
pub const SUBMIT_FAILURES_TOTAL: &str = "slotbook_submit_failures_total";

/// Counter: toggles ignored because the slot was unavailable.
pub const TOGGLES_REJECTED_TOTAL: &str = "slotbook_toggles_rejected_total";

/// Map a gateway failure to a short label for metrics.
pub fn error_label(err: &GatewayError) -> &'static str {
    match err {
        GatewayError::Conflict(_) => "conflict",
        GatewayError::NotFound(_) => "not_found",
        GatewayError::Invalid(_) => "invalid",
        GatewayError::LimitExceeded(_) => "limit_exceeded",
        GatewayError::Unavailable(_) => "unavailable",
    }
}
