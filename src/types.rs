//! Core domain types shared across the benchmark

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Order direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    #[serde(rename = "long")]
    Long,
    #[serde(rename = "short")]
    Short,
}

impl Side {
    pub fn is_long(&self) -> bool {
        matches!(self, Side::Long)
    }
}

/// Price policy for a placed order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderKind {
    #[serde(rename = "market")]
    Market,
    #[serde(rename = "limit")]
    Limit,
    #[serde(rename = "postOnly")]
    PostOnly,
}

/// Which of the venue's two parallel channels carries the request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransportChannel {
    #[serde(rename = "requestResponse")]
    RequestResponse,
    #[serde(rename = "push")]
    Push,
}

/// One order to be placed, immutable once submitted
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderIntent {
    pub symbol: String,
    pub side: Side,
    pub size: Decimal,
    pub kind: OrderKind,
    /// Required for limit/post-only, ignored for market
    pub price: Option<Decimal>,
    pub transport: TransportChannel,
}

/// Synchronous result of one placement attempt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlacementOutcome {
    /// Venue-assigned id, present only on success
    pub operation_id: Option<String>,
    pub success: bool,
    pub sent_at: DateTime<Utc>,
    pub returned_at: DateTime<Utc>,
    pub send_to_return_ms: f64,
    /// True when the placement response itself reported a fill
    pub immediately_filled: bool,
    pub error: Option<String>,
}

/// Out-of-band fill or cancel acknowledgment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationEvent {
    pub operation_id: String,
    /// Venue-reported event time; clock skew against local time is
    /// possible in either direction
    pub event_time: DateTime<Utc>,
    /// Local wall-clock at receipt
    pub received_at: DateTime<Utc>,
}

/// Timing record for one attempted order in a run.
///
/// Fill fields are populated only when a notification was correlated
/// before the deadline; `None` is distinct from a zero latency.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionMetrics {
    pub operation_id: Option<String>,
    pub success: bool,
    pub sent_at: Option<DateTime<Utc>>,
    pub returned_at: Option<DateTime<Utc>>,
    pub send_to_return_ms: Option<f64>,

    pub fill_event_time: Option<DateTime<Utc>>,
    pub fill_received_at: Option<DateTime<Utc>>,
    pub send_to_fill_ms: Option<f64>,
    /// May be negative under clock skew; stored as observed
    pub fill_to_notification_ms: Option<f64>,
    pub fill_timed_out: bool,

    pub cancel_sent_at: Option<DateTime<Utc>>,
    pub cancel_returned_at: Option<DateTime<Utc>>,
    pub cancel_send_to_return_ms: Option<f64>,
    pub cancel_notification_ms: Option<f64>,

    pub error_category: Option<String>,
}

impl ExecutionMetrics {
    /// Record the synchronous placement leg
    pub fn apply_placement(&mut self, outcome: &PlacementOutcome) {
        self.operation_id = outcome.operation_id.clone();
        self.success = outcome.success;
        self.sent_at = Some(outcome.sent_at);
        self.returned_at = Some(outcome.returned_at);
        self.send_to_return_ms = Some(outcome.send_to_return_ms);
        self.error_category = outcome.error.clone();
    }

    /// Record a correlated fill notification
    pub fn apply_fill(&mut self, event: &NotificationEvent) {
        self.fill_event_time = Some(event.event_time);
        self.fill_received_at = Some(event.received_at);
        if let Some(sent) = self.sent_at {
            self.send_to_fill_ms = Some(millis_between(sent, event.received_at));
        }
        self.fill_to_notification_ms =
            Some(millis_between(event.event_time, event.received_at));
    }
}

/// Signed millisecond interval between two wall-clock instants
pub fn millis_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    (to - from).num_microseconds().unwrap_or(0) as f64 / 1000.0
}
