//! Outbound lifecycle events.
//!
//! The core emits these through the [`EventSink`](super::ports::EventSink)
//! port.  Where they end up (a JSON log line, a test recorder) is the
//! adapter's business.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::commands::{AlertId, QueuedAlert, Severity};

/// What happened.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum EventKind {
    /// The alert entered the queue.
    #[serde(rename_all = "camelCase")]
    Enqueued { queue_depth: usize },
    /// The pattern engine began rendering the alert.
    Started,
    /// The pattern ran to its full duration.
    #[serde(rename_all = "camelCase")]
    Finished { elapsed_ms: u64 },
    /// Shutdown interrupted the pattern.
    #[serde(rename_all = "camelCase")]
    Cancelled { elapsed_ms: u64 },
    /// Repeated write failures on one pin stopped the pattern early.
    Aborted { pin: u32, reason: String },
    /// The alert was dropped from the queue at shutdown without running.
    Discarded,
    /// A PWM channel did not acknowledge its stop request in time.
    ChannelStopTimedOut { pin: u32 },
    SystemStarted { backend: &'static str },
    SystemStopped,
}

/// A structured lifecycle record.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertEvent {
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alert_id: Option<AlertId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,
    #[serde(flatten)]
    pub kind: EventKind,
}

impl AlertEvent {
    /// Event tied to a specific alert.
    pub fn for_alert(alert: &QueuedAlert, kind: EventKind) -> Self {
        Self {
            timestamp: Utc::now(),
            alert_id: Some(alert.id.clone()),
            severity: Some(alert.severity()),
            kind,
        }
    }

    /// Event about the system as a whole.
    pub fn system(kind: EventKind) -> Self {
        Self {
            timestamp: Utc::now(),
            alert_id: None,
            severity: None,
            kind,
        }
    }
}
