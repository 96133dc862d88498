//! Inbound alert requests.
//!
//! These represent alerts submitted by the outside world (the transport
//! layer, the stdin intake, tests) that the
//! [`AlertSystem`](super::service::AlertSystem) queues and renders.

use core::fmt;
use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Number of hex characters in an [`AlertId`].
pub const ALERT_ID_LEN: usize = 8;

/// Alert severity, highest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
}

impl Severity {
    pub const ALL: [Severity; 4] = [Self::Critical, Self::High, Self::Medium, Self::Low];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "critical" => Ok(Self::Critical),
            "high" => Ok(Self::High),
            "medium" => Ok(Self::Medium),
            "low" => Ok(Self::Low),
            _ => Err("unknown severity"),
        }
    }
}

/// What a producer asks the queue to render.  Immutable once enqueued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertRequest {
    pub severity: Severity,
    pub alert_type: String,
    pub device_id: String,
}

impl AlertRequest {
    pub fn new(severity: Severity, alert_type: impl Into<String>, device_id: impl Into<String>) -> Self {
        Self {
            severity,
            alert_type: alert_type.into(),
            device_id: device_id.into(),
        }
    }
}

/// Short correlation identifier handed back to the submitter.
///
/// Used only for acknowledgement and log correlation, never for ordering.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct AlertId(heapless::String<ALERT_ID_LEN>);

impl AlertId {
    /// Fresh identifier: the leading hex digits of a random v4 UUID.
    pub fn generate() -> Self {
        let mut buf = uuid::Uuid::encode_buffer();
        let hex = uuid::Uuid::new_v4().simple().encode_lower(&mut buf);
        let mut id = heapless::String::new();
        // A simple UUID is 32 hex digits, so the prefix always fits.
        let _ = id.push_str(&hex[..ALERT_ID_LEN]);
        Self(id)
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for AlertId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An alert waiting in (or just popped from) the queue.
#[derive(Debug, Clone)]
pub struct QueuedAlert {
    pub id: AlertId,
    pub request: AlertRequest,
    pub enqueued_at: DateTime<Utc>,
}

impl QueuedAlert {
    pub fn new(request: AlertRequest) -> Self {
        Self {
            id: AlertId::generate(),
            request,
            enqueued_at: Utc::now(),
        }
    }

    pub fn severity(&self) -> Severity {
        self.request.severity
    }
}
