//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing each [`AlertEvent`] as one JSON line
//! under the `hwalert::events` log target, so lifecycle records can be
//! filtered apart from diagnostic logging (`RUST_LOG=hwalert::events=info`).

use log::{info, warn};

use crate::app::events::AlertEvent;
use crate::app::ports::EventSink;

pub const EVENT_TARGET: &str = "hwalert::events";

/// Adapter that logs every [`AlertEvent`] as structured JSON.
#[derive(Debug, Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

pub fn render(event: &AlertEvent) -> serde_json::Result<String> {
    serde_json::to_string(event)
}

impl EventSink for LogEventSink {
    fn emit(&self, event: &AlertEvent) {
        match render(event) {
            Ok(line) => info!(target: EVENT_TARGET, "{}", line),
            Err(e) => warn!(target: EVENT_TARGET, "unserializable event {:?}: {}", event.kind, e),
        }
    }
}
