//! Recording event sink and harness helpers for integration tests.
//!
//! Every emitted event is stored with the `Instant` it arrived, so tests can
//! assert on ordering and overlap without relying on wall-clock timestamps.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use hwalert::adapters::sim_port::SimulatedPort;
use hwalert::app::events::{AlertEvent, EventKind};
use hwalert::app::ports::EventSink;
use hwalert::drivers::patterns::PatternTable;
use hwalert::{AlertConfig, AlertId, AlertSystem};

pub struct RecordingSink {
    events: Mutex<Vec<(Instant, AlertEvent)>>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            events: Mutex::new(Vec::new()),
        })
    }

    pub fn events(&self) -> Vec<(Instant, AlertEvent)> {
        self.events.lock().unwrap().clone()
    }

    /// First event for `id` matching `pred`.
    pub fn find(&self, id: &AlertId, pred: impl Fn(&EventKind) -> bool) -> Option<(Instant, EventKind)> {
        self.events()
            .into_iter()
            .find(|(_, e)| e.alert_id.as_ref() == Some(id) && pred(&e.kind))
            .map(|(at, e)| (at, e.kind))
    }

    /// Poll until an event for `id` matches `pred`.
    pub fn wait_for(
        &self,
        id: &AlertId,
        limit: Duration,
        pred: impl Fn(&EventKind) -> bool,
    ) -> Option<(Instant, EventKind)> {
        let start = Instant::now();
        loop {
            if let Some(hit) = self.find(id, &pred) {
                return Some(hit);
            }
            if start.elapsed() >= limit {
                return None;
            }
            std::thread::sleep(Duration::from_millis(2));
        }
    }

    /// Alert ids in the order they started executing.
    pub fn started_order(&self) -> Vec<AlertId> {
        self.events()
            .into_iter()
            .filter(|(_, e)| e.kind == EventKind::Started)
            .filter_map(|(_, e)| e.alert_id)
            .collect()
    }

    pub fn count(&self, pred: impl Fn(&EventKind) -> bool) -> usize {
        self.events().iter().filter(|(_, e)| pred(&e.kind)).count()
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: &AlertEvent) {
        self.events.lock().unwrap().push((Instant::now(), event.clone()));
    }
}

pub fn is_started(k: &EventKind) -> bool {
    matches!(k, EventKind::Started)
}

pub fn is_terminal(k: &EventKind) -> bool {
    matches!(
        k,
        EventKind::Finished { .. } | EventKind::Cancelled { .. } | EventKind::Aborted { .. }
    )
}

/// A running system on a fresh simulated port.
pub struct Harness {
    pub port: Arc<SimulatedPort>,
    pub sink: Arc<RecordingSink>,
    pub system: AlertSystem,
}

pub fn harness(config: AlertConfig, scale: f64) -> Harness {
    let port = Arc::new(SimulatedPort::new());
    let sink = RecordingSink::new();
    let system = AlertSystem::start_with_patterns(
        config,
        port.clone(),
        sink.clone(),
        PatternTable::with_time_scale(scale),
    )
    .unwrap();
    Harness { port, sink, system }
}
