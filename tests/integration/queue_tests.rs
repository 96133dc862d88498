//! Queue ordering and serialization through the full system.

use std::time::{Duration, Instant};

use hwalert::app::events::EventKind;
use hwalert::{AlertConfig, Error, Severity, ShutdownPolicy};

use crate::recording_sink::{harness, is_started, is_terminal};

fn drain_config() -> AlertConfig {
    AlertConfig {
        shutdown_policy: ShutdownPolicy::Drain,
        ..AlertConfig::default()
    }
}

#[test]
fn alerts_execute_in_submission_order_without_overlap() {
    let h = harness(drain_config(), 0.02);
    let severities = [
        Severity::Low,
        Severity::Medium,
        Severity::Low,
        Severity::High,
        Severity::Low,
    ];
    let ids: Vec<_> = severities
        .iter()
        .map(|s| h.system.submit_alert(*s, "order", "DEV-Q").unwrap())
        .collect();

    let report = h.system.shutdown();
    assert_eq!(report.discarded, 0);
    assert_eq!(h.sink.started_order(), ids);

    // Each alert's terminal event precedes the next alert's start.
    for pair in ids.windows(2) {
        let (done, _) = h.sink.find(&pair[0], is_terminal).unwrap();
        let (next, _) = h.sink.find(&pair[1], is_started).unwrap();
        assert!(done <= next, "alert {} overlapped {}", pair[0], pair[1]);
    }
    assert_eq!(
        h.sink.count(|k| matches!(k, EventKind::Finished { .. })),
        severities.len()
    );
}

#[test]
fn submit_returns_before_execution_finishes() {
    let h = harness(AlertConfig::default(), 1.0);
    let start = Instant::now();
    let id = h.system.submit_alert(Severity::Critical, "overheat", "DEV-001").unwrap();
    assert!(start.elapsed() < Duration::from_millis(50));
    assert_eq!(id.as_str().len(), 8);
    assert!(id.as_str().chars().all(|c| c.is_ascii_hexdigit()));
}

#[test]
fn enqueued_event_reports_depth() {
    let h = harness(AlertConfig::default(), 1.0);
    let first = h.system.submit_alert(Severity::Critical, "a", "d").unwrap();
    h.sink
        .wait_for(&first, Duration::from_secs(1), is_started)
        .expect("first alert should start");
    // The first alert is in flight; two more wait behind it.
    h.system.submit_alert(Severity::Low, "b", "d").unwrap();
    let third = h.system.submit_alert(Severity::Low, "c", "d").unwrap();
    assert_eq!(h.system.queue_depth(), 2);
    let (_, kind) = h
        .sink
        .find(&third, |k| matches!(k, EventKind::Enqueued { .. }))
        .unwrap();
    assert_eq!(kind, EventKind::Enqueued { queue_depth: 2 });
    assert_eq!(h.system.health().queue_depth, 2);
}

#[test]
fn many_producers_one_consumer() {
    let h = harness(drain_config(), 0.01);
    std::thread::scope(|s| {
        for p in 0..4 {
            let system = &h.system;
            s.spawn(move || {
                for i in 0..3 {
                    system
                        .submit_alert(Severity::Low, format!("p{p}-{i}"), "DEV-P")
                        .unwrap();
                }
            });
        }
    });
    h.system.shutdown();
    assert_eq!(h.sink.started_order().len(), 12);
    assert_eq!(h.sink.count(|k| matches!(k, EventKind::Finished { .. })), 12);
}

#[test]
fn submit_after_shutdown_is_queue_closed() {
    let h = harness(AlertConfig::default(), 1.0);
    h.system.shutdown();
    assert_eq!(
        h.system.submit_alert(Severity::High, "late", "DEV-9"),
        Err(Error::QueueClosed)
    );
}
