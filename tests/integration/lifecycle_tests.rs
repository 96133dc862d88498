//! Startup, shutdown and failure isolation.

use std::sync::Arc;
use std::time::Duration;

use hwalert::adapters::sim_port::SimulatedPort;
use hwalert::app::events::EventKind;
use hwalert::app::ports::{Level, NullSink, PortError};
use hwalert::{AlertConfig, AlertSystem, Error, Severity};

use crate::recording_sink::{harness, is_terminal};

const ALL_PINS: [u32; 4] = [17, 22, 24, 27];

#[test]
fn unavailable_chip_aborts_startup() {
    let port = Arc::new(SimulatedPort::unavailable());
    let err = AlertSystem::start(AlertConfig::default(), port, Arc::new(NullSink)).err();
    assert_eq!(err, Some(Error::PortUnavailable(PortError::ChipUnavailable)));
}

#[test]
fn startup_emits_system_started_with_backend() {
    let h = harness(AlertConfig::default(), 1.0);
    let events = h.sink.events();
    assert_eq!(
        events.first().map(|(_, e)| e.kind.clone()),
        Some(EventKind::SystemStarted {
            backend: "simulation"
        })
    );
    assert_eq!(h.port.open_pins(), ALL_PINS.to_vec());
}

#[test]
fn common_anode_leds_idle_high() {
    let config = AlertConfig {
        common_anode: true,
        ..AlertConfig::default()
    };
    let h = harness(config, 1.0);
    std::thread::sleep(Duration::from_millis(20));
    for pin in [17, 27, 22] {
        assert_eq!(h.port.level(pin), Some(Level::High), "pin {pin}");
    }
    assert_eq!(h.port.level(24), Some(Level::Low));
    h.system.shutdown();
    for pin in [17, 27, 22] {
        assert_eq!(h.port.level(pin), Some(Level::High), "pin {pin}");
    }
}

#[test]
fn double_shutdown_matches_single() {
    let h = harness(AlertConfig::default(), 1.0);
    h.system.submit_alert(Severity::Medium, "x", "d").unwrap();
    let first = h.system.shutdown();
    let pins_after_first = h.port.open_pins();
    let second = h.system.shutdown();
    assert_eq!(first, second);
    assert!(pins_after_first.is_empty());
    assert_eq!(h.port.open_pins(), pins_after_first);
    assert_eq!(h.sink.count(|k| *k == EventKind::SystemStopped), 1);
    assert!(!h.system.is_running());
}

#[test]
fn drop_shuts_down() {
    let h = harness(AlertConfig::default(), 1.0);
    let port = Arc::clone(&h.port);
    let sink = Arc::clone(&h.sink);
    drop(h);
    assert!(port.open_pins().is_empty());
    assert_eq!(sink.count(|k| *k == EventKind::SystemStopped), 1);
}

#[test]
fn recurring_pin_failure_aborts_only_that_alert() {
    let h = harness(AlertConfig::default(), 0.1);
    h.port.fail_writes(27, true);
    let bad = h.system.submit_alert(Severity::Low, "glow", "d").unwrap();
    let (_, kind) = h
        .sink
        .wait_for(&bad, Duration::from_secs(2), is_terminal)
        .expect("alert should end");
    assert!(matches!(kind, EventKind::Aborted { pin: 27, .. }), "{kind:?}");

    h.port.fail_writes(27, false);
    std::thread::sleep(Duration::from_millis(50));
    let good = h.system.submit_alert(Severity::Low, "glow", "d").unwrap();
    let (_, kind) = h
        .sink
        .wait_for(&good, Duration::from_secs(2), is_terminal)
        .expect("next alert should run");
    assert!(matches!(kind, EventKind::Finished { .. }), "{kind:?}");
}

#[test]
fn buzzer_failure_is_isolated_to_its_alert() {
    let h = harness(AlertConfig::default(), 0.1);
    h.port.fail_writes(24, true);
    let high = h.system.submit_alert(Severity::High, "gas_leak", "d").unwrap();
    let (_, kind) = h
        .sink
        .wait_for(&high, Duration::from_secs(2), is_terminal)
        .expect("high should end");
    assert!(matches!(kind, EventKind::Aborted { pin: 24, .. }), "{kind:?}");

    h.port.fail_writes(24, false);
    let low = h.system.submit_alert(Severity::Low, "dust", "d").unwrap();
    let medium = h.system.submit_alert(Severity::Medium, "humidity", "d").unwrap();
    for id in [&low, &medium] {
        let (_, kind) = h
            .sink
            .wait_for(id, Duration::from_secs(2), is_terminal)
            .expect("later alert should run");
        assert!(matches!(kind, EventKind::Finished { .. }), "{kind:?}");
    }
    assert_eq!(h.port.level(24), Some(Level::Low));
}

#[test]
fn stalled_channel_is_reported_and_forced_off() {
    let config = AlertConfig {
        stop_timeout_ms: 20,
        ..AlertConfig::default()
    };
    let h = harness(config, 1.0);
    h.port.set_write_delay(22, Duration::from_millis(300));
    h.system.submit_alert(Severity::Medium, "fade", "d").unwrap();
    std::thread::sleep(Duration::from_millis(100));
    let report = h.system.shutdown();
    assert_eq!(report.timed_out_pins, vec![22]);
    assert_eq!(
        h.sink
            .count(|k| *k == EventKind::ChannelStopTimedOut { pin: 22 }),
        1
    );
    assert!(h.port.open_pins().is_empty());
}
