//! End-to-end alert signatures on the simulated port.

use std::sync::Arc;
use std::time::{Duration, Instant};

use hwalert::adapters::sim_port::SimulatedPort;
use hwalert::app::engine::{DEFAULT_UPDATE_HZ, Outcome, PatternEngine};
use hwalert::app::events::EventKind;
use hwalert::app::ports::{Level, OutputPort};
use hwalert::drivers::buzzer::Buzzer;
use hwalert::drivers::patterns::PatternTable;
use hwalert::drivers::pwm::PwmConfig;
use hwalert::drivers::rgb::{OFF, RgbLed, RgbPins};
use hwalert::drivers::task::CancelToken;
use hwalert::error::ColorChannel;
use hwalert::{AlertConfig, Error, Severity};

use crate::recording_sink::{harness, is_started, is_terminal};

const RED: u32 = 17;
const GREEN: u32 = 27;
const BLUE: u32 = 22;
const BUZZER: u32 = 24;

#[test]
fn critical_pulses_red_with_continuous_buzzer() {
    // 10 s pattern compressed to 2 s.
    let h = harness(AlertConfig::default(), 0.2);
    let id = h.system.submit_alert(Severity::Critical, "overheat", "DEV-001").unwrap();
    assert_eq!(id.as_str().len(), 8);

    h.sink
        .wait_for(&id, Duration::from_secs(1), is_started)
        .expect("critical should start");
    std::thread::sleep(Duration::from_millis(500));
    assert!(h.system.is_active());
    assert_eq!(h.port.level(BUZZER), Some(Level::High));
    assert!(h.port.rising_edges(RED) > 50, "red should be pulse-width modulated");
    assert_eq!(h.port.rising_edges(GREEN), 0);
    assert_eq!(h.port.rising_edges(BLUE), 0);

    let (_, kind) = h
        .sink
        .wait_for(&id, Duration::from_secs(3), is_terminal)
        .expect("critical should finish");
    let EventKind::Finished { elapsed_ms } = kind else {
        panic!("unexpected {kind:?}");
    };
    assert!((2000..2500).contains(&elapsed_ms), "ran {elapsed_ms} ms");

    std::thread::sleep(Duration::from_millis(20));
    assert_eq!(h.port.level(BUZZER), Some(Level::Low));
    assert_eq!(h.port.level(RED), Some(Level::Low));
    assert_eq!(h.port.rising_edges(BUZZER), 1);
    assert!(!h.system.is_active());
}

#[test]
fn critical_red_envelope_peaks_every_200ms() {
    let port = Arc::new(SimulatedPort::new());
    let dyn_port: Arc<dyn OutputPort> = port.clone();
    let pins = RgbPins {
        red: RED,
        green: GREEN,
        blue: BLUE,
    };
    let rgb = RgbLed::open(&dyn_port, pins, PwmConfig::default(), "scenario").unwrap();
    let buzzer = Buzzer::open(Arc::clone(&dyn_port), BUZZER, "scenario").unwrap();
    let table = PatternTable::standard();
    let spec = *table.get(Severity::Critical);
    let engine = PatternEngine::new(rgb, buzzer, Arc::new(table), DEFAULT_UPDATE_HZ);
    let cancel = CancelToken::new();

    // Times at which red climbs through 0.9, i.e. once per 5 Hz pulse.
    let mut peaks = Vec::new();
    let outcome = std::thread::scope(|s| {
        let run = s.spawn(|| engine.run(&spec, &cancel));
        let start = Instant::now();
        let mut above = false;
        while start.elapsed() < Duration::from_millis(1050) {
            let (r, g, b) = engine.rgb().current_color();
            assert_eq!((g, b), (0.0, 0.0));
            if r >= 0.9 && !above {
                peaks.push(start.elapsed());
            }
            above = r >= 0.9;
            std::thread::sleep(Duration::from_millis(2));
        }
        assert_eq!(port.level(BUZZER), Some(Level::High));
        cancel.cancel();
        run.join().unwrap()
    });

    assert_eq!(outcome, Outcome::Cancelled);
    assert!(peaks.len() >= 4, "peaks at {peaks:?}");
    for pair in peaks.windows(2) {
        let gap = pair[1] - pair[0];
        assert!(
            (Duration::from_millis(150)..=Duration::from_millis(250)).contains(&gap),
            "peaks at {peaks:?}"
        );
    }
    assert_eq!(engine.rgb().current_color(), OFF);
    assert_eq!(port.level(BUZZER), Some(Level::Low));
}

#[test]
fn high_runs_to_completion_before_low() {
    let h = harness(AlertConfig::default(), 0.1);
    let t0 = Instant::now();
    let high = h.system.submit_alert(Severity::High, "gas_leak", "DEV-002").unwrap();
    let low = h.system.submit_alert(Severity::Low, "dust", "DEV-002").unwrap();

    let (low_done, _) = h
        .sink
        .wait_for(&low, Duration::from_secs(3), is_terminal)
        .expect("low should finish");
    let (high_done, high_kind) = h.sink.find(&high, is_terminal).unwrap();
    let (low_start, _) = h.sink.find(&low, is_started).unwrap();

    assert!(matches!(high_kind, EventKind::Finished { .. }));
    assert!(high_done <= low_start);
    // 0.5 s of High followed by 0.2 s of Low.
    assert!(low_done.duration_since(t0) >= Duration::from_millis(700));
    assert_eq!(h.port.rising_edges(BUZZER), 3);
}

#[test]
fn shutdown_cancels_critical_promptly() {
    let h = harness(AlertConfig::default(), 1.0);
    let id = h.system.submit_alert(Severity::Critical, "overheat", "DEV-003").unwrap();
    h.sink
        .wait_for(&id, Duration::from_secs(1), is_started)
        .expect("critical should start");
    std::thread::sleep(Duration::from_millis(200));

    let asked = Instant::now();
    h.system.shutdown();
    let (cancelled_at, kind) = h.sink.find(&id, is_terminal).unwrap();
    assert!(matches!(kind, EventKind::Cancelled { .. }), "{kind:?}");
    assert!(
        cancelled_at.duration_since(asked) < Duration::from_millis(100),
        "cancel took {:?}",
        cancelled_at.duration_since(asked)
    );

    for pin in [RED, GREEN, BLUE, BUZZER] {
        assert_eq!(h.port.level(pin), Some(Level::Low), "pin {pin}");
    }
    assert!(h.port.open_pins().is_empty());
}

#[test]
fn out_of_range_color_is_rejected_unchanged() {
    let port = Arc::new(SimulatedPort::new());
    let dyn_port: Arc<dyn OutputPort> = port.clone();
    let pins = RgbPins {
        red: RED,
        green: GREEN,
        blue: BLUE,
    };
    let mut led = RgbLed::open(&dyn_port, pins, PwmConfig::default(), "scenario").unwrap();

    led.set_color(0.2, 0.4, 0.6).unwrap();
    assert_eq!(
        led.set_color(1.5, 0.0, 0.0),
        Err(Error::InvalidColorComponent {
            channel: ColorChannel::Red,
            value: 1.5
        })
    );
    assert_eq!(led.current_color(), (0.2, 0.4, 0.6));
    assert!(led.stop(Duration::from_secs(1)).is_empty());
}
