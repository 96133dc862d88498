//! Pattern engine.
//!
//! Realizes one severity's [`PatternSpec`] against wall-clock time: the
//! buzzer sequence starts once at `t = 0` on a detached worker, and the RGB
//! colour is re-evaluated at a fixed cadence until `t ≥ duration`.
//!
//! Whatever ends the run (completion, cancellation, a pin that keeps
//! failing) the LED is switched off and the buzzer silenced before
//! [`PatternEngine::run`] returns.  Fault streaks start from zero on every
//! run; failures during one alert never count against the next.

use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, warn};

use super::commands::{QueuedAlert, Severity};
use super::ports::PinHandle;
use crate::drivers::buzzer::{BeepMode, Buzzer};
use crate::drivers::patterns::{PatternSpec, PatternTable};
use crate::drivers::rgb::RgbLed;
use crate::drivers::task::CancelToken;

/// Colour update cadence.
pub const DEFAULT_UPDATE_HZ: u32 = 50;

/// Failed writes in a row on one pin before the current alert is abandoned.
pub const MAX_CONSECUTIVE_FAULTS: u32 = 3;

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Finished,
    Cancelled,
    Aborted { pin: u32 },
}

/// The alert currently being rendered.
///
/// At most one exists at a time; it lives only for the duration of a run.
#[derive(Clone)]
pub struct ExecutionContext {
    pub alert: QueuedAlert,
    pub started: Instant,
    pub cancel: CancelToken,
}

impl ExecutionContext {
    pub fn new(alert: QueuedAlert) -> Self {
        Self {
            alert,
            started: Instant::now(),
            cancel: CancelToken::new(),
        }
    }

    pub fn severity(&self) -> Severity {
        self.alert.severity()
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }
}

pub struct PatternEngine {
    rgb: RgbLed,
    buzzer: Buzzer,
    patterns: Arc<PatternTable>,
    update_interval: Duration,
}

impl PatternEngine {
    pub fn new(rgb: RgbLed, buzzer: Buzzer, patterns: Arc<PatternTable>, update_hz: u32) -> Self {
        Self {
            rgb,
            buzzer,
            patterns,
            update_interval: Duration::from_secs_f64(1.0 / f64::from(update_hz.max(1))),
        }
    }

    /// Render `ctx`'s severity to completion or cancellation.
    pub fn execute(&self, ctx: &ExecutionContext) -> Outcome {
        let spec = *self.patterns.get(ctx.severity());
        self.run(&spec, &ctx.cancel)
    }

    /// Render an arbitrary spec.
    pub fn run(&self, spec: &PatternSpec, cancel: &CancelToken) -> Outcome {
        self.rgb.clear_faults();
        self.buzzer.clear_faults();
        let start = Instant::now();

        let beep = if spec.buzzer.is_silent() {
            None
        } else {
            match self.buzzer.beep(spec.buzzer, BeepMode::Detached) {
                Ok(handle) => Some(handle),
                Err(e) => {
                    warn!("Buzzer sequence not started: {}", e);
                    None
                }
            }
        };

        let mut outcome = Outcome::Finished;
        let mut step: u32 = 0;
        loop {
            let t = start.elapsed();
            if t >= spec.duration {
                break;
            }
            if cancel.is_cancelled() {
                outcome = Outcome::Cancelled;
                break;
            }

            if let Err(e) = self.rgb.set_rgb(spec.color_at(t)) {
                warn!("Skipping colour step at {:?}: {}", t, e);
            }
            if let Some(pin) = self.faulted_pin() {
                outcome = Outcome::Aborted { pin };
                break;
            }

            // Ticks are anchored to `start` so sleep overshoot does not drift.
            step += 1;
            let next = (self.update_interval * step).min(spec.duration);
            if !cancel.sleep(next.saturating_sub(start.elapsed())) {
                outcome = Outcome::Cancelled;
                break;
            }
        }

        if let Some(handle) = beep {
            handle.cancel();
            handle.wait();
        }
        self.rgb.off();
        if let Err(e) = self.buzzer.off() {
            warn!("Buzzer off failed: {}", e);
        }
        debug!("Pattern ended after {:?}: {:?}", start.elapsed(), outcome);
        outcome
    }

    fn faulted_pin(&self) -> Option<u32> {
        self.rgb.faulted_pin(MAX_CONSECUTIVE_FAULTS).or_else(|| {
            (self.buzzer.fault_streak() >= MAX_CONSECUTIVE_FAULTS).then_some(self.buzzer.pin())
        })
    }

    pub fn update_interval(&self) -> Duration {
        self.update_interval
    }

    pub fn rgb(&self) -> &RgbLed {
        &self.rgb
    }

    pub fn buzzer(&self) -> &Buzzer {
        &self.buzzer
    }

    /// Stop the PWM channels (bounded wait each) and silence the buzzer.
    ///
    /// Returns the pins whose channels timed out; those were forced off.
    pub fn stop(&mut self, timeout: Duration) -> Vec<u32> {
        let timed_out = self.rgb.stop(timeout);
        if let Err(e) = self.buzzer.off() {
            warn!("Buzzer off failed during stop: {}", e);
        }
        timed_out
    }

    /// Every line this engine drives.
    pub fn handles(&self) -> Vec<PinHandle> {
        let mut handles = self.rgb.handles().to_vec();
        handles.push(self.buzzer.handle());
        handles
    }
}
