//! Buzzer driver.
//!
//! A plain on/off line (no PWM).  A beep sequence is `repeat` cycles of
//! `beep` on followed by `pause` off.  Sequences either block the caller or
//! run on a detached worker that can be cancelled mid-sequence; both forms
//! share one implementation and always leave the line off when they end.
//!
//! Sequences on the same line are serialized, so on/off transitions from
//! two sequences never interleave.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use log::{debug, info, warn};

use crate::app::ports::{Level, OutputPort, PinHandle};
use crate::drivers::task::{CancelToken, WORKER_STACK_KB, spawn_worker};
use crate::error::{Error, Result};

/// Timed beep pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuzzerSequence {
    pub beep: Duration,
    pub pause: Duration,
    pub repeat: u32,
}

impl BuzzerSequence {
    pub const SILENT: Self = Self {
        beep: Duration::ZERO,
        pause: Duration::ZERO,
        repeat: 0,
    };

    pub const fn new(beep: Duration, pause: Duration, repeat: u32) -> Self {
        Self { beep, pause, repeat }
    }

    /// One uninterrupted tone.
    pub const fn continuous(duration: Duration) -> Self {
        Self::new(duration, Duration::ZERO, 1)
    }

    pub fn is_silent(&self) -> bool {
        self.repeat == 0 || self.beep.is_zero()
    }

    /// Total time the line is held on.
    pub fn on_time(&self) -> Duration {
        if self.is_silent() { Duration::ZERO } else { self.beep * self.repeat }
    }

    /// Total time the sequence occupies the line.
    pub fn total(&self) -> Duration {
        if self.is_silent() {
            Duration::ZERO
        } else {
            (self.beep + self.pause) * self.repeat
        }
    }

    /// Same shape with every interval multiplied by `factor`.
    pub fn scaled(&self, factor: f64) -> Self {
        Self {
            beep: self.beep.mul_f64(factor),
            pause: self.pause.mul_f64(factor),
            repeat: self.repeat,
        }
    }
}

/// Whether [`Buzzer::beep`] waits for the sequence to finish.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BeepMode {
    Blocking,
    Detached,
}

/// Handle to a started sequence.
pub struct BeepHandle {
    cancel: CancelToken,
    join: Option<JoinHandle<()>>,
}

impl BeepHandle {
    fn finished() -> Self {
        Self {
            cancel: CancelToken::new(),
            join: None,
        }
    }

    /// Stop the sequence early; the line is driven off by the worker.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Block until the sequence has ended.
    pub fn wait(mut self) {
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }

    pub fn is_finished(&self) -> bool {
        self.join.as_ref().is_none_or(JoinHandle::is_finished)
    }
}

/// Shared pieces a sequence needs, cloneable onto a worker.
#[derive(Clone)]
struct Line {
    port: Arc<dyn OutputPort>,
    handle: PinHandle,
    busy: Arc<Mutex<()>>,
    fault_streak: Arc<AtomicU32>,
}

impl Line {
    /// Write `level`, keeping the fault streak current.
    fn drive(&self, level: Level) -> Result<()> {
        match self.port.set_level(self.handle, level) {
            Ok(()) => {
                self.fault_streak.store(0, Ordering::Release);
                Ok(())
            }
            Err(e) => {
                self.fault_streak.fetch_add(1, Ordering::AcqRel);
                Err(e.into())
            }
        }
    }

    fn set(&self, level: Level) {
        if let Err(e) = self.drive(level) {
            warn!("Buzzer write failed on pin {}: {}", self.handle.pin(), e);
        }
    }

    /// Play `seq`, returning `false` if cancelled before the end.
    fn play(&self, seq: BuzzerSequence, cancel: &CancelToken) -> bool {
        let _guard = match self.busy.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        let mut completed = true;
        for _ in 0..seq.repeat {
            self.set(Level::High);
            if !cancel.sleep(seq.beep) {
                completed = false;
                break;
            }
            self.set(Level::Low);
            if !seq.pause.is_zero() && !cancel.sleep(seq.pause) {
                completed = false;
                break;
            }
        }
        self.set(Level::Low);
        completed
    }
}

pub struct Buzzer {
    line: Line,
}

impl Buzzer {
    /// Claim `pin` (initially low).
    pub fn open(port: Arc<dyn OutputPort>, pin: u32, consumer: &str) -> Result<Self> {
        let handle = port
            .open(pin, Level::Low, consumer)
            .map_err(Error::PortUnavailable)?;
        info!("Buzzer ready on pin {}", pin);
        Ok(Self {
            line: Line {
                port,
                handle,
                busy: Arc::new(Mutex::new(())),
                fault_streak: Arc::new(AtomicU32::new(0)),
            },
        })
    }

    /// Play `seq`.  A silent sequence is a no-op.
    ///
    /// `Blocking` returns after `seq.total()`; `Detached` returns at once
    /// with a handle that can cancel the sequence.
    pub fn beep(&self, seq: BuzzerSequence, mode: BeepMode) -> Result<BeepHandle> {
        if seq.is_silent() {
            return Ok(BeepHandle::finished());
        }
        debug!(
            "Beeping {} times ({:?} on / {:?} off)",
            seq.repeat, seq.beep, seq.pause
        );

        match mode {
            BeepMode::Blocking => {
                self.line.play(seq, &CancelToken::new());
                Ok(BeepHandle::finished())
            }
            BeepMode::Detached => {
                let cancel = CancelToken::new();
                let token = cancel.clone();
                let line = self.line.clone();
                let join = spawn_worker(
                    format!("buzzer-{}", self.line.handle.pin()),
                    WORKER_STACK_KB,
                    move || {
                        line.play(seq, &token);
                    },
                )?;
                Ok(BeepHandle {
                    cancel,
                    join: Some(join),
                })
            }
        }
    }

    /// Drive the line off immediately.
    pub fn off(&self) -> Result<()> {
        self.line.drive(Level::Low)
    }

    /// Consecutive failed writes on the buzzer line.
    pub fn fault_streak(&self) -> u32 {
        self.line.fault_streak.load(Ordering::Acquire)
    }

    /// Forget failures seen so far.
    pub fn clear_faults(&self) {
        self.line.fault_streak.store(0, Ordering::Release);
    }

    pub fn handle(&self) -> PinHandle {
        self.line.handle
    }

    pub fn pin(&self) -> u32 {
        self.line.handle.pin()
    }
}
