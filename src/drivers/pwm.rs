//! Software PWM channel.
//!
//! Approximates an analog level on a digital-only line: a dedicated driver
//! worker holds the pin "on" for `duty × period` and "off" for the rest of
//! each period.  The duty cycle is the only value shared across threads; it
//! lives in an atomic cell as raw `f32` bits so a reader can never observe a
//! half-written update.
//!
//! ## Timing contract
//!
//! - The driver samples the duty cycle once at the start of every period, so
//!   a new value never cuts a period short.
//! - Both edges of a period are scheduled from the period's start instant.
//!   A driver that falls more than a period behind (a blocked write)
//!   resynchronizes to the current time.
//! - `stop(timeout)` wakes the driver immediately and waits at most
//!   `timeout` for it to acknowledge.  On timeout the channel is still marked
//!   stopped; the caller should force the pin off through the port.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError};
use log::{debug, info, trace, warn};

use crate::app::ports::{Level, OutputPort, PinHandle};
use crate::drivers::task::{CancelToken, WORKER_STACK_KB, spawn_worker};
use crate::error::{Error, Result};

/// Default carrier frequency.
pub const DEFAULT_FREQUENCY_HZ: u32 = 500;

/// Stop bound used when a channel is dropped without an explicit stop.
pub const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(1);

/// Clamp to `[0, 1]`; NaN maps to 0.
pub fn clamp01(value: f32) -> f32 {
    if value.is_nan() { 0.0 } else { value.clamp(0.0, 1.0) }
}

/// Static channel parameters, fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PwmConfig {
    pub frequency_hz: u32,
    /// Flip the electrical level (common-anode wiring).
    pub invert_polarity: bool,
    pub initial_duty: f32,
}

impl Default for PwmConfig {
    fn default() -> Self {
        Self {
            frequency_hz: DEFAULT_FREQUENCY_HZ,
            invert_polarity: false,
            initial_duty: 0.0,
        }
    }
}

impl PwmConfig {
    /// Electrical levels for logical (on, off).
    pub const fn levels(&self) -> (Level, Level) {
        if self.invert_polarity {
            (Level::Low, Level::High)
        } else {
            (Level::High, Level::Low)
        }
    }

    pub fn period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.frequency_hz.max(1)))
    }
}

/// State shared between the owner and the driver worker.
struct Shared {
    duty_bits: AtomicU32,
    /// Consecutive failed pin writes; reset by any successful write.
    fault_streak: AtomicU32,
}

impl Shared {
    fn duty(&self) -> f32 {
        f32::from_bits(self.duty_bits.load(Ordering::Acquire))
    }
}

/// One software-PWM output line.
pub struct PwmChannel {
    port: Arc<dyn OutputPort>,
    handle: PinHandle,
    config: PwmConfig,
    shared: Arc<Shared>,
    cancel: CancelToken,
    done_rx: Receiver<()>,
    join: Option<JoinHandle<()>>,
    running: AtomicBool,
}

impl PwmChannel {
    /// Claim `pin` on `port` (initially off) and start its driver worker.
    pub fn open(
        port: Arc<dyn OutputPort>,
        pin: u32,
        config: PwmConfig,
        consumer: &str,
    ) -> Result<Self> {
        let (_, off) = config.levels();
        let handle = port.open(pin, off, consumer).map_err(Error::PortUnavailable)?;

        let shared = Arc::new(Shared {
            duty_bits: AtomicU32::new(clamp01(config.initial_duty).to_bits()),
            fault_streak: AtomicU32::new(0),
        });
        let cancel = CancelToken::new();
        let (done_tx, done_rx) = crossbeam_channel::bounded(1);

        let worker = Driver {
            port: Arc::clone(&port),
            handle,
            config,
            shared: Arc::clone(&shared),
            cancel: cancel.clone(),
        };
        let join = spawn_worker(format!("pwm-{pin}"), WORKER_STACK_KB, move || {
            worker.run();
            let _ = done_tx.send(());
        });
        let join = match join {
            Ok(join) => join,
            Err(e) => {
                let _ = port.close(handle);
                return Err(e);
            }
        };

        info!(
            "PWM started on pin {} ({} Hz, {})",
            pin,
            config.frequency_hz,
            if config.invert_polarity { "inverted" } else { "normal" }
        );

        Ok(Self {
            port,
            handle,
            config,
            shared,
            cancel,
            done_rx,
            join: Some(join),
            running: AtomicBool::new(true),
        })
    }

    /// Set the on-fraction; clamped to `[0, 1]`, applied from the next period.
    pub fn set_duty_cycle(&self, value: f32) {
        self.shared
            .duty_bits
            .store(clamp01(value).to_bits(), Ordering::Release);
    }

    pub fn duty_cycle(&self) -> f32 {
        self.shared.duty()
    }

    /// Signal the driver to exit and wait up to `timeout` for it.
    ///
    /// Idempotent: stopping a stopped channel returns `Ok(())`.  After a
    /// timeout the channel is unusable and the pin state is unknown.
    pub fn stop(&mut self, timeout: Duration) -> Result<()> {
        if !self.running.swap(false, Ordering::AcqRel) {
            return Ok(());
        }
        debug!("Stopping PWM on pin {}", self.handle.pin());
        self.cancel.cancel();

        match self.done_rx.recv_timeout(timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                if let Some(join) = self.join.take() {
                    let _ = join.join();
                }
                info!("PWM stopped on pin {}", self.handle.pin());
                Ok(())
            }
            Err(RecvTimeoutError::Timeout) => {
                // Leave the worker detached; it exits on its own once unblocked.
                self.join.take();
                warn!(
                    "PWM on pin {} did not stop within {:?}",
                    self.handle.pin(),
                    timeout
                );
                Err(Error::ChannelStopTimeout {
                    pin: self.handle.pin(),
                })
            }
        }
    }

    /// Drive the pin to its logical "off" level directly through the port.
    pub fn force_off(&self) -> Result<()> {
        let (_, off) = self.config.levels();
        self.port.set_level(self.handle, off)?;
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Consecutive failed pin writes seen by the driver.
    pub fn fault_streak(&self) -> u32 {
        self.shared.fault_streak.load(Ordering::Acquire)
    }

    /// Forget failures seen so far.
    pub fn clear_faults(&self) {
        self.shared.fault_streak.store(0, Ordering::Release);
    }

    pub fn handle(&self) -> PinHandle {
        self.handle
    }

    pub fn pin(&self) -> u32 {
        self.handle.pin()
    }

    pub fn frequency_hz(&self) -> u32 {
        self.config.frequency_hz
    }

    pub fn is_inverted(&self) -> bool {
        self.config.invert_polarity
    }
}

impl Drop for PwmChannel {
    fn drop(&mut self) {
        let _ = self.stop(DEFAULT_STOP_TIMEOUT);
    }
}

// ── Driver worker ─────────────────────────────────────────────

struct Driver {
    port: Arc<dyn OutputPort>,
    handle: PinHandle,
    config: PwmConfig,
    shared: Arc<Shared>,
    cancel: CancelToken,
}

impl Driver {
    fn run(&self) {
        let (on, off) = self.config.levels();
        let period = self.config.period();
        let mut last: Option<Level> = None;
        let mut period_start = Instant::now();

        loop {
            let duty = self.shared.duty();
            let period_end = period_start + period;

            let keep_going = if duty <= 0.0 {
                self.write(off, &mut last);
                self.cancel.sleep_until(period_end)
            } else if duty >= 1.0 {
                self.write(on, &mut last);
                self.cancel.sleep_until(period_end)
            } else {
                self.write(on, &mut last);
                self.cancel.sleep_until(period_start + period.mul_f32(duty)) && {
                    self.write(off, &mut last);
                    self.cancel.sleep_until(period_end)
                }
            };

            if !keep_going {
                break;
            }

            period_start = period_end;
            let now = Instant::now();
            if now.saturating_duration_since(period_start) > period {
                period_start = now;
            }
        }

        // Leave the line dark on the way out.
        last = None;
        self.write(off, &mut last);
    }

    /// Write `level` unless the line is already known to be there.
    fn write(&self, level: Level, last: &mut Option<Level>) {
        if *last == Some(level) {
            return;
        }
        match self.port.set_level(self.handle, level) {
            Ok(()) => {
                *last = Some(level);
                self.shared.fault_streak.store(0, Ordering::Release);
            }
            Err(e) => {
                *last = None;
                let streak = self.shared.fault_streak.fetch_add(1, Ordering::AcqRel) + 1;
                if streak == 1 {
                    warn!("PWM write failed on pin {}: {}", self.handle.pin(), e);
                } else {
                    trace!("PWM write failed on pin {} (streak {})", self.handle.pin(), streak);
                }
            }
        }
    }
}
