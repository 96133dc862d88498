//! Simulation output port.
//!
//! Stands in for a GPIO chip on machines without one.  Every call is
//! recorded: the current level and edge statistics per line, plus a bounded
//! history of recent calls.  Tests use the fault-injection knobs to make a
//! line fail or block.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use heapless::HistoryBuffer;
use log::{debug, info};

use crate::app::ports::{Level, OutputPort, PinHandle, PortError};

/// Depth of the recent-call history.
pub const HISTORY_LEN: usize = 256;

/// One recorded port call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortCall {
    Open { pin: u32, initial: Level },
    Set { pin: u32, level: Level },
    Close { pin: u32 },
}

#[derive(Debug)]
struct Line {
    open: bool,
    level: Level,
    writes: u64,
    rising_edges: u32,
    high_since: Option<Instant>,
    high_total: Duration,
}

impl Line {
    fn new(initial: Level) -> Self {
        Self {
            open: true,
            level: initial,
            writes: 0,
            rising_edges: 0,
            high_since: initial.is_high().then(Instant::now),
            high_total: Duration::ZERO,
        }
    }

    fn apply(&mut self, level: Level) {
        self.writes += 1;
        match (self.level, level) {
            (Level::Low, Level::High) => {
                self.rising_edges += 1;
                self.high_since = Some(Instant::now());
            }
            (Level::High, Level::Low) => {
                if let Some(since) = self.high_since.take() {
                    self.high_total += since.elapsed();
                }
            }
            _ => {}
        }
        self.level = level;
    }

    fn high_time(&self) -> Duration {
        self.high_total + self.high_since.map_or(Duration::ZERO, |s| s.elapsed())
    }
}

/// Injected misbehaviour for one pin.  Kept apart from [`Line`] so it
/// survives the pin being opened, closed and reopened.
#[derive(Debug, Clone, Copy, Default)]
struct Faults {
    fail_writes: bool,
    write_delay: Duration,
}

struct State {
    chip_available: bool,
    denied: Vec<u32>,
    faults: HashMap<u32, Faults>,
    lines: HashMap<u32, Line>,
    history: HistoryBuffer<PortCall, HISTORY_LEN>,
}

/// In-memory GPIO backend.
pub struct SimulatedPort {
    state: Mutex<State>,
}

impl Default for SimulatedPort {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedPort {
    pub fn new() -> Self {
        info!("Running in simulation mode - no physical GPIO control");
        Self {
            state: Mutex::new(State {
                chip_available: true,
                denied: Vec::new(),
                faults: HashMap::new(),
                lines: HashMap::new(),
                history: HistoryBuffer::new(),
            }),
        }
    }

    /// A port whose chip cannot be opened at all.
    pub fn unavailable() -> Self {
        let port = Self::new();
        port.with_state(|s| s.chip_available = false);
        port
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut State) -> R) -> R {
        let mut guard = match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut guard)
    }

    fn with_line<R>(&self, pin: u32, f: impl FnOnce(&Line) -> R) -> Option<R> {
        self.with_state(|s| s.lines.get(&pin).map(f))
    }

    // ── Fault injection ───────────────────────────────────────

    /// Make `open(pin)` fail with `PinUnavailable`.
    pub fn deny_pin(&self, pin: u32) {
        self.with_state(|s| s.denied.push(pin));
    }

    /// Make every write to `pin` fail (or succeed again).  Applies whether
    /// or not the pin is open yet.
    pub fn fail_writes(&self, pin: u32, fail: bool) {
        self.with_state(|s| s.faults.entry(pin).or_default().fail_writes = fail);
    }

    /// Block every write to `pin` for `delay` before it lands.  Applies
    /// whether or not the pin is open yet.
    pub fn set_write_delay(&self, pin: u32, delay: Duration) {
        self.with_state(|s| s.faults.entry(pin).or_default().write_delay = delay);
    }

    // ── Inspection ────────────────────────────────────────────

    /// Current level of `pin`, if it was ever opened.
    pub fn level(&self, pin: u32) -> Option<Level> {
        self.with_line(pin, |l| l.level)
    }

    pub fn is_open(&self, pin: u32) -> bool {
        self.with_line(pin, |l| l.open).unwrap_or(false)
    }

    pub fn open_pins(&self) -> Vec<u32> {
        self.with_state(|s| {
            let mut pins: Vec<u32> = s
                .lines
                .iter()
                .filter(|(_, l)| l.open)
                .map(|(p, _)| *p)
                .collect();
            pins.sort_unstable();
            pins
        })
    }

    pub fn writes(&self, pin: u32) -> u64 {
        self.with_line(pin, |l| l.writes).unwrap_or(0)
    }

    pub fn rising_edges(&self, pin: u32) -> u32 {
        self.with_line(pin, |l| l.rising_edges).unwrap_or(0)
    }

    /// Total time `pin` has spent high.
    pub fn high_time(&self, pin: u32) -> Duration {
        self.with_line(pin, Line::high_time).unwrap_or(Duration::ZERO)
    }

    /// Recent calls, oldest first.
    pub fn recent_calls(&self) -> Vec<PortCall> {
        self.with_state(|s| s.history.oldest_ordered().copied().collect())
    }
}

impl OutputPort for SimulatedPort {
    fn open(&self, pin: u32, initial: Level, consumer: &str) -> Result<PinHandle, PortError> {
        self.with_state(|s| {
            if !s.chip_available {
                return Err(PortError::ChipUnavailable);
            }
            if s.denied.contains(&pin) {
                return Err(PortError::PinUnavailable(pin));
            }
            if s.lines.get(&pin).is_some_and(|l| l.open) {
                return Err(PortError::PinBusy(pin));
            }
            s.lines.insert(pin, Line::new(initial));
            s.history.write(PortCall::Open { pin, initial });
            debug!("sim: pin {} opened for '{}' ({:?})", pin, consumer, initial);
            Ok(PinHandle::new(pin))
        })
    }

    fn set_level(&self, handle: PinHandle, level: Level) -> Result<(), PortError> {
        let pin = handle.pin();
        let delay = self.with_state(|s| match s.lines.get(&pin) {
            Some(line) if line.open => {
                Ok(s.faults.get(&pin).map_or(Duration::ZERO, |f| f.write_delay))
            }
            _ => Err(PortError::UnknownHandle),
        })?;
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }

        self.with_state(|s| {
            let failing = s.faults.get(&pin).is_some_and(|f| f.fail_writes);
            let line = match s.lines.get_mut(&pin) {
                Some(line) if line.open => line,
                _ => return Err(PortError::UnknownHandle),
            };
            if failing {
                return Err(PortError::WriteFailed(pin));
            }
            line.apply(level);
            s.history.write(PortCall::Set { pin, level });
            Ok(())
        })
    }

    fn close(&self, handle: PinHandle) -> Result<(), PortError> {
        let pin = handle.pin();
        self.with_state(|s| {
            if let Some(line) = s.lines.get_mut(&pin) {
                if line.open {
                    line.open = false;
                    s.history.write(PortCall::Close { pin });
                    debug!("sim: pin {} released", pin);
                }
            }
            Ok(())
        })
    }

    fn backend(&self) -> &'static str {
        "simulation"
    }
}
