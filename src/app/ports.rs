//! Port traits: the hexagonal boundary between the alert engine and the
//! outside world.
//!
//! ```text
//!   OutputPort adapter ◀── drivers (PWM, buzzer) ◀── AlertSystem
//!                                                      │
//!   EventSink adapter  ◀───────────────────────────────┘
//! ```
//!
//! Driven adapters (simulation, embedded-hal pins, log sink) implement these
//! traits.  The core holds them as trait objects chosen once at construction,
//! so it never branches on which backend is active.

use core::fmt;

use super::events::AlertEvent;

// ───────────────────────────────────────────────────────────────
// Digital output port (driven adapter: core → GPIO)
// ───────────────────────────────────────────────────────────────

/// Electrical pin level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Low,
    High,
}

impl Level {
    pub const fn is_high(self) -> bool {
        matches!(self, Self::High)
    }
}

/// Opaque handle to an opened output line.
///
/// Carries the pin number so adapters and log lines can name it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PinHandle {
    pin: u32,
}

impl PinHandle {
    pub const fn new(pin: u32) -> Self {
        Self { pin }
    }

    pub const fn pin(self) -> u32 {
        self.pin
    }
}

/// Minimal capability contract toward the GPIO backend.
///
/// Implementations are shared between the queue consumer, every PWM driver
/// worker and transient buzzer workers, hence `&self` methods and
/// `Send + Sync`.
pub trait OutputPort: Send + Sync {
    /// Claim `pin` as an output, driving it to `initial` immediately.
    fn open(&self, pin: u32, initial: Level, consumer: &str) -> Result<PinHandle, PortError>;

    /// Drive an opened line to `level`.
    fn set_level(&self, handle: PinHandle, level: Level) -> Result<(), PortError>;

    /// Release an opened line.  Closing an already-closed line is a no-op.
    fn close(&self, handle: PinHandle) -> Result<(), PortError>;

    /// Short backend label for health reporting.
    fn backend(&self) -> &'static str;
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: core → logging)
// ───────────────────────────────────────────────────────────────

/// The core emits structured [`AlertEvent`]s through this port.  Adapters
/// decide where they go; the core only defines the record shape.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &AlertEvent);
}

/// Sink that drops every event.
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: &AlertEvent) {}
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`OutputPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortError {
    /// The GPIO chip itself could not be opened.
    ChipUnavailable,
    /// The requested line does not exist or cannot be driven.
    PinUnavailable(u32),
    /// The line is already claimed.
    PinBusy(u32),
    /// The handle does not refer to an opened line.
    UnknownHandle,
    /// Writing a level to the line failed.
    WriteFailed(u32),
}

impl fmt::Display for PortError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ChipUnavailable => write!(f, "GPIO chip unavailable"),
            Self::PinUnavailable(pin) => write!(f, "pin {pin} unavailable"),
            Self::PinBusy(pin) => write!(f, "pin {pin} already claimed"),
            Self::UnknownHandle => write!(f, "unknown pin handle"),
            Self::WriteFailed(pin) => write!(f, "write to pin {pin} failed"),
        }
    }
}

impl std::error::Error for PortError {}
