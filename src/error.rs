//! Unified error types for the alert engine.
//!
//! A single `Error` enum that every subsystem converts into, so the queue
//! consumer and the lifecycle manager handle failures uniformly.  All
//! variants are `Copy` so they can be passed across worker threads and
//! logged without allocation.

use core::fmt;

use crate::app::ports::PortError;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Every fallible operation in the crate funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Error {
    /// `enqueue` was attempted after shutdown.
    QueueClosed,
    /// A colour component outside `[0, 1]` was requested.
    InvalidColorComponent { channel: ColorChannel, value: f32 },
    /// A PWM channel did not confirm shutdown within its bound.
    ChannelStopTimeout { pin: u32 },
    /// The digital output port could not be opened at startup (fatal).
    PortUnavailable(PortError),
    /// A runtime port operation failed (transient).
    Port(PortError),
    /// Configuration is invalid.
    Config(&'static str),
    /// A worker thread could not be spawned.
    Spawn,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::QueueClosed => write!(f, "alert queue closed"),
            Self::InvalidColorComponent { channel, value } => {
                write!(f, "invalid {channel} component {value} (expected 0.0..=1.0)")
            }
            Self::ChannelStopTimeout { pin } => {
                write!(f, "PWM channel on pin {pin} did not stop in time")
            }
            Self::PortUnavailable(e) => write!(f, "output port unavailable: {e}"),
            Self::Port(e) => write!(f, "output port: {e}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::Spawn => write!(f, "failed to spawn worker thread"),
        }
    }
}

impl std::error::Error for Error {}

impl From<PortError> for Error {
    fn from(e: PortError) -> Self {
        Self::Port(e)
    }
}

// ---------------------------------------------------------------------------
// Colour channel tag
// ---------------------------------------------------------------------------

/// Identifies which LED component an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorChannel {
    Red,
    Green,
    Blue,
}

impl fmt::Display for ColorChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Red => write!(f, "red"),
            Self::Green => write!(f, "green"),
            Self::Blue => write!(f, "blue"),
        }
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
