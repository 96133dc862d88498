//! Hardware alert engine library.
//!
//! Serializes alert requests onto one RGB LED and one buzzer.  The domain
//! core lives in [`app`], the software-PWM and pattern drivers in
//! [`drivers`], and the GPIO/log backends in [`adapters`].  Everything that
//! touches hardware goes through [`app::ports::OutputPort`].

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod config;
pub mod drivers;
pub mod error;

pub use app::commands::{AlertId, AlertRequest, Severity};
pub use app::service::{AlertSystem, Health, ShutdownReport};
pub use config::{AlertConfig, ShutdownPolicy};
pub use error::{Error, Result};
