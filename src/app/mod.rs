//! Application core: alert semantics, zero direct I/O.
//!
//! The queue, the pattern engine and the lifecycle manager.  Interaction
//! with hardware and logging happens only through the **port traits** in
//! [`ports`], so the whole core runs against the simulation backend in tests.

pub mod commands;
pub mod engine;
pub mod events;
pub mod ports;
pub mod queue;
pub mod service;
