//! Integration test driver for `tests/integration/` submodule.
//!
//! Each `mod` below maps to a file that exercises a specific subsystem
//! against the simulation backend.  All tests run on the host with no real
//! hardware required; pattern tables are time-compressed where the
//! scenario allows it.

mod lifecycle_tests;
mod queue_tests;
mod recording_sink;
mod scenario_tests;
