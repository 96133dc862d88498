//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter        | Implements   | Connects to                      |
//! |----------------|--------------|----------------------------------|
//! | `sim_port`     | OutputPort   | In-memory recorder               |
//! | `hal_port`     | OutputPort   | Any `embedded-hal` output pins   |
//! | `cdev`         | (factory)    | Linux GPIO character device      |
//! | `log_sink`     | EventSink    | JSON lines via `log`             |
//! | `stdin_source` | (driver)     | Line-delimited JSON alert intake |
//!
//! Backend selection happens once, in [`open_port`]; the core never asks
//! which backend it got.

#[cfg(feature = "gpio-cdev")]
pub mod cdev;
pub mod hal_port;
pub mod log_sink;
pub mod sim_port;
pub mod stdin_source;

use std::sync::Arc;

use log::info;

use crate::app::ports::OutputPort;
use crate::config::AlertConfig;
use crate::error::Result;

/// Open the output backend for `config`.
///
/// `simulate` forces the simulation backend.  Builds without the
/// `gpio-cdev` feature have no hardware backend and fall back to it too.
pub fn open_port(config: &AlertConfig, simulate: bool) -> Result<Arc<dyn OutputPort>> {
    if simulate {
        return Ok(Arc::new(sim_port::SimulatedPort::new()));
    }

    #[cfg(feature = "gpio-cdev")]
    {
        let port = cdev::open(config)?;
        info!("Hardware GPIO backend on {}", config.chip_identifier);
        Ok(Arc::new(port))
    }

    #[cfg(not(feature = "gpio-cdev"))]
    {
        log::warn!(
            "Built without GPIO support; '{}' not opened, simulating instead",
            config.chip_identifier
        );
        info!("Enable the `gpio-cdev` feature for hardware output");
        Ok(Arc::new(sim_port::SimulatedPort::new()))
    }
}
