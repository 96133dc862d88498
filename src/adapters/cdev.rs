//! Linux GPIO character-device backend.
//!
//! Requests the configured lines from `/dev/<chipIdentifier>` and wraps them
//! in a [`HalPort`].  Any failure here means the hardware is unreachable and
//! surfaces as `PortUnavailable`.

use linux_embedded_hal::CdevPin;
use linux_embedded_hal::gpio_cdev::{Chip, LineRequestFlags};
use log::{error, info};

use super::hal_port::HalPort;
use crate::app::ports::PortError;
use crate::config::AlertConfig;
use crate::error::{Error, Result};

fn chip_path(identifier: &str) -> String {
    if identifier.starts_with('/') {
        identifier.to_owned()
    } else {
        format!("/dev/{identifier}")
    }
}

pub fn open(config: &AlertConfig) -> Result<HalPort<CdevPin>> {
    let path = chip_path(&config.chip_identifier);
    let mut chip = Chip::new(&path).map_err(|e| {
        error!("Cannot open GPIO chip {}: {}", path, e);
        Error::PortUnavailable(PortError::ChipUnavailable)
    })?;

    // Lines are requested at their "off" level so nothing flashes before
    // the drivers take over.
    let rgb_off = u8::from(config.common_anode);
    let lines = [
        (config.red_pin, rgb_off),
        (config.green_pin, rgb_off),
        (config.blue_pin, rgb_off),
        (config.buzzer_pin, 0),
    ];

    let mut pins = Vec::with_capacity(lines.len());
    for (pin, default) in lines {
        let unavailable = |e: &dyn std::fmt::Display| {
            error!("GPIO line {} on {} unavailable: {}", pin, path, e);
            Error::PortUnavailable(PortError::PinUnavailable(pin))
        };
        let handle = chip
            .get_line(pin)
            .and_then(|line| line.request(LineRequestFlags::OUTPUT, default, &config.consumer_label))
            .map_err(|e| unavailable(&e))?;
        let cdev = CdevPin::new(handle).map_err(|e| unavailable(&e))?;
        pins.push((pin, cdev));
    }

    info!("GPIO chip {} opened ({} lines)", path, pins.len());
    Ok(HalPort::new(pins))
}
