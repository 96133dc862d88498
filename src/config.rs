//! System configuration parameters
//!
//! Pin assignment, PWM carrier and lifecycle tuning for one alert hardware
//! set.  Supplied once at construction (JSON file or defaults); nothing is
//! reloaded at runtime.

use std::collections::HashSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::drivers::pwm::PwmConfig;
use crate::drivers::rgb::RgbPins;
use crate::error::{Error, Result};

/// What happens to queued alerts at shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShutdownPolicy {
    /// Cancel the alert in flight and drop everything still queued.
    #[default]
    Discard,
    /// Let every queued alert finish first.
    Drain,
}

/// Core alert hardware configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AlertConfig {
    // --- Pins ---
    pub red_pin: u32,
    pub green_pin: u32,
    pub blue_pin: u32,
    pub buzzer_pin: u32,

    // --- PWM ---
    /// Carrier frequency for the three colour channels.
    pub pwm_frequency_hz: u32,
    /// Common-anode LED: a low level lights the die.
    pub common_anode: bool,

    // --- Backend ---
    /// GPIO chip the hardware backend opens (e.g. `gpiochip0`).
    pub chip_identifier: String,
    /// Prefix for the consumer tag each claimed line carries.
    pub consumer_label: String,

    // --- Timing ---
    /// Pattern colour update rate.
    pub update_hz: u32,
    /// Bound on each PWM channel's stop at shutdown (milliseconds).
    pub stop_timeout_ms: u64,
    pub shutdown_policy: ShutdownPolicy,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            // Pins
            red_pin: 17,
            green_pin: 27,
            blue_pin: 22,
            buzzer_pin: 24,

            // PWM
            pwm_frequency_hz: 500,
            common_anode: false,

            // Backend
            chip_identifier: "gpiochip0".into(),
            consumer_label: "hwalert".into(),

            // Timing
            update_hz: 50,
            stop_timeout_ms: 1000,
            shutdown_policy: ShutdownPolicy::Discard,
        }
    }
}

impl AlertConfig {
    /// Reject configurations the system cannot run with.
    pub fn validate(&self) -> Result<()> {
        let pins = [self.red_pin, self.green_pin, self.blue_pin, self.buzzer_pin];
        let unique: HashSet<u32> = pins.iter().copied().collect();
        if unique.len() != pins.len() {
            return Err(Error::Config("pins must be distinct"));
        }
        if self.pwm_frequency_hz == 0 {
            return Err(Error::Config("pwmFrequencyHz must be positive"));
        }
        if self.update_hz == 0 {
            return Err(Error::Config("updateHz must be positive"));
        }
        if self.stop_timeout_ms == 0 {
            return Err(Error::Config("stopTimeoutMs must be positive"));
        }
        Ok(())
    }

    pub fn rgb_pins(&self) -> RgbPins {
        RgbPins {
            red: self.red_pin,
            green: self.green_pin,
            blue: self.blue_pin,
        }
    }

    pub fn pwm(&self) -> PwmConfig {
        PwmConfig {
            frequency_hz: self.pwm_frequency_hz,
            invert_polarity: self.common_anode,
            initial_duty: 0.0,
        }
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }
}
