//! RGB LED driver.
//!
//! Three software-PWM channels drive the red, green and blue dies of one
//! LED.  Colour components are duty cycles in `[0, 1]`; out-of-range input
//! is rejected rather than clamped so a bad pattern step is visible.
//!
//! The three channels are updated one after another.  The skew between them
//! is far below one PWM period and is not perceptible.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, warn};

use crate::app::ports::{OutputPort, PinHandle};
use crate::drivers::pwm::{PwmChannel, PwmConfig};
use crate::error::{ColorChannel, Error, Result};

/// Pin assignment for one RGB LED.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RgbPins {
    pub red: u32,
    pub green: u32,
    pub blue: u32,
}

/// Colour as (r, g, b) duty cycles.
pub type Rgb = (f32, f32, f32);

pub const OFF: Rgb = (0.0, 0.0, 0.0);

pub struct RgbLed {
    red: PwmChannel,
    green: PwmChannel,
    blue: PwmChannel,
}

impl RgbLed {
    /// Open all three channels.  Nothing is left claimed on failure.
    pub fn open(
        port: &Arc<dyn OutputPort>,
        pins: RgbPins,
        config: PwmConfig,
        consumer: &str,
    ) -> Result<Self> {
        let red = PwmChannel::open(Arc::clone(port), pins.red, config, &format!("{consumer}-red"))?;
        let green = match PwmChannel::open(
            Arc::clone(port),
            pins.green,
            config,
            &format!("{consumer}-green"),
        ) {
            Ok(ch) => ch,
            Err(e) => {
                release(port, red);
                return Err(e);
            }
        };
        let blue = match PwmChannel::open(
            Arc::clone(port),
            pins.blue,
            config,
            &format!("{consumer}-blue"),
        ) {
            Ok(ch) => ch,
            Err(e) => {
                release(port, red);
                release(port, green);
                return Err(e);
            }
        };

        Ok(Self { red, green, blue })
    }

    /// Set an absolute colour.  Fails without touching any channel if a
    /// component is outside `[0, 1]`.
    pub fn set_color(&self, r: f32, g: f32, b: f32) -> Result<()> {
        validate(ColorChannel::Red, r)?;
        validate(ColorChannel::Green, g)?;
        validate(ColorChannel::Blue, b)?;
        self.red.set_duty_cycle(r);
        self.green.set_duty_cycle(g);
        self.blue.set_duty_cycle(b);
        Ok(())
    }

    pub fn set_rgb(&self, (r, g, b): Rgb) -> Result<()> {
        self.set_color(r, g, b)
    }

    pub fn off(&self) {
        self.red.set_duty_cycle(0.0);
        self.green.set_duty_cycle(0.0);
        self.blue.set_duty_cycle(0.0);
    }

    pub fn current_color(&self) -> Rgb {
        (
            self.red.duty_cycle(),
            self.green.duty_cycle(),
            self.blue.duty_cycle(),
        )
    }

    /// Pin whose driver has failed at least `threshold` writes in a row.
    pub fn faulted_pin(&self, threshold: u32) -> Option<u32> {
        self.channels()
            .into_iter()
            .find(|ch| ch.fault_streak() >= threshold)
            .map(PwmChannel::pin)
    }

    pub fn clear_faults(&self) {
        for ch in self.channels() {
            ch.clear_faults();
        }
    }

    /// Stop every channel with a bounded wait each.
    ///
    /// A channel that times out is forced off through the port; the pins of
    /// the timed-out channels are returned.
    pub fn stop(&mut self, timeout: Duration) -> Vec<u32> {
        let mut timed_out = Vec::new();
        for ch in [&mut self.red, &mut self.green, &mut self.blue] {
            if let Err(Error::ChannelStopTimeout { pin }) = ch.stop(timeout) {
                if let Err(e) = ch.force_off() {
                    warn!("Could not force pin {} off: {}", pin, e);
                }
                timed_out.push(pin);
            }
        }
        debug!("RGB channels stopped ({} timed out)", timed_out.len());
        timed_out
    }

    pub fn handles(&self) -> [PinHandle; 3] {
        [self.red.handle(), self.green.handle(), self.blue.handle()]
    }

    pub fn is_running(&self) -> bool {
        self.channels().iter().any(|ch| ch.is_running())
    }

    fn channels(&self) -> [&PwmChannel; 3] {
        [&self.red, &self.green, &self.blue]
    }
}

fn validate(channel: ColorChannel, value: f32) -> Result<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(Error::InvalidColorComponent { channel, value })
    }
}

/// Stop a partially constructed channel and give its pin back.
fn release(port: &Arc<dyn OutputPort>, mut ch: PwmChannel) {
    let _ = ch.stop(crate::drivers::pwm::DEFAULT_STOP_TIMEOUT);
    let _ = port.close(ch.handle());
}
