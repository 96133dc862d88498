//! `embedded-hal` output port.
//!
//! Adapts any set of [`embedded_hal::digital::OutputPin`]s to the
//! [`OutputPort`] contract.  Lines are handed over once at construction,
//! keyed by pin number; `open` only claims and initialises them.  Each line
//! has its own lock so PWM workers on different pins never contend.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use embedded_hal::digital::{Error as _, OutputPin};
use log::{debug, warn};

use crate::app::ports::{Level, OutputPort, PinHandle, PortError};

struct Line<P> {
    pin: P,
    claimed: bool,
}

pub struct HalPort<P> {
    lines: HashMap<u32, Mutex<Line<P>>>,
}

impl<P> HalPort<P>
where
    P: OutputPin + Send,
{
    pub fn new(pins: impl IntoIterator<Item = (u32, P)>) -> Self {
        Self {
            lines: pins
                .into_iter()
                .map(|(n, pin)| (n, Mutex::new(Line { pin, claimed: false })))
                .collect(),
        }
    }

    pub fn pins(&self) -> Vec<u32> {
        let mut pins: Vec<u32> = self.lines.keys().copied().collect();
        pins.sort_unstable();
        pins
    }

    fn line(&self, pin: u32) -> Option<MutexGuard<'_, Line<P>>> {
        self.lines.get(&pin).map(|m| match m.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        })
    }
}

fn drive<P: OutputPin>(pin_no: u32, pin: &mut P, level: Level) -> Result<(), PortError> {
    let res = match level {
        Level::High => pin.set_high(),
        Level::Low => pin.set_low(),
    };
    res.map_err(|e| {
        warn!("Pin {} write failed: {:?}", pin_no, e.kind());
        PortError::WriteFailed(pin_no)
    })
}

impl<P> OutputPort for HalPort<P>
where
    P: OutputPin + Send,
{
    fn open(&self, pin: u32, initial: Level, consumer: &str) -> Result<PinHandle, PortError> {
        let mut line = self.line(pin).ok_or(PortError::PinUnavailable(pin))?;
        if line.claimed {
            return Err(PortError::PinBusy(pin));
        }
        drive(pin, &mut line.pin, initial)?;
        line.claimed = true;
        debug!("hal: pin {} claimed for '{}'", pin, consumer);
        Ok(PinHandle::new(pin))
    }

    fn set_level(&self, handle: PinHandle, level: Level) -> Result<(), PortError> {
        let pin = handle.pin();
        let mut line = self.line(pin).ok_or(PortError::UnknownHandle)?;
        if !line.claimed {
            return Err(PortError::UnknownHandle);
        }
        drive(pin, &mut line.pin, level)
    }

    fn close(&self, handle: PinHandle) -> Result<(), PortError> {
        if let Some(mut line) = self.line(handle.pin()) {
            line.claimed = false;
        }
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "embedded-hal"
    }
}
