//! Circulation pump relay driver.
//!
//! A single GPIO drives the relay coil; HIGH closes the contact and runs
//! the pump. The driver is a dumb actuator: scheduling lives in
//! `scheduler`, and the service re-asserts the relay level every tick.
//!
//! On host builds the GPIO write is a no-op and only the in-memory level
//! is tracked.

use crate::drivers::hw_init;
use crate::error::ActuatorError;
use crate::pins;

pub struct PumpDriver {
    pin: i32,
    on: bool,
}

impl Default for PumpDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl PumpDriver {
    pub fn new() -> Self {
        Self::on_pin(pins::PUMP_RELAY_GPIO)
    }

    pub fn on_pin(pin: i32) -> Self {
        Self { pin, on: false }
    }

    /// Drive the relay to `on`. Safe to call with the current level.
    pub fn set(&mut self, on: bool) -> Result<(), ActuatorError> {
        if !hw_init::gpio_write(self.pin, on) {
            return Err(ActuatorError::GpioWriteFailed);
        }
        self.on = on;
        Ok(())
    }

    pub fn is_on(&self) -> bool {
        self.on
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracks_commanded_level() {
        let mut p = PumpDriver::new();
        assert!(!p.is_on());
        p.set(true).unwrap();
        p.set(true).unwrap();
        assert!(p.is_on());
        p.set(false).unwrap();
        assert!(!p.is_on());
    }
}
