//! Hardware adapter: bridges real peripherals to domain port traits.
//!
//! Owns the [`SensorHub`] and the actuator drivers, exposing them through
//! [`SensorPort`] and [`ActuatorPort`]. Generic over the sensor bus, the
//! inter-sample delay and the LED writer, so host builds plug in the
//! simulated bus and [`SimStrip`](crate::drivers::led_strip::SimStrip).

use embedded_hal::delay::DelayNs;
use smart_leds::{SmartLedsWrite, RGB8};

use crate::app::ports::{ActuatorPort, SensorPort};
use crate::drivers::led_strip::{LedMode, LedStrip};
use crate::drivers::pump::PumpDriver;
use crate::error::ActuatorError;
use crate::sensors::{SensorBus, SensorHub, SensorSnapshot};

pub struct HardwareAdapter<B, D, W> {
    sensor_hub: SensorHub<B, D>,
    pump: PumpDriver,
    strip: LedStrip<W>,
}

impl<B, D, W> HardwareAdapter<B, D, W>
where
    B: SensorBus,
    D: DelayNs,
    W: SmartLedsWrite<Color = RGB8>,
{
    pub fn new(sensor_hub: SensorHub<B, D>, pump: PumpDriver, strip: LedStrip<W>) -> Self {
        Self {
            sensor_hub,
            pump,
            strip,
        }
    }

    pub fn pump_on(&self) -> bool {
        self.pump.is_on()
    }

    pub fn led_mode(&self) -> LedMode {
        self.strip.mode()
    }

    pub fn strip(&self) -> &LedStrip<W> {
        &self.strip
    }

    pub fn sensor_hub_mut(&mut self) -> &mut SensorHub<B, D> {
        &mut self.sensor_hub
    }
}

// ── SensorPort implementation ─────────────────────────────────

impl<B, D, W> SensorPort for HardwareAdapter<B, D, W>
where
    B: SensorBus,
    D: DelayNs,
    W: SmartLedsWrite<Color = RGB8>,
{
    fn read_all(&mut self, now_ms: u64) -> SensorSnapshot {
        self.sensor_hub.read_all(now_ms)
    }
}

// ── ActuatorPort implementation ───────────────────────────────

impl<B, D, W> ActuatorPort for HardwareAdapter<B, D, W>
where
    B: SensorBus,
    D: DelayNs,
    W: SmartLedsWrite<Color = RGB8>,
{
    fn set_pump(&mut self, on: bool) -> Result<(), ActuatorError> {
        self.pump.set(on)
    }

    fn set_led_mode(&mut self, mode: LedMode) -> Result<(), ActuatorError> {
        self.strip.set_mode(mode)
    }
}
