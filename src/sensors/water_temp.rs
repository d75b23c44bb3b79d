//! Reservoir water temperature.
//!
//! Three interchangeable front-ends, selected by [`WaterTempSource`]:
//!
//! | Source       | Input                      | Transfer                  |
//! |--------------|----------------------------|---------------------------|
//! | `LinearAdc`  | analog module on GPIO 32   | `v / vref * span + offset`|
//! | `Thermistor` | 10 kΩ NTC, 10 kΩ divider   | Beta equation (B = 3950)  |
//! | `Probe`      | digital probe              | °C as reported            |
//!
//! Every result is clamped to 0–50 °C before it is reported.

use embedded_hal::delay::DelayNs;
use log::warn;

use super::reading::{LastKnownGood, Sample, SensorReading};
use super::sampling::average_voltage;
use super::{AnalogChannel, SensorBus};
use crate::config::{Calibration, SystemConfig, WaterTempSource};
use crate::error::SensorError;

pub const WATER_TEMP_MIN_C: f32 = 0.0;
pub const WATER_TEMP_MAX_C: f32 = 50.0;
/// Reported when no reading is available; also the zero point of every
/// temperature compensation, so a missing probe leaves TDS/pH uncompensated.
pub const DEFAULT_WATER_TEMP_C: f32 = 25.0;

const T25_K: f32 = 298.15;
/// Probe sentinel range; outside it the probe is disconnected.
const PROBE_RANGE_C: (f32, f32) = (-55.0, 125.0);

pub fn linear_celsius(voltage: f32, cal: &Calibration) -> f32 {
    voltage / cal.vref * cal.water_temp_span_c + cal.water_temp_offset_c
}

/// `None` when the divider is at a rail or the log term blows up.
pub fn thermistor_celsius(voltage: f32, cal: &Calibration) -> Option<f32> {
    if voltage <= 0.01 || voltage >= (cal.vref - 0.01) {
        return None;
    }
    let r_ntc = cal.thermistor_divider * voltage / (cal.vref - voltage);
    let inv_t = (1.0 / T25_K) + (1.0 / cal.thermistor_beta) * (r_ntc / cal.thermistor_r25).ln();
    if !inv_t.is_finite() || inv_t <= 0.0 {
        return None;
    }
    Some((1.0 / inv_t) - 273.15)
}

pub fn clamp_water_temp(celsius: f32) -> f32 {
    celsius.clamp(WATER_TEMP_MIN_C, WATER_TEMP_MAX_C)
}

pub struct WaterTempSensor {
    source: WaterTempSource,
    cache: LastKnownGood,
}

impl WaterTempSensor {
    pub fn new(config: &SystemConfig) -> Self {
        Self {
            source: config.water_temp_source,
            cache: LastKnownGood::new(DEFAULT_WATER_TEMP_C, u64::from(config.analog_timeout_ms)),
        }
    }

    pub fn read<B, D>(&mut self, bus: &mut B, delay: &mut D, now_ms: u64, cal: &Calibration) -> Sample
    where
        B: SensorBus + ?Sized,
        D: DelayNs,
    {
        let celsius = match self.source {
            WaterTempSource::LinearAdc => {
                average_voltage(bus, delay, AnalogChannel::WaterTemp, 1, 0, cal)
                    .map(|v| linear_celsius(v, cal))
            }
            WaterTempSource::Thermistor => {
                average_voltage(bus, delay, AnalogChannel::WaterTemp, 1, 0, cal)
                    .and_then(|v| thermistor_celsius(v, cal))
            }
            WaterTempSource::Probe => bus
                .read_probe_celsius()
                .filter(|c| c.is_finite() && (PROBE_RANGE_C.0..=PROBE_RANGE_C.1).contains(c)),
        };

        match celsius {
            Some(c) => self
                .cache
                .accept(SensorReading::measured(clamp_water_temp(c), now_ms)),
            None => {
                let err = match self.source {
                    WaterTempSource::Probe => SensorError::ProbeReadFailed,
                    WaterTempSource::Thermistor => SensorError::OutOfRange,
                    WaterTempSource::LinearAdc => SensorError::AdcReadFailed,
                };
                warn!("water_temp: {}", err);
                self.cache.fail(now_ms)
            }
        }
    }
}
