//! Analog pH probe with two-point calibration.
//!
//! The probe board outputs a voltage that falls as pH rises.  Calibration
//! records the voltage in pH 4.00 and pH 7.00 buffers; readings are mapped
//! along the line through both points:
//!
//! ```text
//! slope = (7 - 4) / (v7 - v4)
//! pH    = 7 + slope * (v - v7)
//! ```
//!
//! Temperature compensation (0.03 V per °C from 25 °C) is applied only when
//! the water temperature is itself sane (strictly between 0 and 100 °C).

use embedded_hal::delay::DelayNs;
use log::warn;

use super::reading::{LastKnownGood, Sample, SensorReading};
use super::sampling::average_voltage;
use super::{AnalogChannel, SensorBus};
use crate::config::{Calibration, SystemConfig};
use crate::error::SensorError;

pub const PH_MIN: f32 = -0.5;
pub const PH_MAX: f32 = 14.5;
pub const DEFAULT_PH: f32 = 7.0;

const TEMP_COEF_V_PER_C: f32 = 0.03;

/// Convert a probe voltage to pH. The result always lies in
/// [`PH_MIN`]..=[`PH_MAX`], for every input including NaN and infinities.
pub fn ph_from_voltage(voltage: f32, water_temp_c: f32, cal: &Calibration) -> f32 {
    let mut v = voltage;
    if water_temp_c > 0.0 && water_temp_c < 100.0 {
        v -= TEMP_COEF_V_PER_C * (water_temp_c - 25.0);
    }
    let slope = (7.0 - 4.0) / (cal.ph7_voltage - cal.ph4_voltage);
    let ph = 7.0 + slope * (v - cal.ph7_voltage);
    // f32::max/min discard NaN, so NaN lands on PH_MIN rather than escaping.
    ph.max(PH_MIN).min(PH_MAX)
}

pub struct PhSensor {
    cache: LastKnownGood,
    samples: u8,
    interval_ms: u8,
}

impl PhSensor {
    pub fn new(config: &SystemConfig) -> Self {
        Self {
            cache: LastKnownGood::new(DEFAULT_PH, u64::from(config.analog_timeout_ms)),
            samples: config.ph_samples,
            interval_ms: config.sample_interval_ms,
        }
    }

    pub fn read<B, D>(
        &mut self,
        bus: &mut B,
        delay: &mut D,
        now_ms: u64,
        water_temp_c: f32,
        cal: &Calibration,
    ) -> Sample
    where
        B: SensorBus + ?Sized,
        D: DelayNs,
    {
        match average_voltage(bus, delay, AnalogChannel::Ph, self.samples, self.interval_ms, cal) {
            Some(v) => self
                .cache
                .accept(SensorReading::measured(ph_from_voltage(v, water_temp_c, cal), now_ms)),
            None => {
                warn!("ph: {}", SensorError::AdcReadFailed);
                self.cache.fail(now_ms)
            }
        }
    }
}
