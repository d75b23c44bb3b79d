//! DHT22 air temperature / humidity sensor.
//!
//! The DHT reports NaN on a checksum or timing failure.  A NaN on either
//! channel fails both, since they arrive in the same frame.  Failures fall
//! back to the last good frame for `climate_timeout_ms`, then to the fixed
//! defaults; once stale the driver asks the bus to re-initialise the sensor,
//! at most once per timeout window.

use log::warn;

use super::reading::{LastKnownGood, ReadingSource, Sample, SensorReading};
use super::SensorBus;
use crate::config::SystemConfig;
use crate::error::SensorError;

/// DHT22 datasheet operating range.
const HUMIDITY_RANGE: (f32, f32) = (0.0, 100.0);
const AIR_TEMP_RANGE_C: (f32, f32) = (-40.0, 80.0);

#[derive(Debug, Clone, Copy)]
pub struct ClimateReading {
    pub humidity: Sample,
    pub air_temp: Sample,
}

pub struct ClimateSensor {
    humidity: LastKnownGood,
    air_temp: LastKnownGood,
    timeout_ms: u64,
    last_reset_ms: Option<u64>,
}

impl ClimateSensor {
    pub fn new(config: &SystemConfig) -> Self {
        let timeout_ms = u64::from(config.climate_timeout_ms);
        Self {
            humidity: LastKnownGood::new(config.default_humidity_percent, timeout_ms),
            air_temp: LastKnownGood::new(config.default_air_temp_c, timeout_ms),
            timeout_ms,
            last_reset_ms: None,
        }
    }

    pub fn read(&mut self, bus: &mut (impl SensorBus + ?Sized), now_ms: u64) -> ClimateReading {
        let frame = bus.read_climate();
        let plausible = in_range(frame.humidity_percent, HUMIDITY_RANGE)
            && in_range(frame.air_temp_c, AIR_TEMP_RANGE_C);

        if plausible {
            return ClimateReading {
                humidity: self
                    .humidity
                    .accept(SensorReading::measured(frame.humidity_percent, now_ms)),
                air_temp: self
                    .air_temp
                    .accept(SensorReading::measured(frame.air_temp_c, now_ms)),
            };
        }

        warn!(
            "climate: {} (ever_read={})",
            SensorError::ClimateReadFailed,
            self.air_temp.has_ever_read()
        );
        let reading = ClimateReading {
            humidity: self.humidity.fail(now_ms),
            air_temp: self.air_temp.fail(now_ms),
        };

        if reading.air_temp.source == ReadingSource::Default && self.reset_due(now_ms) {
            warn!("climate: sensor stale, re-initialising");
            bus.reset_climate();
            self.last_reset_ms = Some(now_ms);
        }
        reading
    }

    fn reset_due(&self, now_ms: u64) -> bool {
        self.last_reset_ms
            .is_none_or(|t| now_ms.saturating_sub(t) >= self.timeout_ms)
    }
}

fn in_range(v: f32, (lo, hi): (f32, f32)) -> bool {
    v.is_finite() && (lo..=hi).contains(&v)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensors::sim::SimSensorBus;

    fn sensor() -> ClimateSensor {
        ClimateSensor::new(&SystemConfig::default())
    }

    #[test]
    fn good_frame_is_measured() {
        let mut bus = SimSensorBus::new();
        bus.set_climate(60.0, 24.5);
        let r = sensor().read(&mut bus, 0);
        assert_eq!(r.humidity.source, ReadingSource::Measured);
        assert!((r.air_temp.value() - 24.5).abs() < f32::EPSILON);
    }

    #[test]
    fn never_read_uses_defaults() {
        let mut bus = SimSensorBus::new();
        let r = sensor().read(&mut bus, 1_000);
        assert_eq!(r.humidity.source, ReadingSource::Default);
        assert!((r.humidity.value() - 33.1).abs() < 1e-4);
        assert!((r.air_temp.value() - 22.1).abs() < 1e-4);
    }

    #[test]
    fn nan_on_one_channel_fails_both() {
        let mut s = sensor();
        let mut bus = SimSensorBus::new();
        bus.set_climate(55.0, 21.0);
        s.read(&mut bus, 0);
        bus.set_climate(f32::NAN, 23.0);
        let r = s.read(&mut bus, 2_000);
        assert_eq!(r.air_temp.source, ReadingSource::LastKnownGood);
        assert!((r.air_temp.value() - 21.0).abs() < f32::EPSILON);
    }

    #[test]
    fn reset_requested_once_per_window() {
        let mut s = sensor();
        let mut bus = SimSensorBus::new();
        s.read(&mut bus, 0);
        s.read(&mut bus, 5_000);
        assert_eq!(bus.climate_resets(), 1);
        s.read(&mut bus, 10_000);
        assert_eq!(bus.climate_resets(), 2);
    }

    #[test]
    fn held_value_does_not_trigger_reset() {
        let mut s = sensor();
        let mut bus = SimSensorBus::new();
        bus.set_climate(55.0, 21.0);
        s.read(&mut bus, 0);
        bus.fail_climate();
        s.read(&mut bus, 9_000);
        assert_eq!(bus.climate_resets(), 0);
    }
}
