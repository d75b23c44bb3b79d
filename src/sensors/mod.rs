//! Sensor subsystem: individual drivers and the aggregating [`SensorHub`].
//!
//! The hub owns every sensor driver and produces a [`SensorSnapshot`] each
//! acquisition pass.  Raw hardware access goes through [`SensorBus`]; the
//! ESP-IDF implementation lives in `drivers::sensor_bus`, the simulated one
//! in [`sim`].
//!
//! Water temperature is read first: TDS, EC and pH all compensate against it.

pub mod climate;
pub mod ph;
pub mod reading;
pub mod sampling;
pub mod sim;
pub mod tds;
pub mod water_level;
pub mod water_temp;

use embedded_hal::delay::DelayNs;
use log::debug;

use crate::config::{Calibration, SystemConfig};
use climate::ClimateSensor;
use ph::PhSensor;
pub use reading::{Metric, ReadingSource, Sample, SensorReading, SensorSnapshot};
use tds::TdsSensor;
use water_level::WaterLevelSensor;
use water_temp::WaterTempSensor;

/// ADC inputs wired to analog probes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalogChannel {
    Tds,
    Ph,
    WaterTemp,
    Ec,
}

/// One DHT frame. NaN on either field marks a failed read.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClimateSample {
    pub humidity_percent: f32,
    pub air_temp_c: f32,
}

impl ClimateSample {
    pub const FAILED: Self = Self {
        humidity_percent: f32::NAN,
        air_temp_c: f32::NAN,
    };
}

/// Raw hardware primitives the sensor drivers are built on.
pub trait SensorBus {
    /// One ADC conversion; `None` if the conversion failed.
    fn analog_read(&mut self, channel: AnalogChannel) -> Option<u16>;

    /// One humidity/temperature frame.
    fn read_climate(&mut self) -> ClimateSample;

    /// Re-initialise the humidity/temperature sensor after it went stale.
    fn reset_climate(&mut self);

    /// Digital water-temperature probe, if fitted.
    fn read_probe_celsius(&mut self) -> Option<f32>;

    /// Trigger the ultrasonic sensor and return the echo width in µs
    /// (0 when no echo arrived).
    fn echo_pulse_us(&mut self) -> u32;
}

impl SensorSnapshot {
    /// Every metric at its fallback value; stands in until the first
    /// acquisition pass.
    pub fn boot(config: &SystemConfig, now_ms: u64) -> Self {
        let fallback = |value| Sample {
            reading: SensorReading::invalid(value, now_ms),
            source: ReadingSource::Default,
        };
        Self {
            taken_at_ms: now_ms,
            air_temp: fallback(config.default_air_temp_c),
            humidity: fallback(config.default_humidity_percent),
            water_temp: fallback(water_temp::DEFAULT_WATER_TEMP_C),
            tds: fallback(0.0),
            ec: fallback(0.0),
            ph: fallback(ph::DEFAULT_PH),
            water_level: fallback(config.fixed_water_level_percent),
        }
    }
}

/// Aggregates all sensor drivers and produces a unified snapshot.
pub struct SensorHub<B, D> {
    bus: B,
    delay: D,
    calibration: Calibration,
    climate: ClimateSensor,
    water_temp: WaterTempSensor,
    tds: TdsSensor,
    ph: PhSensor,
    water_level: WaterLevelSensor,
}

impl<B: SensorBus, D: DelayNs> SensorHub<B, D> {
    pub fn new(bus: B, delay: D, config: &SystemConfig) -> Self {
        Self {
            bus,
            delay,
            calibration: config.calibration.clone(),
            climate: ClimateSensor::new(config),
            water_temp: WaterTempSensor::new(config),
            tds: TdsSensor::new(config),
            ph: PhSensor::new(config),
            water_level: WaterLevelSensor::new(config),
        }
    }

    /// Read every sensor and return a unified snapshot.
    ///
    /// Individual read failures are logged inside each driver and degrade
    /// to last-known-good or default; this never fails.
    pub fn read_all(&mut self, now_ms: u64) -> SensorSnapshot {
        let cal = &self.calibration;
        let water_temp = self.water_temp.read(&mut self.bus, &mut self.delay, now_ms, cal);
        let t = water_temp.value();

        let climate = self.climate.read(&mut self.bus, now_ms);
        let tds = self.tds.read(&mut self.bus, &mut self.delay, now_ms, t, cal);
        let ph = self.ph.read(&mut self.bus, &mut self.delay, now_ms, t, cal);
        let water_level = self.water_level.read(&mut self.bus, now_ms);

        let snapshot = SensorSnapshot {
            taken_at_ms: now_ms,
            air_temp: climate.air_temp,
            humidity: climate.humidity,
            water_temp,
            tds: tds.tds,
            ec: tds.ec,
            ph,
            water_level,
        };
        debug!(
            "sensors: T={:.1} RH={:.1} Tw={:.1} TDS={:.0} EC={:.0} pH={:.2} L={:.0}",
            snapshot.air_temp.value(),
            snapshot.humidity.value(),
            t,
            snapshot.tds.value(),
            snapshot.ec.value(),
            snapshot.ph.value(),
            snapshot.water_level.value(),
        );
        snapshot
    }

    /// Direct bus access (test injection, diagnostics).
    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }
}
