//! Reservoir water level.
//!
//! Either a fixed percentage (no level sensor fitted) or an HC-SR04 mounted
//! above the reservoir.  The ultrasonic path converts the echo pulse to a
//! distance and maps it inversely between the configured "full" and
//! "empty" distances:
//!
//! ```text
//!  sensor ─┬─ full_cm  → 100 %
//!          │
//!          └─ empty_cm →   0 %
//! ```
//!
//! A zero pulse (no echo) is a failed reading.  Distances outside the
//! sensor's 2–400 cm range are clamped into it and flagged invalid.

use log::warn;

use super::reading::{LastKnownGood, Sample, SensorReading};
use super::SensorBus;
use crate::config::{SystemConfig, WaterLevelSource};
use crate::error::SensorError;

pub const MIN_DISTANCE_CM: f32 = 2.0;
pub const MAX_DISTANCE_CM: f32 = 400.0;

/// Speed of sound at ~20 °C, cm/µs.
const SOUND_CM_PER_US: f32 = 0.0343;

/// Round-trip echo time to one-way distance.
pub fn pulse_to_distance_cm(pulse_us: u32) -> f32 {
    pulse_us as f32 * SOUND_CM_PER_US / 2.0
}

/// Map a surface distance to 0–100 %.
pub fn distance_to_percent(distance_cm: f32, full_cm: f32, empty_cm: f32) -> f32 {
    let span = empty_cm - full_cm;
    if span <= 0.0 {
        return 0.0;
    }
    ((empty_cm - distance_cm) / span * 100.0).clamp(0.0, 100.0)
}

pub struct WaterLevelSensor {
    source: WaterLevelSource,
    fixed_percent: f32,
    full_cm: f32,
    empty_cm: f32,
    cache: LastKnownGood,
}

impl WaterLevelSensor {
    pub fn new(config: &SystemConfig) -> Self {
        Self {
            source: config.water_level_source,
            fixed_percent: config.fixed_water_level_percent,
            full_cm: config.tank_full_distance_cm,
            empty_cm: config.tank_empty_distance_cm,
            cache: LastKnownGood::new(
                config.fixed_water_level_percent,
                u64::from(config.analog_timeout_ms),
            ),
        }
    }

    pub fn read(&mut self, bus: &mut (impl SensorBus + ?Sized), now_ms: u64) -> Sample {
        match self.source {
            WaterLevelSource::Fixed => Sample::measured(SensorReading::measured(self.fixed_percent, now_ms)),
            WaterLevelSource::Ultrasonic => {
                let pulse = bus.echo_pulse_us();
                if pulse == 0 {
                    warn!("water_level: {}", SensorError::EchoTimeout);
                    return self.cache.fail(now_ms);
                }
                let raw_cm = pulse_to_distance_cm(pulse);
                let distance = raw_cm.clamp(MIN_DISTANCE_CM, MAX_DISTANCE_CM);
                let percent = distance_to_percent(distance, self.full_cm, self.empty_cm);
                if (raw_cm - distance).abs() > f32::EPSILON {
                    warn!("water_level: {} ({:.1} cm)", SensorError::OutOfRange, raw_cm);
                    self.cache.accept(SensorReading::invalid(percent, now_ms))
                } else {
                    self.cache.accept(SensorReading::measured(percent, now_ms))
                }
            }
        }
    }
}
