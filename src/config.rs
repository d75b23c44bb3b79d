//! System configuration parameters
//!
//! All tunable parameters for the HydroBrain controller: timing, pump
//! schedule, sensor calibration and which physical sensors are fitted.
//! Values can be overridden via NVS (non-volatile storage).

use serde::{Deserialize, Serialize};

/// How water temperature is obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WaterTempSource {
    /// Analog module with a linear voltage → °C transfer.
    LinearAdc,
    /// NTC thermistor in a voltage divider.
    Thermistor,
    /// Digital probe reporting °C directly.
    Probe,
}

/// How EC is obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EcSource {
    /// Derived from TDS by a fixed ppm → µS/cm factor.
    FromTds,
    /// Measured on its own channel and reconciled against a two-point curve.
    Independent,
}

/// How water level is obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WaterLevelSource {
    /// Constant percentage (level sensor not fitted).
    Fixed,
    /// HC-SR04 distance to the water surface.
    Ultrasonic,
}

/// TDS voltage → ppm transfer curve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TdsCurve {
    Linear,
    Polynomial,
}

/// Probe calibration constants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Calibration {
    /// Full-scale ADC count (12-bit).
    pub adc_max: f32,
    /// ADC reference voltage.
    pub vref: f32,

    // --- TDS / EC ---
    pub tds_curve: TdsCurve,
    /// Volts → ppm/1000 slope of the linear curve.
    pub tds_linear_coefficient: f32,
    /// Probe K factor applied after either curve.
    pub tds_calibration_factor: f32,
    /// µS/cm per ppm (500-scale meters use 2.0).
    pub ec_per_ppm: f32,
    /// Cell constant of a dedicated EC probe.
    pub ec_k_value: f32,
    /// Below this voltage the EC probe is considered dry.
    pub ec_min_voltage: f32,
    /// Probe estimates below `voltage * this` are treated as implausible.
    pub ec_plausible_us_per_volt: f32,
    /// Voltage measured in the calibration solution.
    pub ec_cal_voltage: f32,
    /// Conductivity of the calibration solution (µS/cm).
    pub ec_cal_conductivity_us: f32,

    // --- pH ---
    /// Probe voltage in pH 4.00 buffer.
    pub ph4_voltage: f32,
    /// Probe voltage in pH 7.00 buffer.
    pub ph7_voltage: f32,

    // --- Water temperature ---
    /// °C per full-scale volt span of the linear module.
    pub water_temp_span_c: f32,
    /// °C at 0 V for the linear module.
    pub water_temp_offset_c: f32,
    /// Thermistor resistance at 25 °C (Ω).
    pub thermistor_r25: f32,
    /// Thermistor Beta coefficient.
    pub thermistor_beta: f32,
    /// Fixed divider resistor (Ω).
    pub thermistor_divider: f32,
}

impl Default for Calibration {
    fn default() -> Self {
        Self {
            adc_max: 4095.0,
            vref: 3.3,

            tds_curve: TdsCurve::Linear,
            tds_linear_coefficient: 0.64,
            tds_calibration_factor: 0.5,
            ec_per_ppm: 2.0,
            ec_k_value: 1.0,
            ec_min_voltage: 0.05,
            ec_plausible_us_per_volt: 100.0,
            ec_cal_voltage: 1.5,
            ec_cal_conductivity_us: 1413.0,

            ph4_voltage: 3.1,
            ph7_voltage: 2.5,

            water_temp_span_c: 100.0,
            water_temp_offset_c: 0.0,
            thermistor_r25: 10_000.0,
            thermistor_beta: 3950.0,
            thermistor_divider: 10_000.0,
        }
    }
}

/// Core system configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemConfig {
    // --- Timing ---
    /// Sensor acquisition interval (milliseconds)
    pub sensor_interval_ms: u32,
    /// Main loop pass period (milliseconds)
    pub loop_interval_ms: u32,
    /// Telemetry log interval (milliseconds)
    pub telemetry_interval_ms: u32,

    // --- Pump schedule ---
    /// Time between automatic pump cycles (seconds)
    pub pump_cycle_interval_secs: u32,
    /// Length of each automatic run (seconds)
    pub pump_run_duration_secs: u32,
    /// Manual on/off also clears `auto_enabled`
    pub pump_manual_disables_auto: bool,

    // --- Climate sensor fallback ---
    /// How long a last-known-good reading stays usable (milliseconds)
    pub climate_timeout_ms: u32,
    pub default_humidity_percent: f32,
    pub default_air_temp_c: f32,
    /// Fallback window for the analog metrics (milliseconds)
    pub analog_timeout_ms: u32,

    // --- Sampling ---
    pub tds_samples: u8,
    pub ph_samples: u8,
    pub ec_samples: u8,
    /// Delay between consecutive ADC samples (milliseconds)
    pub sample_interval_ms: u8,

    // --- Sources ---
    pub water_temp_source: WaterTempSource,
    pub ec_source: EcSource,
    pub water_level_source: WaterLevelSource,
    /// Reported level when `water_level_source` is `Fixed` (0-100%)
    pub fixed_water_level_percent: f32,
    /// Sensor-to-surface distance of a full tank (cm)
    pub tank_full_distance_cm: f32,
    /// Sensor-to-surface distance of an empty tank (cm)
    pub tank_empty_distance_cm: f32,

    pub calibration: Calibration,

    // --- Grow light ---
    pub led_count: u16,
    /// Global strip brightness (0-255)
    pub led_brightness: u8,

    // --- Profiles ---
    /// Profile activated on first boot
    pub default_profile: String,

    // --- WiFi ---
    /// Link check interval (milliseconds)
    pub wifi_check_interval_ms: u32,
    /// Reconnect attempts before a cooldown
    pub wifi_max_attempts: u8,
    /// Pause after exhausting the attempt budget (milliseconds)
    pub wifi_cooldown_ms: u32,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            // Timing
            sensor_interval_ms: 30_000,    // 1 / 30 s
            loop_interval_ms: 100,         // 10 Hz
            telemetry_interval_ms: 60_000, // 1 / min

            // Pump schedule
            pump_cycle_interval_secs: 3600, // hourly
            pump_run_duration_secs: 900,    // 15 min
            pump_manual_disables_auto: true,

            // Climate
            climate_timeout_ms: 10_000,
            default_humidity_percent: 33.1,
            default_air_temp_c: 22.1,
            analog_timeout_ms: 120_000,

            // Sampling
            tds_samples: 30,
            ph_samples: 20,
            ec_samples: 20,
            sample_interval_ms: 10,

            // Sources
            water_temp_source: WaterTempSource::LinearAdc,
            ec_source: EcSource::FromTds,
            water_level_source: WaterLevelSource::Fixed,
            fixed_water_level_percent: 67.0,
            tank_full_distance_cm: 5.0,
            tank_empty_distance_cm: 40.0,

            calibration: Calibration::default(),

            // Grow light
            led_count: 90,
            led_brightness: 200,

            default_profile: String::from("lettuce"),

            // WiFi
            wifi_check_interval_ms: 10_000,
            wifi_max_attempts: 10,
            wifi_cooldown_ms: 60_000,
        }
    }
}

impl SystemConfig {
    pub fn pump_cycle_interval_ms(&self) -> u64 {
        u64::from(self.pump_cycle_interval_secs) * 1000
    }

    pub fn pump_run_duration_ms(&self) -> u64 {
        u64::from(self.pump_run_duration_secs) * 1000
    }

    /// Upper bound on the time one `read_all` spends in inter-sample delays.
    pub fn worst_case_sampling_ms(&self) -> u32 {
        let mut samples = u32::from(self.tds_samples) + u32::from(self.ph_samples);
        if self.ec_source == EcSource::Independent {
            samples += u32::from(self.ec_samples);
        }
        samples * u32::from(self.sample_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_sane() {
        let c = SystemConfig::default();
        assert!(c.pump_run_duration_secs < c.pump_cycle_interval_secs);
        assert!(c.tank_full_distance_cm < c.tank_empty_distance_cm);
        assert!(c.loop_interval_ms > 0);
        assert!(c.sensor_interval_ms > c.loop_interval_ms);
        assert!((c.calibration.ph4_voltage - c.calibration.ph7_voltage).abs() > 0.1);
    }

    #[test]
    fn default_sampling_budget() {
        let c = SystemConfig::default();
        // 30 TDS + 20 pH samples at 10 ms.
        assert_eq!(c.worst_case_sampling_ms(), 500);

        let independent = SystemConfig {
            ec_source: EcSource::Independent,
            ..Default::default()
        };
        assert_eq!(independent.worst_case_sampling_ms(), 700);
    }

    #[test]
    fn pump_times_in_ms() {
        let c = SystemConfig::default();
        assert_eq!(c.pump_cycle_interval_ms(), 3_600_000);
        assert_eq!(c.pump_run_duration_ms(), 900_000);
    }

    #[test]
    fn serde_roundtrip() {
        let c = SystemConfig::default();
        let json = serde_json::to_string(&c).unwrap();
        let c2: SystemConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(c.pump_cycle_interval_secs, c2.pump_cycle_interval_secs);
        assert_eq!(c.water_temp_source, c2.water_temp_source);
        assert_eq!(c.default_profile, c2.default_profile);
    }

    #[test]
    fn postcard_roundtrip() {
        let c = SystemConfig::default();
        let bytes = postcard::to_allocvec(&c).unwrap();
        let c2: SystemConfig = postcard::from_bytes(&bytes).unwrap();
        assert_eq!(c.led_count, c2.led_count);
        assert!((c.calibration.ph7_voltage - c2.calibration.ph7_voltage).abs() < 0.001);
        assert_eq!(c.calibration.tds_curve, c2.calibration.tds_curve);
    }
}
