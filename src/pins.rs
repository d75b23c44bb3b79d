//! GPIO / peripheral pin assignments for the HydroBrain controller board
//! (classic ESP32 DevKit).
//!
//! Single source of truth: every driver references this module rather than
//! hard-coding pin numbers.  Change a pin here and it propagates everywhere.

// ---------------------------------------------------------------------------
// Sensors: analog (ADC1; ADC2 is unusable while WiFi is up)
// ---------------------------------------------------------------------------

/// Gravity TDS probe, analog output. ADC1 channel 7.
pub const TDS_ADC_GPIO: i32 = 35;
/// Analog pH probe board (PH-4502C). ADC1 channel 6.
pub const PH_ADC_GPIO: i32 = 34;
/// Water-temperature input (analog module or thermistor divider). ADC1 channel 4.
pub const WATER_TEMP_ADC_GPIO: i32 = 32;
/// Optional dedicated EC probe. ADC1 channel 0 (SENSOR_VP).
pub const EC_ADC_GPIO: i32 = 36;

// ---------------------------------------------------------------------------
// Sensors: digital / pulse
// ---------------------------------------------------------------------------

/// DHT22 single-wire data line (needs a 10 kΩ pull-up).
pub const DHT_GPIO: i32 = 21;
/// HC-SR04 trigger output.
pub const ULTRASONIC_TRIG_GPIO: i32 = 14;
/// HC-SR04 echo input (level-shifted to 3.3 V).
pub const ULTRASONIC_ECHO_GPIO: i32 = 15;
/// DS18B20 1-Wire data line (needs a 4.7 kΩ pull-up). Used when the water
/// temperature source is the digital probe.
pub const ONEWIRE_GPIO: i32 = 4;

// ---------------------------------------------------------------------------
// Actuators
// ---------------------------------------------------------------------------

/// WS2812B grow-light strip data line (driven by RMT channel 0).
pub const LED_STRIP_GPIO: i32 = 19;
/// Pump relay coil driver. HIGH = pump running.
pub const PUMP_RELAY_GPIO: i32 = 27;
