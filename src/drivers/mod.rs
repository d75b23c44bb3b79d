//! Actuator drivers, hardware initialisation, and peripheral helpers.

pub mod hw_init;
pub mod led_strip;
pub mod pump;
pub mod sensor_bus;
pub mod watchdog;
#[cfg(target_os = "espidf")]
pub mod ws2812;
