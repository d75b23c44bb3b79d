//! Application core: pure domain logic, zero I/O.
//!
//! Business rules for the HydroBrain controller live here: sensor refresh
//! cadence, profile evaluation, the pump duty cycle and LED state. All
//! interaction with hardware happens through **port traits** defined in
//! [`ports`], keeping this layer testable without real peripherals.

pub mod commands;
pub mod events;
pub mod ports;
pub mod service;
