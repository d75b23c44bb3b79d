//! HTTP API.
//!
//! [`routes`] maps requests to snapshot reads and control-loop commands;
//! [`server`] binds it to the ESP-IDF HTTP server on the device.

pub mod routes;
#[cfg(target_os = "espidf")]
pub mod server;
