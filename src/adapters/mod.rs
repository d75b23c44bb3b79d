//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter    | Implements         | Connects to                 |
//! |------------|--------------------|-----------------------------|
//! | `display`  | DisplayPort        | Status screen (log output)  |
//! | `hardware` | SensorPort         | ESP32 ADC, DHT22, HC-SR04   |
//! |            | ActuatorPort       | Pump relay, WS2812 strip    |
//! | `log_sink` | EventSink          | Serial log output           |
//! | `nvs`      | ConfigPort         | NVS / in-memory store       |
//! |            | StoragePort        |                             |
//! | `time`     | Clock              | ESP32 system timer          |
//! | `wifi`     | ConnectivityPort   | ESP-IDF WiFi STA            |

pub mod display;
pub mod hardware;
pub mod log_sink;
pub mod nvs;
pub mod time;
pub mod wifi;
