//! Outbound application events.
//!
//! The [`AppService`](super::service::AppService) emits these through the
//! [`EventSink`](super::ports::EventSink) port. Adapters on the other side
//! decide what to do with them (serial log, display, future MQTT).

use crate::drivers::led_strip::LedMode;
use crate::profiles::StatusMap;
use crate::scheduler::PumpMode;
use crate::sensors::{Metric, ReadingSource};

/// Structured events emitted by the application core.
#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    /// The service has started with this profile active.
    Started { profile: String },

    /// Periodic telemetry snapshot.
    Telemetry(TelemetryData),

    /// The pump relay changed state.
    PumpChanged { running: bool, mode: PumpMode },

    LedModeChanged(LedMode),

    /// A different plant profile became active.
    ProfileChanged { from: String, to: String },

    /// A custom profile was stored; `replaced` when it overwrote one.
    ProfileAdded { name: String, replaced: bool },

    /// A metric is being served from fallback instead of a fresh reading.
    SensorDegraded { metric: Metric, source: ReadingSource, value: f32 },
}

/// A point-in-time telemetry snapshot suitable for logging.
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryData {
    pub tick: u64,
    pub profile: String,
    pub air_temp_c: f32,
    pub humidity_percent: f32,
    pub water_temp_c: f32,
    pub tds_ppm: f32,
    pub ec_us_cm: f32,
    pub ph: f32,
    pub water_level_percent: f32,
    pub pump_on: bool,
    pub pump_mode: PumpMode,
    pub led_mode: LedMode,
    pub statuses: StatusMap,
}
