//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured application events to
//! the ESP-IDF logger (UART in production). Each line starts with a fixed
//! tag so the serial console can be grepped per subsystem.

use log::{info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`AppEvent`] to the serial console.
#[derive(Debug, Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Telemetry(t) => {
                info!(
                    "TELEM | #{} {} | T={:.1}\u{00b0}C RH={:.1}% | Tw={:.1}\u{00b0}C \
                     TDS={:.0}ppm EC={:.0}uS/cm pH={:.2} | level={:.0}% | \
                     pump={} ({:?}) led={} | tds={} ec={} ph={}",
                    t.tick,
                    t.profile,
                    t.air_temp_c,
                    t.humidity_percent,
                    t.water_temp_c,
                    t.tds_ppm,
                    t.ec_us_cm,
                    t.ph,
                    t.water_level_percent,
                    if t.pump_on { "ON" } else { "OFF" },
                    t.pump_mode,
                    t.led_mode.name(),
                    t.statuses.tds.label(),
                    t.statuses.ec.label(),
                    t.statuses.ph.label(),
                );
            }
            AppEvent::PumpChanged { running, mode } => {
                info!("PUMP | {} ({:?})", if *running { "started" } else { "stopped" }, mode);
            }
            AppEvent::LedModeChanged(mode) => {
                info!("LED | mode={} ({})", mode.index(), mode.name());
            }
            AppEvent::ProfileChanged { from, to } => {
                info!("PROFILE | {} -> {}", from, to);
            }
            AppEvent::ProfileAdded { name, replaced } => {
                info!("PROFILE | {} '{}'", if *replaced { "replaced" } else { "added" }, name);
            }
            AppEvent::SensorDegraded { metric, source, value } => {
                warn!("SENSOR | {} degraded ({:?}), reporting {:.2}{}", metric.key(), source, value, metric.unit());
            }
            AppEvent::Started { profile } => {
                info!("START | profile={}", profile);
            }
        }
    }
}
