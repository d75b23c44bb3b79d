//! HydroBrain Firmware: Main Entry Point
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  HardwareAdapter   LogEventSink   NvsAdapter   MonotonicClock  │
//! │  (Sensor+Actuator) (EventSink)    (Config+NVS) (Clock)         │
//! │  WifiAdapter       LogDisplay     HTTP server                  │
//! │  (Connectivity)    (Display)      (routes → RemoteCommander)   │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │              AppService (pure logic)                   │    │
//! │  │  Sensors · Profiles · PumpScheduler · LED mode         │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use anyhow::Result;
use esp_idf_hal::delay::FreeRtos;
use esp_idf_hal::prelude::Peripherals;
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use esp_idf_svc::wifi::EspWifi;
use log::{error, info, warn};

use hydrobrain::adapters::display::LogDisplay;
use hydrobrain::adapters::hardware::HardwareAdapter;
use hydrobrain::adapters::log_sink::LogEventSink;
use hydrobrain::adapters::nvs::{NvsAdapter, BUILD_WIFI_PASS, BUILD_WIFI_SSID};
use hydrobrain::adapters::time::MonotonicClock;
use hydrobrain::adapters::wifi::{ConnectivityPort, WifiAdapter};
use hydrobrain::app::commands::{command_channel, COMMAND_QUEUE_DEPTH, COMMAND_REPLY_TIMEOUT};
use hydrobrain::app::ports::{Clock, ConfigPort, DisplayPort};
use hydrobrain::app::service::AppService;
use hydrobrain::config::SystemConfig;
use hydrobrain::drivers::led_strip::LedStrip;
use hydrobrain::drivers::pump::PumpDriver;
use hydrobrain::drivers::sensor_bus::EspSensorBus;
use hydrobrain::drivers::watchdog::Watchdog;
use hydrobrain::drivers::ws2812::Ws2812Rmt;
use hydrobrain::profiles::ProfileRegistry;
use hydrobrain::sensors::SensorHub;

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  HydroBrain v{}                   ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    // ── 2. Peripherals ────────────────────────────────────────
    if let Err(e) = hydrobrain::drivers::hw_init::init_peripherals() {
        // The watchdog resets the board once it stops being fed.
        error!("HAL init failed: {}, halting", e);
        #[allow(clippy::empty_loop)]
        loop {}
    }
    let mut watchdog = Watchdog::new();

    // ── 3. Config from NVS (or defaults) ──────────────────────
    let mut nvs = match NvsAdapter::new() {
        Ok(n) => n,
        Err(e) => {
            warn!("NVS init failed ({}), running with defaults and no persistence", e);
            NvsAdapter::default()
        }
    };
    let config = match nvs.load() {
        Ok(cfg) => {
            info!("Config loaded from NVS");
            cfg
        }
        Err(e) => {
            warn!("NVS config load failed ({}), using defaults", e);
            SystemConfig::default()
        }
    };

    // ── 4. Adapters ───────────────────────────────────────────
    let peripherals = Peripherals::take()?;
    let sysloop = EspSystemEventLoop::take()?;
    let nvs_partition = EspDefaultNvsPartition::take()?;

    let strip = LedStrip::new(
        Ws2812Rmt::new(peripherals.rmt.channel0, peripherals.pins.gpio19)?,
        &config,
    );
    let mut hw = HardwareAdapter::new(
        SensorHub::new(EspSensorBus::new(), FreeRtos, &config),
        PumpDriver::new(),
        strip,
    );
    let clock = MonotonicClock::new();
    let mut sink = LogEventSink::new();
    let mut display = LogDisplay::new();

    // ── 5. App service ────────────────────────────────────────
    let registry = ProfileRegistry::with_catalog(&config.default_profile);
    let mut app = AppService::new(config.clone(), registry, clock.now_ms());
    if let Err(e) = app.restore_profiles(&nvs) {
        warn!("Stored profiles unreadable ({}), using catalogue", e);
    }
    app.start(clock.now_ms(), &mut hw, &mut sink);

    // ── 6. Network ────────────────────────────────────────────
    let mut wifi = WifiAdapter::new(&config);
    wifi.attach_driver(EspWifi::new(peripherals.modem, sysloop, Some(nvs_partition))?);
    if let Err(e) = nvs.provision_wifi_credentials(BUILD_WIFI_SSID, BUILD_WIFI_PASS) {
        warn!("WiFi: could not store build-time credentials ({:?})", e);
    }
    match nvs.load_wifi_credentials() {
        Some((ssid, password)) => {
            if let Err(e) = wifi
                .set_credentials(&ssid, &password)
                .and_then(|()| wifi.connect(clock.now_ms()))
            {
                warn!("WiFi: not starting ({})", e);
            }
        }
        None => warn!("WiFi: no credentials (build with WIFI_SSID/WIFI_PASS), HTTP API unreachable"),
    }

    let (commander, inbox) = command_channel(COMMAND_QUEUE_DEPTH, COMMAND_REPLY_TIMEOUT);
    let _server = hydrobrain::http::server::start_server(app.snapshot_handle(), commander)?;

    info!("System ready. Entering control loop.");

    // ── 7. Control loop ───────────────────────────────────────
    loop {
        let now_ms = clock.now_ms();

        let handled = inbox.drain(|cmd| app.handle_command(cmd, now_ms, &mut hw, &mut sink));
        let report = app.tick(now_ms, &mut hw, &mut sink);
        app.emit_telemetry_if_due(now_ms, &mut sink);

        if report.sensors_refreshed || handled > 0 {
            display.render(&app.snapshot());
        }

        app.save_profiles_if_dirty(&mut nvs);
        wifi.poll(now_ms);
        watchdog.feed();

        FreeRtos::delay_ms(config.loop_interval_ms);
    }
}
