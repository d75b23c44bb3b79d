//! Application service, the hexagonal core.
//!
//! [`AppService`] owns the profile registry, the pump scheduler and the
//! published state. It exposes a hardware-agnostic API; all I/O flows
//! through port traits injected at call sites, so the whole service is
//! testable with mock adapters.
//!
//! ```text
//!  SensorPort ──▶ ┌──────────────────────────────┐ ──▶ EventSink
//!                 │          AppService          │
//! ActuatorPort ◀──│ Profiles · Pump · LED state  │ ──▶ SnapshotHandle
//!                 └──────────────────────────────┘
//! ```
//!
//! Every `tick` runs in a fixed order: sensors (when due), statuses, pump
//! schedule, relay re-assert, publish.

use std::sync::Arc;

use log::{info, warn};

use crate::config::SystemConfig;
use crate::drivers::led_strip::LedMode;
use crate::error::Result;
use crate::profiles::{evaluate_all, ProfileRegistry, StatusMap, StoredProfiles};
use crate::scheduler::{PumpScheduleState, PumpScheduler, PumpTransition};
use crate::sensors::{Metric, SensorSnapshot};
use crate::state::{SnapshotHandle, SystemStateSnapshot};

use super::commands::{AppCommand, CommandOutcome};
use super::events::{AppEvent, TelemetryData};
use super::ports::{ActuatorPort, EventSink, SensorPort, StorageError, StoragePort};

/// NVS namespace and key for custom profiles.
pub const PROFILES_NAMESPACE: &str = "hydrobrain";
pub const PROFILES_KEY: &str = "profiles";
/// Largest encoded profile blob accepted in either direction.
pub const MAX_PROFILES_BLOB: usize = 4096;

/// What a single `tick` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TickReport {
    /// Sensors were read this pass (the display should refresh).
    pub sensors_refreshed: bool,
    pub pump: Option<PumpTransition>,
}

// ───────────────────────────────────────────────────────────────
// AppService
// ───────────────────────────────────────────────────────────────

pub struct AppService {
    config: SystemConfig,
    registry: ProfileRegistry,
    scheduler: PumpScheduler,
    sensors: SensorSnapshot,
    statuses: StatusMap,
    led_mode: LedMode,
    degraded: Vec<Metric>,
    last_sensor_read_ms: Option<u64>,
    last_telemetry_ms: Option<u64>,
    tick_count: u64,
    profiles_dirty: bool,
    handle: SnapshotHandle,
}

impl AppService {
    /// Construct the service. Sensors hold their fallback values until the
    /// first `tick`; call [`start`](Self::start) next.
    pub fn new(config: SystemConfig, registry: ProfileRegistry, now_ms: u64) -> Self {
        let scheduler = PumpScheduler::new(&config, now_ms);
        let sensors = SensorSnapshot::boot(&config, now_ms);
        let statuses = evaluate_all(&sensors, registry.active());
        let handle = SnapshotHandle::new(SystemStateSnapshot {
            tick: 0,
            taken_at_ms: now_ms,
            sensors,
            profile: registry.active_name().to_owned(),
            profile_names: registry.names().map(str::to_owned).collect(),
            statuses,
            pump: scheduler.state(),
            led_mode: LedMode::Off,
            led_on: false,
        });
        Self {
            config,
            registry,
            scheduler,
            sensors,
            statuses,
            led_mode: LedMode::Off,
            degraded: Vec::new(),
            last_sensor_read_ms: None,
            last_telemetry_ms: None,
            tick_count: 0,
            profiles_dirty: false,
            handle,
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Drive every actuator to its boot state and publish.
    pub fn start(&mut self, now_ms: u64, hw: &mut impl ActuatorPort, sink: &mut impl EventSink) {
        if let Err(e) = hw.all_off() {
            warn!("AppService: boot actuator reset failed: {}", e);
        }
        self.led_mode = LedMode::Off;
        self.publish(now_ms);
        sink.emit(&AppEvent::Started {
            profile: self.registry.active_name().to_owned(),
        });
        info!("AppService started (profile '{}')", self.registry.active_name());
    }

    // ── Per-tick orchestration ────────────────────────────────

    /// Run one control pass.
    ///
    /// `hw` satisfies both [`SensorPort`] and [`ActuatorPort`]; this avoids
    /// a double mutable borrow while keeping the port boundary explicit.
    pub fn tick(
        &mut self,
        now_ms: u64,
        hw: &mut (impl SensorPort + ActuatorPort),
        sink: &mut impl EventSink,
    ) -> TickReport {
        self.tick_count += 1;
        let mut report = TickReport::default();

        // 1. Sensors, when due
        let interval = u64::from(self.config.sensor_interval_ms);
        let due = self
            .last_sensor_read_ms
            .is_none_or(|t| now_ms.saturating_sub(t) >= interval);
        if due {
            self.sensors = hw.read_all(now_ms);
            self.last_sensor_read_ms = Some(now_ms);
            report.sensors_refreshed = true;
            self.report_degraded(sink);

            // 2. Statuses against the active profile
            self.statuses = evaluate_all(&self.sensors, self.registry.active());
        }

        // 3. Pump schedule
        report.pump = self.scheduler.tick(now_ms);
        if let Some(t) = report.pump {
            self.emit_pump(t, sink);
        }

        // 4. Relay follows the scheduler every pass
        if let Err(e) = hw.set_pump(self.scheduler.is_running()) {
            warn!("AppService: pump relay: {}", e);
        }

        // 5. Publish
        self.publish(now_ms);
        report
    }

    // ── Command handling ──────────────────────────────────────

    /// Apply an external command and republish.
    pub fn handle_command(
        &mut self,
        cmd: AppCommand,
        now_ms: u64,
        hw: &mut impl ActuatorPort,
        sink: &mut impl EventSink,
    ) -> Result<CommandOutcome> {
        let outcome = match cmd {
            AppCommand::CycleLed => {
                let next = self.led_mode.next();
                self.apply_led(next, hw, sink)?;
                Ok(CommandOutcome::Led(next))
            }
            AppCommand::SetLedMode(mode) => {
                self.apply_led(mode, hw, sink)?;
                Ok(CommandOutcome::Led(mode))
            }
            AppCommand::SetPump(pump_cmd) => {
                let transition = self.scheduler.command(pump_cmd);
                info!("AppService: pump command {:?}", pump_cmd);
                hw.set_pump(self.scheduler.is_running())?;
                if let Some(t) = transition {
                    self.emit_pump(t, sink);
                }
                Ok(CommandOutcome::Pump(self.scheduler.state()))
            }
            AppCommand::SetActiveProfile(name) => {
                let from = self.registry.active_name().to_owned();
                let to = self.registry.set_active(&name)?.name.clone();
                self.statuses = evaluate_all(&self.sensors, self.registry.active());
                if from != to {
                    self.profiles_dirty = true;
                    sink.emit(&AppEvent::ProfileChanged {
                        from,
                        to: to.clone(),
                    });
                }
                Ok(CommandOutcome::ProfileActivated(to))
            }
            AppCommand::AddProfile(profile) => {
                let insert = self.registry.add_profile(profile)?;
                let name = insert.name;
                let replaced = insert.replaced.is_some();
                if name == self.registry.active_name() {
                    self.statuses = evaluate_all(&self.sensors, self.registry.active());
                }
                self.profiles_dirty = true;
                sink.emit(&AppEvent::ProfileAdded {
                    name: name.clone(),
                    replaced,
                });
                Ok(CommandOutcome::ProfileAdded { name, replaced })
            }
        };
        self.publish(now_ms);
        outcome
    }

    /// Emit a telemetry event when `telemetry_interval_ms` has elapsed.
    pub fn emit_telemetry_if_due(&mut self, now_ms: u64, sink: &mut impl EventSink) -> bool {
        let interval = u64::from(self.config.telemetry_interval_ms);
        if self
            .last_telemetry_ms
            .is_some_and(|t| now_ms.saturating_sub(t) < interval)
        {
            return false;
        }
        self.last_telemetry_ms = Some(now_ms);
        sink.emit(&AppEvent::Telemetry(self.build_telemetry()));
        true
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn build_telemetry(&self) -> TelemetryData {
        let s = &self.sensors;
        TelemetryData {
            tick: self.tick_count,
            profile: self.registry.active_name().to_owned(),
            air_temp_c: s.air_temp.value(),
            humidity_percent: s.humidity.value(),
            water_temp_c: s.water_temp.value(),
            tds_ppm: s.tds.value(),
            ec_us_cm: s.ec.value(),
            ph: s.ph.value(),
            water_level_percent: s.water_level.value(),
            pump_on: self.scheduler.is_running(),
            pump_mode: self.scheduler.state().mode(),
            led_mode: self.led_mode,
            statuses: self.statuses,
        }
    }

    /// Cloneable read handle for other tasks.
    pub fn snapshot_handle(&self) -> SnapshotHandle {
        self.handle.clone()
    }

    pub fn snapshot(&self) -> Arc<SystemStateSnapshot> {
        self.handle.load()
    }

    pub fn profiles(&self) -> &ProfileRegistry {
        &self.registry
    }

    pub fn pump_state(&self) -> PumpScheduleState {
        self.scheduler.state()
    }

    pub fn led_mode(&self) -> LedMode {
        self.led_mode
    }

    pub fn sensors(&self) -> &SensorSnapshot {
        &self.sensors
    }

    pub fn statuses(&self) -> StatusMap {
        self.statuses
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn config(&self) -> &SystemConfig {
        &self.config
    }

    // ── Profile persistence ───────────────────────────────────

    pub fn profiles_dirty(&self) -> bool {
        self.profiles_dirty
    }

    /// Write custom profiles and the active selection if they changed.
    /// Returns `true` if a write happened.
    pub fn save_profiles_if_dirty(&mut self, storage: &mut impl StoragePort) -> bool {
        if !self.profiles_dirty {
            return false;
        }
        let blob = match postcard::to_allocvec(&self.registry.to_stored()) {
            Ok(b) if b.len() <= MAX_PROFILES_BLOB => b,
            Ok(b) => {
                warn!("profiles: {} bytes exceeds {} byte limit, not saved", b.len(), MAX_PROFILES_BLOB);
                self.profiles_dirty = false;
                return false;
            }
            Err(e) => {
                warn!("profiles: encode failed: {}", e);
                return false;
            }
        };
        match storage.write(PROFILES_NAMESPACE, PROFILES_KEY, &blob) {
            Ok(()) => {
                self.profiles_dirty = false;
                info!("profiles: saved ({} bytes)", blob.len());
                true
            }
            Err(e) => {
                warn!("profiles: save failed: {}", e);
                false
            }
        }
    }

    /// Re-apply profiles saved by a previous boot. A missing blob is not an
    /// error.
    pub fn restore_profiles(&mut self, storage: &impl StoragePort) -> core::result::Result<(), StorageError> {
        let mut buf = vec![0u8; MAX_PROFILES_BLOB];
        let len = match storage.read(PROFILES_NAMESPACE, PROFILES_KEY, &mut buf) {
            Ok(n) => n,
            Err(StorageError::NotFound) => return Ok(()),
            Err(e) => return Err(e),
        };
        let stored: StoredProfiles =
            postcard::from_bytes(&buf[..len]).map_err(|_| StorageError::Corrupted)?;
        info!("profiles: restoring {} custom, active '{}'", stored.custom.len(), stored.active);
        self.registry.restore(stored);
        self.statuses = evaluate_all(&self.sensors, self.registry.active());
        Ok(())
    }

    // ── Internal ──────────────────────────────────────────────

    fn apply_led(&mut self, mode: LedMode, hw: &mut impl ActuatorPort, sink: &mut impl EventSink) -> Result<()> {
        hw.set_led_mode(mode)?;
        if mode != self.led_mode {
            self.led_mode = mode;
            sink.emit(&AppEvent::LedModeChanged(mode));
        }
        Ok(())
    }

    fn emit_pump(&self, transition: PumpTransition, sink: &mut impl EventSink) {
        sink.emit(&AppEvent::PumpChanged {
            running: transition == PumpTransition::Started,
            mode: self.scheduler.state().mode(),
        });
    }

    /// One event per metric on entering fallback.
    fn report_degraded(&mut self, sink: &mut impl EventSink) {
        let now_degraded: Vec<Metric> = self.sensors.degraded().collect();
        for m in &now_degraded {
            if !self.degraded.contains(m) {
                let sample = self.sensors.get(*m);
                sink.emit(&AppEvent::SensorDegraded {
                    metric: *m,
                    source: sample.source,
                    value: sample.value(),
                });
            }
        }
        self.degraded = now_degraded;
    }

    fn publish(&self, now_ms: u64) {
        self.handle.publish(SystemStateSnapshot {
            tick: self.tick_count,
            taken_at_ms: now_ms,
            sensors: self.sensors,
            profile: self.registry.active_name().to_owned(),
            profile_names: self.registry.names().map(str::to_owned).collect(),
            statuses: self.statuses,
            pump: self.scheduler.state(),
            led_mode: self.led_mode,
            led_on: self.led_mode.is_lit(),
        });
    }
}
