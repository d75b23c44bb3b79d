//! Mock hardware adapter for integration tests.
//!
//! Sensors come from the simulated bus; every actuator call is recorded so
//! tests can assert on the full command history.

use hydrobrain::app::events::AppEvent;
use hydrobrain::app::ports::{ActuatorPort, EventSink, SensorPort};
use hydrobrain::app::service::AppService;
use hydrobrain::config::SystemConfig;
use hydrobrain::drivers::led_strip::LedMode;
use hydrobrain::error::ActuatorError;
use hydrobrain::profiles::ProfileRegistry;
use hydrobrain::sensors::sim::{CountingDelay, SimSensorBus};
use hydrobrain::sensors::{SensorHub, SensorSnapshot};

// ── Actuator call record ──────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ActuatorCall {
    Pump(bool),
    Led(LedMode),
}

// ── MockHardware ──────────────────────────────────────────────

pub struct MockHardware {
    pub hub: SensorHub<SimSensorBus, CountingDelay>,
    pub calls: Vec<ActuatorCall>,
    pub fail_led: bool,
}

#[allow(dead_code)]
impl MockHardware {
    pub fn new(config: &SystemConfig) -> Self {
        Self {
            hub: SensorHub::new(SimSensorBus::new(), CountingDelay::default(), config),
            calls: Vec::new(),
            fail_led: false,
        }
    }

    pub fn bus(&mut self) -> &mut SimSensorBus {
        self.hub.bus_mut()
    }

    pub fn pump_on(&self) -> bool {
        self.calls
            .iter()
            .rev()
            .find_map(|c| match c {
                ActuatorCall::Pump(on) => Some(*on),
                ActuatorCall::Led(_) => None,
            })
            .unwrap_or(false)
    }

    pub fn led_mode(&self) -> LedMode {
        self.calls
            .iter()
            .rev()
            .find_map(|c| match c {
                ActuatorCall::Led(mode) => Some(*mode),
                ActuatorCall::Pump(_) => None,
            })
            .unwrap_or_default()
    }
}

impl SensorPort for MockHardware {
    fn read_all(&mut self, now_ms: u64) -> SensorSnapshot {
        self.hub.read_all(now_ms)
    }
}

impl ActuatorPort for MockHardware {
    fn set_pump(&mut self, on: bool) -> Result<(), ActuatorError> {
        self.calls.push(ActuatorCall::Pump(on));
        Ok(())
    }

    fn set_led_mode(&mut self, mode: LedMode) -> Result<(), ActuatorError> {
        if self.fail_led {
            return Err(ActuatorError::LedStripWriteFailed);
        }
        self.calls.push(ActuatorCall::Led(mode));
        Ok(())
    }
}

// ── RecordingSink ─────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct RecordingSink {
    pub events: Vec<AppEvent>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn count(&self, pred: impl Fn(&AppEvent) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}

// ── Fixtures ──────────────────────────────────────────────────

/// A started service on the `lettuce` profile at t = 0.
pub fn started(config: SystemConfig) -> (AppService, MockHardware, RecordingSink) {
    let mut hw = MockHardware::new(&config);
    let mut sink = RecordingSink::default();
    let mut app = AppService::new(config, ProfileRegistry::with_catalog("lettuce"), 0);
    app.start(0, &mut hw, &mut sink);
    (app, hw, sink)
}
