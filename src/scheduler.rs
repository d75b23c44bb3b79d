//! Pump duty-cycle scheduler.
//!
//! Two operating modes, selected by `manual_override`:
//!
//! ```text
//!            now - last_cycle >= CYCLE_INTERVAL
//!   AUTO  ┌──────────┐ ─────────────────────────▶ ┌─────────┐
//!         │  idle    │                            │ running │
//!         └──────────┘ ◀───────────────────────── └─────────┘
//!            now - cycle_start >= RUN_DURATION
//!
//!   MANUAL  running set directly by On / Off; no automatic transitions
//! ```
//!
//! The scheduler owns only timer values, checked on every `tick`.  A manual
//! command overwrites state directly; `Auto` resumes from the existing
//! `last_cycle_ms` without resetting the timer.

use serde::Serialize;

use crate::config::SystemConfig;

/// Manual pump commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpCommand {
    On,
    Off,
    /// Return to the automatic duty cycle.
    Auto,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PumpMode {
    Auto,
    Manual,
}

/// A change of the pump's running state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpTransition {
    Started,
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PumpScheduleState {
    pub auto_enabled: bool,
    pub manual_override: bool,
    pub running: bool,
    pub cycle_start_ms: u64,
    pub last_cycle_ms: u64,
}

impl PumpScheduleState {
    pub fn mode(&self) -> PumpMode {
        if self.manual_override || !self.auto_enabled {
            PumpMode::Manual
        } else {
            PumpMode::Auto
        }
    }
}

pub struct PumpScheduler {
    state: PumpScheduleState,
    cycle_interval_ms: u64,
    run_duration_ms: u64,
    manual_disables_auto: bool,
}

impl PumpScheduler {
    /// Boot state: auto enabled, idle, cycle timer starting at `now_ms`.
    pub fn new(config: &SystemConfig, now_ms: u64) -> Self {
        Self::with_timing(
            config.pump_cycle_interval_ms(),
            config.pump_run_duration_ms(),
            config.pump_manual_disables_auto,
            now_ms,
        )
    }

    pub fn with_timing(
        cycle_interval_ms: u64,
        run_duration_ms: u64,
        manual_disables_auto: bool,
        now_ms: u64,
    ) -> Self {
        Self {
            state: PumpScheduleState {
                auto_enabled: true,
                manual_override: false,
                running: false,
                cycle_start_ms: now_ms,
                last_cycle_ms: now_ms,
            },
            cycle_interval_ms,
            run_duration_ms,
            manual_disables_auto,
        }
    }

    pub fn state(&self) -> PumpScheduleState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state.running
    }

    /// Evaluate the automatic duty cycle. No-op in manual mode.
    pub fn tick(&mut self, now_ms: u64) -> Option<PumpTransition> {
        if self.state.mode() == PumpMode::Manual {
            return None;
        }
        let s = &mut self.state;
        if s.running {
            if now_ms.saturating_sub(s.cycle_start_ms) >= self.run_duration_ms {
                s.running = false;
                return Some(PumpTransition::Stopped);
            }
        } else if now_ms.saturating_sub(s.last_cycle_ms) >= self.cycle_interval_ms {
            s.running = true;
            s.cycle_start_ms = now_ms;
            s.last_cycle_ms = now_ms;
            return Some(PumpTransition::Started);
        }
        None
    }

    /// Apply a manual command. Flags are recorded even when the running
    /// state does not change.
    ///
    /// A manual `On` leaves `cycle_start_ms` alone, so `Auto` after a long
    /// manual run stops the pump on the next `tick`.
    pub fn command(&mut self, cmd: PumpCommand) -> Option<PumpTransition> {
        let was_running = self.state.running;
        match cmd {
            PumpCommand::On | PumpCommand::Off => {
                self.state.manual_override = true;
                if self.manual_disables_auto {
                    self.state.auto_enabled = false;
                }
                self.state.running = cmd == PumpCommand::On;
            }
            PumpCommand::Auto => {
                self.state.manual_override = false;
                self.state.auto_enabled = true;
            }
        }
        match (was_running, self.state.running) {
            (false, true) => Some(PumpTransition::Started),
            (true, false) => Some(PumpTransition::Stopped),
            _ => None,
        }
    }
}
