//! Status screen adapter.
//!
//! [`render_lines`] lays the snapshot out as the fixed rows of the status
//! screen; [`LogDisplay`] is the [`DisplayPort`] used when no panel is
//! fitted and writes a changed screen to the log at debug level.

use log::debug;

use crate::app::ports::DisplayPort;
use crate::profiles::ProfileMetric;
use crate::state::SystemStateSnapshot;

/// Width of one screen row in characters.
pub const LINE_WIDTH: usize = 21;

fn fit(mut line: String) -> String {
    line.truncate(LINE_WIDTH);
    line
}

/// Screen rows: header, one row per profiled metric, level, actuators.
pub fn render_lines(state: &SystemStateSnapshot) -> Vec<String> {
    let mut lines = Vec::with_capacity(ProfileMetric::ALL.len() + 3);
    let header = if state.statuses.all_optimal() { "OK" } else { "CHECK" };
    lines.push(fit(format!("{} [{}]", state.profile, header)));

    for m in ProfileMetric::ALL {
        let metric = m.metric();
        let sample = state.sensors.get(metric);
        let flag = if sample.is_degraded() { "*" } else { "" };
        lines.push(fit(format!(
            "{:<6}{:>7.1}{} {}",
            metric.key(),
            sample.reading.value(),
            flag,
            state.statuses.get(m).label()
        )));
    }

    lines.push(fit(format!("level {:.0}%", state.sensors.water_level.reading.value())));
    lines.push(fit(format!(
        "pump {} led {}",
        if state.pump.running { "ON" } else { "OFF" },
        state.led_mode.name()
    )));
    lines
}

#[derive(Debug, Default)]
pub struct LogDisplay {
    last: Vec<String>,
    renders: u32,
}

impl LogDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> &[String] {
        &self.last
    }

    /// Screens that differed from the previous one.
    pub fn renders(&self) -> u32 {
        self.renders
    }
}

impl DisplayPort for LogDisplay {
    fn render(&mut self, state: &SystemStateSnapshot) {
        let lines = render_lines(state);
        if lines == self.last {
            return;
        }
        for line in &lines {
            debug!("DISPLAY | {}", line);
        }
        self.last = lines;
        self.renders = self.renders.wrapping_add(1);
    }
}
