//! Published system state.
//!
//! The control loop is the only writer. Each pass builds a complete
//! [`SystemStateSnapshot`] and swaps it into the [`SnapshotHandle`]; HTTP
//! handlers on other tasks `load()` an `Arc` to the latest one and never
//! observe a half-updated tick.

use std::sync::{Arc, RwLock};

use serde::Serialize;

use crate::drivers::led_strip::LedMode;
use crate::profiles::StatusMap;
use crate::scheduler::PumpScheduleState;
use crate::sensors::SensorSnapshot;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemStateSnapshot {
    pub tick: u64,
    pub taken_at_ms: u64,
    pub sensors: SensorSnapshot,
    pub profile: String,
    /// Every registered profile, sorted.
    pub profile_names: Vec<String>,
    pub statuses: StatusMap,
    pub pump: PumpScheduleState,
    pub led_mode: LedMode,
    pub led_on: bool,
}

#[derive(Debug, Clone)]
pub struct SnapshotHandle {
    inner: Arc<RwLock<Arc<SystemStateSnapshot>>>,
}

impl SnapshotHandle {
    pub fn new(initial: SystemStateSnapshot) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Arc::new(initial))),
        }
    }

    pub fn publish(&self, snapshot: SystemStateSnapshot) {
        let next = Arc::new(snapshot);
        // A panicked reader cannot leave the Arc half-written.
        let mut slot = self.inner.write().unwrap_or_else(|e| e.into_inner());
        *slot = next;
    }

    pub fn load(&self) -> Arc<SystemStateSnapshot> {
        let slot = self.inner.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&slot)
    }
}
