//! Sensor reading value types and the last-known-good fallback policy.
//!
//! A [`SensorReading`] is stamped once and never mutated; every acquisition
//! produces new readings.  When a sensor fails, its [`LastKnownGood`] cache
//! decides, through [`resolve_fallback`], whether the previous reading is
//! still usable or whether the fixed default must be reported instead.

use core::fmt;

use serde::Serialize;

/// Every physical quantity the controller measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Metric {
    AirTemp,
    Humidity,
    WaterTemp,
    Tds,
    Ec,
    Ph,
    WaterLevel,
}

impl Metric {
    pub const ALL: [Metric; 7] = [
        Metric::AirTemp,
        Metric::Humidity,
        Metric::WaterTemp,
        Metric::Tds,
        Metric::Ec,
        Metric::Ph,
        Metric::WaterLevel,
    ];

    /// JSON / log key.
    pub const fn key(self) -> &'static str {
        match self {
            Self::AirTemp => "airTemp",
            Self::Humidity => "humidity",
            Self::WaterTemp => "waterTemp",
            Self::Tds => "tds",
            Self::Ec => "ec",
            Self::Ph => "ph",
            Self::WaterLevel => "waterLevel",
        }
    }

    pub const fn unit(self) -> &'static str {
        match self {
            Self::AirTemp | Self::WaterTemp => "\u{00b0}C",
            Self::Humidity | Self::WaterLevel => "%",
            Self::Tds => "ppm",
            Self::Ec => "uS/cm",
            Self::Ph => "",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

// ───────────────────────────────────────────────────────────────
// SensorReading
// ───────────────────────────────────────────────────────────────

/// One scalar measurement, immutable once stamped.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SensorReading {
    value: f32,
    timestamp_ms: u64,
    valid: bool,
}

impl SensorReading {
    /// A reading that came straight from a working sensor.
    pub const fn measured(value: f32, timestamp_ms: u64) -> Self {
        Self {
            value,
            timestamp_ms,
            valid: true,
        }
    }

    /// A substituted or clamped value; `valid` is false.
    pub const fn invalid(value: f32, timestamp_ms: u64) -> Self {
        Self {
            value,
            timestamp_ms,
            valid: false,
        }
    }

    pub const fn value(&self) -> f32 {
        self.value
    }

    pub const fn timestamp_ms(&self) -> u64 {
        self.timestamp_ms
    }

    pub const fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn age_ms(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.timestamp_ms)
    }
}

/// How a reading reached the snapshot this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ReadingSource {
    Measured,
    LastKnownGood,
    Default,
}

/// A reading tagged with its provenance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Sample {
    pub reading: SensorReading,
    pub source: ReadingSource,
}

impl Sample {
    pub const fn measured(reading: SensorReading) -> Self {
        Self {
            reading,
            source: ReadingSource::Measured,
        }
    }

    pub const fn value(&self) -> f32 {
        self.reading.value()
    }

    /// True when the value is not a fresh, in-range measurement.
    pub fn is_degraded(&self) -> bool {
        self.source != ReadingSource::Measured || !self.reading.is_valid()
    }
}

// ───────────────────────────────────────────────────────────────
// Fallback policy
// ───────────────────────────────────────────────────────────────

/// Outcome of [`resolve_fallback`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackDecision {
    /// Reuse the last-known-good reading unchanged.
    Hold,
    /// Report the fixed default.
    Default,
}

/// Decide what to report after a failed read.
///
/// The last-known-good reading is held while its age is within
/// `timeout_ms` (inclusive). A sensor that never produced a good reading,
/// or whose last good reading is older than the window, yields the default.
pub fn resolve_fallback(
    last_good: Option<&SensorReading>,
    now_ms: u64,
    timeout_ms: u64,
) -> FallbackDecision {
    match last_good {
        Some(r) if r.age_ms(now_ms) <= timeout_ms => FallbackDecision::Hold,
        _ => FallbackDecision::Default,
    }
}

/// Per-metric last-known-good cache.
#[derive(Debug, Clone)]
pub struct LastKnownGood {
    last: Option<SensorReading>,
    timeout_ms: u64,
    default: f32,
}

impl LastKnownGood {
    pub fn new(default: f32, timeout_ms: u64) -> Self {
        Self {
            last: None,
            timeout_ms,
            default,
        }
    }

    /// Record a fresh reading. Only valid readings replace the cache.
    pub fn accept(&mut self, reading: SensorReading) -> Sample {
        if reading.is_valid() {
            self.last = Some(reading);
        }
        Sample::measured(reading)
    }

    /// The sensor failed this tick.
    pub fn fail(&self, now_ms: u64) -> Sample {
        match (resolve_fallback(self.last.as_ref(), now_ms, self.timeout_ms), self.last) {
            (FallbackDecision::Hold, Some(last)) => Sample {
                reading: last,
                source: ReadingSource::LastKnownGood,
            },
            _ => self.default_sample(now_ms),
        }
    }

    /// `Some` → fresh measurement, `None` → failure.
    pub fn resolve(&mut self, measured: Option<f32>, now_ms: u64) -> Sample {
        match measured {
            Some(v) => self.accept(SensorReading::measured(v, now_ms)),
            None => self.fail(now_ms),
        }
    }

    pub fn default_sample(&self, now_ms: u64) -> Sample {
        Sample {
            reading: SensorReading::invalid(self.default, now_ms),
            source: ReadingSource::Default,
        }
    }

    pub fn last_good(&self) -> Option<&SensorReading> {
        self.last.as_ref()
    }

    /// Distinguishes "never read" from "transient failure".
    pub fn has_ever_read(&self) -> bool {
        self.last.is_some()
    }
}

// ───────────────────────────────────────────────────────────────
// SensorSnapshot
// ───────────────────────────────────────────────────────────────

/// One sample per metric, produced by a single acquisition pass.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SensorSnapshot {
    pub taken_at_ms: u64,
    pub air_temp: Sample,
    pub humidity: Sample,
    pub water_temp: Sample,
    pub tds: Sample,
    pub ec: Sample,
    pub ph: Sample,
    pub water_level: Sample,
}

impl SensorSnapshot {
    pub fn get(&self, metric: Metric) -> &Sample {
        match metric {
            Metric::AirTemp => &self.air_temp,
            Metric::Humidity => &self.humidity,
            Metric::WaterTemp => &self.water_temp,
            Metric::Tds => &self.tds,
            Metric::Ec => &self.ec,
            Metric::Ph => &self.ph,
            Metric::WaterLevel => &self.water_level,
        }
    }

    pub fn value(&self, metric: Metric) -> f32 {
        self.get(metric).value()
    }

    /// Metrics whose value is not a fresh valid measurement.
    pub fn degraded(&self) -> impl Iterator<Item = Metric> + '_ {
        Metric::ALL
            .into_iter()
            .filter(|m| self.get(*m).is_degraded())
    }
}
