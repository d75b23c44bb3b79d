//! Plant profiles and threshold evaluation.
//!
//! A [`PlantProfile`] holds one inclusive optimal [`Range`] per profiled
//! metric.  [`evaluate`] classifies a value against a range with no
//! hysteresis, so a value sitting on a boundary may flap between statuses
//! from one refresh to the next.
//!
//! The [`ProfileRegistry`] starts with a fixed crop catalogue and accepts
//! user-defined profiles at runtime.  Names are normalised (trimmed,
//! lower-case); inserting an existing name replaces it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::ProfileError;
use crate::sensors::{Metric, SensorSnapshot};

pub const MAX_PROFILE_NAME_LEN: usize = 24;
/// User-defined profiles the registry accepts on top of the catalogue.
/// Worst case, every custom and every edited catalogue profile encodes to
/// about 3.1 KiB of postcard, inside the stored-blob limit.
pub const MAX_CUSTOM_PROFILES: usize = 32;

// ───────────────────────────────────────────────────────────────
// Ranges and status
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Range {
    pub min: f32,
    pub max: f32,
}

impl Range {
    pub const fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, value: f32) -> bool {
        self.min <= value && value <= self.max
    }
}

/// Per-metric classification against the active profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricStatus {
    Optimal,
    /// Below the range.
    Warning,
    /// Above the range.
    Alert,
}

impl MetricStatus {
    /// Dashboard label.
    pub const fn label(self) -> &'static str {
        match self {
            Self::Optimal => "Optimal",
            Self::Warning => "Low",
            Self::Alert => "High",
        }
    }
}

/// Classify `value` against `range`. Non-finite values classify as Alert.
pub fn evaluate(value: f32, range: Range) -> MetricStatus {
    if value < range.min {
        MetricStatus::Warning
    } else if value > range.max {
        MetricStatus::Alert
    } else if range.contains(value) {
        MetricStatus::Optimal
    } else {
        MetricStatus::Alert
    }
}

// ───────────────────────────────────────────────────────────────
// Profiles
// ───────────────────────────────────────────────────────────────

/// The six metrics a profile constrains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ProfileMetric {
    Tds,
    Ec,
    Ph,
    WaterTemp,
    Humidity,
    AirTemp,
}

impl ProfileMetric {
    pub const ALL: [ProfileMetric; 6] = [
        ProfileMetric::Tds,
        ProfileMetric::Ec,
        ProfileMetric::Ph,
        ProfileMetric::WaterTemp,
        ProfileMetric::Humidity,
        ProfileMetric::AirTemp,
    ];

    pub const fn metric(self) -> Metric {
        match self {
            Self::Tds => Metric::Tds,
            Self::Ec => Metric::Ec,
            Self::Ph => Metric::Ph,
            Self::WaterTemp => Metric::WaterTemp,
            Self::Humidity => Metric::Humidity,
            Self::AirTemp => Metric::AirTemp,
        }
    }

    pub const fn key(self) -> &'static str {
        self.metric().key()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlantProfile {
    pub name: String,
    pub tds: Range,
    pub ec: Range,
    pub ph: Range,
    pub water_temp: Range,
    pub humidity: Range,
    pub air_temp: Range,
}

impl PlantProfile {
    pub fn range(&self, metric: ProfileMetric) -> Range {
        match metric {
            ProfileMetric::Tds => self.tds,
            ProfileMetric::Ec => self.ec,
            ProfileMetric::Ph => self.ph,
            ProfileMetric::WaterTemp => self.water_temp,
            ProfileMetric::Humidity => self.humidity,
            ProfileMetric::AirTemp => self.air_temp,
        }
    }

    /// Check every bound; called at the registry boundary.
    pub fn validate(&self) -> Result<(), ProfileError> {
        normalize_name(&self.name)?;
        for m in ProfileMetric::ALL {
            let r = self.range(m);
            if !r.min.is_finite() || !r.max.is_finite() {
                return Err(ProfileError::NonFiniteBound(m));
            }
            if r.min > r.max {
                return Err(ProfileError::InvertedRange(m));
            }
        }
        Ok(())
    }
}

fn normalize_name(name: &str) -> Result<String, ProfileError> {
    let name = name.trim().to_ascii_lowercase();
    let ok = !name.is_empty()
        && name.len() <= MAX_PROFILE_NAME_LEN
        && name
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || matches!(b, b' ' | b'_' | b'-'));
    if ok { Ok(name) } else { Err(ProfileError::InvalidName) }
}

/// Status of each profiled metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusMap {
    pub tds: MetricStatus,
    pub ec: MetricStatus,
    pub ph: MetricStatus,
    pub water_temp: MetricStatus,
    pub humidity: MetricStatus,
    pub air_temp: MetricStatus,
}

impl StatusMap {
    pub fn get(&self, metric: ProfileMetric) -> MetricStatus {
        match metric {
            ProfileMetric::Tds => self.tds,
            ProfileMetric::Ec => self.ec,
            ProfileMetric::Ph => self.ph,
            ProfileMetric::WaterTemp => self.water_temp,
            ProfileMetric::Humidity => self.humidity,
            ProfileMetric::AirTemp => self.air_temp,
        }
    }

    pub fn all_optimal(&self) -> bool {
        ProfileMetric::ALL
            .into_iter()
            .all(|m| self.get(m) == MetricStatus::Optimal)
    }
}

pub fn evaluate_all(snapshot: &SensorSnapshot, profile: &PlantProfile) -> StatusMap {
    let status = |m: ProfileMetric| evaluate(snapshot.value(m.metric()), profile.range(m));
    StatusMap {
        tds: status(ProfileMetric::Tds),
        ec: status(ProfileMetric::Ec),
        ph: status(ProfileMetric::Ph),
        water_temp: status(ProfileMetric::WaterTemp),
        humidity: status(ProfileMetric::Humidity),
        air_temp: status(ProfileMetric::AirTemp),
    }
}

// ───────────────────────────────────────────────────────────────
// Catalogue
// ───────────────────────────────────────────────────────────────

/// (name, tds ppm, ec µS/cm, ph, water °C, humidity %, air °C)
type CatalogEntry = (&'static str, (f32, f32), (f32, f32), (f32, f32), (f32, f32), (f32, f32), (f32, f32));

#[rustfmt::skip]
const CATALOG: [CatalogEntry; 12] = [
    ("lettuce",    (400.0, 600.0),  (800.0, 1200.0),  (5.5, 6.5), (18.0, 24.0), (50.0, 70.0), (15.0, 24.0)),
    ("basil",      (500.0, 800.0),  (1000.0, 1600.0), (5.5, 6.5), (20.0, 25.0), (40.0, 60.0), (20.0, 28.0)),
    ("mint",       (500.0, 800.0),  (1000.0, 1600.0), (5.5, 6.5), (18.0, 24.0), (50.0, 70.0), (18.0, 26.0)),
    ("strawberry", (500.0, 750.0),  (1000.0, 1500.0), (5.5, 6.2), (18.0, 22.0), (60.0, 75.0), (18.0, 26.0)),
    ("tomato",     (1000.0, 1750.0),(2000.0, 3500.0), (5.5, 6.5), (20.0, 26.0), (55.0, 70.0), (21.0, 29.0)),
    ("cucumber",   (800.0, 1200.0), (1600.0, 2400.0), (5.5, 6.0), (20.0, 26.0), (60.0, 80.0), (22.0, 30.0)),
    ("spinach",    (600.0, 1000.0), (1200.0, 2000.0), (6.0, 7.0), (16.0, 22.0), (50.0, 70.0), (15.0, 22.0)),
    ("arugula",    (400.0, 800.0),  (800.0, 1600.0),  (6.0, 7.0), (16.0, 22.0), (40.0, 60.0), (15.0, 24.0)),
    ("kale",       (600.0, 1000.0), (1200.0, 2000.0), (5.5, 6.5), (16.0, 22.0), (50.0, 70.0), (15.0, 24.0)),
    ("parsley",    (400.0, 900.0),  (800.0, 1800.0),  (5.5, 6.5), (18.0, 24.0), (40.0, 60.0), (18.0, 25.0)),
    ("coriander",  (600.0, 900.0),  (1200.0, 1800.0), (6.2, 6.8), (18.0, 24.0), (40.0, 60.0), (17.0, 27.0)),
    ("chives",     (600.0, 900.0),  (1200.0, 1800.0), (6.0, 6.8), (18.0, 24.0), (40.0, 60.0), (18.0, 25.0)),
];

fn catalog_profile(entry: &CatalogEntry) -> PlantProfile {
    let (name, tds, ec, ph, water, hum, air) = *entry;
    PlantProfile {
        name: name.to_owned(),
        tds: Range::new(tds.0, tds.1),
        ec: Range::new(ec.0, ec.1),
        ph: Range::new(ph.0, ph.1),
        water_temp: Range::new(water.0, water.1),
        humidity: Range::new(hum.0, hum.1),
        air_temp: Range::new(air.0, air.1),
    }
}

pub fn is_builtin(name: &str) -> bool {
    CATALOG.iter().any(|e| e.0 == name)
}

// ───────────────────────────────────────────────────────────────
// Registry
// ───────────────────────────────────────────────────────────────

/// Profiles that differ from the built-in catalogue, for persistence.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoredProfiles {
    pub active: String,
    pub custom: Vec<PlantProfile>,
}

/// Result of [`ProfileRegistry::add_profile`].
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileInsert {
    /// Normalised key the profile was stored under.
    pub name: String,
    /// The profile previously stored under that key.
    pub replaced: Option<PlantProfile>,
}

#[derive(Debug, Clone)]
pub struct ProfileRegistry {
    profiles: BTreeMap<String, PlantProfile>,
    active: String,
}

impl ProfileRegistry {
    /// Catalogue registry with `active` selected, falling back to the
    /// first catalogue entry when `active` is unknown.
    pub fn with_catalog(active: &str) -> Self {
        let profiles: BTreeMap<String, PlantProfile> = CATALOG
            .iter()
            .map(|e| (e.0.to_owned(), catalog_profile(e)))
            .collect();
        let mut registry = Self {
            profiles,
            active: CATALOG[0].0.to_owned(),
        };
        if registry.set_active(active).is_err() {
            log::warn!("profiles: '{}' unknown, using '{}'", active, registry.active);
        }
        registry
    }

    pub fn get(&self, name: &str) -> Option<&PlantProfile> {
        let key = name.trim().to_ascii_lowercase();
        self.profiles.get(&key)
    }

    pub fn active(&self) -> &PlantProfile {
        // `active` always names an entry: it is only assigned from existing keys.
        &self.profiles[&self.active]
    }

    pub fn active_name(&self) -> &str {
        &self.active
    }

    pub fn set_active(&mut self, name: &str) -> Result<&PlantProfile, ProfileError> {
        let key = normalize_name(name).map_err(|_| ProfileError::UnknownProfile)?;
        if !self.profiles.contains_key(&key) {
            return Err(ProfileError::UnknownProfile);
        }
        self.active = key;
        Ok(self.active())
    }

    /// Validate and insert; an existing profile with the same name is
    /// replaced and returned. A new name is refused once
    /// [`MAX_CUSTOM_PROFILES`] user profiles exist.
    pub fn add_profile(&mut self, mut profile: PlantProfile) -> Result<ProfileInsert, ProfileError> {
        profile.validate()?;
        profile.name = normalize_name(&profile.name)?;
        if !self.profiles.contains_key(&profile.name) && self.custom_count() >= MAX_CUSTOM_PROFILES {
            return Err(ProfileError::RegistryFull);
        }
        let name = profile.name.clone();
        let replaced = self.profiles.insert(name.clone(), profile);
        Ok(ProfileInsert { name, replaced })
    }

    /// Profiles not part of the built-in catalogue.
    pub fn custom_count(&self) -> usize {
        self.names().filter(|n| !is_builtin(n)).count()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.profiles.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    /// Everything a reboot would lose.
    pub fn to_stored(&self) -> StoredProfiles {
        let custom = self
            .profiles
            .values()
            .filter(|p| {
                CATALOG
                    .iter()
                    .find(|e| e.0 == p.name)
                    .is_none_or(|e| catalog_profile(e) != **p)
            })
            .cloned()
            .collect();
        StoredProfiles {
            active: self.active.clone(),
            custom,
        }
    }

    /// Re-apply persisted profiles. Invalid entries are skipped.
    pub fn restore(&mut self, stored: StoredProfiles) {
        for p in stored.custom {
            let name = p.name.clone();
            if let Err(e) = self.add_profile(p) {
                log::warn!("profiles: skipping stored '{}': {}", name, e);
            }
        }
        if self.set_active(&stored.active).is_err() {
            log::warn!("profiles: stored active '{}' unknown", stored.active);
        }
    }
}
