//! Unified error types for the HydroBrain firmware.
//!
//! A single `Error` enum that every subsystem can convert into, keeping the
//! control loop's error handling uniform.  All variants are `Copy` so they
//! can be handed back through the command channel without allocation.

use core::fmt;

use crate::profiles::ProfileMetric;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

/// Every fallible operation in the firmware funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A sensor could not be read or returned out-of-range data.
    Sensor(SensorError),
    /// An actuator command failed.
    Actuator(ActuatorError),
    /// A plant profile was rejected or could not be found.
    Profile(ProfileError),
    /// A communication subsystem failed.
    Comms(CommsError),
    /// Peripheral initialisation failed.
    Init(&'static str),
    /// Configuration is invalid or could not be loaded.
    Config(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sensor(e) => write!(f, "sensor: {e}"),
            Self::Actuator(e) => write!(f, "actuator: {e}"),
            Self::Profile(e) => write!(f, "profile: {e}"),
            Self::Comms(e) => write!(f, "comms: {e}"),
            Self::Init(msg) => write!(f, "init: {msg}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

// ---------------------------------------------------------------------------
// Sensor errors
// ---------------------------------------------------------------------------

/// Sensor failures are never returned to callers; they are logged and the
/// reading degrades to last-known-good or a default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    /// Every ADC sample in a burst failed.
    AdcReadFailed,
    /// The DHT returned NaN or timed out.
    ClimateReadFailed,
    /// The digital temperature probe is missing or returned a sentinel.
    ProbeReadFailed,
    /// The ultrasonic echo never arrived.
    EchoTimeout,
    /// Reading is outside the physically plausible range.
    OutOfRange,
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AdcReadFailed => write!(f, "ADC read failed"),
            Self::ClimateReadFailed => write!(f, "climate sensor read failed"),
            Self::ProbeReadFailed => write!(f, "temperature probe read failed"),
            Self::EchoTimeout => write!(f, "ultrasonic echo timeout"),
            Self::OutOfRange => write!(f, "reading out of range"),
        }
    }
}

impl From<SensorError> for Error {
    fn from(e: SensorError) -> Self {
        Self::Sensor(e)
    }
}

// ---------------------------------------------------------------------------
// Actuator errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActuatorError {
    /// GPIO set failed.
    GpioWriteFailed,
    /// The LED strip rejected the pixel buffer.
    LedStripWriteFailed,
}

impl fmt::Display for ActuatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::GpioWriteFailed => write!(f, "GPIO write failed"),
            Self::LedStripWriteFailed => write!(f, "LED strip write failed"),
        }
    }
}

impl From<ActuatorError> for Error {
    fn from(e: ActuatorError) -> Self {
        Self::Actuator(e)
    }
}

// ---------------------------------------------------------------------------
// Profile errors
// ---------------------------------------------------------------------------

/// Rejections raised at the profile-registry boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileError {
    /// No profile with the requested name exists.
    UnknownProfile,
    /// Name is empty, too long, or contains unsupported characters.
    InvalidName,
    /// A bound is NaN or infinite.
    NonFiniteBound(ProfileMetric),
    /// `min > max` for the given metric.
    InvertedRange(ProfileMetric),
    /// No room for another user-defined profile.
    RegistryFull,
}

impl fmt::Display for ProfileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownProfile => write!(f, "unknown profile"),
            Self::InvalidName => {
                write!(f, "profile name must be 1-24 characters of a-z, 0-9, space, '_' or '-'")
            }
            Self::NonFiniteBound(m) => write!(f, "{} bounds must be finite", m.key()),
            Self::InvertedRange(m) => write!(f, "{} min must not exceed max", m.key()),
            Self::RegistryFull => write!(f, "custom profile limit reached"),
        }
    }
}

impl From<ProfileError> for Error {
    fn from(e: ProfileError) -> Self {
        Self::Profile(e)
    }
}

// ---------------------------------------------------------------------------
// Communications errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommsError {
    WifiConnectFailed,
    WifiDisconnected,
    /// The control loop did not answer a command in time.
    ControlLoopUnavailable,
}

impl fmt::Display for CommsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WifiConnectFailed => write!(f, "WiFi connect failed"),
            Self::WifiDisconnected => write!(f, "WiFi disconnected"),
            Self::ControlLoopUnavailable => write!(f, "control loop unavailable"),
        }
    }
}

impl From<CommsError> for Error {
    fn from(e: CommsError) -> Self {
        Self::Comms(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_prefixes_subsystem() {
        let e: Error = SensorError::EchoTimeout.into();
        assert_eq!(e.to_string(), "sensor: ultrasonic echo timeout");
        let e: Error = ProfileError::InvertedRange(ProfileMetric::Ph).into();
        assert_eq!(e.to_string(), "profile: ph min must not exceed max");
    }

    #[test]
    fn comms_error_converts() {
        let e = Error::from(CommsError::ControlLoopUnavailable);
        assert!(matches!(e, Error::Comms(CommsError::ControlLoopUnavailable)));
    }
}
