//! TDS probe and EC derivation.
//!
//! TDS: burst-average the probe, divide the voltage by the temperature
//! compensation factor `1 + 0.02 * (T - 25)`, then apply the configured
//! [`TdsCurve`] and probe K factor.
//!
//! EC comes from one of two strategies ([`EcSource`]):
//!
//! - `FromTds` multiplies TDS by a fixed ppm → µS/cm factor.
//! - `Independent` reads a dedicated probe.  The probe estimate depends on a
//!   cell constant that is easy to get wrong; when it comes out implausibly
//!   small for the measured voltage, the two-point curve through
//!   (0 V, 0 µS/cm) and (cal voltage, cal solution) is used instead.

use embedded_hal::delay::DelayNs;
use log::{debug, warn};

use super::reading::{LastKnownGood, Sample, SensorReading};
use super::sampling::average_voltage;
use super::{AnalogChannel, SensorBus};
use crate::config::{Calibration, EcSource, SystemConfig, TdsCurve};
use crate::error::SensorError;

pub const TDS_MAX_PPM: f32 = 5000.0;
pub const EC_MAX_US_CM: f32 = 10_000.0;

/// Reference and gain resistors of the EC probe front-end.
const EC_RES2_OHM: f32 = 820.0;
const EC_REF_GAIN: f32 = 200.0;
const EC_PROBE_TEMP_COEF: f32 = 0.0185;

pub fn compensation_factor(water_temp_c: f32) -> f32 {
    1.0 + 0.02 * (water_temp_c - 25.0)
}

pub fn tds_from_voltage(voltage: f32, water_temp_c: f32, cal: &Calibration) -> f32 {
    let v = voltage / compensation_factor(water_temp_c);
    let ppm = match cal.tds_curve {
        TdsCurve::Linear => v * cal.tds_linear_coefficient * 1000.0,
        TdsCurve::Polynomial => 133.42 * v * v * v - 255.86 * v * v + 857.39 * v,
    } * cal.tds_calibration_factor;
    // NaN from a zero compensation factor lands on 0 ppm.
    ppm.max(0.0).min(TDS_MAX_PPM)
}

pub fn ec_from_tds(tds_ppm: f32, cal: &Calibration) -> f32 {
    (tds_ppm * cal.ec_per_ppm).clamp(0.0, EC_MAX_US_CM)
}

/// Cell-constant estimate from the dedicated EC probe (µS/cm).
pub fn ec_probe_estimate(voltage: f32, water_temp_c: f32, cal: &Calibration) -> f32 {
    let millivolts = voltage * 1000.0;
    let ms_cm = millivolts / EC_RES2_OHM / EC_REF_GAIN * cal.ec_k_value;
    ms_cm * 1000.0 / (1.0 + EC_PROBE_TEMP_COEF * (water_temp_c - 25.0))
}

/// Two-point interpolation anchored at 0 V and the calibration solution.
pub fn ec_two_point(voltage: f32, water_temp_c: f32, cal: &Calibration) -> f32 {
    voltage / cal.ec_cal_voltage * cal.ec_cal_conductivity_us / compensation_factor(water_temp_c)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EcFormula {
    Probe,
    TwoPoint,
}

/// Pick between the probe estimate and the two-point curve.
pub fn reconcile_ec(voltage: f32, water_temp_c: f32, cal: &Calibration) -> (f32, EcFormula) {
    let estimate = ec_probe_estimate(voltage, water_temp_c, cal);
    let implausible =
        voltage > cal.ec_min_voltage && estimate < voltage * cal.ec_plausible_us_per_volt;
    let (ec, formula) = if implausible {
        (ec_two_point(voltage, water_temp_c, cal), EcFormula::TwoPoint)
    } else {
        (estimate, EcFormula::Probe)
    };
    (ec.clamp(0.0, EC_MAX_US_CM), formula)
}

#[derive(Debug, Clone, Copy)]
pub struct TdsReading {
    pub tds: Sample,
    pub ec: Sample,
}

pub struct TdsSensor {
    tds: LastKnownGood,
    ec: LastKnownGood,
    ec_source: EcSource,
    tds_samples: u8,
    ec_samples: u8,
    interval_ms: u8,
}

impl TdsSensor {
    pub fn new(config: &SystemConfig) -> Self {
        let timeout = u64::from(config.analog_timeout_ms);
        Self {
            tds: LastKnownGood::new(0.0, timeout),
            ec: LastKnownGood::new(0.0, timeout),
            ec_source: config.ec_source,
            tds_samples: config.tds_samples,
            ec_samples: config.ec_samples,
            interval_ms: config.sample_interval_ms,
        }
    }

    pub fn read<B, D>(
        &mut self,
        bus: &mut B,
        delay: &mut D,
        now_ms: u64,
        water_temp_c: f32,
        cal: &Calibration,
    ) -> TdsReading
    where
        B: SensorBus + ?Sized,
        D: DelayNs,
    {
        let tds = match average_voltage(bus, delay, AnalogChannel::Tds, self.tds_samples, self.interval_ms, cal) {
            Some(v) => self
                .tds
                .accept(SensorReading::measured(tds_from_voltage(v, water_temp_c, cal), now_ms)),
            None => {
                warn!("tds: {}", SensorError::AdcReadFailed);
                self.tds.fail(now_ms)
            }
        };

        let ec = match self.ec_source {
            EcSource::FromTds => {
                let value = ec_from_tds(tds.value(), cal);
                let stamped = if tds.reading.is_valid() {
                    SensorReading::measured(value, tds.reading.timestamp_ms())
                } else {
                    SensorReading::invalid(value, tds.reading.timestamp_ms())
                };
                Sample {
                    reading: stamped,
                    source: tds.source,
                }
            }
            EcSource::Independent => {
                match average_voltage(bus, delay, AnalogChannel::Ec, self.ec_samples, self.interval_ms, cal) {
                    Some(v) => {
                        let (value, formula) = reconcile_ec(v, water_temp_c, cal);
                        debug!("ec: {:.3} V -> {:.0} uS/cm via {:?}", v, value, formula);
                        self.ec.accept(SensorReading::measured(value, now_ms))
                    }
                    None => {
                        warn!("ec: {}", SensorError::AdcReadFailed);
                        self.ec.fail(now_ms)
                    }
                }
            }
        };

        TdsReading { tds, ec }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compensation_is_unity_at_25c() {
        assert!((compensation_factor(25.0) - 1.0).abs() < f32::EPSILON);
        assert!((compensation_factor(35.0) - 1.2).abs() < 1e-5);
    }

    #[test]
    fn linear_curve_at_reference_temperature() {
        let cal = Calibration::default();
        // 1.0 V * 0.64 * 1000 * 0.5
        assert!((tds_from_voltage(1.0, 25.0, &cal) - 320.0).abs() < 1e-3);
    }

    #[test]
    fn warmer_water_reads_lower() {
        let cal = Calibration::default();
        assert!(tds_from_voltage(1.0, 30.0, &cal) < tds_from_voltage(1.0, 25.0, &cal));
    }

    #[test]
    fn polynomial_curve() {
        let cal = Calibration {
            tds_curve: TdsCurve::Polynomial,
            ..Default::default()
        };
        let expected = (133.42 - 255.86 + 857.39) * 0.5;
        assert!((tds_from_voltage(1.0, 25.0, &cal) - expected).abs() < 1e-2);
    }

    #[test]
    fn tds_never_negative_or_above_cap() {
        let cal = Calibration::default();
        assert!(tds_from_voltage(-1.0, 25.0, &cal) >= 0.0);
        assert!(tds_from_voltage(1000.0, 25.0, &cal) <= TDS_MAX_PPM);
    }

    #[test]
    fn ec_ratio() {
        let cal = Calibration::default();
        assert!((ec_from_tds(500.0, &cal) - 1000.0).abs() < f32::EPSILON);
    }

    #[test]
    fn implausible_probe_estimate_uses_two_point_curve() {
        let cal = Calibration::default();
        // k=1: 1.5 V → 9.1 µS/cm, far below 1.5 * 100.
        let (ec, formula) = reconcile_ec(1.5, 25.0, &cal);
        assert_eq!(formula, EcFormula::TwoPoint);
        assert!((ec - 1413.0).abs() < 0.5);
    }

    #[test]
    fn plausible_probe_estimate_is_kept() {
        let cal = Calibration {
            ec_k_value: 150.0,
            ..Default::default()
        };
        let (_, formula) = reconcile_ec(1.0, 25.0, &cal);
        assert_eq!(formula, EcFormula::Probe);
    }

    #[test]
    fn dry_probe_is_not_reconciled() {
        let cal = Calibration::default();
        let (ec, formula) = reconcile_ec(0.01, 25.0, &cal);
        assert_eq!(formula, EcFormula::Probe);
        assert!(ec < 1.0);
    }
}
