//! Bounded ADC burst averaging.
//!
//! A burst of `count` samples takes at most `(count - 1) * interval_ms`
//! in delays; both are capped so a single acquisition pass has a known
//! worst-case latency.

use embedded_hal::delay::DelayNs;

use super::{AnalogChannel, SensorBus};
use crate::config::Calibration;

pub const MAX_SAMPLES: u8 = 64;
pub const MAX_SAMPLE_INTERVAL_MS: u8 = 50;

/// Convert a raw ADC count to volts.
pub fn raw_to_voltage(raw: f32, cal: &Calibration) -> f32 {
    raw / cal.adc_max * cal.vref
}

/// Average a burst of samples on `channel` and return the mean voltage.
///
/// Failed samples are skipped; `None` only when every sample failed.
pub fn average_voltage<B, D>(
    bus: &mut B,
    delay: &mut D,
    channel: AnalogChannel,
    count: u8,
    interval_ms: u8,
    cal: &Calibration,
) -> Option<f32>
where
    B: SensorBus + ?Sized,
    D: DelayNs,
{
    let count = count.clamp(1, MAX_SAMPLES);
    let interval = u32::from(interval_ms.min(MAX_SAMPLE_INTERVAL_MS));

    let mut sum: u32 = 0;
    let mut ok: u32 = 0;
    for i in 0..count {
        if let Some(raw) = bus.analog_read(channel) {
            sum += u32::from(raw);
            ok += 1;
        }
        if i + 1 < count && interval > 0 {
            delay.delay_ms(interval);
        }
    }

    if ok == 0 {
        return None;
    }
    Some(raw_to_voltage(sum as f32 / ok as f32, cal))
}
