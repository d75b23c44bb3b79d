//! Simulated sensor bus for host builds and tests.
//!
//! Every input is injectable; unset analog channels read mid-scale and the
//! climate sensor reports NaN until a value is set, like an unplugged DHT.

use embedded_hal::delay::DelayNs;

use super::{AnalogChannel, ClimateSample, SensorBus};

const CHANNELS: usize = 4;

const fn channel_index(channel: AnalogChannel) -> usize {
    match channel {
        AnalogChannel::Tds => 0,
        AnalogChannel::Ph => 1,
        AnalogChannel::WaterTemp => 2,
        AnalogChannel::Ec => 3,
    }
}

#[derive(Debug, Clone)]
pub struct SimSensorBus {
    analog: [Option<u16>; CHANNELS],
    analog_reads: [u32; CHANNELS],
    climate: ClimateSample,
    probe_c: Option<f32>,
    echo_us: u32,
    climate_resets: u32,
}

impl Default for SimSensorBus {
    fn default() -> Self {
        Self::new()
    }
}

impl SimSensorBus {
    pub fn new() -> Self {
        Self {
            analog: [Some(2048); CHANNELS],
            analog_reads: [0; CHANNELS],
            climate: ClimateSample::FAILED,
            probe_c: None,
            echo_us: 0,
            climate_resets: 0,
        }
    }

    /// `None` makes every read on the channel fail.
    pub fn set_analog(&mut self, channel: AnalogChannel, raw: Option<u16>) {
        self.analog[channel_index(channel)] = raw;
    }

    /// Set the analog channel to the ADC count nearest to `volts`.
    pub fn set_analog_voltage(&mut self, channel: AnalogChannel, volts: f32) {
        let raw = (volts / 3.3 * 4095.0).round().clamp(0.0, 4095.0) as u16;
        self.set_analog(channel, Some(raw));
    }

    pub fn set_climate(&mut self, humidity_percent: f32, air_temp_c: f32) {
        self.climate = ClimateSample {
            humidity_percent,
            air_temp_c,
        };
    }

    pub fn fail_climate(&mut self) {
        self.climate = ClimateSample::FAILED;
    }

    pub fn set_probe(&mut self, celsius: Option<f32>) {
        self.probe_c = celsius;
    }

    pub fn set_echo_us(&mut self, pulse_us: u32) {
        self.echo_us = pulse_us;
    }

    pub fn analog_reads(&self, channel: AnalogChannel) -> u32 {
        self.analog_reads[channel_index(channel)]
    }

    pub fn climate_resets(&self) -> u32 {
        self.climate_resets
    }
}

impl SensorBus for SimSensorBus {
    fn analog_read(&mut self, channel: AnalogChannel) -> Option<u16> {
        let idx = channel_index(channel);
        self.analog_reads[idx] += 1;
        self.analog[idx]
    }

    fn read_climate(&mut self) -> ClimateSample {
        self.climate
    }

    fn reset_climate(&mut self) {
        self.climate_resets += 1;
    }

    fn read_probe_celsius(&mut self) -> Option<f32> {
        self.probe_c
    }

    fn echo_pulse_us(&mut self) -> u32 {
        self.echo_us
    }
}

/// Delay that returns immediately and records how long it was asked to wait.
#[derive(Debug, Default, Clone)]
pub struct CountingDelay {
    total_ns: u64,
}

impl CountingDelay {
    pub fn total_ms(&self) -> u64 {
        self.total_ns / 1_000_000
    }
}

impl DelayNs for CountingDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.total_ns += u64::from(ns);
    }
}
