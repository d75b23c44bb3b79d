//! [`SensorBus`] over the real peripherals configured in `hw_init`.

use log::{debug, warn};

use crate::drivers::hw_init;
use crate::sensors::{AnalogChannel, ClimateSample, SensorBus};

pub struct EspSensorBus {
    climate_failures: u32,
}

impl Default for EspSensorBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EspSensorBus {
    pub fn new() -> Self {
        Self { climate_failures: 0 }
    }

    const fn adc_channel(channel: AnalogChannel) -> u32 {
        match channel {
            AnalogChannel::Tds => hw_init::ADC1_CH_TDS,
            AnalogChannel::Ph => hw_init::ADC1_CH_PH,
            AnalogChannel::WaterTemp => hw_init::ADC1_CH_WATER_TEMP,
            AnalogChannel::Ec => hw_init::ADC1_CH_EC,
        }
    }
}

impl SensorBus for EspSensorBus {
    fn analog_read(&mut self, channel: AnalogChannel) -> Option<u16> {
        hw_init::adc1_read(Self::adc_channel(channel))
    }

    fn read_climate(&mut self) -> ClimateSample {
        match hw_init::dht22_read() {
            Some((humidity_percent, air_temp_c)) => {
                self.climate_failures = 0;
                ClimateSample { humidity_percent, air_temp_c }
            }
            None => {
                self.climate_failures = self.climate_failures.saturating_add(1);
                debug!("dht22: frame failed ({} in a row)", self.climate_failures);
                ClimateSample::FAILED
            }
        }
    }

    fn reset_climate(&mut self) {
        // Release the line so the next start pulse begins from idle high.
        hw_init::gpio_write(crate::pins::DHT_GPIO, true);
        warn!("dht22: re-initialised after {} failed frames", self.climate_failures);
        self.climate_failures = 0;
    }

    fn read_probe_celsius(&mut self) -> Option<f32> {
        hw_init::ds18b20_read()
    }

    fn echo_pulse_us(&mut self) -> u32 {
        hw_init::ultrasonic_pulse_us()
    }
}
