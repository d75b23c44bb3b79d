//! WS2812B writer on the ESP32 RMT peripheral.
//!
//! Each colour byte goes out MSB first in GRB order; one RMT item per bit.
//! The strip latches after the line stays low for >50 µs, which the idle
//! level after `start_blocking` provides.

use core::time::Duration;

use esp_idf_hal::gpio::OutputPin;
use esp_idf_hal::peripheral::Peripheral;
use esp_idf_hal::rmt::config::TransmitConfig;
use esp_idf_hal::rmt::{PinState, Pulse, RmtChannel, TxRmtDriver, VariableLengthSignal};
use esp_idf_svc::sys::EspError;
use smart_leds::{SmartLedsWrite, RGB8};

// Bit timings from the WS2812B datasheet (±150 ns).
const T0H_NS: u64 = 350;
const T0L_NS: u64 = 800;
const T1H_NS: u64 = 700;
const T1L_NS: u64 = 600;

pub struct Ws2812Rmt<'d> {
    tx: TxRmtDriver<'d>,
    zero: [Pulse; 2],
    one: [Pulse; 2],
}

impl<'d> Ws2812Rmt<'d> {
    pub fn new<C: RmtChannel>(
        channel: impl Peripheral<P = C> + 'd,
        pin: impl Peripheral<P = impl OutputPin> + 'd,
    ) -> Result<Self, EspError> {
        let config = TransmitConfig::new().clock_divider(1);
        let tx = TxRmtDriver::new(channel, pin, &config)?;
        let hz = tx.counter_clock()?;
        let pulse = |state, ns| Pulse::new_with_duration(hz, state, &Duration::from_nanos(ns));
        let zero = [pulse(PinState::High, T0H_NS)?, pulse(PinState::Low, T0L_NS)?];
        let one = [pulse(PinState::High, T1H_NS)?, pulse(PinState::Low, T1L_NS)?];
        Ok(Self { tx, zero, one })
    }
}

impl SmartLedsWrite for Ws2812Rmt<'_> {
    type Error = EspError;
    type Color = RGB8;

    fn write<T, I>(&mut self, iterator: T) -> Result<(), Self::Error>
    where
        T: IntoIterator<Item = I>,
        I: Into<Self::Color>,
    {
        let mut signal = VariableLengthSignal::new();
        for px in iterator {
            let px: RGB8 = px.into();
            for byte in [px.g, px.r, px.b] {
                for bit in (0..8).rev() {
                    let pulses = if byte >> bit & 1 == 1 { &self.one } else { &self.zero };
                    signal.push(pulses.iter())?;
                }
            }
        }
        self.tx.start_blocking(&signal)
    }
}
