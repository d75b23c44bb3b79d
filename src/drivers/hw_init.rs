//! One-shot hardware peripheral initialization and raw pin helpers.
//!
//! Configures the ADC1 oneshot unit and the GPIO directions using raw
//! ESP-IDF sys calls. Called once from `main()` before the control loop
//! starts. On host builds every pin helper is a no-op.

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

#[cfg(target_os = "espidf")]
use log::info;

#[cfg(target_os = "espidf")]
use crate::pins;

// ── Error type ────────────────────────────────────────────────

/// Errors during one-shot peripheral initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HwInitError {
    AdcInitFailed(i32),
    GpioConfigFailed(i32),
    RmtInitFailed,
}

impl core::fmt::Display for HwInitError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::AdcInitFailed(rc) => write!(f, "ADC1 init failed (rc={})", rc),
            Self::GpioConfigFailed(rc) => write!(f, "GPIO config failed (rc={})", rc),
            Self::RmtInitFailed => write!(f, "RMT channel for LED strip failed"),
        }
    }
}

impl From<HwInitError> for crate::error::Error {
    fn from(_: HwInitError) -> Self {
        Self::Init("peripheral init failed")
    }
}

// ADC1 channel numbers for the analog inputs (classic ESP32 mapping).
pub const ADC1_CH_TDS: u32 = 7; // GPIO35
pub const ADC1_CH_PH: u32 = 6; // GPIO34
pub const ADC1_CH_WATER_TEMP: u32 = 4; // GPIO32
pub const ADC1_CH_EC: u32 = 0; // GPIO36

#[cfg(target_os = "espidf")]
pub fn init_peripherals() -> Result<(), HwInitError> {
    // SAFETY: Called once from main() before the control loop; single-threaded.
    unsafe {
        init_adc()?;
        init_gpio()?;
    }
    info!("hw_init: all peripherals configured");
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
pub fn init_peripherals() -> Result<(), HwInitError> {
    log::info!("hw_init(sim): peripheral init skipped");
    Ok(())
}

// ── ADC (oneshot) ─────────────────────────────────────────────

#[cfg(target_os = "espidf")]
static mut ADC1_HANDLE: adc_oneshot_unit_handle_t = core::ptr::null_mut();

/// SAFETY: Must be called only from the init path or the control-loop
/// sensor path. `init_adc()` completes before the loop starts.
#[cfg(target_os = "espidf")]
unsafe fn adc1_handle() -> adc_oneshot_unit_handle_t {
    unsafe { ADC1_HANDLE }
}

#[cfg(target_os = "espidf")]
unsafe fn init_adc() -> Result<(), HwInitError> {
    let init_cfg = adc_oneshot_unit_init_cfg_t {
        unit_id: adc_unit_t_ADC_UNIT_1,
        ulp_mode: adc_ulp_mode_t_ADC_ULP_MODE_DISABLE,
        ..Default::default()
    };
    // SAFETY: ADC1_HANDLE is only written here, once at boot.
    let ret = unsafe { adc_oneshot_new_unit(&init_cfg, &raw mut ADC1_HANDLE) };
    if ret != ESP_OK as i32 {
        return Err(HwInitError::AdcInitFailed(ret));
    }

    // 12 dB attenuation gives the full 0–3.3 V span.
    let chan_cfg = adc_oneshot_chan_cfg_t {
        atten: adc_atten_t_ADC_ATTEN_DB_12,
        bitwidth: adc_bitwidth_t_ADC_BITWIDTH_12,
    };
    for ch in [ADC1_CH_TDS, ADC1_CH_PH, ADC1_CH_WATER_TEMP, ADC1_CH_EC] {
        let ret = unsafe { adc_oneshot_config_channel(adc1_handle(), ch, &chan_cfg) };
        if ret != ESP_OK as i32 {
            return Err(HwInitError::AdcInitFailed(ret));
        }
    }

    info!("hw_init: ADC1 configured (CH7=TDS, CH6=pH, CH4=water temp, CH0=EC)");
    Ok(())
}

/// One raw 12-bit conversion, `None` if the driver reported an error.
#[cfg(target_os = "espidf")]
pub fn adc1_read(channel: u32) -> Option<u16> {
    let mut raw: i32 = 0;
    // SAFETY: adc1_handle() contract; control-loop access only.
    let ret = unsafe { adc_oneshot_read(adc1_handle(), channel, &mut raw) };
    if ret != ESP_OK as i32 {
        return None;
    }
    Some(raw.max(0) as u16)
}

#[cfg(not(target_os = "espidf"))]
pub fn adc1_read(_channel: u32) -> Option<u16> {
    None
}

// ── GPIO ──────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
unsafe fn configure_pin(pin: i32, mode: gpio_mode_t, pull_up: bool) -> Result<(), HwInitError> {
    let cfg = gpio_config_t {
        pin_bit_mask: 1u64 << pin,
        mode,
        pull_up_en: if pull_up {
            gpio_pullup_t_GPIO_PULLUP_ENABLE
        } else {
            gpio_pullup_t_GPIO_PULLUP_DISABLE
        },
        pull_down_en: gpio_pulldown_t_GPIO_PULLDOWN_DISABLE,
        intr_type: gpio_int_type_t_GPIO_INTR_DISABLE,
    };
    let ret = unsafe { gpio_config(&cfg) };
    if ret != ESP_OK as i32 {
        return Err(HwInitError::GpioConfigFailed(ret));
    }
    Ok(())
}

#[cfg(target_os = "espidf")]
unsafe fn init_gpio() -> Result<(), HwInitError> {
    unsafe {
        configure_pin(pins::PUMP_RELAY_GPIO, gpio_mode_t_GPIO_MODE_OUTPUT, false)?;
        gpio_set_level(pins::PUMP_RELAY_GPIO, 0);

        configure_pin(pins::ULTRASONIC_TRIG_GPIO, gpio_mode_t_GPIO_MODE_OUTPUT, false)?;
        gpio_set_level(pins::ULTRASONIC_TRIG_GPIO, 0);

        configure_pin(pins::ULTRASONIC_ECHO_GPIO, gpio_mode_t_GPIO_MODE_INPUT, false)?;

        // DHT line idles high through its pull-up; the driver flips direction.
        configure_pin(pins::DHT_GPIO, gpio_mode_t_GPIO_MODE_INPUT_OUTPUT_OD, true)?;
        gpio_set_level(pins::DHT_GPIO, 1);

        configure_pin(pins::ONEWIRE_GPIO, gpio_mode_t_GPIO_MODE_INPUT_OUTPUT_OD, true)?;
        gpio_set_level(pins::ONEWIRE_GPIO, 1);
    }
    info!("hw_init: GPIO configured (relay, trig, echo, dht, 1-wire)");
    Ok(())
}

#[cfg(target_os = "espidf")]
pub fn gpio_read(pin: i32) -> bool {
    // SAFETY: read-only register access on a configured input pin.
    (unsafe { gpio_get_level(pin) }) != 0
}

#[cfg(not(target_os = "espidf"))]
pub fn gpio_read(_pin: i32) -> bool {
    false
}

#[cfg(target_os = "espidf")]
pub fn gpio_write(pin: i32, high: bool) -> bool {
    // SAFETY: write to a pin configured as output in init_gpio().
    (unsafe { gpio_set_level(pin, u32::from(high)) }) == ESP_OK as i32
}

#[cfg(not(target_os = "espidf"))]
pub fn gpio_write(_pin: i32, _high: bool) -> bool {
    true
}

// ── Timing ────────────────────────────────────────────────────

/// Microseconds since boot.
#[cfg(target_os = "espidf")]
pub fn micros() -> i64 {
    // SAFETY: esp_timer_get_time reads the RTC counter.
    unsafe { esp_timer_get_time() }
}

#[cfg(target_os = "espidf")]
pub fn delay_us(us: u32) {
    // SAFETY: busy-wait ROM helper.
    unsafe { esp_rom_delay_us(us) };
}

// ── Ultrasonic ────────────────────────────────────────────────

/// Echo wait limit; ~5 m round trip, past the sensor's 4 m ceiling.
pub const ECHO_TIMEOUT_US: i64 = 30_000;

/// Fire a 10 µs trigger and measure the echo's high time in µs.
/// Returns 0 when no echo arrived before [`ECHO_TIMEOUT_US`].
#[cfg(target_os = "espidf")]
pub fn ultrasonic_pulse_us() -> u32 {
    gpio_write(pins::ULTRASONIC_TRIG_GPIO, false);
    delay_us(2);
    gpio_write(pins::ULTRASONIC_TRIG_GPIO, true);
    delay_us(10);
    gpio_write(pins::ULTRASONIC_TRIG_GPIO, false);

    let start = micros();
    while !gpio_read(pins::ULTRASONIC_ECHO_GPIO) {
        if micros() - start > ECHO_TIMEOUT_US {
            return 0;
        }
    }
    let rise = micros();
    while gpio_read(pins::ULTRASONIC_ECHO_GPIO) {
        if micros() - rise > ECHO_TIMEOUT_US {
            return 0;
        }
    }
    (micros() - rise).max(0) as u32
}

#[cfg(not(target_os = "espidf"))]
pub fn ultrasonic_pulse_us() -> u32 {
    0
}

// ── DHT22 ─────────────────────────────────────────────────────

/// Wait while the line holds `level`; returns the time spent in µs or
/// `None` on timeout.
#[cfg(target_os = "espidf")]
fn dht_wait_while(level: bool, timeout_us: i64) -> Option<i64> {
    let start = micros();
    while gpio_read(pins::DHT_GPIO) == level {
        if micros() - start > timeout_us {
            return None;
        }
    }
    Some(micros() - start)
}

/// Bit-bang one DHT22 frame: `(humidity %, temperature °C)`.
///
/// Frame layout: 16-bit humidity ×10, 16-bit temperature ×10 with the sign
/// in bit 15, 8-bit checksum. A bit is 1 when its high phase exceeds ~40 µs.
#[cfg(target_os = "espidf")]
pub fn dht22_read() -> Option<(f32, f32)> {
    // Start signal: pull low ≥1 ms, release.
    gpio_write(pins::DHT_GPIO, false);
    delay_us(1_200);
    gpio_write(pins::DHT_GPIO, true);
    delay_us(30);

    // Sensor response: ~80 µs low, ~80 µs high.
    dht_wait_while(true, 100)?;
    dht_wait_while(false, 100)?;
    dht_wait_while(true, 100)?;

    let mut data = [0u8; 5];
    for bit in 0..40 {
        dht_wait_while(false, 80)?;
        let high = dht_wait_while(true, 100)?;
        if high > 40 {
            data[bit / 8] |= 1 << (7 - (bit % 8));
        }
    }

    let sum = data[..4].iter().fold(0u8, |acc, b| acc.wrapping_add(*b));
    if sum != data[4] {
        return None;
    }
    let humidity = f32::from(u16::from_be_bytes([data[0], data[1]])) / 10.0;
    let raw_t = u16::from_be_bytes([data[2] & 0x7F, data[3]]);
    let mut temp = f32::from(raw_t) / 10.0;
    if data[2] & 0x80 != 0 {
        temp = -temp;
    }
    Some((humidity, temp))
}

#[cfg(not(target_os = "espidf"))]
pub fn dht22_read() -> Option<(f32, f32)> {
    None
}

// ── DS18B20 (1-Wire) ──────────────────────────────────────────

#[cfg(target_os = "espidf")]
const OW_SKIP_ROM: u8 = 0xCC;
#[cfg(target_os = "espidf")]
const OW_CONVERT_T: u8 = 0x44;
#[cfg(target_os = "espidf")]
const OW_READ_SCRATCHPAD: u8 = 0xBE;
/// 12-bit conversion takes up to 750 ms; polled in 10 ms steps.
#[cfg(target_os = "espidf")]
const DS18B20_CONVERSION_POLLS: u32 = 80;

/// Dallas/Maxim CRC-8 (x^8 + x^5 + x^4 + 1, LSB first).
pub fn onewire_crc8(data: &[u8]) -> u8 {
    data.iter().fold(0u8, |mut crc, &byte| {
        let mut b = byte;
        for _ in 0..8 {
            let mix = (crc ^ b) & 0x01;
            crc >>= 1;
            if mix != 0 {
                crc ^= 0x8C;
            }
            b >>= 1;
        }
        crc
    })
}

/// Temperature from a 9-byte scratchpad, `None` on a CRC mismatch.
/// Bytes 0..2 are a little-endian signed count of 1/16 °C.
pub fn ds18b20_celsius(scratchpad: &[u8; 9]) -> Option<f32> {
    if onewire_crc8(&scratchpad[..8]) != scratchpad[8] {
        return None;
    }
    let raw = i16::from_le_bytes([scratchpad[0], scratchpad[1]]);
    Some(f32::from(raw) / 16.0)
}

/// Reset pulse; `true` if a device answered with a presence pulse.
#[cfg(target_os = "espidf")]
fn ow_reset() -> bool {
    gpio_write(pins::ONEWIRE_GPIO, false);
    delay_us(480);
    gpio_write(pins::ONEWIRE_GPIO, true);
    delay_us(70);
    let present = !gpio_read(pins::ONEWIRE_GPIO);
    delay_us(410);
    present
}

#[cfg(target_os = "espidf")]
fn ow_write_bit(bit: bool) {
    gpio_write(pins::ONEWIRE_GPIO, false);
    if bit {
        delay_us(6);
        gpio_write(pins::ONEWIRE_GPIO, true);
        delay_us(64);
    } else {
        delay_us(60);
        gpio_write(pins::ONEWIRE_GPIO, true);
        delay_us(10);
    }
}

#[cfg(target_os = "espidf")]
fn ow_read_bit() -> bool {
    gpio_write(pins::ONEWIRE_GPIO, false);
    delay_us(6);
    gpio_write(pins::ONEWIRE_GPIO, true);
    delay_us(9);
    let bit = gpio_read(pins::ONEWIRE_GPIO);
    delay_us(55);
    bit
}

#[cfg(target_os = "espidf")]
fn ow_write_byte(byte: u8) {
    for i in 0..8 {
        ow_write_bit(byte & (1 << i) != 0);
    }
}

#[cfg(target_os = "espidf")]
fn ow_read_byte() -> u8 {
    (0..8).fold(0u8, |acc, i| if ow_read_bit() { acc | (1 << i) } else { acc })
}

/// One conversion from the single DS18B20 on the bus, in °C.
/// `None` when no device answers, the conversion never completes, or the
/// scratchpad fails its CRC.
#[cfg(target_os = "espidf")]
pub fn ds18b20_read() -> Option<f32> {
    if !ow_reset() {
        return None;
    }
    ow_write_byte(OW_SKIP_ROM);
    ow_write_byte(OW_CONVERT_T);

    // The device holds the line low until the conversion is done.
    let mut done = false;
    for _ in 0..DS18B20_CONVERSION_POLLS {
        // SAFETY: yields to the scheduler for one tick.
        unsafe { vTaskDelay(1) };
        if ow_read_bit() {
            done = true;
            break;
        }
    }
    if !done || !ow_reset() {
        return None;
    }
    ow_write_byte(OW_SKIP_ROM);
    ow_write_byte(OW_READ_SCRATCHPAD);
    let mut scratchpad = [0u8; 9];
    for byte in &mut scratchpad {
        *byte = ow_read_byte();
    }
    ds18b20_celsius(&scratchpad)
}

#[cfg(not(target_os = "espidf"))]
pub fn ds18b20_read() -> Option<f32> {
    None
}
