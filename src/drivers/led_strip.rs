//! Grow-light LED strip.
//!
//! Four fixed modes cycled from the dashboard:
//!
//! | # | Mode   | Colour        |
//! |---|--------|---------------|
//! | 0 | Off    | (0, 0, 0)     |
//! | 1 | Growth | (0, 128, 0)   |
//! | 2 | Relax  | (0, 0, 255)   |
//! | 3 | Sleep  | (255, 0, 0)   |
//!
//! Every pixel shows the same colour, scaled by the configured brightness,
//! and the whole frame goes out in one `SmartLedsWrite::write`.

use serde::{Serialize, Serializer};
use smart_leds::{brightness, SmartLedsWrite, RGB8};

use crate::config::SystemConfig;
use crate::error::ActuatorError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LedMode {
    #[default]
    Off = 0,
    Growth = 1,
    Relax = 2,
    Sleep = 3,
}

impl LedMode {
    pub const COUNT: u8 = 4;
    pub const ALL: [Self; 4] = [Self::Off, Self::Growth, Self::Relax, Self::Sleep];

    pub fn from_index(index: u8) -> Self {
        Self::ALL[usize::from(index % Self::COUNT)]
    }

    pub fn index(self) -> u8 {
        self as u8
    }

    /// `(m + 1) mod 4`.
    pub fn next(self) -> Self {
        Self::from_index(self.index() + 1)
    }

    pub fn color(self) -> RGB8 {
        match self {
            Self::Off => RGB8::new(0, 0, 0),
            Self::Growth => RGB8::new(0, 128, 0),
            Self::Relax => RGB8::new(0, 0, 255),
            Self::Sleep => RGB8::new(255, 0, 0),
        }
    }

    pub fn is_lit(self) -> bool {
        self != Self::Off
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Off => "off",
            Self::Growth => "growth",
            Self::Relax => "relax",
            Self::Sleep => "sleep",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.name() == name)
    }
}

// Dashboards expect the numeric mode.
impl Serialize for LedMode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.index())
    }
}

pub struct LedStrip<W> {
    writer: W,
    len: u16,
    brightness: u8,
    mode: LedMode,
}

impl<W> LedStrip<W>
where
    W: SmartLedsWrite<Color = RGB8>,
{
    pub fn new(writer: W, config: &SystemConfig) -> Self {
        Self {
            writer,
            len: config.led_count,
            brightness: config.led_brightness,
            mode: LedMode::Off,
        }
    }

    /// Fill the strip with the mode colour and latch it.
    pub fn set_mode(&mut self, mode: LedMode) -> Result<(), ActuatorError> {
        let frame = core::iter::repeat_n(mode.color(), usize::from(self.len));
        self.writer
            .write(brightness(frame, self.brightness))
            .map_err(|_| ActuatorError::LedStripWriteFailed)?;
        self.mode = mode;
        Ok(())
    }

    pub fn cycle(&mut self) -> Result<LedMode, ActuatorError> {
        let next = self.mode.next();
        self.set_mode(next)?;
        Ok(next)
    }

    pub fn mode(&self) -> LedMode {
        self.mode
    }

    pub fn is_on(&self) -> bool {
        self.mode.is_lit()
    }

    pub fn writer(&self) -> &W {
        &self.writer
    }
}

// ── Simulation writer ─────────────────────────────────────────

/// Records every frame pushed to it. Host builds and tests use this in
/// place of the RMT-driven WS2812 writer.
#[derive(Debug, Default)]
pub struct SimStrip {
    frames: Vec<Vec<RGB8>>,
    fail: bool,
}

impl SimStrip {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent writes fail.
    pub fn set_failing(&mut self, fail: bool) {
        self.fail = fail;
    }

    pub fn frames(&self) -> &[Vec<RGB8>] {
        &self.frames
    }

    pub fn last_frame(&self) -> Option<&[RGB8]> {
        self.frames.last().map(Vec::as_slice)
    }
}

impl SmartLedsWrite for SimStrip {
    type Error = ActuatorError;
    type Color = RGB8;

    fn write<T, I>(&mut self, iterator: T) -> Result<(), Self::Error>
    where
        T: IntoIterator<Item = I>,
        I: Into<Self::Color>,
    {
        if self.fail {
            return Err(ActuatorError::LedStripWriteFailed);
        }
        self.frames.push(iterator.into_iter().map(Into::into).collect());
        Ok(())
    }
}
