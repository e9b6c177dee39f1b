//! Light state model and wire payloads.
//!
//! [`LightState`] is the tracked output state of the fixture;
//! [`LightCommand`] is the partial update decoded from a control payload.
//! Both use the wire encoding of the control topic: a flat JSON object with
//! `brightness` (0-255), `color{r,g,b}` (0-255 each), `flash` (int),
//! `transition` (seconds, int) and `state` (`"ON"`/`"OFF"`).

use serde::{Deserialize, Serialize};

/// One 8-bit-per-channel color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const BLACK: Self = Self { r: 0, g: 0, b: 0 };
    pub const WHITE: Self = Self {
        r: 255,
        g: 255,
        b: 255,
    };

    /// All channels at zero.
    pub fn is_black(self) -> bool {
        self == Self::BLACK
    }
}

impl Default for Rgb {
    fn default() -> Self {
        Self::BLACK
    }
}

/// On/off directive, encoded `"ON"` / `"OFF"` on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum PowerState {
    On,
    #[default]
    Off,
}

/// The full tracked state of the fixture.
///
/// `flash` and `transition` are directives carried along with the state,
/// not tracked output values — [`LightState::matches`] ignores them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LightState {
    pub brightness: u8,
    pub color: Rgb,
    pub flash: u32,
    /// Transition duration in whole seconds.
    pub transition: u32,
    pub state: PowerState,
}

impl Default for LightState {
    fn default() -> Self {
        Self {
            brightness: 255,
            color: Rgb::BLACK,
            flash: 0,
            transition: 0,
            state: PowerState::Off,
        }
    }
}

impl LightState {
    /// Equality over the tracked output fields, ignoring the `flash` and
    /// `transition` directives.
    pub fn matches(&self, other: &Self) -> bool {
        self.brightness == other.brightness
            && self.color == other.color
            && self.state == other.state
    }

    /// Overlay the fields a command specifies onto this state.
    pub fn apply(&mut self, command: &LightCommand) {
        if let Some(brightness) = command.brightness {
            self.brightness = brightness;
        }
        if let Some(color) = command.color {
            self.color = color;
        }
        if let Some(flash) = command.flash {
            self.flash = flash;
        }
        if let Some(transition) = command.transition {
            self.transition = transition;
        }
        if let Some(state) = command.state {
            self.state = state;
        }
    }
}

/// Partial state update decoded from a control payload.
///
/// Unspecified fields keep their current value; unknown JSON fields are
/// ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LightCommand {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brightness: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<Rgb>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flash: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transition: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<PowerState>,
}

// ── Tests ────────────────────────────────────────────────────
