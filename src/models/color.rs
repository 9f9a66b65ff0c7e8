use rand::Rng;
use serde::{Serialize, Serializer};
use std::fmt;

/// Presentation color handed to each connection, rendered as a CSS `hsl()` value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    pub hue: u16,
    pub saturation: u8,
    pub lightness: u8,
}

impl Color {
    pub const SATURATION: u8 = 80;
    pub const LIGHTNESS: u8 = 50;

    pub fn from_hue(hue: u16) -> Self {
        Self {
            hue: hue % 360,
            saturation: Self::SATURATION,
            lightness: Self::LIGHTNESS,
        }
    }

    pub fn random() -> Self {
        Self::from_hue(rand::rng().random_range(0..360))
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "hsl({}, {}%, {}%)", self.hue, self.saturation, self.lightness)
    }
}

impl Serialize for Color {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
