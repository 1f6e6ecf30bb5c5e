//! Display colors: parsing the generator's hex strings and rendering CSS.

use serde::{Serialize, Serializer};
use std::fmt;

/// An sRGB color with straight alpha.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    /// Alpha in [0, 1]
    pub a: f64,
}

impl Rgba {
    pub const WHITE: Rgba = Rgba::rgb(0xff, 0xff, 0xff);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    pub const fn rgba(r: u8, g: u8, b: u8, a: f64) -> Self {
        Self { r, g, b, a }
    }

    /// Parses `#rgb`, `#rrggbb` or `#rrggbbaa` (leading `#` optional).
    pub fn parse_hex(input: &str) -> Option<Self> {
        let hex = input.trim();
        let hex = hex.strip_prefix('#').unwrap_or(hex);
        if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        let channel = |s: &str| u8::from_str_radix(s, 16).ok();

        match hex.len() {
            3 => {
                let mut out = [0u8; 3];
                for (slot, ch) in out.iter_mut().zip(hex.chars()) {
                    let v = ch.to_digit(16)? as u8;
                    *slot = v * 17;
                }
                Some(Self::rgb(out[0], out[1], out[2]))
            }
            6 => Some(Self::rgb(
                channel(&hex[0..2])?,
                channel(&hex[2..4])?,
                channel(&hex[4..6])?,
            )),
            8 => Some(Self::rgba(
                channel(&hex[0..2])?,
                channel(&hex[2..4])?,
                channel(&hex[4..6])?,
                channel(&hex[6..8])? as f64 / 255.0,
            )),
            _ => None,
        }
    }

    /// Same color with a different alpha.
    pub fn with_alpha(self, a: f64) -> Self {
        Self {
            a: a.clamp(0.0, 1.0),
            ..self
        }
    }

    /// `#rrggbb`, ignoring alpha.
    pub fn to_hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl Default for Rgba {
    fn default() -> Self {
        Self::WHITE
    }
}

impl fmt::Display for Rgba {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.a >= 1.0 {
            write!(f, "{}", self.to_hex())
        } else {
            write!(f, "rgba({}, {}, {}, {})", self.r, self.g, self.b, self.a)
        }
    }
}

impl Serialize for Rgba {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

// Tailwind slate/red/orange tones used by the face shaders.
pub const SLATE_700: Rgba = Rgba::rgb(0x33, 0x41, 0x55);
pub const SLATE_600: Rgba = Rgba::rgb(0x47, 0x55, 0x69);
pub const RED_800: Rgba = Rgba::rgb(0x99, 0x1b, 0x1b);
pub const RED_900: Rgba = Rgba::rgb(0x7f, 0x1d, 0x1d);
pub const ORANGE_600: Rgba = Rgba::rgb(0xea, 0x58, 0x0c);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_long_and_short_hex() {
        assert_eq!(Rgba::parse_hex("#ff8800"), Some(Rgba::rgb(255, 136, 0)));
        assert_eq!(Rgba::parse_hex("f80"), Some(Rgba::rgb(255, 136, 0)));
        assert_eq!(Rgba::parse_hex("  #FFFFFF "), Some(Rgba::WHITE));
    }

    #[test]
    fn test_parse_hex_with_alpha() {
        let color = Rgba::parse_hex("#00000080").unwrap();
        assert!((color.a - 128.0 / 255.0).abs() < 1e-9);
    }

    #[test]
    fn test_reject_garbage() {
        assert_eq!(Rgba::parse_hex("red"), None);
        assert_eq!(Rgba::parse_hex("#12345"), None);
        assert_eq!(Rgba::parse_hex("#zzzzzz"), None);
        assert_eq!(Rgba::parse_hex("#ééé"), None);
        assert_eq!(Rgba::parse_hex("#+f+f+f"), None);
        assert_eq!(Rgba::parse_hex("#-1-1-1"), None);
    }

    #[test]
    fn test_display_css() {
        assert_eq!(Rgba::rgb(1, 2, 3).to_string(), "#010203");
        assert_eq!(
            Rgba::rgba(56, 189, 248, 0.2).to_string(),
            "rgba(56, 189, 248, 0.2)"
        );
    }
}
