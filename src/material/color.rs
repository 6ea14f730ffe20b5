use std::fmt;
use std::str::FromStr;

/// Color applied to the model before the user picks anything.
pub const DEFAULT_COLOR: &str = "#4a90e2";

/// Fixed swatches offered by the color panel.
pub const PALETTE: [&str; 10] = [
    "#4a90e2", "#e74c3c", "#2ecc71", "#f39c12", "#9b59b6", "#e91e63", "#f1c40f", "#95a5a6",
    "#2c3e50", "#ecf0f1",
];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ColorError {
    #[error("invalid hex color `{0}` (expected #rrggbb)")]
    InvalidHex(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Red,
    Green,
    Blue,
}

impl Channel {
    pub const ALL: [Channel; 3] = [Channel::Red, Channel::Green, Channel::Blue];

    pub fn label(self) -> &'static str {
        match self {
            Channel::Red => "Red (R)",
            Channel::Green => "Green (G)",
            Channel::Blue => "Blue (B)",
        }
    }

    /// Accent used for the channel label in the color panel.
    pub fn accent(self) -> Rgb {
        match self {
            Channel::Red => Rgb::new(0xe7, 0x4c, 0x3c),
            Channel::Green => Rgb::new(0x2e, 0xcc, 0x71),
            Channel::Blue => Rgb::new(0x34, 0x98, 0xdb),
        }
    }
}

/// 8-bit sRGB triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb::new(0, 0, 0);
    pub const WHITE: Rgb = Rgb::new(0xff, 0xff, 0xff);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub const fn from_u32(value: u32) -> Self {
        Self::new(
            ((value >> 16) & 0xff) as u8,
            ((value >> 8) & 0xff) as u8,
            (value & 0xff) as u8,
        )
    }

    /// Parses `#rrggbb` or `rrggbb`, case-insensitive.
    pub fn from_hex(hex: &str) -> Result<Self, ColorError> {
        let digits = hex.strip_prefix('#').unwrap_or(hex);
        if digits.len() != 6 || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(ColorError::InvalidHex(hex.to_string()));
        }
        let value = u32::from_str_radix(digits, 16)
            .map_err(|_| ColorError::InvalidHex(hex.to_string()))?;
        Ok(Self::from_u32(value))
    }

    /// Lowercase `#rrggbb`.
    pub fn to_hex(self) -> String {
        rgb_to_hex(self.r, self.g, self.b)
    }

    pub fn channel(self, channel: Channel) -> u8 {
        match channel {
            Channel::Red => self.r,
            Channel::Green => self.g,
            Channel::Blue => self.b,
        }
    }

    pub fn with_channel(mut self, channel: Channel, value: u8) -> Self {
        match channel {
            Channel::Red => self.r = value,
            Channel::Green => self.g = value,
            Channel::Blue => self.b = value,
        }
        self
    }

    /// Linear-light components for shading.
    pub fn to_linear(self) -> [f32; 3] {
        [
            srgb_to_linear(self.r),
            srgb_to_linear(self.g),
            srgb_to_linear(self.b),
        ]
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for Rgb {
    type Err = ColorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

/// Lenient conversion used by the color panel: anything unparsable is black.
pub fn hex_to_rgb(hex: &str) -> Rgb {
    Rgb::from_hex(hex).unwrap_or(Rgb::BLACK)
}

pub fn rgb_to_hex(r: u8, g: u8, b: u8) -> String {
    format!("#{r:02x}{g:02x}{b:02x}")
}

/// Parses a channel field the way a browser `parseInt` would (leading
/// integer, anything else is 0) and clamps into `[0, 255]`.
pub fn parse_channel(text: &str) -> u8 {
    let trimmed = text.trim_start();
    let (negative, rest) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };
    let digits: &str = {
        let end = rest
            .bytes()
            .position(|b| !b.is_ascii_digit())
            .unwrap_or(rest.len());
        &rest[..end]
    };
    if digits.is_empty() || negative {
        return 0;
    }
    match digits.parse::<u64>() {
        Ok(value) => value.min(255) as u8,
        // Too many digits to fit: saturate.
        Err(_) => 255,
    }
}

fn srgb_to_linear(channel: u8) -> f32 {
    let c = channel as f32 / 255.0;
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}
