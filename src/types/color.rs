use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::core::{TextShape, TypeShape, XmlType};

/// An ARGB color, written as `#RRGGBB` (or `#AARRGGBB` when not opaque).
///
/// Parsing also accepts `r,g,b`, `a,r,g,b` and a few color names.
///
/// # Examples
///
/// ```
/// use xml_mapper::types::Color;
///
/// let pink: Color = "#FFC0CB".parse().unwrap();
/// assert_eq!(pink, Color::rgb(255, 192, 203));
/// assert_eq!("255, 192, 203".parse::<Color>().unwrap(), pink);
/// assert_eq!(Color::argb(128, 0, 0, 0).to_string(), "#80000000");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color {
    pub a: u8,
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

const NAMED: &[(&str, Color)] = &[
    ("black", Color::rgb(0, 0, 0)),
    ("white", Color::rgb(255, 255, 255)),
    ("red", Color::rgb(255, 0, 0)),
    ("green", Color::rgb(0, 128, 0)),
    ("blue", Color::rgb(0, 0, 255)),
    ("pink", Color::rgb(255, 192, 203)),
    ("transparent", Color::argb(0, 255, 255, 255)),
];

impl Color {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { a: 255, r, g, b }
    }

    pub const fn argb(a: u8, r: u8, g: u8, b: u8) -> Self {
        Self { a, r, g, b }
    }
}

impl Default for Color {
    fn default() -> Self {
        Color::rgb(0, 0, 0)
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.a == 255 {
            write!(f, "#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
        } else {
            write!(f, "#{:02X}{:02X}{:02X}{:02X}", self.a, self.r, self.g, self.b)
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ColorParseError {
    #[error("invalid hex color `{0}`")]
    Hex(String),

    #[error("invalid color component `{0}`")]
    Component(String),

    #[error("unknown color `{0}`")]
    Unknown(String),
}

impl FromStr for Color {
    type Err = ColorParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let text = s.trim();
        if let Some(hex) = text.strip_prefix('#') {
            return parse_hex(hex).ok_or_else(|| ColorParseError::Hex(text.to_string()));
        }
        if text.contains(',') {
            let components = text
                .split(',')
                .map(|part| {
                    part.trim()
                        .parse::<u8>()
                        .map_err(|_| ColorParseError::Component(part.trim().to_string()))
                })
                .collect::<Result<Vec<u8>, _>>()?;
            return match components.as_slice() {
                [r, g, b] => Ok(Color::rgb(*r, *g, *b)),
                [a, r, g, b] => Ok(Color::argb(*a, *r, *g, *b)),
                _ => Err(ColorParseError::Unknown(text.to_string())),
            };
        }
        NAMED
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(text))
            .map(|(_, color)| *color)
            .ok_or_else(|| ColorParseError::Unknown(text.to_string()))
    }
}

fn parse_hex(hex: &str) -> Option<Color> {
    if !hex.is_ascii() {
        return None;
    }
    let byte = |index: usize| u8::from_str_radix(hex.get(index..index + 2)?, 16).ok();
    match hex.len() {
        6 => Some(Color::rgb(byte(0)?, byte(2)?, byte(4)?)),
        8 => Some(Color::argb(byte(0)?, byte(2)?, byte(4)?, byte(6)?)),
        _ => None,
    }
}

impl XmlType for Color {
    fn shape() -> TypeShape {
        TypeShape::Scalar(TextShape::parsed::<Color>().with_default::<Color>())
    }
}
