//! Conversions between what devices put on the bus and what the host model
//! expects.

mod color;
pub use color::{hex_to_xy, xy_to_hex, DEFAULT_BRIGHTNESS};

use std::fmt;

use log::warn;

#[derive(Debug, PartialEq)]
pub enum Error {
    InvalidHex(String),
    InvalidChromaticity(f64, f64),
    NotANumber(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidHex(hex) => write!(f, "invalid hex color {hex:?}"),
            Self::InvalidChromaticity(x, y) => write!(f, "invalid chromaticity ({x}, {y})"),
            Self::NotANumber(value) => write!(f, "{value} is not a number"),
        }
    }
}

impl std::error::Error for Error {}

pub fn to_percentage(raw: f64, maximum: f64) -> i64 {
    let factor = maximum / 100.0;
    (raw / factor).floor() as i64
}

pub fn to_raw(percentage: f64, maximum: f64) -> i64 {
    let factor = maximum / 100.0;
    let raw = (percentage * factor).floor();

    if raw > maximum {
        warn!("{percentage}% overflows maximum {maximum}");
        maximum.floor() as i64
    } else {
        raw as i64
    }
}

/// Display title for a property key: `battery_low` becomes "Battery low".
pub fn sentence_case(key: &str) -> String {
    if key == "linkquality" {
        return "Link quality".to_string();
    }

    let title = key.replace('_', " ");
    let mut chars = title.chars();

    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_percentage() {
        assert_eq!(to_percentage(254.0, 254.0), 100);
        assert_eq!(to_percentage(200.0, 254.0), 78);
        assert_eq!(to_percentage(0.0, 254.0), 0);
        assert_eq!(to_percentage(127.0, 255.0), 49);
    }

    #[test]
    fn test_to_raw() {
        assert_eq!(to_raw(100.0, 254.0), 254);
        assert_eq!(to_raw(0.0, 254.0), 0);
        assert_eq!(to_raw(50.0, 1000.0), 500);
        assert_eq!(to_raw(150.0, 254.0), 254);
    }

    #[test]
    fn test_percentage_round_trip() {
        for maximum in [100.0, 254.0, 255.0, 1000.0, 65535.0] {
            for percentage in 0..=100 {
                let raw = to_raw(percentage as f64, maximum);
                let back = to_percentage(raw as f64, maximum);

                assert!(
                    (back - percentage).abs() <= 1,
                    "{percentage}% of {maximum} came back as {back}%"
                );
            }
        }
    }

    #[test]
    fn test_sentence_case() {
        assert_eq!(sentence_case("linkquality"), "Link quality");
        assert_eq!(sentence_case("battery_low"), "Battery low");
        assert_eq!(sentence_case("color_temp_startup"), "Color temp startup");
        assert_eq!(sentence_case("VOLTAGE"), "Voltage");
        assert_eq!(sentence_case("power state"), "Power state");
        assert_eq!(sentence_case(""), "");
    }
}
