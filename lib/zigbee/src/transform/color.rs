use super::Error;

pub const DEFAULT_BRIGHTNESS: f64 = 254.0;

fn gamma(value: f64) -> f64 {
    if value <= 0.0031308 {
        12.92 * value
    } else {
        1.055 * value.powf(1.0 / 2.4) - 0.055
    }
}

fn inverse_gamma(value: f64) -> f64 {
    if value > 0.04045 {
        ((value + 0.055) / 1.055).powf(2.4)
    } else {
        value / 12.92
    }
}

fn channel(value: f64, max: f64) -> u8 {
    let value = value / max * 255.0;

    // a channel that went negative is reported as saturated, which is what
    // paired UIs have always shown for out-of-gamut colors
    if value < 0.0 {
        255
    } else {
        value.round().min(255.0) as u8
    }
}

/// Converts CIE xy chromaticity plus a brightness in `0..=255` to `#rrggbb`.
pub fn xy_to_hex(x: f64, y: f64, brightness: f64) -> Result<String, Error> {
    if !x.is_finite() || !y.is_finite() || y == 0.0 {
        return Err(Error::InvalidChromaticity(x, y));
    }

    let z = 1.0 - x - y;

    let luminance = brightness / 255.0;
    let cx = (luminance / y) * x;
    let cz = (luminance / y) * z;

    let r = gamma(cx * 1.612 - luminance * 0.203 - cz * 0.302);
    let g = gamma(-cx * 0.509 + luminance * 1.412 + cz * 0.066);
    let b = gamma(cx * 0.026 - luminance * 0.072 + cz * 0.962);

    let max = r.max(g).max(b);
    if !max.is_finite() || max == 0.0 {
        return Err(Error::InvalidChromaticity(x, y));
    }

    Ok(format!(
        "#{:02x}{:02x}{:02x}",
        channel(r, max),
        channel(g, max),
        channel(b, max)
    ))
}

/// Converts `#rrggbb` (leading `#` optional) to CIE xy, each coordinate
/// rounded to two significant digits.
pub fn hex_to_xy(hex: &str) -> Result<(f64, f64), Error> {
    let digits = hex.strip_prefix('#').unwrap_or(hex);

    if digits.len() != 6 || !digits.is_ascii() {
        return Err(Error::InvalidHex(hex.to_string()));
    }

    let component = |range: std::ops::Range<usize>| {
        u8::from_str_radix(&digits[range], 16)
            .map(|value| inverse_gamma(value as f64 / 255.0))
            .map_err(|_| Error::InvalidHex(hex.to_string()))
    };

    let red = component(0..2)?;
    let green = component(2..4)?;
    let blue = component(4..6)?;

    let cx = red * 0.664511 + green * 0.154324 + blue * 0.162028;
    let cy = red * 0.283881 + green * 0.668433 + blue * 0.047685;
    let cz = red * 0.000088 + green * 0.072310 + blue * 0.986039;

    let sum = cx + cy + cz;
    if sum == 0.0 {
        return Err(Error::InvalidHex(hex.to_string()));
    }

    Ok((significant(cx / sum), significant(cy / sum)))
}

fn significant(value: f64) -> f64 {
    if value == 0.0 {
        return 0.0;
    }

    let scale = 10f64.powi(1 - value.abs().log10().floor() as i32);
    (value * scale).round() / scale
}
