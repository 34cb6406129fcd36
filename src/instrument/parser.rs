//! Response parsing for the MAVO command set.
//!
//! Device output is untrusted, so every function here is total over its input:
//! malformed text yields a sentinel (`NaN`, `-1`, `None`, empty `Vec`) instead
//! of an error. The one exception is an unrecognized unit symbol in an
//! otherwise numeric measurement, which points at an unsupported instrument
//! and is raised as [`MavoError::UnsupportedUnit`].

use crate::error::{AppResult, MavoError};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Prefix of every error response.
pub const ERROR_PREFIX: &str = "ERROR = ";

/// Error number reported when the text after [`ERROR_PREFIX`] is not numeric.
pub const NON_NUMERIC_ERROR: i32 = -1;

/// Footcandle to lux.
pub const LUX_PER_FOOTCANDLE: f64 = 10.76391042;
/// Footlambert to candela per square metre.
pub const CANDELA_M2_PER_FOOTLAMBERT: f64 = 3.4262591;

/// Unit symbols reported by the photometer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PhotometricUnit {
    /// Lux (illuminance, SI).
    Lx,
    /// Footcandle (illuminance).
    Fc,
    /// Footlambert (luminance).
    Fl,
    /// Candela per square metre (luminance, SI).
    CdM2,
}

impl PhotometricUnit {
    /// Factor that converts a value in this unit to lux or cd/m².
    pub fn si_factor(self) -> f64 {
        match self {
            PhotometricUnit::Lx | PhotometricUnit::CdM2 => 1.0,
            PhotometricUnit::Fc => LUX_PER_FOOTCANDLE,
            PhotometricUnit::Fl => CANDELA_M2_PER_FOOTLAMBERT,
        }
    }

    /// Symbol as reported by the device.
    pub fn symbol(self) -> &'static str {
        match self {
            PhotometricUnit::Lx => "LX",
            PhotometricUnit::Fc => "FC",
            PhotometricUnit::Fl => "FL",
            PhotometricUnit::CdM2 => "CD_M2",
        }
    }

    /// SI unit the converted value is expressed in.
    pub fn si_symbol(self) -> &'static str {
        match self {
            PhotometricUnit::Lx | PhotometricUnit::Fc => "lx",
            PhotometricUnit::Fl | PhotometricUnit::CdM2 => "cd/m²",
        }
    }
}

impl FromStr for PhotometricUnit {
    type Err = MavoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "LX" => Ok(PhotometricUnit::Lx),
            "FC" => Ok(PhotometricUnit::Fc),
            "FL" => Ok(PhotometricUnit::Fl),
            "CD_M2" => Ok(PhotometricUnit::CdM2),
            _ => Err(MavoError::UnsupportedUnit(s.to_string())),
        }
    }
}

impl fmt::Display for PhotometricUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// A measurement normalized to SI units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PhotometricReading {
    /// Value in lux (illuminance) or cd/m² (luminance).
    pub value_si: f64,
    /// Unit the device reported the value in.
    pub source_unit: PhotometricUnit,
}

/// Error number embedded in a response, `0` if the response is not an error.
pub fn detect_embedded_error(response: &str) -> i32 {
    match response.strip_prefix(ERROR_PREFIX) {
        Some(number) => number.trim().parse().unwrap_or(NON_NUMERIC_ERROR),
        None => 0,
    }
}

/// Strip the echoed command, i.e. everything up to and including the first space.
pub fn remove_echo(response: &str) -> String {
    if response.trim().is_empty() {
        return String::new();
    }
    match response.find(' ') {
        Some(index) => response[index + 1..].trim().to_string(),
        None => response.to_string(),
    }
}

/// Convert `value` given in the unit `symbol` to SI.
pub fn convert_to_si(value: f64, symbol: &str) -> AppResult<f64> {
    let unit: PhotometricUnit = symbol.parse()?;
    Ok(value * unit.si_factor())
}

/// Parse a raw measurement such as `"+ 123.4 LX"`.
///
/// The device separates sign and magnitude, so the first two tokens are joined
/// before parsing. Returns `Ok(None)` for malformed text.
pub fn parse_reading(response: &str) -> AppResult<Option<PhotometricReading>> {
    let parts = split_at_whitespace(response);
    if parts.len() < 3 {
        return Ok(None);
    }
    let literal = format!("{}{}", parts[0], parts[1]);
    let Ok(value) = literal.parse::<f64>() else {
        // also the path taken by "ERROR = n" responses
        return Ok(None);
    };
    let source_unit: PhotometricUnit = parts[2].parse()?;
    Ok(Some(PhotometricReading {
        value_si: value * source_unit.si_factor(),
        source_unit,
    }))
}

/// Measurement value in SI units, `NaN` for malformed text.
pub fn parse_measurement(response: &str) -> AppResult<f64> {
    Ok(parse_reading(response)?.map_or(f64::NAN, |reading| reading.value_si))
}

/// Range index, `-1` for malformed text.
pub fn parse_range(response: &str) -> i32 {
    response.trim().parse().unwrap_or(-1)
}

/// Operating time `"h,m,s"` as fractional hours, `NaN` for malformed text.
pub fn parse_operating_hours(response: &str) -> f64 {
    let parts = split_at_commas(response);
    if parts.len() < 3 {
        return f64::NAN;
    }
    let fields: Option<Vec<i64>> = parts[..3]
        .iter()
        .map(|part| part.parse::<i32>().ok().map(i64::from))
        .collect();
    match fields.as_deref() {
        Some([hours, minutes, seconds]) => {
            (hours * 3600 + minutes * 60 + seconds) as f64 / 3600.0
        }
        _ => f64::NAN,
    }
}

/// Split at commas, trimming fields and dropping empty ones.
pub fn split_identity(response: &str) -> Vec<String> {
    split_at_commas(response)
        .into_iter()
        .map(str::to_string)
        .collect()
}

fn split_at_commas(response: &str) -> Vec<&str> {
    response
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect()
}

fn split_at_whitespace(response: &str) -> Vec<&str> {
    response.split_whitespace().collect()
}
