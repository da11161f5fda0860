//! GPS position parsing
//!
//! ExifTool renders `GPSPosition` as two degrees/minutes/seconds coordinates:
//!
//! ```text
//! 23 deg 46' 12.00" N, 90 deg 23' 26.00" E
//! ```

use serde::{Deserialize, Serialize};

use crate::error::ParseError;

/// A bounds-checked position in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    #[serde(rename = "lat")]
    latitude: f64,
    #[serde(rename = "lon")]
    longitude: f64,
}

impl Location {
    /// Latitude must be within [-90, 90] and longitude within [-180, 180].
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, ParseError> {
        if !is_valid(latitude, longitude) {
            return Err(ParseError::InvalidCoordinates { latitude, longitude });
        }
        Ok(Self { latitude, longitude })
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }
}

fn is_valid(latitude: f64, longitude: f64) -> bool {
    (-90.0..=90.0).contains(&latitude) && (-180.0..=180.0).contains(&longitude)
}

/// Parse a `latitude, longitude` DMS pair into a [`Location`].
pub fn parse_position(raw: &str) -> Result<Location, ParseError> {
    let parts: Vec<&str> = raw.split(',').collect();
    if parts.len() != 2 {
        return Err(ParseError::PartCount(parts.len()));
    }

    let latitude = dms_to_decimal(parts[0])?;
    let longitude = dms_to_decimal(parts[1])?;
    Location::new(latitude, longitude)
}

/// Convert one `D deg M' S" H` coordinate to decimal degrees.
fn dms_to_decimal(coordinate: &str) -> Result<f64, ParseError> {
    let stripped = coordinate.replacen("deg", "", 1);
    let tokens: Vec<&str> = stripped.split_whitespace().collect();
    if tokens.len() < 4 {
        return Err(ParseError::TooFewTokens(coordinate.trim().to_string()));
    }

    let degrees = parse_number(tokens[0])?;
    let minutes = parse_number(tokens[1].trim_end_matches('\''))?;
    let seconds = parse_number(tokens[2].trim_end_matches('"'))?;

    let decimal = degrees + minutes / 60.0 + seconds / 3600.0;
    Ok(match tokens[3] {
        "S" | "W" => -decimal,
        _ => decimal,
    })
}

fn parse_number(token: &str) -> Result<f64, ParseError> {
    token
        .parse::<f64>()
        .map_err(|_| ParseError::InvalidNumber(token.to_string()))
}
