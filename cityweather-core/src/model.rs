use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::error::LookupError;

/// Current conditions at the looked-up city.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentWeather {
    pub temperature_c: f64,
    pub wind_speed_kmh: f64,
    pub weather_code: i32,
    /// Observation time as reported by the service, e.g. `2024-05-01T14:00`.
    pub observed_at: String,
}

impl CurrentWeather {
    /// Parse `observed_at`, accepting the minute-resolution local form the
    /// services return as well as RFC 3339.
    pub fn observed_at_parsed(&self) -> Option<NaiveDateTime> {
        NaiveDateTime::parse_from_str(&self.observed_at, "%Y-%m-%dT%H:%M")
            .ok()
            .or_else(|| {
                DateTime::parse_from_rfc3339(&self.observed_at)
                    .ok()
                    .map(|dt| dt.naive_local())
            })
    }
}

/// Descriptive metadata for the resolved city.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CityInfo {
    pub name: String,
    pub admin_region: String,
    pub country: String,
    pub population: u64,
    pub elevation_m: f64,
    pub latitude: f64,
    pub longitude: f64,
}

/// A successful lookup: weather plus city metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherReport {
    pub weather: CurrentWeather,
    pub city: CityInfo,
}

impl WeatherReport {
    /// Reject reports with non-finite numbers or coordinates outside the
    /// geographic range.
    pub fn validated(self) -> Result<Self, LookupError> {
        let numbers = [
            ("temperature", self.weather.temperature_c),
            ("wind speed", self.weather.wind_speed_kmh),
            ("elevation", self.city.elevation_m),
            ("latitude", self.city.latitude),
            ("longitude", self.city.longitude),
        ];
        if let Some((field, _)) = numbers.iter().find(|(_, v)| !v.is_finite()) {
            return Err(LookupError::Malformed(format!("{field} is not a finite number")));
        }

        if !(-90.0..=90.0).contains(&self.city.latitude) {
            return Err(LookupError::Malformed(format!(
                "latitude {} out of range",
                self.city.latitude
            )));
        }
        if !(-180.0..=180.0).contains(&self.city.longitude) {
            return Err(LookupError::Malformed(format!(
                "longitude {} out of range",
                self.city.longitude
            )));
        }

        Ok(self)
    }
}
