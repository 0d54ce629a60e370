use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::{Deserialize, Deserializer};

use crate::{
    error::LookupError,
    model::{CityInfo, CurrentWeather, WeatherReport},
    provider::truncate_body,
};

use super::WeatherProvider;

pub const DEFAULT_BASE_URL: &str = "http://localhost:5000";

/// Client for the city-weather service, which serves `GET /weather/{city}`.
#[derive(Debug, Clone)]
pub struct BackendProvider {
    base_url: Url,
    http: Client,
}

impl BackendProvider {
    pub fn new(base_url: &str, http: Client) -> Result<Self> {
        let base_url =
            Url::parse(base_url).with_context(|| format!("Failed to parse URL '{base_url}'"))?;
        if base_url.cannot_be_a_base() {
            anyhow::bail!("URL '{base_url}' cannot be used as a base URL");
        }

        Ok(Self { base_url, http })
    }

    fn weather_url(&self, city: &str) -> Result<Url, LookupError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| LookupError::Transport(format!("invalid base URL {}", self.base_url)))?
            .pop_if_empty()
            .push("weather")
            .push(city);
        Ok(url)
    }
}

#[derive(Debug, Deserialize)]
struct BeCityInfo {
    name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    admin1: String,
    #[serde(default, deserialize_with = "null_as_default")]
    country: String,
    #[serde(default, deserialize_with = "null_as_default")]
    population: u64,
    elevation: f64,
    latitude: f64,
    longitude: f64,
}

/// Geocoding omits region and population for some places (city-states,
/// villages); the service passes them through as missing or `null`.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Deserialize)]
struct BeResponse {
    temperature: f64,
    windspeed: f64,
    weathercode: i32,
    time: String,
    #[serde(rename = "cityInfo")]
    city_info: BeCityInfo,
}

impl From<BeResponse> for WeatherReport {
    fn from(res: BeResponse) -> Self {
        WeatherReport {
            weather: CurrentWeather {
                temperature_c: res.temperature,
                wind_speed_kmh: res.windspeed,
                weather_code: res.weathercode,
                observed_at: res.time,
            },
            city: CityInfo {
                name: res.city_info.name,
                admin_region: res.city_info.admin1,
                country: res.city_info.country,
                population: res.city_info.population,
                elevation_m: res.city_info.elevation,
                latitude: res.city_info.latitude,
                longitude: res.city_info.longitude,
            },
        }
    }
}

#[async_trait]
impl WeatherProvider for BackendProvider {
    async fn lookup(&self, city: &str) -> Result<WeatherReport, LookupError> {
        let url = self.weather_url(city)?;
        tracing::debug!(%url, "requesting city weather from backend");

        let res = self.http.get(url).send().await.map_err(|e| {
            tracing::debug!(error = %e, "backend request failed");
            LookupError::Transport(e.to_string())
        })?;

        let status = res.status();
        let body = res
            .text()
            .await
            .map_err(|e| LookupError::Transport(format!("failed to read response body: {e}")))?;

        if status == StatusCode::NOT_FOUND {
            return Err(LookupError::NotFound(city.to_string()));
        }
        if !status.is_success() {
            return Err(LookupError::Transport(format!(
                "backend request failed with status {}: {}",
                status,
                truncate_body(&body),
            )));
        }

        let parsed: BeResponse = serde_json::from_str(&body)
            .map_err(|e| LookupError::Malformed(format!("backend JSON: {e}")))?;

        WeatherReport::from(parsed).validated()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn city_is_pushed_as_one_encoded_segment() {
        let provider = BackendProvider::new("http://localhost:5000/api/", Client::new()).unwrap();
        let url = provider.weather_url("São Paulo/x").unwrap();
        assert_eq!(url.as_str(), "http://localhost:5000/api/weather/S%C3%A3o%20Paulo%2Fx");
    }

    #[test]
    fn city_info_tolerates_missing_and_null_fields() {
        let info: BeCityInfo = serde_json::from_value(serde_json::json!({
            "name": "Monaco",
            "admin1": null,
            "elevation": 65.0,
            "latitude": 43.73,
            "longitude": 7.42
        }))
        .unwrap();

        assert!(info.admin1.is_empty());
        assert!(info.country.is_empty());
        assert_eq!(info.population, 0);
    }

    #[test]
    fn rejects_non_base_urls() {
        assert!(BackendProvider::new("mailto:someone@example.com", Client::new()).is_err());
        assert!(BackendProvider::new("localhost:5000", Client::new()).is_err());
    }
}
