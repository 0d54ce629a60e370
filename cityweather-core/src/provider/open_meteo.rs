//! Direct Open-Meteo lookup: geocode the city name, then fetch current
//! conditions for its coordinates. No API key required.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Deserialize;

use crate::{
    error::LookupError,
    model::{CityInfo, CurrentWeather, WeatherReport},
    provider::truncate_body,
};

use super::WeatherProvider;

pub const GEOCODING_BASE_URL: &str = "https://geocoding-api.open-meteo.com";
pub const FORECAST_BASE_URL: &str = "https://api.open-meteo.com";

#[derive(Debug, Clone)]
pub struct OpenMeteoProvider {
    geocoding_url: Url,
    forecast_url: Url,
    http: Client,
}

impl OpenMeteoProvider {
    pub fn new(http: Client) -> Result<Self> {
        Self::with_base_urls(GEOCODING_BASE_URL, FORECAST_BASE_URL, http)
    }

    /// Point the provider at other hosts, e.g. a mirror or a mock server.
    pub fn with_base_urls(geocoding: &str, forecast: &str, http: Client) -> Result<Self> {
        Ok(Self {
            geocoding_url: endpoint(geocoding, "v1/search")?,
            forecast_url: endpoint(forecast, "v1/forecast")?,
            http,
        })
    }

    async fn geocode(&self, city: &str) -> Result<OmPlace, LookupError> {
        let res = self
            .http
            .get(self.geocoding_url.clone())
            .query(&[("name", city), ("count", "1"), ("language", "en"), ("format", "json")])
            .send()
            .await
            .map_err(|e| LookupError::Transport(format!("Open-Meteo geocoding: {e}")))?;

        let parsed: OmSearchResponse = read_json(res, "geocoding").await?;

        parsed
            .results
            .unwrap_or_default()
            .into_iter()
            .next()
            .ok_or_else(|| LookupError::NotFound(city.to_string()))
    }

    async fn current(&self, place: &OmPlace) -> Result<OmCurrentWeather, LookupError> {
        let res = self
            .http
            .get(self.forecast_url.clone())
            .query(&[
                ("latitude", place.latitude.to_string()),
                ("longitude", place.longitude.to_string()),
                ("current_weather", "true".to_string()),
            ])
            .send()
            .await
            .map_err(|e| LookupError::Transport(format!("Open-Meteo forecast: {e}")))?;

        let parsed: OmForecastResponse = read_json(res, "forecast").await?;
        Ok(parsed.current_weather)
    }
}

fn endpoint(base: &str, path: &str) -> Result<Url> {
    let base = if base.ends_with('/') { base.to_string() } else { format!("{base}/") };
    Url::parse(&base)
        .and_then(|url| url.join(path))
        .with_context(|| format!("Failed to build Open-Meteo endpoint from '{base}'"))
}

async fn read_json<T: serde::de::DeserializeOwned>(
    res: reqwest::Response,
    what: &str,
) -> Result<T, LookupError> {
    let status = res.status();
    let body = res
        .text()
        .await
        .map_err(|e| LookupError::Transport(format!("Open-Meteo {what} body: {e}")))?;

    if !status.is_success() {
        return Err(LookupError::Transport(format!(
            "Open-Meteo {what} request failed with status {}: {}",
            status,
            truncate_body(&body),
        )));
    }

    serde_json::from_str(&body)
        .map_err(|e| LookupError::Malformed(format!("Open-Meteo {what} JSON: {e}")))
}

#[derive(Debug, Deserialize)]
struct OmPlace {
    name: String,
    #[serde(default)]
    admin1: String,
    #[serde(default)]
    country: String,
    #[serde(default)]
    population: u64,
    #[serde(default)]
    elevation: f64,
    latitude: f64,
    longitude: f64,
}

#[derive(Debug, Deserialize)]
struct OmSearchResponse {
    results: Option<Vec<OmPlace>>,
}

#[derive(Debug, Deserialize)]
struct OmCurrentWeather {
    temperature: f64,
    windspeed: f64,
    weathercode: i32,
    time: String,
}

#[derive(Debug, Deserialize)]
struct OmForecastResponse {
    current_weather: OmCurrentWeather,
}

#[async_trait]
impl WeatherProvider for OpenMeteoProvider {
    async fn lookup(&self, city: &str) -> Result<WeatherReport, LookupError> {
        let place = self.geocode(city).await?;
        tracing::debug!(
            city,
            latitude = place.latitude,
            longitude = place.longitude,
            "geocoded city"
        );

        let current = self.current(&place).await?;

        WeatherReport {
            weather: CurrentWeather {
                temperature_c: current.temperature,
                wind_speed_kmh: current.windspeed,
                weather_code: current.weathercode,
                observed_at: current.time,
            },
            city: CityInfo {
                name: place.name,
                admin_region: place.admin1,
                country: place.country,
                population: place.population,
                elevation_m: place.elevation,
                latitude: place.latitude,
                longitude: place.longitude,
            },
        }
        .validated()
    }
}
