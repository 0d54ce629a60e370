use crate::{
    Config, LookupError, WeatherReport,
    provider::{backend::BackendProvider, open_meteo::OpenMeteoProvider},
};
use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use std::{convert::TryFrom, fmt::Debug, sync::Arc, time::Duration};

pub mod backend;
pub mod open_meteo;

const USER_AGENT: &str = concat!("cityweather/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderId {
    Backend,
    OpenMeteo,
}

impl ProviderId {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::Backend => "backend",
            ProviderId::OpenMeteo => "open-meteo",
        }
    }

    pub const fn all() -> &'static [ProviderId] {
        &[ProviderId::Backend, ProviderId::OpenMeteo]
    }
}

impl std::fmt::Display for ProviderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for ProviderId {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let lower = value.to_lowercase();

        match lower.as_str() {
            "backend" => Ok(ProviderId::Backend),
            "open-meteo" | "openmeteo" => Ok(ProviderId::OpenMeteo),
            _ => Err(anyhow::anyhow!(
                "Unknown provider '{value}'. Supported providers: backend, open-meteo."
            )),
        }
    }
}

/// A remote source that resolves a city name to its current weather.
#[async_trait]
pub trait WeatherProvider: Send + Sync + Debug {
    async fn lookup(&self, city: &str) -> Result<WeatherReport, LookupError>;
}

/// Shared HTTP client for providers. The request timeout mirrors the lookup
/// timeout so a hung connection is released as well.
pub fn http_client(timeout: Duration) -> anyhow::Result<Client> {
    Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()
        .context("Failed to build HTTP client")
}

/// Construct a provider from config and explicit ProviderId.
pub fn provider_from_config(
    id: ProviderId,
    config: &Config,
) -> anyhow::Result<Arc<dyn WeatherProvider>> {
    let http = http_client(config.lookup_timeout())?;

    let provider: Arc<dyn WeatherProvider> = match id {
        ProviderId::Backend => {
            let base_url = config.provider_base_url(id).unwrap_or(backend::DEFAULT_BASE_URL);
            Arc::new(BackendProvider::new(base_url, http).with_context(|| {
                format!(
                    "Invalid base URL for provider '{id}'.\n\
                     Hint: run `cityweather configure {id}` and enter a valid URL."
                )
            })?)
        }
        ProviderId::OpenMeteo => match config.provider_config(id) {
            Some(cfg) => {
                let geocoding = cfg.geocoding_url.as_deref().unwrap_or(&cfg.base_url);
                Arc::new(
                    OpenMeteoProvider::with_base_urls(geocoding, &cfg.base_url, http)
                        .with_context(|| format!("Invalid base URL for provider '{id}'"))?,
                )
            }
            None => Arc::new(OpenMeteoProvider::new(http)?),
        },
    };

    tracing::debug!(provider = %id, "lookup provider ready");
    Ok(provider)
}

/// Construct the default provider from config, using `default_provider` field.
pub fn default_provider_from_config(config: &Config) -> anyhow::Result<Arc<dyn WeatherProvider>> {
    let id = config.default_provider_id()?;
    provider_from_config(id, config)
}

pub(crate) fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}
