use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fs, path::PathBuf, time::Duration};

use crate::provider::ProviderId;

pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Configuration for a single provider (e.g., where it lives).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub base_url: String,

    /// Open-Meteo only: separate geocoding host. Falls back to `base_url`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geocoding_url: Option<String>,
}

/// Top-level configuration stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Optional default provider id, "backend" or "open-meteo". Unset means backend.
    pub default_provider: Option<String>,

    /// Upper bound for a single lookup, in seconds.
    #[serde(default)]
    pub timeout_secs: Option<u64>,

    /// Example TOML:
    /// [providers.backend]
    /// base_url = "http://localhost:5000"
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
}

impl Config {
    /// Return the default provider as a strongly-typed ProviderId.
    pub fn default_provider_id(&self) -> Result<ProviderId> {
        match self.default_provider.as_deref() {
            None => Ok(ProviderId::Backend),
            Some(s) => ProviderId::try_from(s).map_err(|e| {
                anyhow!(
                    "{e}\n\
                     Hint: run `cityweather configure <provider>` (e.g. `cityweather configure backend`) to fix the default."
                )
            }),
        }
    }

    pub fn provider_config(&self, id: ProviderId) -> Option<&ProviderConfig> {
        self.providers.get(id.as_str())
    }

    /// Store default provider as string.
    pub fn set_default_provider(&mut self, id: ProviderId) {
        self.default_provider = Some(id.as_str().to_string());
    }

    pub fn lookup_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS))
    }

    /// Load config from disk, or return an empty default if it doesn't exist yet.
    pub fn load() -> Result<Self> {
        let path = Self::config_file_path()?;
        if !path.exists() {
            // First run: no config file, return empty.
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_toml(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        toml::from_str(contents).context("Invalid configuration TOML")
    }

    /// Save config to disk, creating parent directories as needed.
    pub fn save(&self) -> Result<PathBuf> {
        let path = Self::config_file_path()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(&path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(path)
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("dev", "cityweather", "cityweather-cli")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Set/replace a provider's settings and make it the default if none is set yet.
    pub fn upsert_provider(&mut self, provider_id: ProviderId, provider: ProviderConfig) {
        self.providers.insert(provider_id.as_str().to_string(), provider);

        if self.default_provider.is_none() {
            self.default_provider = Some(provider_id.to_string());
        }
    }

    /// Convenience helper: set/replace only the base URL of a provider.
    pub fn upsert_provider_base_url(&mut self, provider_id: ProviderId, base_url: String) {
        self.upsert_provider(provider_id, ProviderConfig { base_url, geocoding_url: None });
    }

    /// Returns the configured base URL for a provider, if present.
    pub fn provider_base_url(&self, provider_id: ProviderId) -> Option<&str> {
        self.provider_config(provider_id).map(|cfg| cfg.base_url.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ProviderId;

    #[test]
    fn default_provider_is_backend_when_not_set() {
        let cfg = Config::default();
        assert_eq!(cfg.default_provider_id().unwrap(), ProviderId::Backend);
    }

    #[test]
    fn unknown_default_provider_has_hint() {
        let cfg = Config { default_provider: Some("openweather".into()), ..Config::default() };
        let msg = cfg.default_provider_id().unwrap_err().to_string();

        assert!(msg.contains("Unknown provider 'openweather'"));
        assert!(msg.contains("Hint: run `cityweather configure"));
    }

    #[test]
    fn set_base_url_and_default_for_provider() {
        let mut cfg = Config::default();

        cfg.upsert_provider_base_url(ProviderId::OpenMeteo, "http://mirror.local".into());

        let default = cfg.default_provider_id().expect("default provider must exist");
        assert_eq!(default, ProviderId::OpenMeteo);
        assert_eq!(cfg.provider_base_url(ProviderId::OpenMeteo), Some("http://mirror.local"));
        assert_eq!(cfg.provider_base_url(ProviderId::Backend), None);
    }

    #[test]
    fn upsert_does_not_override_existing_default() {
        let mut cfg = Config::default();

        cfg.upsert_provider_base_url(ProviderId::Backend, "http://localhost:5000".into());
        cfg.upsert_provider_base_url(ProviderId::OpenMeteo, "http://mirror.local".into());

        assert_eq!(cfg.default_provider_id().unwrap(), ProviderId::Backend);

        cfg.set_default_provider(ProviderId::OpenMeteo);
        assert_eq!(cfg.default_provider_id().unwrap(), ProviderId::OpenMeteo);
    }

    #[test]
    fn geocoding_url_roundtrips_only_when_set() {
        let mut cfg = Config::default();
        cfg.upsert_provider(
            ProviderId::OpenMeteo,
            ProviderConfig {
                base_url: "http://forecast.local".into(),
                geocoding_url: Some("http://geo.local".into()),
            },
        );
        cfg.upsert_provider_base_url(ProviderId::Backend, "http://localhost:5000".into());

        let text = toml::to_string_pretty(&cfg).unwrap();
        assert_eq!(text.matches("geocoding_url").count(), 1);

        let back = Config::from_toml(&text).unwrap();
        let om = back.provider_config(ProviderId::OpenMeteo).unwrap();
        assert_eq!(om.geocoding_url.as_deref(), Some("http://geo.local"));
        assert!(back.provider_config(ProviderId::Backend).unwrap().geocoding_url.is_none());
    }

    #[test]
    fn timeout_defaults_to_ten_seconds() {
        let mut cfg = Config::default();
        assert_eq!(cfg.lookup_timeout(), Duration::from_secs(10));

        cfg.timeout_secs = Some(3);
        assert_eq!(cfg.lookup_timeout(), Duration::from_secs(3));
    }

    #[test]
    fn parses_toml_with_missing_sections() {
        let cfg = Config::from_toml("default_provider = \"open-meteo\"\n").unwrap();
        assert_eq!(cfg.default_provider_id().unwrap(), ProviderId::OpenMeteo);
        assert!(cfg.providers.is_empty());
        assert_eq!(cfg.timeout_secs, None);
    }

    #[test]
    fn toml_roundtrip_keeps_providers() {
        let mut cfg = Config { timeout_secs: Some(4), ..Config::default() };
        cfg.upsert_provider_base_url(ProviderId::Backend, "http://weather.internal:8080".into());

        let text = toml::to_string_pretty(&cfg).unwrap();
        assert!(text.contains("[providers.backend]"));

        let back = Config::from_toml(&text).unwrap();
        assert_eq!(back.provider_base_url(ProviderId::Backend), Some("http://weather.internal:8080"));
        assert_eq!(back.lookup_timeout(), Duration::from_secs(4));
        assert_eq!(back.default_provider_id().unwrap(), ProviderId::Backend);
    }

    #[test]
    fn rejects_invalid_toml() {
        let err = Config::from_toml("timeout_secs = \"soon\"").unwrap_err();
        assert!(err.to_string().contains("Invalid configuration TOML"));
    }
}
