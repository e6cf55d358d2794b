use anyhow::{Context, Result, anyhow};
use chrono::FixedOffset;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};

use crate::{model::Coordinates, provider::ServiceId};

/// Environment variable selecting the active geolocation provider.
pub const LOCATOR_ENV: &str = "IPWEATHER_LOCATOR";

/// Credentials and endpoint for a single external service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub api_key: String,

    /// Overrides the service's public endpoint, e.g. for a proxy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

/// What the resolver does when geolocation fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum FallbackPolicy {
    /// Substitute the configured default location.
    #[default]
    DefaultLocation,
    /// Report the failure and skip the weather lookup.
    Fail,
}

/// Fallback policy and the default location it uses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FallbackConfig {
    pub policy: FallbackPolicy,
    pub latitude: String,
    pub longitude: String,
    pub city: String,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            policy: FallbackPolicy::DefaultLocation,
            latitude: "28.6139".to_string(),
            longitude: "77.2090".to_string(),
            city: "New Delhi".to_string(),
        }
    }
}

impl FallbackConfig {
    pub fn default_location(&self) -> Coordinates {
        Coordinates::new(&self.latitude, &self.longitude, &self.city)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub show_time: bool,

    /// Offset of the displayed clock from UTC. 330 is India Standard Time.
    pub utc_offset_minutes: i32,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self { show_time: true, utc_offset_minutes: 330 }
    }
}

impl DisplayConfig {
    pub fn utc_offset(&self) -> Result<FixedOffset> {
        FixedOffset::east_opt(self.utc_offset_minutes * 60).ok_or_else(|| {
            anyhow!(
                "Invalid display.utc_offset_minutes = {}: must be within +/-1439 minutes",
                self.utc_offset_minutes
            )
        })
    }
}

/// Top-level configuration stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Active geolocation provider id, e.g. "apiip" or "ipinfo".
    pub locator: Option<String>,

    /// Example TOML:
    /// [providers.weatherapi]
    /// api_key = "..."
    pub providers: HashMap<String, ProviderConfig>,

    pub fallback: FallbackConfig,

    pub display: DisplayConfig,
}

impl Config {
    /// Return the active geolocation provider as a strongly-typed ServiceId.
    pub fn locator_id(&self) -> Result<ServiceId> {
        let s = self.locator.as_ref().ok_or_else(|| {
            anyhow!(
                "No geolocation provider configured.\n\
                 Hint: run `ipweather configure <provider>` (e.g. `ipweather configure apiip`) first."
            )
        })?;

        let id = ServiceId::try_from(s.as_str())?;
        if !id.is_locator() {
            return Err(anyhow!(
                "'{id}' is not a geolocation provider. Supported locators: apiip, ipinfo."
            ));
        }

        Ok(id)
    }

    pub fn provider_config(&self, id: ServiceId) -> Option<&ProviderConfig> {
        self.providers.get(id.as_str())
    }

    pub fn set_locator(&mut self, id: ServiceId) {
        self.locator = Some(id.as_str().to_string());
    }

    /// Set/replace a service API key. The first geolocation provider configured
    /// becomes the active locator.
    pub fn upsert_provider_api_key(&mut self, id: ServiceId, api_key: String) {
        match self.providers.get_mut(id.as_str()) {
            Some(cfg) => cfg.api_key = api_key,
            None => {
                self.providers
                    .insert(id.as_str().to_string(), ProviderConfig { api_key, base_url: None });
            }
        }

        if id.is_locator() && self.locator.is_none() {
            self.set_locator(id);
        }
    }

    /// Returns API key for a service, if present.
    pub fn provider_api_key(&self, id: ServiceId) -> Option<&str> {
        self.provider_config(id).map(|cfg| cfg.api_key.as_str())
    }

    /// Endpoint for a service: the configured override or the public default.
    pub fn base_url(&self, id: ServiceId) -> &str {
        self.provider_config(id)
            .and_then(|cfg| cfg.base_url.as_deref())
            .unwrap_or_else(|| id.default_base_url())
    }

    pub fn is_provider_configured(&self, id: ServiceId) -> bool {
        self.provider_api_key(id).is_some()
    }

    /// Apply `IPWEATHER_*` overrides from the process environment.
    pub fn with_env_overrides(mut self) -> Result<Self> {
        self.apply_overrides(|name| std::env::var(name).ok())?;
        Ok(self)
    }

    /// Apply overrides from an arbitrary variable lookup. Keys are applied
    /// before the locator so an explicit locator always wins.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        for id in ServiceId::all() {
            if let Some(key) = lookup(id.env_key()).filter(|k| !k.trim().is_empty()) {
                self.upsert_provider_api_key(*id, key.trim().to_string());
            }
        }

        if let Some(locator) = lookup(LOCATOR_ENV).filter(|l| !l.trim().is_empty()) {
            let id = ServiceId::try_from(locator.trim())
                .with_context(|| format!("Invalid {LOCATOR_ENV}"))?;
            self.set_locator(id);
        }

        Ok(())
    }

    /// Load config from the platform config directory.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_file_path()?)
    }

    /// Load config from `path`, or return defaults if it doesn't exist yet.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let cfg: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(cfg)
    }

    /// Save config to the platform config directory.
    pub fn save(&self) -> Result<PathBuf> {
        let path = Self::config_file_path()?;
        self.save_to(&path)?;
        Ok(path)
    }

    /// Save config to `path`, creating parent directories as needed.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("dev", "ipweather", "ipweather")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locator_id_errors_when_not_set() {
        let cfg = Config::default();
        let err = cfg.locator_id().unwrap_err();

        assert!(err.to_string().contains("No geolocation provider configured"));
    }

    #[test]
    fn locator_id_rejects_weather_service() {
        let mut cfg = Config::default();
        cfg.set_locator(ServiceId::WeatherApi);

        let err = cfg.locator_id().unwrap_err();
        assert!(err.to_string().contains("not a geolocation provider"));
    }

    #[test]
    fn first_locator_key_becomes_active() {
        let mut cfg = Config::default();

        cfg.upsert_provider_api_key(ServiceId::WeatherApi, "WEATHER_KEY".into());
        assert!(cfg.locator.is_none());

        cfg.upsert_provider_api_key(ServiceId::Ipinfo, "IPINFO_KEY".into());
        cfg.upsert_provider_api_key(ServiceId::Apiip, "APIIP_KEY".into());

        assert_eq!(cfg.locator_id().unwrap(), ServiceId::Ipinfo);
        assert_eq!(cfg.provider_api_key(ServiceId::Apiip), Some("APIIP_KEY"));
        assert!(cfg.is_provider_configured(ServiceId::WeatherApi));
    }

    #[test]
    fn upsert_keeps_base_url_override() {
        let mut cfg = Config::default();
        cfg.providers.insert(
            "weatherapi".into(),
            ProviderConfig { api_key: "OLD".into(), base_url: Some("http://proxy".into()) },
        );

        cfg.upsert_provider_api_key(ServiceId::WeatherApi, "NEW".into());

        assert_eq!(cfg.provider_api_key(ServiceId::WeatherApi), Some("NEW"));
        assert_eq!(cfg.base_url(ServiceId::WeatherApi), "http://proxy");
        assert_eq!(cfg.base_url(ServiceId::Apiip), ServiceId::Apiip.default_base_url());
    }

    #[test]
    fn env_overrides_apply_keys_then_locator() {
        let mut cfg = Config::default();
        cfg.apply_overrides(|name| match name {
            "IPWEATHER_APIIP_KEY" => Some("A".into()),
            "IPWEATHER_WEATHERAPI_KEY" => Some(" W ".into()),
            "IPWEATHER_IPINFO_KEY" => Some("".into()),
            "IPWEATHER_LOCATOR" => Some("ipinfo".into()),
            _ => None,
        })
        .unwrap();

        assert_eq!(cfg.provider_api_key(ServiceId::Apiip), Some("A"));
        assert_eq!(cfg.provider_api_key(ServiceId::WeatherApi), Some("W"));
        assert!(!cfg.is_provider_configured(ServiceId::Ipinfo));
        assert_eq!(cfg.locator.as_deref(), Some("ipinfo"));
    }

    #[test]
    fn env_override_rejects_unknown_locator() {
        let mut cfg = Config::default();
        let err = cfg
            .apply_overrides(|name| (name == LOCATOR_ENV).then(|| "carrier-pigeon".to_string()))
            .unwrap_err();

        assert!(format!("{err:#}").contains("Unknown service"));
    }

    #[test]
    fn defaults_point_at_new_delhi() {
        let cfg = Config::default();

        assert_eq!(cfg.fallback.policy, FallbackPolicy::DefaultLocation);
        assert_eq!(
            cfg.fallback.default_location(),
            Coordinates::new("28.6139", "77.2090", "New Delhi")
        );
        assert_eq!(cfg.display.utc_offset().unwrap().local_minus_utc(), 330 * 60);
    }

    #[test]
    fn invalid_utc_offset_is_an_error() {
        let display = DisplayConfig { show_time: true, utc_offset_minutes: 24 * 60 };
        assert!(display.utc_offset().is_err());
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let cfg: Config = toml::from_str(
            r#"
            locator = "apiip"

            [providers.apiip]
            api_key = "K"

            [fallback]
            policy = "fail"
            city = "Pune"
            "#,
        )
        .unwrap();

        assert_eq!(cfg.locator_id().unwrap(), ServiceId::Apiip);
        assert_eq!(cfg.fallback.policy, FallbackPolicy::Fail);
        assert_eq!(cfg.fallback.city, "Pune");
        assert_eq!(cfg.fallback.latitude, "28.6139");
        assert!(cfg.display.show_time);
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut cfg = Config::default();
        cfg.upsert_provider_api_key(ServiceId::Apiip, "APIIP_KEY".into());
        cfg.display.show_time = false;
        cfg.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.locator_id().unwrap(), ServiceId::Apiip);
        assert_eq!(loaded.provider_api_key(ServiceId::Apiip), Some("APIIP_KEY"));
        assert!(!loaded.display.show_time);
    }

    #[test]
    fn load_missing_file_returns_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = Config::load_from(&dir.path().join("absent.toml")).unwrap();

        assert!(cfg.providers.is_empty());
        assert!(cfg.locator.is_none());
    }
}
