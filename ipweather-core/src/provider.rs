use crate::{
    Config, Coordinates, FetchError, LocateError, PartialLocation, WeatherReading,
    provider::{apiip::ApiipProvider, ipinfo::IpinfoProvider, weatherapi::WeatherApiProvider},
};
use async_trait::async_trait;
use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::{convert::TryFrom, fmt::Debug};
use tracing::warn;

pub mod apiip;
pub mod ipinfo;
pub mod weatherapi;

/// External services the dashboard talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceId {
    Apiip,
    Ipinfo,
    WeatherApi,
}

impl ServiceId {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceId::Apiip => "apiip",
            ServiceId::Ipinfo => "ipinfo",
            ServiceId::WeatherApi => "weatherapi",
        }
    }

    pub const fn all() -> &'static [ServiceId] {
        &[ServiceId::Apiip, ServiceId::Ipinfo, ServiceId::WeatherApi]
    }

    /// Whether this service resolves a location from the caller's IP.
    pub fn is_locator(&self) -> bool {
        matches!(self, ServiceId::Apiip | ServiceId::Ipinfo)
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            ServiceId::Apiip => "https://apiip.net",
            ServiceId::Ipinfo => "https://ipinfo.io",
            ServiceId::WeatherApi => "https://api.weatherapi.com",
        }
    }

    /// Environment variable that overrides this service's API key.
    pub fn env_key(&self) -> &'static str {
        match self {
            ServiceId::Apiip => "IPWEATHER_APIIP_KEY",
            ServiceId::Ipinfo => "IPWEATHER_IPINFO_KEY",
            ServiceId::WeatherApi => "IPWEATHER_WEATHERAPI_KEY",
        }
    }
}

impl std::fmt::Display for ServiceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for ServiceId {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let lower = value.to_lowercase();

        match lower.as_str() {
            "apiip" => Ok(ServiceId::Apiip),
            "ipinfo" => Ok(ServiceId::Ipinfo),
            "weatherapi" => Ok(ServiceId::WeatherApi),
            _ => Err(anyhow::anyhow!(
                "Unknown service '{value}'. Supported services: apiip, ipinfo, weatherapi."
            )),
        }
    }
}

/// Resolves the caller's approximate location from their network address.
#[async_trait]
pub trait GeoProvider: Send + Sync + Debug {
    fn id(&self) -> ServiceId;

    /// Fields the service did not report are left as `None`.
    async fn locate(&self) -> Result<PartialLocation, LocateError>;
}

/// Fetches current conditions for a location.
#[async_trait]
pub trait WeatherProvider: Send + Sync + Debug {
    async fn current(&self, coordinates: &Coordinates) -> Result<WeatherReading, FetchError>;
}

fn api_key(id: ServiceId, config: &Config) -> anyhow::Result<String> {
    config.provider_api_key(id).map(str::to_owned).ok_or_else(|| {
        anyhow::anyhow!(
            "No API key configured for '{id}'.\n\
                 Hint: run `ipweather configure {id}` or set {}.",
            id.env_key()
        )
    })
}

/// Construct a geolocation provider from config and explicit ServiceId.
pub fn geo_provider_from_config(
    id: ServiceId,
    config: &Config,
) -> anyhow::Result<Box<dyn GeoProvider>> {
    let api_key = api_key(id, config)?;
    let base_url = config.base_url(id);

    let boxed: Box<dyn GeoProvider> = match id {
        ServiceId::Apiip => Box::new(ApiipProvider::with_base_url(api_key, base_url)),
        ServiceId::Ipinfo => Box::new(IpinfoProvider::with_base_url(api_key, base_url)),
        ServiceId::WeatherApi => {
            return Err(anyhow::anyhow!("'{id}' is not a geolocation provider"));
        }
    };

    Ok(boxed)
}

/// Construct the active geolocation provider, using the `locator` field.
pub fn default_geo_provider_from_config(config: &Config) -> anyhow::Result<Box<dyn GeoProvider>> {
    let id = config.locator_id()?;
    geo_provider_from_config(id, config)
}

pub fn weather_provider_from_config(config: &Config) -> anyhow::Result<Box<dyn WeatherProvider>> {
    let id = ServiceId::WeatherApi;
    let api_key = api_key(id, config)?;

    Ok(Box::new(WeatherApiProvider::with_base_url(api_key, config.base_url(id))))
}

/// Send a geolocation request and decode a 200 response body as `T`.
pub(crate) async fn fetch_location_json<T: DeserializeOwned>(
    id: ServiceId,
    request: RequestBuilder,
) -> Result<T, LocateError> {
    // without_url(): the request URL carries the access key.
    let res = request
        .send()
        .await
        .map_err(|e| LocateError::Network(e.without_url().to_string()))?;

    let status = res.status();
    if status != StatusCode::OK {
        let body = res.text().await.unwrap_or_default();
        warn!(service = %id, %status, body = %truncate_body(&body), "geolocation request rejected");
        return Err(LocateError::Status(status.as_u16()));
    }

    let body =
        res.text().await.map_err(|e| LocateError::Network(e.without_url().to_string()))?;

    serde_json::from_str(&body).map_err(|e| LocateError::Malformed(e.to_string()))
}

/// Textual form of a JSON scalar. Numbers keep their JSON spelling; null,
/// empty strings and non-scalars count as absent.
pub(crate) fn json_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub(crate) fn trim_base(base_url: &str) -> &str {
    base_url.trim_end_matches('/')
}

pub(crate) fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}
