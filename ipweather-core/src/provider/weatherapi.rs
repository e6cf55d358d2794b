use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{Number, Value};
use tracing::{debug, instrument, warn};

use crate::{
    Coordinates, FetchError, WeatherReading,
    provider::{trim_base, truncate_body},
};

use super::{ServiceId, WeatherProvider};

#[derive(Debug, Clone)]
pub struct WeatherApiProvider {
    api_key: String,
    base_url: String,
    http: Client,
}

impl WeatherApiProvider {
    pub fn new(api_key: String) -> Self {
        Self::with_base_url(api_key, ServiceId::WeatherApi.default_base_url())
    }

    pub fn with_base_url(api_key: String, base_url: impl Into<String>) -> Self {
        Self { api_key, base_url: base_url.into(), http: Client::new() }
    }

    #[instrument(skip(self), fields(city = %coordinates.city), level = "debug")]
    async fn fetch_current(&self, coordinates: &Coordinates) -> Result<WeatherReading, FetchError> {
        let url = format!("{}/v1/current.json", trim_base(&self.base_url));
        let q = coordinates.query();

        let res = self
            .http
            .get(url)
            .query(&[("key", self.api_key.as_str()), ("q", q.as_str()), ("aqi", "no")])
            .send()
            .await
            .map_err(|e| FetchError::Network(e.without_url().to_string()))?;

        let status = res.status();
        if status != StatusCode::OK {
            let body = res.text().await.unwrap_or_default();
            warn!(%status, body = %truncate_body(&body), "WeatherAPI current request rejected");
            return Err(FetchError::Status(status.as_u16()));
        }

        let body =
            res.text().await.map_err(|e| FetchError::Network(e.without_url().to_string()))?;

        let reading = parse_current(&body)?;
        debug!(?reading, "WeatherAPI responded");

        Ok(reading)
    }
}

#[derive(Debug, Deserialize)]
struct WaCondition {
    text: String,
}

#[derive(Debug, Deserialize)]
struct WaCurrent {
    temp_c: Number,
    humidity: Number,
    pressure_mb: Number,
    condition: WaCondition,
}

#[derive(Debug, Deserialize)]
struct WaResponse {
    current: WaCurrent,
}

/// Classify a 200 body: not JSON at all is a parse failure, JSON without the
/// expected `current` block is "not found".
fn parse_current(body: &str) -> Result<WeatherReading, FetchError> {
    let value: Value = serde_json::from_str(body).map_err(|_| FetchError::Parse)?;
    let parsed: WaResponse = serde_json::from_value(value).map_err(|e| {
        debug!(error = %e, "WeatherAPI body lacks current conditions");
        FetchError::NotFound
    })?;

    let current = parsed.current;

    Ok(WeatherReading {
        temperature: format!("{}°C", current.temp_c),
        condition: current.condition.text,
        humidity: format!("{}%", current.humidity),
        pressure: format!("{} hPa", current.pressure_mb),
    })
}

#[async_trait]
impl WeatherProvider for WeatherApiProvider {
    async fn current(&self, coordinates: &Coordinates) -> Result<WeatherReading, FetchError> {
        self.fetch_current(coordinates).await
    }
}
