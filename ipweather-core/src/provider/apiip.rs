use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::{
    LocateError, PartialLocation,
    provider::{fetch_location_json, json_text, trim_base},
};

use super::{GeoProvider, ServiceId};

/// Geolocation via apiip.net.
#[derive(Debug, Clone)]
pub struct ApiipProvider {
    api_key: String,
    base_url: String,
    http: Client,
}

impl ApiipProvider {
    pub fn new(api_key: String) -> Self {
        Self::with_base_url(api_key, ServiceId::Apiip.default_base_url())
    }

    pub fn with_base_url(api_key: String, base_url: impl Into<String>) -> Self {
        Self { api_key, base_url: base_url.into(), http: Client::new() }
    }

    #[instrument(skip(self), level = "debug")]
    async fn fetch_check(&self) -> Result<PartialLocation, LocateError> {
        let url = format!("{}/api/check", trim_base(&self.base_url));

        let request = self.http.get(url).query(&[("accessKey", self.api_key.as_str())]);
        let parsed: ApiipResponse = fetch_location_json(ServiceId::Apiip, request).await?;

        let location = parsed.into_location();
        debug!(?location, "apiip responded");

        Ok(location)
    }
}

#[derive(Debug, Deserialize)]
struct ApiipCoordinates {
    #[serde(default)]
    latitude: Value,
    #[serde(default)]
    longitude: Value,
}

#[derive(Debug, Deserialize)]
struct ApiipResponse {
    #[serde(default)]
    location: Option<ApiipCoordinates>,
    #[serde(default)]
    city: Value,
}

impl ApiipResponse {
    fn into_location(self) -> PartialLocation {
        let (latitude, longitude) = match &self.location {
            Some(loc) => (json_text(&loc.latitude), json_text(&loc.longitude)),
            None => (None, None),
        };

        PartialLocation { latitude, longitude, city: json_text(&self.city) }
    }
}

#[async_trait]
impl GeoProvider for ApiipProvider {
    fn id(&self) -> ServiceId {
        ServiceId::Apiip
    }

    async fn locate(&self) -> Result<PartialLocation, LocateError> {
        self.fetch_check().await
    }
}
