//! Location resolution with a configurable fallback policy.

use tracing::{info, warn};

use crate::{
    Config,
    config::{FallbackConfig, FallbackPolicy},
    error::LocateError,
    model::{Coordinates, PartialLocation},
    provider::{GeoProvider, default_geo_provider_from_config},
};

#[derive(Debug)]
pub struct LocationResolver {
    provider: Box<dyn GeoProvider>,
    fallback: FallbackConfig,
}

impl LocationResolver {
    pub fn new(provider: Box<dyn GeoProvider>, fallback: FallbackConfig) -> Self {
        Self { provider, fallback }
    }

    /// Build from config: the active locator and the configured fallback.
    /// Only the locator's key is required.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let provider = default_geo_provider_from_config(config)?;
        Ok(Self::new(provider, config.fallback.clone()))
    }

    pub fn with_policy(mut self, policy: FallbackPolicy) -> Self {
        self.fallback.policy = policy;
        self
    }

    pub fn policy(&self) -> FallbackPolicy {
        self.fallback.policy
    }

    /// Resolve the caller's location.
    ///
    /// Under [`FallbackPolicy::DefaultLocation`] this never fails: a failed
    /// lookup yields the default location and each missing field is taken
    /// from it. Under [`FallbackPolicy::Fail`] any failure, including a
    /// missing field, is returned.
    pub async fn resolve(&self) -> Result<Coordinates, LocateError> {
        let service = self.provider.id();

        match self.provider.locate().await {
            Ok(partial) => match self.fallback.policy {
                FallbackPolicy::DefaultLocation => Ok(self.fill_missing(partial)),
                FallbackPolicy::Fail => require_complete(partial),
            },
            Err(err) => {
                warn!(%service, error = %err, "geolocation failed");
                match self.fallback.policy {
                    FallbackPolicy::DefaultLocation => {
                        info!(city = %self.fallback.city, "using default location");
                        Ok(self.fallback.default_location())
                    }
                    FallbackPolicy::Fail => Err(err),
                }
            }
        }
    }

    fn fill_missing(&self, partial: PartialLocation) -> Coordinates {
        let fallback = &self.fallback;

        if partial.latitude.is_none() || partial.longitude.is_none() || partial.city.is_none() {
            info!(?partial, "filling missing location fields from default");
        }

        Coordinates {
            latitude: partial.latitude.unwrap_or_else(|| fallback.latitude.clone()),
            longitude: partial.longitude.unwrap_or_else(|| fallback.longitude.clone()),
            city: partial.city.unwrap_or_else(|| fallback.city.clone()),
        }
    }
}

fn require_complete(partial: PartialLocation) -> Result<Coordinates, LocateError> {
    Ok(Coordinates {
        latitude: partial.latitude.ok_or(LocateError::MissingField("latitude"))?,
        longitude: partial.longitude.ok_or(LocateError::MissingField("longitude"))?,
        city: partial.city.ok_or(LocateError::MissingField("city"))?,
    })
}
