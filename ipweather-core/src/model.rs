use serde::{Deserialize, Serialize};

/// Resolved location used to query the weather service.
///
/// Latitude and longitude are kept as the exact text the geolocation service
/// returned so they reach the weather query unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: String,
    pub longitude: String,
    pub city: String,
}

impl Coordinates {
    pub fn new(
        latitude: impl Into<String>,
        longitude: impl Into<String>,
        city: impl Into<String>,
    ) -> Self {
        Self { latitude: latitude.into(), longitude: longitude.into(), city: city.into() }
    }

    /// Value of the weather service `q` parameter, e.g. `28.6139,77.2090`.
    pub fn query(&self) -> String {
        format!("{},{}", self.latitude, self.longitude)
    }
}

/// Location as reported by a geolocation provider, before any fallback is applied.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartialLocation {
    pub latitude: Option<String>,
    pub longitude: Option<String>,
    pub city: Option<String>,
}

/// Current conditions, with units already attached to each value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeatherReading {
    pub temperature: String,
    pub condition: String,
    pub humidity: String,
    pub pressure: String,
}
