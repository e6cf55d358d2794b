//! The resolve-then-fetch pipeline and its text rendering.

use chrono::{DateTime, FixedOffset};
use serde_json::{Value, json};
use tracing::{debug, info};

use crate::{
    Config,
    config::FallbackPolicy,
    error::{FetchError, LocateError},
    locate::LocationResolver,
    model::{Coordinates, WeatherReading},
    provider::{WeatherProvider, weather_provider_from_config},
};

/// Shown instead of the weather when no location could be resolved.
pub const LOCATION_UNAVAILABLE: &str = "Unable to retrieve location data. Please try again.";

pub const TITLE: &str = "🌦️ Weather Dashboard";

/// Outcome of one pipeline run.
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub generated_at: DateTime<FixedOffset>,
    pub location: Result<Coordinates, LocateError>,
    /// `None` when the location could not be resolved and no lookup was made.
    pub weather: Option<Result<WeatherReading, FetchError>>,
}

impl Report {
    pub fn render_text(&self, show_time: bool) -> String {
        let mut lines = vec![TITLE.to_string()];

        if show_time {
            lines.push(format!(
                "Current time: {}",
                self.generated_at.format("%Y-%m-%d %H:%M:%S %:z")
            ));
        }

        match &self.location {
            Ok(coordinates) => lines.push(format!("📍 {}", coordinates.city)),
            Err(_) => lines.push(format!("Error: {LOCATION_UNAVAILABLE}")),
        }

        match &self.weather {
            Some(Ok(reading)) => {
                lines.push(format!("🌡️ Temperature: {}", reading.temperature));
                lines.push(format!("☁️ Weather: {}", reading.condition));
                lines.push(format!("💧 Humidity: {}", reading.humidity));
                lines.push(format!("🔽 Pressure: {}", reading.pressure));
            }
            Some(Err(err)) => lines.push(format!("Error: {err}")),
            None => {}
        }

        lines.iter().map(|line| format!("{line}\n")).collect()
    }

    pub fn to_json(&self) -> Value {
        let location = match &self.location {
            Ok(coordinates) => json!(coordinates),
            Err(err) => json!({ "error": LOCATION_UNAVAILABLE, "cause": err.to_string() }),
        };

        let weather = match &self.weather {
            Some(Ok(reading)) => json!(reading),
            Some(Err(err)) => json!({ "error": err.to_string() }),
            None => Value::Null,
        };

        json!({
            "generated_at": self.generated_at.to_rfc3339(),
            "location": location,
            "weather": weather,
        })
    }
}

/// Resolver followed by weather lookup.
#[derive(Debug)]
pub struct Dashboard {
    resolver: LocationResolver,
    weather: Box<dyn WeatherProvider>,
}

impl Dashboard {
    pub fn new(resolver: LocationResolver, weather: Box<dyn WeatherProvider>) -> Self {
        Self { resolver, weather }
    }

    /// Build the pipeline from config: the active locator, WeatherAPI and
    /// the configured fallback.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let resolver = LocationResolver::from_config(config)?;
        let weather = weather_provider_from_config(config)?;

        Ok(Self::new(resolver, weather))
    }

    pub fn with_policy(mut self, policy: FallbackPolicy) -> Self {
        self.resolver = self.resolver.with_policy(policy);
        self
    }

    /// Run the whole pipeline. Errors are captured in the report, never raised.
    pub async fn run(&self, generated_at: DateTime<FixedOffset>) -> Report {
        let location = self.resolver.resolve().await;

        let weather = match &location {
            Ok(coordinates) => {
                info!(city = %coordinates.city, q = %coordinates.query(), "fetching weather");
                Some(self.weather.current(coordinates).await)
            }
            Err(err) => {
                debug!(error = %err, "skipping weather lookup");
                None
            }
        };

        Report { generated_at, location, weather }
    }
}
