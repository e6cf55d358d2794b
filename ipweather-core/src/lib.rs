//! Core library for the `ipweather` dashboard.
//!
//! This crate defines:
//! - Configuration & credentials handling
//! - Geolocation and weather providers
//! - The location resolver with its fallback policy
//! - The resolve-then-fetch pipeline and its rendering
//!
//! It is used by `ipweather-cli`, but can also be reused by other binaries or services.

pub mod config;
pub mod dashboard;
pub mod error;
pub mod locate;
pub mod model;
pub mod provider;

pub use config::{Config, DisplayConfig, FallbackConfig, FallbackPolicy, ProviderConfig};
pub use dashboard::{Dashboard, Report};
pub use error::{FetchError, LocateError};
pub use locate::LocationResolver;
pub use model::{Coordinates, PartialLocation, WeatherReading};
pub use provider::{GeoProvider, ServiceId, WeatherProvider};
