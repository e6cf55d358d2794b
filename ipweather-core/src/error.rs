use thiserror::Error;

/// Why a location could not be resolved.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LocateError {
    #[error("Geolocation request failed: {0}")]
    Network(String),

    #[error("Geolocation service returned status {0}")]
    Status(u16),

    #[error("Failed to parse geolocation response: {0}")]
    Malformed(String),

    #[error("Geolocation response is missing `{0}`")]
    MissingField(&'static str),
}

/// Why current weather could not be fetched.
///
/// The display strings are shown to the user verbatim.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("Unable to reach weather service: {0}")]
    Network(String),

    #[error("Unable to fetch data. Status code {0}")]
    Status(u16),

    #[error("Weather data not found.")]
    NotFound,

    #[error("Failed to parse JSON response.")]
    Parse,
}
