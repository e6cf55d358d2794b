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

/// Geolocation via ipinfo.io, which reports coordinates as a single `loc`
/// field, e.g. `"28.6139,77.2090"`.
#[derive(Debug, Clone)]
pub struct IpinfoProvider {
    token: String,
    base_url: String,
    http: Client,
}

impl IpinfoProvider {
    pub fn new(token: String) -> Self {
        Self::with_base_url(token, ServiceId::Ipinfo.default_base_url())
    }

    pub fn with_base_url(token: String, base_url: impl Into<String>) -> Self {
        Self { token, base_url: base_url.into(), http: Client::new() }
    }

    #[instrument(skip(self), level = "debug")]
    async fn fetch_json(&self) -> Result<PartialLocation, LocateError> {
        let url = format!("{}/json", trim_base(&self.base_url));

        let request = self.http.get(url).query(&[("token", self.token.as_str())]);
        let parsed: IpinfoResponse = fetch_location_json(ServiceId::Ipinfo, request).await?;

        let (latitude, longitude) = split_loc(&parsed.loc);
        let location = PartialLocation { latitude, longitude, city: json_text(&parsed.city) };
        debug!(?location, "ipinfo responded");

        Ok(location)
    }
}

#[derive(Debug, Deserialize)]
struct IpinfoResponse {
    #[serde(default)]
    loc: Value,
    #[serde(default)]
    city: Value,
}

/// Split `"lat,lon"`. Anything other than two non-empty parts yields neither.
fn split_loc(loc: &Value) -> (Option<String>, Option<String>) {
    let Some(text) = json_text(loc) else {
        return (None, None);
    };

    match text.split_once(',') {
        Some((lat, lon)) if is_pair(lat, lon) => {
            (Some(lat.trim().to_string()), Some(lon.trim().to_string()))
        }
        _ => (None, None),
    }
}

fn is_pair(lat: &str, lon: &str) -> bool {
    !lat.trim().is_empty() && !lon.trim().is_empty() && !lon.contains(',')
}

#[async_trait]
impl GeoProvider for IpinfoProvider {
    fn id(&self) -> ServiceId {
        ServiceId::Ipinfo
    }

    async fn locate(&self) -> Result<PartialLocation, LocateError> {
        self.fetch_json().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn split_loc_requires_two_parts() {
        assert_eq!(
            split_loc(&json!("28.6139,77.2090")),
            (Some("28.6139".into()), Some("77.2090".into()))
        );
        assert_eq!(split_loc(&json!("28.6139")), (None, None));
        assert_eq!(split_loc(&json!("28.6139,")), (None, None));
        assert_eq!(split_loc(&json!("1,2,3")), (None, None));
        assert_eq!(split_loc(&Value::Null), (None, None));
    }

    #[tokio::test]
    async fn reads_loc_and_city() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/json"))
            .and(query_param("token", "TOKEN"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ip": "203.0.113.7",
                "city": "Mumbai",
                "loc": "19.0728,72.8826"
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let provider = IpinfoProvider::with_base_url("TOKEN".into(), mock_server.uri());
        let location = provider.locate().await.unwrap();

        assert_eq!(location.latitude.as_deref(), Some("19.0728"));
        assert_eq!(location.longitude.as_deref(), Some("72.8826"));
        assert_eq!(location.city.as_deref(), Some("Mumbai"));
    }

    #[tokio::test]
    async fn server_error_is_a_status_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&mock_server)
            .await;

        let provider = IpinfoProvider::with_base_url("TOKEN".into(), mock_server.uri());
        assert_eq!(provider.locate().await.unwrap_err(), LocateError::Status(503));
    }

    #[tokio::test]
    async fn empty_error_body_still_reports_status() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429).insert_header("content-type", "text/plain"))
            .mount(&mock_server)
            .await;

        let provider = IpinfoProvider::with_base_url("TOKEN".into(), mock_server.uri());
        assert_eq!(provider.locate().await.unwrap_err(), LocateError::Status(429));
    }
}
