//! Geocoding provider adapters.
//!
//! Every adapter turns a free-text address into a [`GeocodeResult`] or a
//! [`ProviderError`]. Errors never escape the orchestrator; they only mean
//! "try the next provider".

mod geoapify;
mod google;
mod nominatim;
mod opencage;

pub use geoapify::GeoapifyProvider;
pub use google::GoogleProvider;
pub use nominatim::NominatimProvider;
pub use opencage::OpencageProvider;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use thiserror::Error;

use crate::models::{GeocodeResult, GeocodeSource};

/// Why a provider produced no result
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("no API key configured")]
    MissingKey,

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected HTTP status {0}")]
    Status(StatusCode),

    #[error("provider rejected request: {0}")]
    Rejected(String),

    #[error("malformed response: {0}")]
    Decode(String),

    #[error("no results")]
    NoResults,
}

/// Address to geocode, with the locality/country bias applied by each provider
#[derive(Debug, Clone, Copy)]
pub struct AddressQuery<'a> {
    pub address: &'a str,
    pub locality: &'a str,
    pub country: &'a str,
}

impl AddressQuery<'_> {
    /// `"address, locality, country"`
    pub fn full_text(&self) -> String {
        format!("{}, {}, {}", self.address, self.locality, self.country)
    }
}

#[async_trait]
pub trait GeoProvider: Send + Sync {
    fn source(&self) -> GeocodeSource;

    /// Timeout used when the shared budget has more time left than this
    fn default_timeout(&self) -> Duration;

    async fn geocode(
        &self,
        query: &AddressQuery<'_>,
        timeout: Duration,
    ) -> Result<GeocodeResult, ProviderError>;
}

/// Build the HTTP client shared by the adapters
pub fn http_client(user_agent: &str) -> reqwest::Result<Client> {
    Client::builder()
        .user_agent(user_agent.to_string())
        .gzip(true)
        .build()
}

/// Send a GET request with `timeout` and decode a JSON body
async fn fetch_json<T: DeserializeOwned>(
    request: RequestBuilder,
    timeout: Duration,
) -> Result<T, ProviderError> {
    let response = request.timeout(timeout).send().await?;

    if !response.status().is_success() {
        return Err(ProviderError::Status(response.status()));
    }

    response
        .json::<T>()
        .await
        .map_err(|e| ProviderError::Decode(e.to_string()))
}

/// Build a result from coordinates that may be out of range
fn make_result(
    lat: f64,
    lon: f64,
    display_name: String,
    source: GeocodeSource,
) -> Result<GeocodeResult, ProviderError> {
    GeocodeResult::new(lat, lon, display_name, source)
        .ok_or_else(|| ProviderError::Decode(format!("coordinates out of range: {lat}, {lon}")))
}

/// Parse a coordinate that may arrive as a JSON string or number
fn parse_coord(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_coord() {
        assert_eq!(parse_coord(&json!("-33.52")), Some(-33.52));
        assert_eq!(parse_coord(&json!(-70.77)), Some(-70.77));
        assert_eq!(parse_coord(&json!("abc")), None);
        assert_eq!(parse_coord(&json!(null)), None);
    }

    #[test]
    fn test_full_text() {
        let query = AddressQuery {
            address: "Las Naciones 857",
            locality: "Maipú",
            country: "Chile",
        };
        assert_eq!(query.full_text(), "Las Naciones 857, Maipú, Chile");
    }
}
