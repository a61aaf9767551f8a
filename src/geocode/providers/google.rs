//! Google Geocoding API adapter (primary provider).

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use super::{fetch_json, make_result, AddressQuery, GeoProvider, ProviderError};
use crate::config::ProviderConfig;
use crate::models::{GeocodeResult, GeocodeSource};

#[derive(Debug, Deserialize)]
struct GoogleResponse {
    status: String,
    #[serde(default)]
    results: Vec<GoogleResult>,
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GoogleResult {
    #[serde(default)]
    formatted_address: String,
    geometry: GoogleGeometry,
}

#[derive(Debug, Deserialize)]
struct GoogleGeometry {
    location: GoogleLocation,
}

#[derive(Debug, Deserialize)]
struct GoogleLocation {
    lat: f64,
    lng: f64,
}

pub struct GoogleProvider {
    client: Client,
    config: ProviderConfig,
    country_code: String,
}

impl GoogleProvider {
    pub fn new(client: Client, config: ProviderConfig, country_code: &str) -> Self {
        Self {
            client,
            config,
            country_code: country_code.to_string(),
        }
    }
}

#[async_trait]
impl GeoProvider for GoogleProvider {
    fn source(&self) -> GeocodeSource {
        GeocodeSource::Google
    }

    fn default_timeout(&self) -> Duration {
        self.config.timeout()
    }

    async fn geocode(
        &self,
        query: &AddressQuery<'_>,
        timeout: Duration,
    ) -> Result<GeocodeResult, ProviderError> {
        let key = self.config.api_key.as_deref().ok_or(ProviderError::MissingKey)?;

        let components = format!(
            "country:{}|locality:{}",
            self.country_code.to_uppercase(),
            query.locality
        );
        let request = self.client.get(self.config.endpoint.clone()).query(&[
            ("address", query.full_text().as_str()),
            ("components", components.as_str()),
            ("region", self.country_code.as_str()),
            ("language", "es"),
            ("key", key),
        ]);

        let response: GoogleResponse = fetch_json(request, timeout).await?;
        match response.status.as_str() {
            "OK" => {}
            "ZERO_RESULTS" => return Err(ProviderError::NoResults),
            other => {
                return Err(ProviderError::Rejected(match response.error_message {
                    Some(msg) => format!("{other}: {msg}"),
                    None => other.to_string(),
                }))
            }
        }

        let best = response
            .results
            .into_iter()
            .next()
            .ok_or(ProviderError::NoResults)?;
        let location = best.geometry.location;
        make_result(
            location.lat,
            location.lng,
            best.formatted_address,
            GeocodeSource::Google,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geocode::providers::stub;
    use axum::{extract::Query, routing::get, Json, Router};
    use serde_json::{json, Value};
    use std::collections::HashMap;

    const QUERY: AddressQuery<'static> = AddressQuery {
        address: "Las Naciones 857",
        locality: "Maipú",
        country: "Chile",
    };

    fn provider(endpoint: url::Url, key: Option<&str>) -> GoogleProvider {
        let config = ProviderConfig {
            endpoint,
            timeout_ms: 6_000,
            api_key: key.map(String::from),
        };
        GoogleProvider::new(stub::client(), config, "cl")
    }

    #[tokio::test]
    async fn test_missing_key_skips_network() {
        // Nothing listens on this port; a request would fail with Transport instead
        let endpoint = url::Url::parse("http://127.0.0.1:9/search").unwrap();
        let err = provider(endpoint, None)
            .geocode(&QUERY, Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::MissingKey));
    }

    #[tokio::test]
    async fn test_first_candidate_wins() {
        let router = Router::new().route(
            "/search",
            get(|Query(params): Query<HashMap<String, String>>| async move {
                assert_eq!(params["components"], "country:CL|locality:Maipú");
                assert_eq!(params["address"], "Las Naciones 857, Maipú, Chile");
                assert_eq!(params["key"], "secret");
                Json(json!({
                    "status": "OK",
                    "results": [
                        {"formatted_address": "Las Naciones 857, Maipú",
                         "geometry": {"location": {"lat": -33.52, "lng": -70.77}}},
                        {"formatted_address": "Other",
                         "geometry": {"location": {"lat": -33.40, "lng": -70.60}}}
                    ]
                }))
            }),
        );
        let endpoint = stub::serve(router).await;

        let result = provider(endpoint, Some("secret"))
            .geocode(&QUERY, Duration::from_secs(2))
            .await
            .unwrap();
        assert_eq!(result.latitude(), -33.52);
        assert_eq!(result.longitude(), -70.77);
        assert_eq!(result.display_name(), "Las Naciones 857, Maipú");
        assert_eq!(result.source(), GeocodeSource::Google);
    }

    #[tokio::test]
    async fn test_api_status_errors() {
        let router = Router::new()
            .route(
                "/search",
                get(|| async { Json(json!({"status": "ZERO_RESULTS", "results": []})) }),
            )
            .route(
                "/denied",
                get(|| async {
                    Json(json!({"status": "REQUEST_DENIED", "error_message": "bad key"}))
                }),
            );
        let endpoint = stub::serve(router).await;

        let err = provider(endpoint.clone(), Some("k"))
            .geocode(&QUERY, Duration::from_secs(2))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::NoResults));

        let denied = endpoint.join("/denied").unwrap();
        let err = provider(denied, Some("k"))
            .geocode(&QUERY, Duration::from_secs(2))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Rejected(ref m) if m.contains("bad key")));
    }

    #[tokio::test]
    async fn test_http_error_status() {
        let router = Router::new().route(
            "/search",
            get(|| async { (axum::http::StatusCode::SERVICE_UNAVAILABLE, Json(Value::Null)) }),
        );
        let endpoint = stub::serve(router).await;
        let err = provider(endpoint, Some("k"))
            .geocode(&QUERY, Duration::from_secs(2))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Status(s) if s.as_u16() == 503));
    }
}
