//! Geoapify adapter (keyed fallback).

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use super::{fetch_json, make_result, AddressQuery, GeoProvider, ProviderError};
use crate::config::ProviderConfig;
use crate::models::{BoundingBox, GeocodeResult, GeocodeSource};

#[derive(Debug, Deserialize)]
struct GeoapifyResponse {
    #[serde(default)]
    results: Vec<GeoapifyResult>,
}

#[derive(Debug, Deserialize)]
struct GeoapifyResult {
    lat: f64,
    lon: f64,
    #[serde(default)]
    formatted: String,
}

pub struct GeoapifyProvider {
    client: Client,
    config: ProviderConfig,
    country_code: String,
    bias: BoundingBox,
}

impl GeoapifyProvider {
    pub fn new(client: Client, config: ProviderConfig, country_code: &str, bias: BoundingBox) -> Self {
        Self {
            client,
            config,
            country_code: country_code.to_string(),
            bias,
        }
    }
}

#[async_trait]
impl GeoProvider for GeoapifyProvider {
    fn source(&self) -> GeocodeSource {
        GeocodeSource::Geoapify
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

        let filter = format!("countrycode:{}|city:{}", self.country_code, query.locality);
        let bias = format!("rect:{}", self.bias.to_rect_param());
        let request = self.client.get(self.config.endpoint.clone()).query(&[
            ("text", query.full_text().as_str()),
            ("format", "json"),
            ("apiKey", key),
            ("filter", filter.as_str()),
            ("bias", bias.as_str()),
            ("limit", "5"),
        ]);

        let response: GeoapifyResponse = fetch_json(request, timeout).await?;
        let best = response
            .results
            .into_iter()
            .next()
            .ok_or(ProviderError::NoResults)?;
        make_result(best.lat, best.lon, best.formatted, GeocodeSource::Geoapify)
    }
}
