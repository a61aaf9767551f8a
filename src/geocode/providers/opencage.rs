//! OpenCage adapter (keyed fallback).

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use super::{fetch_json, make_result, AddressQuery, GeoProvider, ProviderError};
use crate::config::ProviderConfig;
use crate::models::{GeocodeResult, GeocodeSource};

#[derive(Debug, Deserialize)]
struct OpencageResponse {
    #[serde(default)]
    results: Vec<OpencageResult>,
}

#[derive(Debug, Deserialize)]
struct OpencageResult {
    geometry: OpencageGeometry,
    #[serde(default)]
    formatted: String,
}

#[derive(Debug, Deserialize)]
struct OpencageGeometry {
    lat: f64,
    lng: f64,
}

pub struct OpencageProvider {
    client: Client,
    config: ProviderConfig,
    country_code: String,
}

impl OpencageProvider {
    pub fn new(client: Client, config: ProviderConfig, country_code: &str) -> Self {
        Self {
            client,
            config,
            country_code: country_code.to_string(),
        }
    }
}

#[async_trait]
impl GeoProvider for OpencageProvider {
    fn source(&self) -> GeocodeSource {
        GeocodeSource::Opencage
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

        let request = self.client.get(self.config.endpoint.clone()).query(&[
            ("q", query.full_text().as_str()),
            ("key", key),
            ("countrycode", self.country_code.as_str()),
            ("limit", "5"),
            ("no_annotations", "1"),
        ]);

        let response: OpencageResponse = fetch_json(request, timeout).await?;
        let best = response
            .results
            .into_iter()
            .next()
            .ok_or(ProviderError::NoResults)?;
        make_result(
            best.geometry.lat,
            best.geometry.lng,
            best.formatted,
            GeocodeSource::Opencage,
        )
    }
}
