//! Multi-provider geocoding under a shared time budget.
//!
//! Providers are called one after another in a fixed priority order; the
//! first result inside the trusted bounding box wins. Calls are sequential
//! so paid APIs are not hit once a cheaper one has answered, which means
//! worst-case latency approaches the sum of the per-call timeouts (bounded
//! by the budget plus the overshoot of the call in flight when it expires).
//! A call that is already running is never cancelled.

use std::time::Duration;
use tracing::{debug, info, warn};

use super::budget::TimeBudget;
use super::providers::{
    AddressQuery, GeoProvider, GeoapifyProvider, GoogleProvider, NominatimProvider,
    OpencageProvider, ProviderError,
};
use crate::config::GeocodingConfig;
use crate::models::{BoundingBox, GeocodeResult};

pub struct GeocodeOrchestrator {
    /// Priority order: primary first
    providers: Vec<Box<dyn GeoProvider>>,
    bbox: BoundingBox,
}

impl GeocodeOrchestrator {
    pub fn new(providers: Vec<Box<dyn GeoProvider>>, bbox: BoundingBox) -> Self {
        Self { providers, bbox }
    }

    /// Google, then Nominatim, then Geoapify, then OpenCage
    pub fn from_config(
        config: &GeocodingConfig,
        client: reqwest::Client,
        bbox: BoundingBox,
    ) -> Self {
        let providers: Vec<Box<dyn GeoProvider>> = vec![
            Box::new(GoogleProvider::new(
                client.clone(),
                config.google.clone(),
                &config.country_code,
            )),
            Box::new(NominatimProvider::new(
                client.clone(),
                config.nominatim.clone(),
                &config.country_code,
                &config.region,
            )),
            Box::new(GeoapifyProvider::new(
                client.clone(),
                config.geoapify.clone(),
                &config.country_code,
                bbox,
            )),
            Box::new(OpencageProvider::new(
                client,
                config.opencage.clone(),
                &config.country_code,
            )),
        ];

        for p in &providers {
            debug!("Geocoding provider {} (default timeout {:?})", p.source(), p.default_timeout());
        }

        Self::new(providers, bbox)
    }

    /// Best result for `query` within `budget_ms` (clamped to [2000, 60000]).
    ///
    /// Returns the first inside-box result, else the first outside-box result
    /// seen in priority order, else `None`.
    pub async fn geocode(&self, query: &AddressQuery<'_>, budget_ms: u64) -> Option<GeocodeResult> {
        let budget = TimeBudget::start(budget_ms);
        let mut outside: Option<GeocodeResult> = None;

        for provider in &self.providers {
            let source = provider.source();
            let Some(timeout) = budget.timeout_for(provider.default_timeout()) else {
                debug!("Geocoding budget of {:?} exhausted before {}", budget.total(), source);
                break;
            };

            match provider.geocode(query, timeout).await {
                Ok(result) if self.bbox.contains_result(&result) => {
                    info!(
                        "Geocoded '{}' via {} at ({}, {})",
                        query.address,
                        source,
                        result.latitude(),
                        result.longitude()
                    );
                    return Some(result);
                }
                Ok(result) => {
                    debug!(
                        "{} result ({}, {}) lies outside the trusted area",
                        source,
                        result.latitude(),
                        result.longitude()
                    );
                    if outside.is_none() {
                        outside = Some(result);
                    }
                }
                Err(ProviderError::MissingKey) => {
                    debug!("Skipping {}: no API key configured", source);
                }
                Err(e) => {
                    warn!("Geocoding provider {} failed for '{}': {}", source, query.address, e);
                }
            }
        }

        if let Some(result) = &outside {
            info!(
                "No result inside the trusted area for '{}'; using {} outside it",
                query.address,
                result.source()
            );
        }
        outside
    }

    /// Total of all providers' default timeouts, an upper bound on unbudgeted latency
    pub fn worst_case_latency(&self) -> Duration {
        self.providers.iter().map(|p| p.default_timeout()).sum()
    }
}
