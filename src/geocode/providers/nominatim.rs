//! OpenStreetMap Nominatim adapter.
//!
//! Two phases. When a house number can be split off the address, a
//! structured query is tried first and only house/building-level candidates
//! are accepted. Otherwise (or when that finds nothing) several free-text
//! phrasings are tried in order and the best candidate of the first
//! non-empty response wins.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use super::{fetch_json, make_result, parse_coord, AddressQuery, GeoProvider, ProviderError};
use crate::config::ProviderConfig;
use crate::geocode::budget::TimeBudget;
use crate::geocode::normalize::split_address;
use crate::models::{GeocodeResult, GeocodeSource};

/// Alternate spellings of the default locality, tried as extra free-text variants
const LOCALITY_SPELLINGS: &[&str] = &["Maipu", "Maipú"];

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct NominatimItem {
    lat: serde_json::Value,
    lon: serde_json::Value,
    #[serde(default)]
    display_name: String,
    #[serde(default, rename = "type")]
    place_type: Option<String>,
    #[serde(default)]
    addresstype: Option<String>,
    #[serde(default)]
    importance: Option<f64>,
    #[serde(default)]
    address: Option<NominatimAddress>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct NominatimAddress {
    #[serde(default)]
    house_number: Option<String>,
}

impl NominatimItem {
    fn importance(&self) -> f64 {
        self.importance.unwrap_or(0.0)
    }

    fn place_type(&self) -> String {
        self.place_type.as_deref().unwrap_or("").to_lowercase()
    }

    /// Explicitly a house/building or carrying a house number
    fn is_house(&self) -> bool {
        let t = self.place_type();
        let at = self.addresstype.as_deref().unwrap_or("").to_lowercase();
        matches!(t.as_str(), "house" | "building")
            || matches!(at.as_str(), "house" | "building")
            || self
                .address
                .as_ref()
                .and_then(|a| a.house_number.as_deref())
                .is_some_and(|n| !n.is_empty())
    }

    fn type_weight(&self) -> u8 {
        match self.place_type().as_str() {
            "house" => 3,
            "building" | "address" => 2,
            "residential" => 1,
            _ => 0,
        }
    }

    fn into_result(self) -> Result<GeocodeResult, ProviderError> {
        let lat = parse_coord(&self.lat)
            .ok_or_else(|| ProviderError::Decode(format!("bad lat {}", self.lat)))?;
        let lon = parse_coord(&self.lon)
            .ok_or_else(|| ProviderError::Decode(format!("bad lon {}", self.lon)))?;
        make_result(lat, lon, self.display_name, GeocodeSource::Nominatim)
    }
}

/// First element with the maximal key; later equal keys do not displace it.
fn first_max_by<T, F>(items: Vec<T>, mut cmp: F) -> Option<T>
where
    F: FnMut(&T, &T) -> std::cmp::Ordering,
{
    let mut best: Option<T> = None;
    for item in items {
        match &best {
            Some(current) if cmp(&item, current).is_le() => {}
            _ => best = Some(item),
        }
    }
    best
}

/// Highest-importance house-level candidate from a structured response
pub(crate) fn pick_structured(items: Vec<NominatimItem>) -> Option<NominatimItem> {
    let houses: Vec<NominatimItem> = items.into_iter().filter(NominatimItem::is_house).collect();
    first_max_by(houses, |a, b| a.importance().total_cmp(&b.importance()))
}

/// Best candidate by (place-type weight, importance)
pub(crate) fn pick_free_text(items: Vec<NominatimItem>) -> Option<NominatimItem> {
    first_max_by(items, |a, b| {
        a.type_weight()
            .cmp(&b.type_weight())
            .then(a.importance().total_cmp(&b.importance()))
    })
}

pub struct NominatimProvider {
    client: Client,
    config: ProviderConfig,
    country_code: String,
    region: String,
}

impl NominatimProvider {
    pub fn new(client: Client, config: ProviderConfig, country_code: &str, region: &str) -> Self {
        Self {
            client,
            config,
            country_code: country_code.to_string(),
            region: region.to_string(),
        }
    }

    async fn search(
        &self,
        params: &[(&str, &str)],
        timeout: Duration,
    ) -> Result<Vec<NominatimItem>, ProviderError> {
        let request = self
            .client
            .get(self.config.endpoint.clone())
            .header(reqwest::header::ACCEPT_LANGUAGE, "es")
            .query(&[
                ("format", "jsonv2"),
                ("addressdetails", "1"),
                ("limit", "5"),
                ("polygon_geojson", "0"),
            ])
            .query(params);
        // Nominatim answers an empty array, or `null` on some mirrors
        let items: Option<Vec<NominatimItem>> = fetch_json(request, timeout).await?;
        Ok(items.unwrap_or_default())
    }

    /// Free-text phrasings, most specific first, without duplicates
    fn free_text_variants(&self, query: &AddressQuery<'_>, street: &str) -> Vec<String> {
        let mut variants = vec![
            query.full_text(),
            format!(
                "{}, {}, {}, {}",
                query.address, query.locality, self.region, query.country
            ),
            format!("{}, {}", query.address, query.country),
            format!("{}, {}, {}", street, query.locality, query.country),
        ];
        for spelling in LOCALITY_SPELLINGS {
            variants.push(format!("{}, {}, {}", street, spelling, query.country));
        }

        let mut seen = std::collections::HashSet::new();
        variants.retain(|v| seen.insert(v.clone()));
        variants
    }
}

#[async_trait]
impl GeoProvider for NominatimProvider {
    fn source(&self) -> GeocodeSource {
        GeocodeSource::Nominatim
    }

    fn default_timeout(&self) -> Duration {
        self.config.timeout()
    }

    async fn geocode(
        &self,
        query: &AddressQuery<'_>,
        timeout: Duration,
    ) -> Result<GeocodeResult, ProviderError> {
        // All requests of this call share the caller's timeout
        let budget = TimeBudget::with_total(timeout);
        let parts = split_address(query.address);
        let mut last_error = ProviderError::NoResults;

        if let Some(number) = &parts.house_number {
            let street = format!("{} {}", number, parts.street);
            if let Some(t) = budget.timeout_for(timeout) {
                let params = [
                    ("street", street.as_str()),
                    ("city", query.locality),
                    ("country", query.country),
                ];
                match self.search(&params, t).await {
                    Ok(items) => {
                        if let Some(best) = pick_structured(items) {
                            match best.into_result() {
                                Ok(result) => {
                                    debug!("Nominatim structured hit for '{}'", query.address);
                                    return Ok(result);
                                }
                                Err(e) => {
                                    debug!("Nominatim structured candidate unusable: {}", e);
                                    last_error = e;
                                }
                            }
                        }
                    }
                    Err(e) => {
                        debug!("Nominatim structured query failed: {}", e);
                        last_error = e;
                    }
                }
            }
        }

        for variant in self.free_text_variants(query, &parts.street) {
            let Some(t) = budget.timeout_for(timeout) else {
                break;
            };
            let params = [
                ("q", variant.as_str()),
                ("countrycodes", self.country_code.as_str()),
            ];
            match self.search(&params, t).await {
                Ok(items) => {
                    if let Some(best) = pick_free_text(items) {
                        match best.into_result() {
                            Ok(result) => {
                                debug!("Nominatim free-text hit with '{}'", variant);
                                return Ok(result);
                            }
                            Err(e) => {
                                debug!("Nominatim candidate for '{}' unusable: {}", variant, e);
                                last_error = e;
                            }
                        }
                    }
                }
                Err(e) => {
                    debug!("Nominatim query '{}' failed: {}", variant, e);
                    last_error = e;
                }
            }
        }

        Err(last_error)
    }
}
