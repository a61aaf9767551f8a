//! Address and point to UV assignment.
//!
//! Used at resident registration to pick the UV automatically, and as an
//! administrative lookup.

use serde::Serialize;
use tracing::{debug, info};

use crate::error::AssignError;
use crate::geocode::{AddressQuery, GeocodeOrchestrator};
use crate::models::{GeocodeResult, UvAssignment};
use crate::uv::UvResolver;

/// Geocoded address together with its UV
#[derive(Debug, Clone, Serialize)]
pub struct AddressAssignment {
    pub geocoding: GeocodeResult,
    pub uv: UvAssignment,
}

/// Locality, country and budget applied when a request leaves them out
#[derive(Debug, Clone)]
pub struct AssignDefaults {
    pub locality: String,
    pub country: String,
    pub budget_ms: u64,
}

pub struct Assigner {
    orchestrator: GeocodeOrchestrator,
    resolver: UvResolver,
    defaults: AssignDefaults,
}

impl Assigner {
    pub fn new(
        orchestrator: GeocodeOrchestrator,
        resolver: UvResolver,
        defaults: AssignDefaults,
    ) -> Self {
        Self {
            orchestrator,
            resolver,
            defaults,
        }
    }

    pub fn resolver(&self) -> &UvResolver {
        &self.resolver
    }

    /// Geocode `address` and resolve its UV.
    pub async fn assign_address(
        &self,
        address: &str,
        locality: Option<&str>,
        country: Option<&str>,
        budget_ms: Option<u64>,
    ) -> Result<AddressAssignment, AssignError> {
        let address = address.trim();
        if address.is_empty() {
            return Err(AssignError::AddressNotFound);
        }

        let query = AddressQuery {
            address,
            locality: locality.unwrap_or(&self.defaults.locality),
            country: country.unwrap_or(&self.defaults.country),
        };
        let budget_ms = budget_ms.unwrap_or(self.defaults.budget_ms);
        debug!(
            "Assigning '{}' ({}, {}) with budget {} ms",
            query.address, query.locality, query.country, budget_ms
        );

        let geocoding = self
            .orchestrator
            .geocode(&query, budget_ms)
            .await
            .ok_or(AssignError::AddressNotFound)?;

        let uv = self
            .resolver
            .resolve(geocoding.latitude(), geocoding.longitude())
            .await?;

        info!(
            "'{}' -> UV {:?} (inside: {}, {:.1} m, source: {})",
            query.address,
            uv.uv_id,
            uv.inside,
            uv.distance_meters,
            geocoding.source()
        );
        Ok(AddressAssignment { geocoding, uv })
    }

    /// Resolve a raw coordinate, skipping geocoding.
    pub async fn assign_point(&self, lat: f64, lon: f64) -> Result<UvAssignment, AssignError> {
        self.resolver.resolve(lat, lon).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geocode::{GeoProvider, ProviderError, DEFAULT_BUDGET_MS};
    use crate::models::{GeocodeSource, TerritorialUnit, UvGeometry, MAIPU_BBOX};
    use crate::uv::MemoryUvStore;
    use async_trait::async_trait;
    use geo::polygon;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    struct FixedProvider {
        source: GeocodeSource,
        answer: Option<(f64, f64)>,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl GeoProvider for FixedProvider {
        fn source(&self) -> GeocodeSource {
            self.source
        }

        fn default_timeout(&self) -> Duration {
            Duration::from_secs(5)
        }

        async fn geocode(
            &self,
            query: &AddressQuery<'_>,
            _timeout: Duration,
        ) -> Result<GeocodeResult, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let (lat, lon) = self.answer.ok_or(ProviderError::NoResults)?;
            Ok(GeocodeResult::new(lat, lon, query.full_text(), self.source).unwrap())
        }
    }

    fn uv_centro() -> TerritorialUnit {
        TerritorialUnit {
            id: 3,
            name: "UV Centro".into(),
            geometry: UvGeometry::Polygon(polygon![
                (x: -70.78, y: -33.53),
                (x: -70.76, y: -33.53),
                (x: -70.76, y: -33.51),
                (x: -70.78, y: -33.51)
            ]),
        }
    }

    fn assigner(
        answers: &[(GeocodeSource, Option<(f64, f64)>)],
        units: Vec<TerritorialUnit>,
    ) -> (Assigner, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let providers = answers
            .iter()
            .map(|&(source, answer)| {
                Box::new(FixedProvider {
                    source,
                    answer,
                    calls: calls.clone(),
                }) as Box<dyn GeoProvider>
            })
            .collect();
        let orchestrator = GeocodeOrchestrator::new(providers, MAIPU_BBOX);
        let resolver = UvResolver::new(Arc::new(MemoryUvStore::build(units)));
        let defaults = AssignDefaults {
            locality: "Maipú".into(),
            country: "Chile".into(),
            budget_ms: DEFAULT_BUDGET_MS,
        };
        (Assigner::new(orchestrator, resolver, defaults), calls)
    }

    #[tokio::test]
    async fn test_address_inside_uv() {
        let (assigner, calls) = assigner(
            &[
                (GeocodeSource::Google, Some((-33.52, -70.77))),
                (GeocodeSource::Nominatim, Some((-33.52, -70.77))),
            ],
            vec![uv_centro()],
        );

        let result = assigner
            .assign_address("Las Naciones 857", Some("Maipú"), None, Some(12_000))
            .await
            .unwrap();

        assert_eq!(result.geocoding.source(), GeocodeSource::Google);
        assert_eq!(result.geocoding.display_name(), "Las Naciones 857, Maipú, Chile");
        assert_eq!(
            result.uv,
            UvAssignment {
                uv_id: Some(3),
                uv_name: Some("UV Centro".into()),
                inside: true,
                distance_meters: 0.0,
                edge: false,
            }
        );
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_address_not_found() {
        let (assigner, _) = assigner(
            &[
                (GeocodeSource::Google, None),
                (GeocodeSource::Nominatim, None),
            ],
            vec![uv_centro()],
        );
        let err = assigner
            .assign_address("Calle Inexistente 1", None, None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, AssignError::AddressNotFound));
    }

    #[tokio::test]
    async fn test_blank_address_skips_providers() {
        let (assigner, calls) = assigner(&[(GeocodeSource::Google, Some((-33.52, -70.77)))], vec![]);
        let err = assigner.assign_address("  ", None, None, None).await.unwrap_err();
        assert!(matches!(err, AssignError::AddressNotFound));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_outside_result_still_assigned() {
        // Only an out-of-area result exists; the nearest UV is still returned
        let (assigner, _) = assigner(
            &[(GeocodeSource::Nominatim, Some((-33.44, -70.65)))],
            vec![uv_centro()],
        );
        let result = assigner
            .assign_address("Alameda 100", None, None, None)
            .await
            .unwrap();
        assert_eq!(result.uv.uv_id, Some(3));
        assert!(!result.uv.inside);
        assert!(result.uv.distance_meters > 1_000.0);
    }

    #[tokio::test]
    async fn test_geocoded_but_no_units() {
        let (assigner, _) = assigner(&[(GeocodeSource::Google, Some((-33.52, -70.77)))], vec![]);
        let err = assigner
            .assign_address("Las Naciones 857", None, None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, AssignError::NoTerritorialUnits));
    }

    #[tokio::test]
    async fn test_point_mode_skips_geocoding() {
        let (assigner, calls) = assigner(&[(GeocodeSource::Google, None)], vec![uv_centro()]);
        let uv = assigner.assign_point(-33.52, -70.77).await.unwrap();
        assert_eq!(uv.uv_id, Some(3));
        assert!(uv.inside);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_serialized_shape() {
        let result = AddressAssignment {
            geocoding: GeocodeResult::new(-33.52, -70.77, "x", GeocodeSource::Google).unwrap(),
            uv: UvAssignment::nearest(4, "UV Sur".into(), 12.5),
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["geocoding"]["source"], "google");
        assert_eq!(json["uv"]["id_uv"], 4);
        assert_eq!(json["uv"]["nombre"], "UV Sur");
        assert_eq!(json["uv"]["dist_m"], 12.5);
        assert_eq!(json["uv"]["edge"], true);
    }
}
