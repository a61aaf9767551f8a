//! In-memory polygon store backed by an R-tree.

use async_trait::async_trait;
use geo::{BoundingRect, Contains, MultiPolygon, Point};
use rstar::{RTree, RTreeObject, AABB};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use super::geometry::units_from_feature_collection;
use super::store::{StoreError, UnitRef, UvStore};
use crate::models::TerritorialUnit;

/// Wrapper for R-tree indexing of territorial units
#[derive(Clone)]
struct IndexedUnit {
    /// Position in load order; containment ties resolve to the lowest
    position: usize,
    unit: Arc<TerritorialUnit>,
    shape: MultiPolygon<f64>,
    envelope: AABB<[f64; 2]>,
}

impl RTreeObject for IndexedUnit {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

impl IndexedUnit {
    /// `None` for units without any vertex
    fn new(position: usize, unit: Arc<TerritorialUnit>) -> Option<Self> {
        let shape = unit.geometry.to_multi_polygon();
        let rect = shape.bounding_rect()?;
        Some(Self {
            position,
            unit,
            shape,
            envelope: AABB::from_corners(
                [rect.min().x, rect.min().y],
                [rect.max().x, rect.max().y],
            ),
        })
    }
}

/// Units held in memory, loaded once from a GeoJSON FeatureCollection
pub struct MemoryUvStore {
    units: Vec<Arc<TerritorialUnit>>,
    tree: RTree<IndexedUnit>,
}

impl MemoryUvStore {
    pub fn build(units: Vec<TerritorialUnit>) -> Self {
        let units: Vec<Arc<TerritorialUnit>> = units.into_iter().map(Arc::new).collect();
        let indexed: Vec<IndexedUnit> = units
            .iter()
            .enumerate()
            .filter_map(|(i, u)| IndexedUnit::new(i, Arc::clone(u)))
            .collect();

        let tree = RTree::bulk_load(indexed);
        info!(
            "Spatial index built with {} of {} units",
            tree.size(),
            units.len()
        );

        Self { units, tree }
    }

    /// Load from a GeoJSON file. Undecodable features are skipped with a warning.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let path = path.as_ref();
        info!("Loading UV polygons from {}", path.display());

        let text = std::fs::read_to_string(path)?;
        let value: serde_json::Value = serde_json::from_str(&text)
            .map_err(|e| StoreError::Geometry(e.into()))?;
        let (units, rejected) = units_from_feature_collection(&value)?;

        for (index, reason) in &rejected {
            warn!("Skipping feature #{}: {}", index, reason);
        }

        Ok(Self::build(units))
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    fn lookup(&self, lat: f64, lon: f64) -> Option<&Arc<TerritorialUnit>> {
        let point = Point::new(lon, lat);
        let query_envelope = AABB::from_point([lon, lat]);

        // Envelope candidates from the R-tree, then exact containment
        self.tree
            .locate_in_envelope_intersecting(&query_envelope)
            .filter(|iu| iu.shape.contains(&point))
            .min_by_key(|iu| iu.position)
            .map(|iu| &iu.unit)
    }
}

fn unit_ref(unit: &TerritorialUnit) -> UnitRef {
    UnitRef {
        id: unit.id,
        name: unit.name.clone(),
    }
}

#[async_trait]
impl UvStore for MemoryUvStore {
    async fn find_containing(&self, lat: f64, lon: f64) -> Result<Option<UnitRef>, StoreError> {
        Ok(self.lookup(lat, lon).map(|u| unit_ref(u)))
    }

    async fn load_units(&self) -> Result<Vec<TerritorialUnit>, StoreError> {
        Ok(self.units.iter().map(|u| TerritorialUnit::clone(u)).collect())
    }

    async fn list_units(&self) -> Result<Vec<UnitRef>, StoreError> {
        Ok(self.units.iter().map(|u| unit_ref(u)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UvGeometry;
    use geo::polygon;
    use std::io::Write;

    fn square(id: i64, name: &str, min_lon: f64, min_lat: f64, size: f64) -> TerritorialUnit {
        TerritorialUnit {
            id,
            name: name.to_string(),
            geometry: UvGeometry::Polygon(polygon![
                (x: min_lon, y: min_lat),
                (x: min_lon + size, y: min_lat),
                (x: min_lon + size, y: min_lat + size),
                (x: min_lon, y: min_lat + size)
            ]),
        }
    }

    #[tokio::test]
    async fn test_containment() {
        let store = MemoryUvStore::build(vec![
            square(1, "UV Poniente", -70.80, -33.55, 0.02),
            square(3, "UV Centro", -70.78, -33.53, 0.02),
        ]);

        let hit = store.find_containing(-33.52, -70.77).await.unwrap().unwrap();
        assert_eq!(hit, UnitRef { id: 3, name: "UV Centro".into() });

        assert!(store.find_containing(-33.40, -70.60).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_overlap_resolves_to_first_loaded() {
        let store = MemoryUvStore::build(vec![
            square(7, "Primera", -70.80, -33.55, 0.10),
            square(2, "Segunda", -70.80, -33.55, 0.10),
        ]);
        let hit = store.find_containing(-33.50, -70.75).await.unwrap().unwrap();
        assert_eq!(hit.id, 7);
    }

    #[tokio::test]
    async fn test_boundary_point_is_not_contained() {
        let store = MemoryUvStore::build(vec![square(1, "A", 0.0, 0.0, 1.0)]);
        assert!(store.find_containing(0.0, 0.5).await.unwrap().is_none());
        assert!(store.find_containing(0.5, 0.5).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_empty_geometry_is_listed_but_not_indexed() {
        let empty = TerritorialUnit {
            id: 9,
            name: "Sin límites".into(),
            geometry: UvGeometry::MultiPolygon(MultiPolygon::new(vec![])),
        };
        let store = MemoryUvStore::build(vec![empty, square(1, "A", 0.0, 0.0, 1.0)]);
        assert_eq!(store.len(), 2);
        assert_eq!(store.list_units().await.unwrap().len(), 2);
        assert_eq!(store.find_containing(0.5, 0.5).await.unwrap().unwrap().id, 1);
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"type": "FeatureCollection", "features": [
                {{"type": "Feature", "properties": {{"id_uv": 3, "nombre": "UV Centro"}},
                  "geometry": {{"type": "Polygon", "coordinates": [[[-70.78, -33.53], [-70.76, -33.53], [-70.76, -33.51], [-70.78, -33.51], [-70.78, -33.53]]]}}}},
                {{"type": "Feature", "properties": {{"id_uv": 4}}, "geometry": null}}
            ]}}"#
        )
        .unwrap();

        let store = MemoryUvStore::load_from_file(file.path()).unwrap();
        assert_eq!(store.len(), 1);
        let units = store.load_units().await.unwrap();
        assert_eq!(units[0].name, "UV Centro");
    }

    #[test]
    fn test_missing_file() {
        let err = MemoryUvStore::load_from_file("/nonexistent/uv.geojson").err().unwrap();
        assert!(matches!(err, StoreError::Io(_)));
    }
}
