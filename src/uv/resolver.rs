//! Point to territorial-unit resolution.

use std::sync::Arc;
use tracing::debug;

use super::geometry::min_vertex_distance;
use super::store::UvStore;
use crate::error::AssignError;
use crate::models::{TerritorialUnit, UvAssignment};

/// Resolves points against the polygon store: exact containment first,
/// nearest vertex otherwise.
#[derive(Clone)]
pub struct UvResolver {
    store: Arc<dyn UvStore>,
}

impl UvResolver {
    pub fn new(store: Arc<dyn UvStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn UvStore> {
        &self.store
    }

    pub async fn resolve(&self, lat: f64, lon: f64) -> Result<UvAssignment, AssignError> {
        if let Some(unit) = self.store.find_containing(lat, lon).await? {
            debug!("({}, {}) lies inside UV {} ({})", lat, lon, unit.id, unit.name);
            return Ok(UvAssignment::contained(unit.id, unit.name));
        }

        let units = self.store.load_units().await?;
        if units.is_empty() {
            return Err(AssignError::NoTerritorialUnits);
        }

        Ok(match nearest_unit(&units, lat, lon) {
            Some((unit, distance)) => {
                debug!(
                    "({}, {}) outside all UVs; nearest is {} at {:.1} m",
                    lat, lon, unit.id, distance
                );
                UvAssignment::nearest(unit.id, unit.name.clone(), distance)
            }
            None => UvAssignment::unresolved(),
        })
    }
}

/// Unit with the smallest vertex distance to the point. Ties keep the earlier
/// unit; units without vertices never win.
pub fn nearest_unit(
    units: &[TerritorialUnit],
    lat: f64,
    lon: f64,
) -> Option<(&TerritorialUnit, f64)> {
    let mut best: Option<(&TerritorialUnit, f64)> = None;
    for unit in units {
        let d = min_vertex_distance(unit.geometry.vertices(), lat, lon);
        if d.is_finite() && best.map_or(true, |(_, best_d)| d < best_d) {
            best = Some((unit, d));
        }
    }
    best
}
