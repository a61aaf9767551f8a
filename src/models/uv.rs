//! Territorial unit (UV) types.

use geo::{MultiPolygon, Polygon};
use serde::Serialize;

/// Nearest-vertex distance below which an approximate assignment is flagged as `edge`.
pub const EDGE_THRESHOLD_METERS: f64 = 30.0;

/// Geometry of a territorial unit, decoded once at the storage boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum UvGeometry {
    Polygon(Polygon<f64>),
    MultiPolygon(MultiPolygon<f64>),
}

impl UvGeometry {
    /// Every vertex of every ring (exterior and interiors), for all constituent polygons.
    pub fn vertices(&self) -> Box<dyn Iterator<Item = geo::Coord<f64>> + '_> {
        match self {
            UvGeometry::Polygon(p) => Box::new(polygon_vertices(p)),
            UvGeometry::MultiPolygon(mp) => Box::new(mp.0.iter().flat_map(polygon_vertices)),
        }
    }

    /// View as a multipolygon, for containment and envelope computation
    pub fn to_multi_polygon(&self) -> MultiPolygon<f64> {
        match self {
            UvGeometry::Polygon(p) => MultiPolygon::new(vec![p.clone()]),
            UvGeometry::MultiPolygon(mp) => mp.clone(),
        }
    }
}

fn polygon_vertices(polygon: &Polygon<f64>) -> impl Iterator<Item = geo::Coord<f64>> + '_ {
    std::iter::once(polygon.exterior())
        .chain(polygon.interiors())
        .flat_map(|ring| ring.0.iter().copied())
}

/// A neighbourhood unit as read from the polygon store
#[derive(Debug, Clone)]
pub struct TerritorialUnit {
    pub id: i64,
    pub name: String,
    pub geometry: UvGeometry,
}

/// Outcome of resolving a point against the configured units.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UvAssignment {
    #[serde(rename = "id_uv")]
    pub uv_id: Option<i64>,
    #[serde(rename = "nombre")]
    pub uv_name: Option<String>,
    /// Point lies strictly inside the unit's polygon
    pub inside: bool,
    /// 0 when `inside`, otherwise the nearest vertex distance
    #[serde(rename = "dist_m")]
    pub distance_meters: f64,
    pub edge: bool,
}

impl UvAssignment {
    pub fn contained(id: i64, name: String) -> Self {
        Self {
            uv_id: Some(id),
            uv_name: Some(name),
            inside: true,
            distance_meters: 0.0,
            edge: false,
        }
    }

    pub fn nearest(id: i64, name: String, distance_meters: f64) -> Self {
        Self {
            uv_id: Some(id),
            uv_name: Some(name),
            inside: false,
            distance_meters,
            edge: distance_meters < EDGE_THRESHOLD_METERS,
        }
    }

    /// Units exist but none carries a usable vertex
    pub fn unresolved() -> Self {
        Self {
            uv_id: None,
            uv_name: None,
            inside: false,
            distance_meters: f64::INFINITY,
            edge: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{polygon, LineString};

    #[test]
    fn test_vertices_cover_interiors_and_members() {
        let with_hole = Polygon::new(
            LineString::from(vec![(0.0, 0.0), (4.0, 0.0), (4.0, 4.0), (0.0, 0.0)]),
            vec![LineString::from(vec![(1.0, 1.0), (2.0, 1.0), (1.0, 1.0)])],
        );
        assert_eq!(UvGeometry::Polygon(with_hole.clone()).vertices().count(), 7);

        let other = polygon![(x: 10.0, y: 10.0), (x: 11.0, y: 10.0), (x: 11.0, y: 11.0)];
        let multi = UvGeometry::MultiPolygon(MultiPolygon::new(vec![with_hole, other]));
        // polygon! closes the ring, adding a fourth vertex
        assert_eq!(multi.vertices().count(), 11);
    }

    #[test]
    fn test_edge_threshold() {
        assert!(UvAssignment::nearest(1, "A".into(), 18.0).edge);
        assert!(!UvAssignment::nearest(1, "A".into(), 45.0).edge);
        assert!(!UvAssignment::nearest(1, "A".into(), 30.0).edge);
        assert!(!UvAssignment::contained(1, "A".into()).edge);
    }
}
