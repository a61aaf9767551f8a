//! Spherical distance and GeoJSON geometry decoding.

use geo::{Coord, LineString, MultiPolygon, Polygon};
use serde::Deserialize;

use crate::models::{TerritorialUnit, UvGeometry};

/// Mean Earth radius used for haversine distances
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// Great-circle distance in meters between two lat/lon points (haversine).
pub fn distance_meters(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let p1 = lat1.to_radians();
    let p2 = lat2.to_radians();
    let dphi = (lat2 - lat1).to_radians();
    let dlambda = (lon2 - lon1).to_radians();

    let a = (dphi / 2.0).sin().powi(2) + p1.cos() * p2.cos() * (dlambda / 2.0).sin().powi(2);
    // Rounding can push `a` marginally above 1 for antipodal points
    2.0 * EARTH_RADIUS_METERS * a.sqrt().min(1.0).asin()
}

/// Minimum distance from the point to any vertex of `vertices`.
///
/// Edge interiors are ignored, so this overestimates the true distance to a
/// polygon whose nearest feature is the middle of a long edge.
pub fn min_vertex_distance<I>(vertices: I, lat: f64, lon: f64) -> f64
where
    I: IntoIterator<Item = Coord<f64>>,
{
    vertices
        .into_iter()
        .map(|c| distance_meters(lat, lon, c.y, c.x))
        .fold(f64::INFINITY, f64::min)
}

#[derive(Debug, thiserror::Error)]
pub enum GeometryError {
    #[error("invalid GeoJSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unsupported geometry type '{0}'")]
    Unsupported(String),

    #[error("position needs at least two coordinates")]
    ShortPosition,
}

type Position = Vec<f64>;
type Ring = Vec<Position>;

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum RawGeometry {
    Polygon { coordinates: Vec<Ring> },
    MultiPolygon { coordinates: Vec<Vec<Ring>> },
    #[serde(other)]
    Other,
}

/// Decode a GeoJSON Polygon or MultiPolygon.
pub fn decode_geojson(text: &str) -> Result<UvGeometry, GeometryError> {
    let value: serde_json::Value = serde_json::from_str(text)?;
    decode_geojson_value(&value)
}

/// Decode an already-parsed GeoJSON geometry object.
pub fn decode_geojson_value(value: &serde_json::Value) -> Result<UvGeometry, GeometryError> {
    match RawGeometry::deserialize(value)? {
        RawGeometry::Polygon { coordinates } => Ok(UvGeometry::Polygon(to_polygon(coordinates)?)),
        RawGeometry::MultiPolygon { coordinates } => {
            let polygons = coordinates
                .into_iter()
                .map(to_polygon)
                .collect::<Result<Vec<_>, _>>()?;
            Ok(UvGeometry::MultiPolygon(MultiPolygon::new(polygons)))
        }
        RawGeometry::Other => Err(GeometryError::Unsupported(
            value["type"].as_str().unwrap_or("<missing>").to_string(),
        )),
    }
}

/// Decode the features of a GeoJSON FeatureCollection into units.
///
/// Each feature needs an integer `id_uv` property and a Polygon or
/// MultiPolygon geometry; `nombre` defaults to an empty name. Features that
/// cannot be decoded are returned separately as `(index, reason)`.
pub fn units_from_feature_collection(
    value: &serde_json::Value,
) -> Result<(Vec<TerritorialUnit>, Vec<(usize, String)>), GeometryError> {
    let features = value["features"]
        .as_array()
        .ok_or_else(|| GeometryError::Unsupported("expected a FeatureCollection".to_string()))?;

    let mut units = Vec::with_capacity(features.len());
    let mut rejected = Vec::new();

    for (index, feature) in features.iter().enumerate() {
        let properties = &feature["properties"];
        let Some(id) = properties["id_uv"].as_i64() else {
            rejected.push((index, "missing integer id_uv".to_string()));
            continue;
        };
        let name = properties["nombre"].as_str().unwrap_or_default().to_string();

        match decode_geojson_value(&feature["geometry"]) {
            Ok(geometry) => units.push(TerritorialUnit { id, name, geometry }),
            Err(e) => rejected.push((index, format!("unit {id}: {e}"))),
        }
    }

    Ok((units, rejected))
}

/// Encode as a GeoJSON geometry object with `[lon, lat]` positions.
pub fn to_geojson(geometry: &UvGeometry) -> serde_json::Value {
    match geometry {
        UvGeometry::Polygon(p) => serde_json::json!({
            "type": "Polygon",
            "coordinates": polygon_rings(p),
        }),
        UvGeometry::MultiPolygon(mp) => serde_json::json!({
            "type": "MultiPolygon",
            "coordinates": mp.0.iter().map(polygon_rings).collect::<Vec<_>>(),
        }),
    }
}

fn polygon_rings(polygon: &Polygon<f64>) -> Vec<Vec<[f64; 2]>> {
    std::iter::once(polygon.exterior())
        .chain(polygon.interiors())
        .map(|ring| ring.0.iter().map(|c| [c.x, c.y]).collect())
        .collect()
}

fn to_polygon(rings: Vec<Ring>) -> Result<Polygon<f64>, GeometryError> {
    let mut rings = rings.into_iter().map(to_line_string);
    let exterior = match rings.next() {
        Some(ring) => ring?,
        None => LineString::new(vec![]),
    };
    let interiors = rings.collect::<Result<Vec<_>, _>>()?;
    Ok(Polygon::new(exterior, interiors))
}

/// Extra dimensions (elevation) are dropped
fn to_line_string(ring: Ring) -> Result<LineString<f64>, GeometryError> {
    ring.into_iter()
        .map(|pos| match pos.as_slice() {
            [x, y, ..] => Ok(Coord { x: *x, y: *y }),
            _ => Err(GeometryError::ShortPosition),
        })
        .collect::<Result<Vec<_>, _>>()
        .map(LineString::new)
}
