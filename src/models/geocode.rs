//! Geocoding result types and the trusted municipal bounding box.

use serde::{Deserialize, Serialize};

/// Approximate extent of Maipú as `(min_lon, min_lat, max_lon, max_lat)`.
pub const MAIPU_BBOX: BoundingBox = BoundingBox {
    min_lon: -70.873,
    min_lat: -33.625,
    max_lon: -70.683,
    max_lat: -33.455,
};

/// Provider that produced a geocoding result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeocodeSource {
    Google,
    Nominatim,
    Geoapify,
    Opencage,
}

impl std::fmt::Display for GeocodeSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GeocodeSource::Google => write!(f, "google"),
            GeocodeSource::Nominatim => write!(f, "nominatim"),
            GeocodeSource::Geoapify => write!(f, "geoapify"),
            GeocodeSource::Opencage => write!(f, "opencage"),
        }
    }
}

/// A resolved address in WGS84 decimal degrees.
///
/// Fields are private so a result can only be built through [`GeocodeResult::new`],
/// which rejects out-of-range coordinates.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeocodeResult {
    #[serde(rename = "lat")]
    latitude: f64,
    #[serde(rename = "lon")]
    longitude: f64,
    display_name: String,
    source: GeocodeSource,
}

impl GeocodeResult {
    /// Returns `None` when the coordinates are not finite or fall outside WGS84 ranges.
    pub fn new(
        latitude: f64,
        longitude: f64,
        display_name: impl Into<String>,
        source: GeocodeSource,
    ) -> Option<Self> {
        if !valid_coordinates(latitude, longitude) {
            return None;
        }
        Some(Self {
            latitude,
            longitude,
            display_name: display_name.into(),
            source,
        })
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn source(&self) -> GeocodeSource {
        self.source
    }
}

/// Check that a lat/lon pair lies within WGS84 ranges
pub fn valid_coordinates(lat: f64, lon: f64) -> bool {
    lat.is_finite() && lon.is_finite() && (-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lon)
}

/// Axis-aligned rectangle in lon/lat
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
}

impl BoundingBox {
    /// Inclusive on every edge.
    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        (self.min_lat..=self.max_lat).contains(&lat) && (self.min_lon..=self.max_lon).contains(&lon)
    }

    pub fn contains_result(&self, result: &GeocodeResult) -> bool {
        self.contains(result.latitude(), result.longitude())
    }

    /// Format as `minLon,minLat,maxLon,maxLat`
    pub fn to_rect_param(&self) -> String {
        format!(
            "{},{},{},{}",
            self.min_lon, self.min_lat, self.max_lon, self.max_lat
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_rejects_invalid_coordinates() {
        assert!(GeocodeResult::new(91.0, 0.0, "", GeocodeSource::Google).is_none());
        assert!(GeocodeResult::new(0.0, -180.5, "", GeocodeSource::Google).is_none());
        assert!(GeocodeResult::new(f64::NAN, 0.0, "", GeocodeSource::Google).is_none());
        assert!(GeocodeResult::new(-33.52, -70.77, "x", GeocodeSource::Nominatim).is_some());
    }

    #[test]
    fn test_maipu_bbox() {
        assert!(MAIPU_BBOX.contains(-33.52, -70.77));
        assert!(MAIPU_BBOX.contains(-33.455, -70.683));
        // Santiago centre lies east of the box
        assert!(!MAIPU_BBOX.contains(-33.4372, -70.6506));
        assert!(!MAIPU_BBOX.contains(-70.77, -33.52));
    }

    #[test]
    fn test_serialized_shape() {
        let result = GeocodeResult::new(-33.52, -70.77, "Las Naciones 857", GeocodeSource::Google)
            .unwrap();
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["lat"], -33.52);
        assert_eq!(json["lon"], -70.77);
        assert_eq!(json["display_name"], "Las Naciones 857");
        assert_eq!(json["source"], "google");
    }
}
