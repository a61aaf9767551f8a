//! Core data models for address geocoding and UV assignment.

pub mod geocode;
pub mod uv;

pub use geocode::{BoundingBox, GeocodeResult, GeocodeSource, MAIPU_BBOX};
pub use uv::{TerritorialUnit, UvAssignment, UvGeometry, EDGE_THRESHOLD_METERS};
