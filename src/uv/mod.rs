//! Territorial unit (UV) resolution.
//!
//! Polygons come from a [`UvStore`]: MySQL in production, or an R-tree
//! backed in-memory index loaded from GeoJSON.

pub mod geometry;
mod index;
mod resolver;
mod store;

pub use geometry::{distance_meters, min_vertex_distance, to_geojson, GeometryError};
pub use index::MemoryUvStore;
pub use resolver::{nearest_unit, UvResolver};
pub use store::{MySqlUvStore, StoreError, UnitRef, UvStore};
