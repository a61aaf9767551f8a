//! uvgeo - Address geocoding and territorial unit (UV) assignment for Maipú
//!
//! This library provides shared types and modules for the server and ingest binaries.

pub mod assign;
pub mod config;
pub mod error;
pub mod geocode;
pub mod models;
pub mod uv;

pub use assign::{AddressAssignment, AssignDefaults, Assigner};
pub use error::AssignError;
pub use models::{GeocodeResult, GeocodeSource, TerritorialUnit, UvAssignment, UvGeometry};
