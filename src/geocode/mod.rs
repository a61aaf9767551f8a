//! Address geocoding: normalisation, provider adapters and the orchestrator.

pub mod budget;
pub mod normalize;
pub mod orchestrator;
pub mod providers;

pub use budget::{clamp_budget_ms, TimeBudget, DEFAULT_BUDGET_MS};
pub use normalize::{split_address, AddressParts};
pub use orchestrator::GeocodeOrchestrator;
pub use providers::{AddressQuery, GeoProvider, ProviderError};
