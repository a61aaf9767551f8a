//! Terminal failures of an assignment request.

use thiserror::Error;

use crate::uv::StoreError;

#[derive(Debug, Error)]
pub enum AssignError {
    /// Every provider was exhausted without a usable result
    #[error("address not found")]
    AddressNotFound,

    #[error("no territorial units configured")]
    NoTerritorialUnits,

    #[error(transparent)]
    Storage(#[from] StoreError),
}
