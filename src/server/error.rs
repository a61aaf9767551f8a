use axum::{
    extract::rejection::QueryRejection,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;
use thiserror::Error;

use uvgeo::uv::StoreError;
use uvgeo::AssignError;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Assign(#[from] AssignError),

    #[error("{0}")]
    Store(#[from] StoreError),
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Assign(AssignError::AddressNotFound) => StatusCode::NOT_FOUND,
            ApiError::Assign(AssignError::NoTerritorialUnits) => StatusCode::NOT_FOUND,
            ApiError::Assign(AssignError::Storage(_)) | ApiError::Store(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        }

        (status, Json(json!({ "ok": false, "detail": self.to_string() }))).into_response()
    }
}
