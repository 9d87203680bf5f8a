//! Error type for the API layer.
//!
//! [`ApiError`] maps every failure onto an HTTP status and renders it as
//! `{"error": <message>, "status": <code>}`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use citysim_core::CityError;

/// Errors returned by API handlers.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// A city operation failed.
    #[error(transparent)]
    City(#[from] CityError),

    /// A query parameter was out of range.
    #[error("invalid query: {0}")]
    InvalidQuery(String),
}

impl ApiError {
    /// HTTP status this error is reported with.
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::City(CityError::CityNotFound(_) | CityError::CarNotFound(_)) => StatusCode::NOT_FOUND,
            Self::City(CityError::InvalidSettings(_)) | Self::InvalidQuery(_) => StatusCode::BAD_REQUEST,
            Self::City(CityError::NotActive(_)) => StatusCode::CONFLICT,
            Self::City(CityError::Broker { .. }) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = serde_json::json!({
            "error": self.to_string(),
            "status": status.as_u16(),
        });

        (status, axum::Json(body)).into_response()
    }
}
