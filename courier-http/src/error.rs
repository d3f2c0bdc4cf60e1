//! API error mapping

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use courier_dispatch::DispatchError;
use courier_transport::ValidationError;
use serde::Serialize;
use thiserror::Error;

/// Failures surfaced to API callers.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request is malformed; nothing was enqueued.
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// The job was enqueued but ultimately rejected.
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

#[derive(Debug, Serialize)]
pub(crate) struct ErrorBody {
    pub(crate) error: &'static str,
    pub(crate) detail: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind) = match &self {
            Self::Validation(_) => (StatusCode::BAD_REQUEST, "validation"),
            Self::Dispatch(_) => (StatusCode::INTERNAL_SERVER_ERROR, "dispatch"),
        };

        if status.is_server_error() {
            tracing::warn!(status = %status, error = %self, "request failed");
        }

        (
            status,
            Json(ErrorBody {
                error: kind,
                detail: self.to_string(),
            }),
        )
            .into_response()
    }
}
