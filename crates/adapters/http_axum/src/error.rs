//! HTTP error response mapping.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use visionhub_domain::error::{NotFoundError, VisionHubError};

/// JSON error body returned by API endpoints.
#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

/// Maps [`VisionHubError`] to an HTTP response with appropriate status code.
#[derive(Debug)]
pub struct ApiError(VisionHubError);

impl ApiError {
    /// A 404 for an entity id that is unknown or does not parse.
    pub(crate) fn not_found(entity: &'static str, id: &str) -> Self {
        Self(
            NotFoundError {
                entity,
                id: id.to_string(),
            }
            .into(),
        )
    }
}

impl From<VisionHubError> for ApiError {
    fn from(err: VisionHubError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self.0 {
            VisionHubError::Validation(err) => (StatusCode::BAD_REQUEST, err.to_string()),
            VisionHubError::InvalidStatus(err) => (StatusCode::BAD_REQUEST, err.to_string()),
            VisionHubError::NotFound(err) => (StatusCode::NOT_FOUND, err.to_string()),
            VisionHubError::Storage(err) => {
                tracing::error!(error = %err, "storage error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_string(),
                )
            }
        };

        (status, Json(ErrorBody { error: message })).into_response()
    }
}
