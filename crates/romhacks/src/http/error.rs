//! Mapping of crate errors onto HTTP responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::error;

use crate::error::Error;

impl Error {
    /// The HTTP status this error is reported with.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Validation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::AdminDisabled => StatusCode::SERVICE_UNAVAILABLE,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::InvalidMonth(_) | Self::BadRequest(_) | Self::Import { .. } => {
                StatusCode::BAD_REQUEST
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let body = match &self {
            Self::Validation { issues } => json!({
                "success": false,
                "error": "validation failed",
                "issues": issues,
            }),
            _ if status.is_server_error() && status != StatusCode::SERVICE_UNAVAILABLE => {
                // Internal details stay in the log
                error!(error = %self, "Request failed");
                json!({ "success": false, "error": "internal server error" })
            }
            _ => json!({ "success": false, "error": self.to_string() }),
        };

        (status, Json(body)).into_response()
    }
}
