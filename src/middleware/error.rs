use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::error::AuthError;

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, detail) = match &self {
            Self::Unauthenticated => (
                StatusCode::UNAUTHORIZED,
                "Invalid or missing authentication".to_string(),
            ),
            Self::Forbidden => (StatusCode::FORBIDDEN, "User is banned".to_string()),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            Self::Store(_) | Self::Internal(_) => {
                tracing::error!(error = %self, "Auth internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal error".to_string(),
                )
            }
        };
        (status, Json(json!({ "detail": detail }))).into_response()
    }
}
