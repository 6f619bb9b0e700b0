use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use livelog_core::LiveError;

/// Application-level errors that map directly to HTTP responses.
///
/// Every variant implements [`IntoResponse`] so Axum handlers can use
/// `Result<impl IntoResponse, AppError>` as their return type.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<LiveError> for AppError {
    fn from(err: LiveError) -> Self {
        match err {
            LiveError::SiteNotFound(_) => AppError::NotFound("Site not found".to_string()),
            err if err.is_validation() => AppError::BadRequest(err.to_string()),
            err => AppError::Internal(err.into()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg.as_str()),
            AppError::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                "validation_error",
                msg.as_str(),
            ),
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:#}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "Internal server error",
                )
            }
        };

        (
            status,
            Json(json!({
                "error": {
                    "code": code,
                    "message": message,
                    "field": null
                }
            })),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use livelog_core::segment::SegmentError;

    use super::*;

    #[test]
    fn live_errors_map_onto_status_codes() {
        let cases = [
            (LiveError::SiteNotFound(9), StatusCode::NOT_FOUND),
            (
                LiveError::InvalidPeriod("fortnight".to_string()),
                StatusCode::BAD_REQUEST,
            ),
            (
                LiveError::Segment(SegmentError::UnknownDimension("planet".to_string())),
                StatusCode::BAD_REQUEST,
            ),
            (
                LiveError::Database(anyhow::anyhow!("disk full")),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(AppError::from(err).into_response().status(), status);
        }
    }

    #[test]
    fn validation_message_names_the_input() {
        let err = AppError::from(LiveError::InvalidPeriod("fortnight".to_string()));
        assert!(matches!(err, AppError::BadRequest(ref m) if m.contains("fortnight")));
    }
}
