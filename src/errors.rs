//! Service error taxonomy and its HTTP mapping.

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use thiserror::Error;
use tracing::error;

/// Every failure a request handler can surface. Scan skips are not errors;
/// they live in the `scan_skipped` ledger.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Bad client input; plain-English message, never logged as an error.
    #[error("{0}")]
    Validation(String),

    /// The named entity does not exist (or is soft-deleted).
    #[error("{0} not found")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    /// The metadata upstream answered with a non-retryable failure. The
    /// upstream status and a truncated body travel in `details` for the
    /// caller's log; end users only see the short message.
    #[error("upstream metadata request failed")]
    Upstream {
        status: Option<u16>,
        details: String,
    },

    #[error("upstream metadata request timed out")]
    UpstreamTimeout,

    #[error("database error")]
    Database(#[from] sqlx::Error),

    // no #[from]: anyhow::Error is not a std Error, the impl lives below
    #[error("internal error")]
    Internal(anyhow::Error),
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::Internal(err)
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Upstream { .. } => StatusCode::BAD_GATEWAY,
            ApiError::UpstreamTimeout => StatusCode::GATEWAY_TIMEOUT,
            ApiError::Database(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        match self {
            ApiError::Database(e) => error!("database error: {e:?}"),
            ApiError::Internal(e) => error!("internal error: {e:?}"),
            ApiError::Upstream { status, details } => {
                error!("upstream failure (status {status:?}): {details}")
            }
            _ => {}
        }

        let mut body = serde_json::json!({ "error": self.to_string() });
        if let ApiError::Upstream { status, details } = self {
            body["details"] = serde_json::json!({
                "upstreamStatus": status,
                "body": details,
            });
        }
        HttpResponse::build(self.status_code()).json(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_kinds_to_status_codes() {
        assert_eq!(
            ApiError::Validation("bad".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::NotFound("artist".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::Conflict("scan already running".into()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::Upstream { status: Some(500), details: String::new() }.status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(ApiError::UpstreamTimeout.status_code(), StatusCode::GATEWAY_TIMEOUT);
    }

    #[test]
    fn not_found_names_the_entity() {
        assert_eq!(ApiError::NotFound("artist".into()).to_string(), "artist not found");
    }
}
