//! API Error Handling
//!
//! Structured error responses with HTTP status codes and request tracking.

use crate::errors::{CaseboxError, LedgerError, UpstreamError};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;
use tracing::error;

/// Top-level API error response with request tracking
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub request_id: String,
    pub error: ErrorBody,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    /// NOT_FOUND, BAD_REQUEST, UNAUTHORIZED, UPSTREAM_FAILURE or INTERNAL_ERROR
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

#[derive(Debug)]
pub struct ApiError {
    pub kind: ApiErrorKind,
    pub request_id: String,
    pub details: Option<serde_json::Value>,
}

#[derive(Debug)]
pub enum ApiErrorKind {
    NotFound(String),
    BadRequest(String),
    Unauthorized(String),
    UpstreamFailure(String),
    InternalError(String),
}

impl ApiError {
    fn new(kind: ApiErrorKind, request_id: String) -> Self {
        Self {
            kind,
            request_id,
            details: None,
        }
    }

    pub fn not_found(request_id: String, message: String) -> Self {
        Self::new(ApiErrorKind::NotFound(message), request_id)
    }

    pub fn bad_request(request_id: String, message: String) -> Self {
        Self::new(ApiErrorKind::BadRequest(message), request_id)
    }

    pub fn unauthorized(request_id: String, message: String) -> Self {
        Self::new(ApiErrorKind::Unauthorized(message), request_id)
    }

    pub fn upstream_failure(request_id: String, message: String) -> Self {
        Self::new(ApiErrorKind::UpstreamFailure(message), request_id)
    }

    pub fn internal_error(request_id: String, message: String) -> Self {
        Self::new(ApiErrorKind::InternalError(message), request_id)
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Map a domain error onto the HTTP taxonomy
    pub fn from_domain(request_id: String, err: CaseboxError) -> Self {
        match err {
            CaseboxError::NotFound { .. } => Self::not_found(request_id, err.to_string()),
            CaseboxError::InvalidInput(msg) => Self::bad_request(request_id, msg),
            CaseboxError::Unauthorized(msg) => Self::unauthorized(request_id, msg),
            CaseboxError::Ledger(LedgerError::InsufficientFunds { balance, required }) => {
                Self::bad_request(request_id, "Insufficient balance".to_string())
                    .with_details(json!({ "balance": balance, "required": required }))
            }
            CaseboxError::Ledger(e) => Self::bad_request(request_id, e.to_string()),
            // The provider answered but refused the request (bad asset, amount)
            CaseboxError::Upstream(e @ UpstreamError::Rejected { .. }) => {
                Self::bad_request(request_id, e.to_string())
            }
            CaseboxError::Upstream(e) => Self::upstream_failure(request_id, e.to_string()),
            CaseboxError::Configuration(_) | CaseboxError::Storage(_) => {
                error!(request_id = %request_id, error = %err, "Internal failure");
                Self::internal_error(request_id, "Internal server error".to_string())
            }
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ApiErrorKind::NotFound(msg) => write!(f, "[{}] Not Found: {}", self.request_id, msg),
            ApiErrorKind::BadRequest(msg) => write!(f, "[{}] Bad Request: {}", self.request_id, msg),
            ApiErrorKind::Unauthorized(msg) => write!(f, "[{}] Unauthorized: {}", self.request_id, msg),
            ApiErrorKind::UpstreamFailure(msg) => write!(f, "[{}] Upstream Failure: {}", self.request_id, msg),
            ApiErrorKind::InternalError(msg) => write!(f, "[{}] Internal Error: {}", self.request_id, msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self.kind {
            ApiErrorKind::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            ApiErrorKind::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiErrorKind::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg),
            ApiErrorKind::UpstreamFailure(msg) => (StatusCode::BAD_GATEWAY, "UPSTREAM_FAILURE", msg),
            ApiErrorKind::InternalError(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg)
            }
        };

        let body = Json(ErrorResponse {
            request_id: self.request_id,
            error: ErrorBody {
                code: code.to_string(),
                message,
                details: self.details,
            },
        });

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::StorageError;

    fn status_of(err: CaseboxError) -> StatusCode {
        ApiError::from_domain("rid".to_string(), err).into_response().status()
    }

    #[test]
    fn test_domain_mapping() {
        assert_eq!(status_of(CaseboxError::not_found("Case", "x")), StatusCode::NOT_FOUND);
        assert_eq!(
            status_of(LedgerError::InsufficientFunds { balance: 1, required: 2 }.into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(status_of(LedgerError::NonPositiveAmount(0).into()), StatusCode::BAD_REQUEST);
        assert_eq!(
            status_of(LedgerError::BalanceOverflow { balance: i64::MAX, delta: 1 }.into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(status_of(LedgerError::AmountOutOfRange(1e300).into()), StatusCode::BAD_REQUEST);
        assert_eq!(
            status_of(CaseboxError::Unauthorized("Token expired".into())),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            status_of(UpstreamError::BadStatus { service: "steam", status: 503 }.into()),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            status_of(UpstreamError::Rejected { service: "crypto_pay", message: "no".into() }.into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(StorageError::ReadFailed("io".into()).into()),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_internal_details_are_hidden() {
        let err = ApiError::from_domain("rid".to_string(), StorageError::ReadFailed("disk on fire".into()).into());
        assert!(!err.to_string().contains("disk on fire"));
    }
}
