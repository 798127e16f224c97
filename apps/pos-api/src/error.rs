//! API error types.
//!
//! Maps store and domain errors to HTTP status codes and a JSON body.
//!
//! ```text
//! DbError / CoreError / ValidationError ──► ApiError ──► (status, {"error", "message"})
//! ```

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use bistro_core::{CoreError, ValidationError};
use bistro_db::DbError;
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Errors a client can see.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed request (bad query string, unknown room name).
    #[error("{0}")]
    BadRequest(String),

    /// Well-formed request rejected by a business rule. Nothing changed.
    #[error("{message}")]
    Validation { code: &'static str, message: String },

    #[error("{0}")]
    NotFound(String),

    /// Occupied table, lost race, illegal transition. Nothing changed.
    #[error("{message}")]
    Conflict { code: &'static str, message: String },

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Validation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict { .. } => StatusCode::CONFLICT,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "bad_request",
            ApiError::Validation { code, .. } | ApiError::Conflict { code, .. } => *code,
            ApiError::NotFound(_) => "not_found",
            ApiError::Unauthorized(_) => "unauthenticated",
            ApiError::Forbidden(_) => "forbidden",
            ApiError::Internal(_) => "internal_error",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            ApiError::Internal(detail) => {
                error!(detail = %detail, "Request failed");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };
        let body = json!({ "error": self.code(), "message": message });
        (status, Json(body)).into_response()
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        let code = err.code();
        match err {
            CoreError::NotFound { .. } | CoreError::ItemNotFound(_) => {
                ApiError::NotFound(err.to_string())
            }
            CoreError::InvalidTransition { .. }
            | CoreError::TableOccupied { .. }
            | CoreError::TargetOccupied { .. }
            | CoreError::TableUnavailable { .. }
            | CoreError::OrderClosed { .. }
            | CoreError::Conflict(_) => ApiError::Conflict {
                code,
                message: err.to_string(),
            },
            CoreError::InvalidQuantity { .. }
            | CoreError::ItemUnavailable(_)
            | CoreError::InvalidItem(_)
            | CoreError::InvalidPaymentAmount { .. }
            | CoreError::Validation(_) => ApiError::Validation {
                code,
                message: err.to_string(),
            },
        }
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        CoreError::from(err).into()
    }
}

impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Domain(core) => core.into(),
            DbError::NotFound { .. } => ApiError::NotFound(err.to_string()),
            DbError::Conflict(_) | DbError::PoolExhausted => ApiError::Conflict {
                code: "conflict",
                message: err.to_string(),
            },
            DbError::UniqueViolation { .. } => ApiError::Conflict {
                code: "duplicate",
                message: err.to_string(),
            },
            DbError::ForeignKeyViolation { .. } => ApiError::Validation {
                code: "invalid_reference",
                message: err.to_string(),
            },
            other => ApiError::Internal(other.to_string()),
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
