//! API Error Types

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use claw_core::{ErrorKind, ProtocolError};
use claw_executor::ExecutorError;
use claw_signer::SignerError;
use claw_store::StoreError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Unauthorized: {reason}")]
    Unauthorized { reason: String },

    /// Authenticated, but lacking scope, membership or allowlisting
    #[error("Forbidden: {reason}")]
    Forbidden { reason: String },

    /// Expired attestation or non-increasing attestation nonce
    #[error("Replay rejected: {message}")]
    Replay { message: String },

    /// Bot request nonce seen before
    #[error("Replay rejected: nonce {nonce} already used by bot {bot_id}")]
    NonceReused { bot_id: String, nonce: String },

    #[error("Resource not found: {resource_type} with id {id}")]
    NotFound { resource_type: String, id: String },

    #[error("Conflict: {message}")]
    Conflict { message: String },

    #[error("Service unavailable: {reason}")]
    ServiceUnavailable { reason: String },

    #[error("Internal error: {message}")]
    Internal { message: String },

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Executor error: {0}")]
    Executor(#[from] ExecutorError),

    #[error("Signer error: {0}")]
    Signer(#[from] SignerError),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Error response body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ApiError::Validation { .. } => ErrorKind::Validation,
            ApiError::Unauthorized { .. } | ApiError::Forbidden { .. } => ErrorKind::Auth,
            ApiError::Replay { .. } | ApiError::NonceReused { .. } => ErrorKind::Replay,
            ApiError::NotFound { .. } => ErrorKind::NotFound,
            ApiError::Conflict { .. } => ErrorKind::Conflict,
            ApiError::ServiceUnavailable { .. } | ApiError::Internal { .. } => {
                ErrorKind::Transient
            }
            ApiError::Store(e) => e.kind(),
            ApiError::Executor(e) => e.kind(),
            ApiError::Signer(e) => e.kind(),
            ApiError::Protocol(e) => e.kind(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Forbidden { .. } => StatusCode::FORBIDDEN,
            ApiError::NonceReused { .. } => StatusCode::UNAUTHORIZED,
            ApiError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            other => match other.kind() {
                ErrorKind::Validation | ErrorKind::Replay => StatusCode::BAD_REQUEST,
                ErrorKind::Auth => StatusCode::UNAUTHORIZED,
                ErrorKind::Conflict => StatusCode::CONFLICT,
                ErrorKind::NotFound => StatusCode::NOT_FOUND,
                ErrorKind::Transient => StatusCode::SERVICE_UNAVAILABLE,
            },
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::Unauthorized { .. } => "UNAUTHORIZED",
            ApiError::Forbidden { .. } => "FORBIDDEN",
            ApiError::Internal { .. } => "INTERNAL_ERROR",
            other => match other.kind() {
                ErrorKind::Validation => "VALIDATION_ERROR",
                ErrorKind::Auth => "UNAUTHORIZED",
                ErrorKind::Replay => "REPLAY",
                ErrorKind::Conflict => "CONFLICT",
                ErrorKind::NotFound => "NOT_FOUND",
                ErrorKind::Transient => "SERVICE_UNAVAILABLE",
            },
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::Validation {
            message: message.into(),
        }
    }

    pub fn unauthorized(reason: impl Into<String>) -> Self {
        ApiError::Unauthorized {
            reason: reason.into(),
        }
    }

    pub fn forbidden(reason: impl Into<String>) -> Self {
        ApiError::Forbidden {
            reason: reason.into(),
        }
    }

    pub fn replay(message: impl Into<String>) -> Self {
        ApiError::Replay {
            message: message.into(),
        }
    }

    pub fn not_found(resource_type: impl Into<String>, id: impl Into<String>) -> Self {
        ApiError::NotFound {
            resource_type: resource_type.into(),
            id: id.into(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        ApiError::Conflict {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        ApiError::Internal {
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        (status, Json(ErrorResponse::from(&self))).into_response()
    }
}

impl From<&ApiError> for ErrorResponse {
    fn from(err: &ApiError) -> Self {
        ErrorResponse {
            code: err.error_code().to_string(),
            message: err.to_string(),
            details: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_variants() {
        let err = ApiError::validation("bad hex");
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.error_code(), "VALIDATION_ERROR");

        let err = ApiError::forbidden("missing scope intents.propose");
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(err.kind(), ErrorKind::Auth);

        let err = ApiError::NonceReused {
            bot_id: "bot-1".into(),
            nonce: "n1".into(),
        };
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(err.error_code(), "REPLAY");

        assert_eq!(ApiError::replay("expired").status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_wrapped_errors_follow_kind() {
        let err = ApiError::from(StoreError::duplicate("Fund", "fund-1"));
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
        assert_eq!(err.error_code(), "CONFLICT");

        let err = ApiError::from(StoreError::not_found("Bot", "bot-9"));
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);

        let err = ApiError::from(StoreError::database("connection reset"));
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);

        let err = ApiError::from(ProtocolError::NonceNotIncreasing {
            last: "5".into(),
            incoming: "5".into(),
        });
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.error_code(), "REPLAY");

        let err = ApiError::from(SignerError::InvalidSignature("bad v".into()));
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
    }
}
