//! API error types.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use stow_core::upload::UploadResponse;

/// API error type.
///
/// Every variant except `InvalidSignature` renders as an [`UploadResponse`]
/// body, which is what upload clients expect on failure. Signature rejections
/// render as `{"invalid": true}`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("method not allowed: {0}")]
    MethodNotAllowed(String),

    #[error("{0}")]
    TooLarge(String),

    #[error("signature request rejected: {0}")]
    InvalidSignature(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("storage error: {0}")]
    Storage(#[from] stow_storage::StorageError),

    #[error("core error: {0}")]
    Core(#[from] stow_core::Error),
}

impl From<stow_signer::SignerError> for ApiError {
    fn from(e: stow_signer::SignerError) -> Self {
        if e.is_rejection() {
            Self::InvalidSignature(e.to_string())
        } else {
            Self::Internal(e.to_string())
        }
    }
}

impl ApiError {
    /// Get the error code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::BadRequest(_) => "bad_request",
            Self::MethodNotAllowed(_) => "method_not_allowed",
            Self::TooLarge(_) => "too_large",
            Self::InvalidSignature(_) => "invalid_signature",
            Self::Internal(_) => "internal_error",
            Self::Storage(_) => "storage_error",
            Self::Core(_) => "core_error",
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            Self::TooLarge(_) => StatusCode::BAD_REQUEST,
            Self::InvalidSignature(_) => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Storage(e) => match e {
                stow_storage::StorageError::NotFound(_) => StatusCode::NOT_FOUND,
                stow_storage::StorageError::MissingParts { .. } => StatusCode::BAD_REQUEST,
                stow_storage::StorageError::InvalidPartIndex { .. } => StatusCode::BAD_REQUEST,
                stow_storage::StorageError::InvalidPartCount { .. } => StatusCode::BAD_REQUEST,
                stow_storage::StorageError::InvalidKey(_) => StatusCode::BAD_REQUEST,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Core(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(code = self.code(), error = %self, "request failed");
        }

        match &self {
            Self::InvalidSignature(_) => {
                (status, Json(serde_json::json!({"invalid": true}))).into_response()
            }
            Self::TooLarge(message) => {
                (status, Json(UploadResponse::failure_no_retry(message.as_str()))).into_response()
            }
            _ => (status, Json(UploadResponse::failure(self.to_string()))).into_response(),
        }
    }
}

/// Result type for API handlers.
pub type ApiResult<T> = std::result::Result<T, ApiError>;
