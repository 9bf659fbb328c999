/// Unified error types for Lumenforge
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for the service
#[derive(Error, Debug)]
pub enum AppError {
    /// Database errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Authentication errors (missing/invalid token)
    #[error("Authentication failed: {0}")]
    Unauthorized(String),

    /// Authorization errors
    #[error("Not authorized: {0}")]
    Forbidden(String),

    /// Unknown account
    #[error("Account not found: {0}")]
    AccountNotFound(String),

    /// Unknown media asset
    #[error("Asset not found: {0}")]
    AssetNotFound(String),

    /// Non-positive grant/deduct or negative set amount
    #[error("Invalid amount: {0}")]
    InvalidAmount(i64),

    /// Balance too low for the requested deduction
    #[error("Insufficient {currency} credits: balance is {balance}, requested {requested}")]
    InsufficientCredits {
        currency: String,
        balance: i64,
        requested: i64,
    },

    /// Admin accounts cannot be suspended or deleted
    #[error("Admin accounts cannot be suspended or deleted")]
    AdminAccountProtected,

    /// Actors cannot suspend or delete themselves
    #[error("Cannot perform this action on your own account")]
    SelfActionForbidden,

    /// Status transition not allowed from the current state
    #[error("Invalid state transition: account is {current}, cannot {action}")]
    InvalidStateTransition { current: String, action: String },

    /// Asset has no extension slots left
    #[error("Extension limit reached: {remaining} extensions remaining")]
    ExtensionLimitReached { remaining: i64 },

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Blob storage errors (transient, non-fatal during sweep)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Internal server errors
    #[error("Internal error: {0}")]
    Internal(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// JSON error response format
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

/// Convert AppError to HTTP response
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            AppError::Unauthorized(_) => (
                StatusCode::UNAUTHORIZED,
                "AuthenticationRequired",
                self.to_string(),
            ),
            AppError::Forbidden(_) => (StatusCode::FORBIDDEN, "Forbidden", self.to_string()),
            AppError::AccountNotFound(_) => {
                (StatusCode::NOT_FOUND, "AccountNotFound", self.to_string())
            }
            AppError::AssetNotFound(_) => {
                (StatusCode::NOT_FOUND, "AssetNotFound", self.to_string())
            }
            AppError::InvalidAmount(_) => {
                (StatusCode::BAD_REQUEST, "InvalidAmount", self.to_string())
            }
            AppError::InsufficientCredits { .. } => (
                StatusCode::PAYMENT_REQUIRED,
                "InsufficientCredits",
                self.to_string(),
            ),
            AppError::AdminAccountProtected => (
                StatusCode::FORBIDDEN,
                "AdminAccountProtected",
                self.to_string(),
            ),
            AppError::SelfActionForbidden => (
                StatusCode::FORBIDDEN,
                "SelfActionForbidden",
                self.to_string(),
            ),
            AppError::InvalidStateTransition { .. } => (
                StatusCode::CONFLICT,
                "InvalidStateTransition",
                self.to_string(),
            ),
            AppError::ExtensionLimitReached { .. } => (
                StatusCode::CONFLICT,
                "ExtensionLimitReached",
                self.to_string(),
            ),
            AppError::Validation(_) => {
                (StatusCode::BAD_REQUEST, "InvalidRequest", self.to_string())
            }
            AppError::Database(_) | AppError::Internal(_) | AppError::Io(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "InternalServerError",
                "Internal server error".to_string(), // Don't leak details
            ),
            AppError::Storage(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "StorageError",
                "Storage backend unavailable".to_string(),
            ),
        };

        let body = Json(ErrorResponse {
            error: error_code.to_string(),
            message,
        });

        (status, body).into_response()
    }
}

/// Result type alias for service operations
pub type AppResult<T> = Result<T, AppError>;
