// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application error types with consistent acknowledgement bodies.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Application error type that converts to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Authentication required: {0}")]
    AuthRequired(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Sheets API error: {0}")]
    SheetsApi(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Marker message for a rejected or expired Google credential.
    pub const SHEETS_AUTH_ERROR: &'static str = "Sheets credential rejected";
    /// Marker message for HTTP 429 from the Sheets API.
    pub const SHEETS_RATE_LIMIT: &'static str = "Sheets rate limit exceeded";

    /// True when the failure means the user has to sign in again.
    pub fn is_auth_error(&self) -> bool {
        match self {
            AppError::AuthRequired(_) => true,
            AppError::SheetsApi(msg) => msg == Self::SHEETS_AUTH_ERROR,
            _ => false,
        }
    }

    /// True when the Sheets API asked us to back off.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, AppError::SheetsApi(msg) if msg == Self::SHEETS_RATE_LIMIT)
    }
}

/// JSON error body, shaped like every other acknowledgement.
#[derive(Serialize)]
struct ErrorResponse {
    success: bool,
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, details) = match &self {
            AppError::AuthRequired(msg) => {
                (StatusCode::UNAUTHORIZED, "auth_required", Some(msg.clone()))
            }
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", Some(msg.clone())),
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, "bad_request", Some(msg.clone()))
            }
            AppError::SheetsApi(msg) => {
                (StatusCode::BAD_GATEWAY, "sheets_error", Some(msg.clone()))
            }
            AppError::Storage(msg) => {
                tracing::error!(error = %msg, "Storage error");
                (StatusCode::INTERNAL_SERVER_ERROR, "storage_error", None)
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "Internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None)
            }
        };

        let body = ErrorResponse {
            success: false,
            error: error.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for services and handlers
pub type Result<T> = std::result::Result<T, AppError>;
