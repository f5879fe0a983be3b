// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application error types with consistent API responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Application error type that converts to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// The token endpoint answered with a non-success status.
    #[error("Schwab token exchange failed with HTTP {status}: {body}")]
    UpstreamExchange { status: u16, body: String },

    /// Transport or decode failure talking to Schwab.
    #[error("Schwab API error: {0}")]
    SchwabApi(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// True for failures reported by the provider rather than by us.
    pub fn is_upstream(&self) -> bool {
        matches!(self, AppError::UpstreamExchange { .. } | AppError::SchwabApi(_))
    }
}

/// JSON error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, details) = match &self {
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, "bad_request", Some(msg.clone()))
            }
            // The user is waiting on the callback page, so the provider's
            // answer is shown to them as a client error.
            AppError::UpstreamExchange { .. } => (
                StatusCode::BAD_REQUEST,
                "upstream_exchange",
                Some(self.to_string()),
            ),
            AppError::SchwabApi(msg) => {
                (StatusCode::BAD_GATEWAY, "schwab_error", Some(msg.clone()))
            }
            AppError::Database(msg) => {
                tracing::error!(error = %msg, "Database error");
                (StatusCode::INTERNAL_SERVER_ERROR, "database_error", None)
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "Internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None)
            }
        };

        let body = ErrorResponse {
            error: error.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;
