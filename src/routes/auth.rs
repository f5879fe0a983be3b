// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Schwab OAuth authentication routes.

use axum::{
    extract::{Query, State},
    response::Redirect,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::{AppError, Result};
use crate::services::schwab::{AuthStatus, DEFAULT_EXPIRES_IN_SECS};
use crate::AppState;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/login", get(auth_start))
        .route("/auth/callback", get(auth_callback))
        .route("/auth/status", get(auth_status))
}

/// Start OAuth flow - redirect to Schwab authorization.
async fn auth_start(State(state): State<Arc<AppState>>) -> Redirect {
    let auth_url = state.auth.build_authorization_url();

    tracing::info!(
        client_id = %state.config.schwab_app_key,
        "Starting OAuth flow, redirecting to Schwab"
    );

    Redirect::temporary(&auth_url)
}

#[derive(Deserialize)]
pub struct CallbackParams {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
}

/// Summary returned once the code exchange succeeds.
#[derive(Debug, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct CallbackResponse {
    pub status: String,
    pub token_type: String,
    pub expires_in: i64,
}

/// OAuth callback - exchange code for tokens and store them.
async fn auth_callback(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CallbackParams>,
) -> Result<Json<CallbackResponse>> {
    // Check for OAuth errors
    if let Some(error) = params.error {
        tracing::warn!(error = %error, "OAuth error from Schwab");
        let detail = match params.error_description {
            Some(description) => format!("{}: {}", error, description),
            None => error,
        };
        return Err(AppError::BadRequest(format!(
            "Authorization was not granted ({})",
            detail
        )));
    }

    let code = params
        .code
        .filter(|c| !c.is_empty())
        .ok_or_else(|| AppError::BadRequest("Missing authorization code".to_string()))?;

    let tokens = state.auth.exchange_code_for_token(&code).await?;

    Ok(Json(CallbackResponse {
        status: "authenticated".to_string(),
        token_type: tokens
            .token_type
            .unwrap_or_else(crate::models::credential::default_token_type),
        expires_in: tokens.expires_in.unwrap_or(DEFAULT_EXPIRES_IN_SECS),
    }))
}

/// Report whether a usable credential is stored.
async fn auth_status(State(state): State<Arc<AppState>>) -> Result<Json<AuthStatus>> {
    Ok(Json(state.auth.status().await?))
}
