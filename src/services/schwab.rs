// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Schwab OAuth client and token lifecycle.
//!
//! Handles:
//! - Authorization URL construction
//! - Authorization code exchange
//! - Encrypted token storage
//! - Token refresh when expired or about to expire

use crate::config::Config;
use crate::error::AppError;
use serde::Deserialize;

/// Schwab OAuth client.
#[derive(Clone)]
pub struct SchwabClient {
    http: reqwest::Client,
    base_url: String,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
}

impl SchwabClient {
    /// Create a new Schwab client from the app credentials in `config`.
    pub fn new(config: &Config) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .build()
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: config.schwab_oauth_base_url.clone(),
            client_id: config.schwab_app_key.clone(),
            client_secret: config.schwab_app_secret.clone(),
            redirect_uri: config.redirect_uri.clone(),
        })
    }

    /// URL the user is sent to for consent.
    pub fn authorization_url(&self) -> String {
        format!(
            "{}/authorize?client_id={}&redirect_uri={}&response_type=code",
            self.base_url,
            urlencoding::encode(&self.client_id),
            urlencoding::encode(&self.redirect_uri),
        )
    }

    /// Exchange an authorization code for tokens.
    pub async fn exchange_code(&self, code: &str) -> Result<TokenResponse, AppError> {
        self.post_token_form(&[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.redirect_uri.as_str()),
        ])
        .await
    }

    /// Mint a new access token from a refresh token.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenResponse, AppError> {
        self.post_token_form(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ])
        .await
    }

    /// POST a form to the token endpoint with HTTP Basic client auth.
    async fn post_token_form(&self, form: &[(&str, &str)]) -> Result<TokenResponse, AppError> {
        let response = self
            .http
            .post(format!("{}/token", self.base_url))
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(form)
            .send()
            .await
            .map_err(|e| AppError::SchwabApi(format!("Token request failed: {}", e)))?;

        self.check_response_json(response).await
    }

    /// Check response and parse JSON body.
    async fn check_response_json<T: for<'de> Deserialize<'de>>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, AppError> {
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), body = %body, "Schwab token endpoint rejected request");
            return Err(AppError::UpstreamExchange {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json()
            .await
            .map_err(|e| AppError::SchwabApi(format!("Failed to parse token response: {}", e)))
    }
}

/// Token endpoint response.
#[derive(Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub id_token: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
    /// Access token lifetime in seconds
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub scope: Option<String>,
}

impl std::fmt::Debug for TokenResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenResponse")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .field("id_token", &self.id_token.as_ref().map(|_| "<redacted>"))
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .field("scope", &self.scope)
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// SchwabAuthService - High-level service with token management
// ─────────────────────────────────────────────────────────────────────────────

use crate::db::CredentialDb;
use crate::models::credential::{default_token_type, CredentialRecord};
use crate::services::crypto::TokenCipher;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Margin before token expiration when we proactively refresh (5 minutes).
pub const TOKEN_REFRESH_MARGIN_SECS: i64 = 5 * 60;

/// Lifetime assumed when the provider omits `expires_in`.
pub const DEFAULT_EXPIRES_IN_SECS: i64 = 1800;

/// Absolute expiry for a token issued at `now`. Negative lifetimes count as
/// already expired.
fn token_expiry(now: DateTime<Utc>, expires_in: Option<i64>) -> Result<DateTime<Utc>, AppError> {
    let secs = expires_in.unwrap_or(DEFAULT_EXPIRES_IN_SECS).max(0);
    Duration::try_seconds(secs)
        .and_then(|lifetime| now.checked_add_signed(lifetime))
        .ok_or_else(|| AppError::SchwabApi(format!("invalid expires_in: {}", secs)))
}

/// Snapshot of the stored credential, without any token material.
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(ts_rs::TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct AuthStatus {
    pub authenticated: bool,
    pub token_type: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    /// Access token usable without a refresh
    pub fresh: bool,
    /// A decryptable refresh token is stored
    pub refreshable: bool,
}

/// Owns the Schwab token lifecycle.
///
/// Nothing is cached in memory: every call re-reads the stored record, so
/// the request path and the background checker always agree on state.
/// Refreshes are serialized through `refresh_lock` so concurrent callers
/// that find the same stale record make a single provider call.
#[derive(Clone)]
pub struct SchwabAuthService {
    client: SchwabClient,
    cipher: TokenCipher,
    db: CredentialDb,
    refresh_lock: Arc<Mutex<()>>,
}

impl SchwabAuthService {
    pub fn new(client: SchwabClient, cipher: TokenCipher, db: CredentialDb) -> Self {
        Self {
            client,
            cipher,
            db,
            refresh_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Build the service from configuration and an opened store.
    pub fn from_config(config: &Config, db: CredentialDb) -> Result<Self, AppError> {
        Ok(Self::new(
            SchwabClient::new(config)?,
            TokenCipher::new(&config.secret_key)?,
            db,
        ))
    }

    fn refresh_margin() -> Duration {
        Duration::seconds(TOKEN_REFRESH_MARGIN_SECS)
    }

    // ─── OAuth Flow ──────────────────────────────────────────────────────────

    /// Schwab consent page URL.
    pub fn build_authorization_url(&self) -> String {
        self.client.authorization_url()
    }

    /// Exchange an authorization code and persist the resulting tokens.
    ///
    /// Unlike refresh, failures here reach the caller: the user is waiting
    /// on the callback.
    pub async fn exchange_code_for_token(&self, code: &str) -> Result<TokenResponse, AppError> {
        tracing::info!("Exchanging authorization code for tokens");

        let tokens = self.client.exchange_code(code).await?;
        let record = self.store_tokens(&tokens).await?;

        tracing::info!(
            expires_at = %record.expires_at,
            token_type = %record.token_type,
            "Schwab authorization complete, tokens stored"
        );
        Ok(tokens)
    }

    /// Encrypt and persist a token response. Both the code exchange and the
    /// refresh exchange write through here.
    ///
    /// Nothing is written if the response carries no access token or an
    /// unrepresentable lifetime.
    pub async fn store_tokens(&self, tokens: &TokenResponse) -> Result<CredentialRecord, AppError> {
        if tokens.access_token.is_empty() {
            return Err(AppError::SchwabApi("empty access_token".to_string()));
        }
        let expires_at = token_expiry(Utc::now(), tokens.expires_in)?;

        let record = CredentialRecord {
            access_token: self.cipher.encrypt(&tokens.access_token)?,
            refresh_token: self
                .cipher
                .encrypt(tokens.refresh_token.as_deref().unwrap_or_default())?,
            id_token: self
                .cipher
                .encrypt(tokens.id_token.as_deref().unwrap_or_default())?,
            token_type: tokens.token_type.clone().unwrap_or_else(default_token_type),
            expires_at,
        };

        self.db.upsert(&record).await?;
        Ok(record)
    }

    // ─── Token Management ────────────────────────────────────────────────────

    /// Get an access token that is good for at least the refresh margin.
    ///
    /// Returns `None` when there is no stored credential, when the stored
    /// token cannot be decrypted, or when a needed refresh fails. Failures
    /// are logged, never returned: this runs from the background checker
    /// and from opportunistic request paths.
    pub async fn get_active_token(&self) -> Option<String> {
        let record = match self.db.get_record().await {
            Ok(Some(record)) => record,
            Ok(None) => {
                tracing::debug!("No stored Schwab credential");
                return None;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to read stored credential");
                return None;
            }
        };

        if record.is_fresh_at(Utc::now(), Self::refresh_margin()) {
            return self.cipher.decrypt(&record.access_token).into_option();
        }

        tracing::info!(
            expires_at = %record.expires_at,
            "Access token expired or expiring soon, refreshing"
        );
        self.refresh_access_token(&record).await
    }

    /// Refresh the access token and persist the new tokens.
    ///
    /// On any failure the stored record is left as it was so a later call
    /// can retry with the same refresh token.
    pub async fn refresh_access_token(&self, record: &CredentialRecord) -> Option<String> {
        let _guard = self.refresh_lock.lock().await;

        // Re-read after acquiring the lock: another caller may have refreshed.
        let latest = match self.db.get_record().await {
            Ok(Some(current)) => current,
            Ok(None) => record.clone(),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to re-read credential, using caller's copy");
                record.clone()
            }
        };

        if latest != *record && latest.is_fresh_at(Utc::now(), Self::refresh_margin()) {
            if let Some(token) = self.cipher.decrypt(&latest.access_token).into_option() {
                tracing::debug!("Token already refreshed by another caller");
                return Some(token);
            }
        }

        let Some(refresh_token) = self.cipher.decrypt(&latest.refresh_token).into_option() else {
            tracing::warn!("No usable refresh token stored, re-authorization required");
            return None;
        };

        let mut tokens = match self.client.refresh(&refresh_token).await {
            Ok(tokens) => tokens,
            Err(e) if e.is_upstream() => {
                tracing::warn!(error = %e, "Token refresh failed, keeping stored credential");
                return None;
            }
            Err(e) => {
                tracing::error!(error = %e, "Token refresh failed unexpectedly");
                return None;
            }
        };

        // Schwab does not always rotate the refresh token.
        if tokens.refresh_token.as_deref().map_or(true, str::is_empty) {
            tokens.refresh_token = Some(refresh_token);
        }

        match self.store_tokens(&tokens).await {
            Ok(stored) => {
                tracing::info!(expires_at = %stored.expires_at, "Schwab access token refreshed");
                Some(tokens.access_token)
            }
            Err(e) if e.is_upstream() => {
                tracing::warn!(error = %e, "Rejected refresh response, keeping stored credential");
                None
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to store refreshed tokens");
                None
            }
        }
    }

    /// Describe the stored credential without refreshing it.
    pub async fn status(&self) -> Result<AuthStatus, AppError> {
        let Some(record) = self.db.get_record().await? else {
            return Ok(AuthStatus {
                authenticated: false,
                token_type: None,
                expires_at: None,
                fresh: false,
                refreshable: false,
            });
        };

        let access_usable = self.cipher.decrypt(&record.access_token).is_usable();
        let refreshable = self.cipher.decrypt(&record.refresh_token).is_usable();
        let fresh = access_usable && record.is_fresh_at(Utc::now(), Self::refresh_margin());

        Ok(AuthStatus {
            authenticated: access_usable || refreshable,
            token_type: Some(record.token_type),
            expires_at: Some(record.expires_at),
            fresh,
            refreshable,
        })
    }
}
