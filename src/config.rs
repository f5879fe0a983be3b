// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application configuration loaded from environment variables.
//!
//! A `.env` file in the working directory is read first when present.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Default Schwab OAuth endpoint root.
pub const DEFAULT_SCHWAB_OAUTH_BASE_URL: &str = "https://api.schwabapi.com/v1/oauth";

const DEFAULT_REDIRECT_URI: &str = "https://127.0.0.1:8000/auth/callback";

/// Where encrypted credentials are persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    /// Google Cloud Firestore (or its emulator).
    Firestore,
    /// Process memory; lost on restart. Local development only.
    Memory,
}

impl std::str::FromStr for StoreBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "firestore" => Ok(StoreBackend::Firestore),
            "memory" => Ok(StoreBackend::Memory),
            other => Err(ConfigError::Invalid {
                name: "STORE_BACKEND",
                value: other.to_string(),
            }),
        }
    }
}

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // --- Environment Variables (non-sensitive) ---
    /// Schwab app key (OAuth client ID)
    pub schwab_app_key: String,
    /// Callback URL registered with the Schwab app
    pub redirect_uri: String,
    /// Schwab OAuth endpoint root (`/authorize` and `/token` live under it)
    pub schwab_oauth_base_url: String,
    /// Credential store backend
    pub store_backend: StoreBackend,
    /// GCP project ID (Firestore backend)
    pub gcp_project_id: String,
    /// Server port
    pub port: u16,
    /// Timeout for outbound calls to Schwab
    pub http_timeout: Duration,
    /// Built frontend to serve for unmatched paths
    pub static_dir: Option<PathBuf>,

    // --- Secrets ---
    /// Schwab app secret (OAuth client secret)
    pub schwab_app_secret: String,
    /// Secret the token encryption key is derived from
    pub secret_key: String,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let store_backend = env::var("STORE_BACKEND")
            .unwrap_or_else(|_| "firestore".to_string())
            .parse()?;

        let http_timeout_secs = env::var("HTTP_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(30);

        Ok(Self {
            schwab_app_key: env::var("SCHWAB_APP_KEY")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("SCHWAB_APP_KEY"))?,
            redirect_uri: env::var("REDIRECT_URI")
                .unwrap_or_else(|_| DEFAULT_REDIRECT_URI.to_string()),
            schwab_oauth_base_url: env::var("SCHWAB_OAUTH_BASE_URL")
                .map(|v| v.trim_end_matches('/').to_string())
                .unwrap_or_else(|_| DEFAULT_SCHWAB_OAUTH_BASE_URL.to_string()),
            store_backend,
            gcp_project_id: env::var("GCP_PROJECT_ID").unwrap_or_else(|_| "local-dev".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),
            http_timeout: Duration::from_secs(http_timeout_secs),
            static_dir: env::var("STATIC_DIR").ok().map(PathBuf::from),

            schwab_app_secret: env::var("SCHWAB_APP_SECRET")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("SCHWAB_APP_SECRET"))?,
            secret_key: env::var("SECRET_KEY").map_err(|_| ConfigError::Missing("SECRET_KEY"))?,
        })
    }

    /// Deterministic configuration for tests.
    pub fn test_default() -> Self {
        Self {
            schwab_app_key: "test_app_key".to_string(),
            redirect_uri: "https://127.0.0.1:8000/auth/callback".to_string(),
            schwab_oauth_base_url: DEFAULT_SCHWAB_OAUTH_BASE_URL.to_string(),
            store_backend: StoreBackend::Memory,
            gcp_project_id: "test-project".to_string(),
            port: 8080,
            http_timeout: Duration::from_secs(5),
            static_dir: None,
            schwab_app_secret: "test_app_secret".to_string(),
            secret_key: "test_secret_key".to_string(),
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_env() {
        // Set required env vars for test
        env::set_var("SCHWAB_APP_KEY", "test_key");
        env::set_var("SCHWAB_APP_SECRET", " test_secret \n");
        env::set_var("SECRET_KEY", "encryption-secret");
        env::set_var("STORE_BACKEND", "memory");
        env::set_var("SCHWAB_OAUTH_BASE_URL", "http://localhost:9999/oauth/");

        let config = Config::from_env().expect("Config should load");

        assert_eq!(config.schwab_app_key, "test_key");
        assert_eq!(config.schwab_app_secret, "test_secret");
        assert_eq!(config.secret_key, "encryption-secret");
        assert_eq!(config.store_backend, StoreBackend::Memory);
        assert_eq!(config.schwab_oauth_base_url, "http://localhost:9999/oauth");
        assert_eq!(config.port, 8080);
    }

    #[test]
    fn test_store_backend_parse() {
        assert_eq!(
            "Firestore".parse::<StoreBackend>().unwrap(),
            StoreBackend::Firestore
        );
        assert_eq!(" memory ".parse::<StoreBackend>().unwrap(), StoreBackend::Memory);
        assert!(matches!(
            "sqlite".parse::<StoreBackend>(),
            Err(ConfigError::Invalid { name: "STORE_BACKEND", .. })
        ));
    }
}
