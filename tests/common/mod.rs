// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use chrono::{DateTime, Utc};
use schwab_tracker::config::Config;
use schwab_tracker::db::CredentialDb;
use schwab_tracker::models::CredentialRecord;
use schwab_tracker::routes::create_router;
use schwab_tracker::services::{SchwabAuthService, TokenCipher};
use schwab_tracker::AppState;
use std::sync::Arc;

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection.
#[allow(dead_code)]
pub async fn test_db() -> CredentialDb {
    CredentialDb::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

/// Test config pointing the OAuth client at `base_url` (a mock server).
#[allow(dead_code)]
pub fn test_config(base_url: &str) -> Config {
    Config {
        schwab_oauth_base_url: format!("{}/v1/oauth", base_url),
        ..Config::test_default()
    }
}

/// Cipher keyed the same way as the service built from `config`.
#[allow(dead_code)]
pub fn test_cipher(config: &Config) -> TokenCipher {
    TokenCipher::new(&config.secret_key).expect("cipher")
}

/// Auth service over an in-memory store; returns the store handle too.
#[allow(dead_code)]
pub fn test_service(config: &Config) -> (SchwabAuthService, CredentialDb) {
    let db = CredentialDb::new_in_memory();
    let service = SchwabAuthService::from_config(config, db.clone()).expect("service");
    (service, db)
}

/// Store an encrypted credential directly, bypassing the service.
#[allow(dead_code)]
pub async fn seed_record(
    db: &CredentialDb,
    cipher: &TokenCipher,
    access: &str,
    refresh: &str,
    expires_at: DateTime<Utc>,
) -> CredentialRecord {
    let record = CredentialRecord {
        access_token: cipher.encrypt(access).unwrap(),
        refresh_token: cipher.encrypt(refresh).unwrap(),
        id_token: String::new(),
        token_type: "Bearer".to_string(),
        expires_at,
    };
    db.upsert(&record).await.unwrap();
    record
}

/// Create a test app over an in-memory store.
/// Returns the router and the shared state.
#[allow(dead_code)]
pub fn create_test_app(config: Config) -> (axum::Router, Arc<AppState>) {
    let (service, db) = test_service(&config);

    let state = Arc::new(AppState {
        config,
        db,
        auth: Arc::new(service),
    });

    (create_router(state.clone()), state)
}
