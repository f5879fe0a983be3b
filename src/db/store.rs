// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Credential store with typed operations.
//!
//! There is only ever one credential, kept as a single Firestore document
//! (`auth_tokens/schwab`). Writes overwrite the whole document, so the
//! last writer wins and no locking is needed.

use crate::db::{collections, CREDENTIAL_DOC_ID};
use crate::error::AppError;
use crate::models::CredentialRecord;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Clone)]
enum Backend {
    Firestore(firestore::FirestoreDb),
    Memory(Arc<RwLock<Option<CredentialRecord>>>),
}

/// Handle to the credential store. Cheap to clone.
#[derive(Clone)]
pub struct CredentialDb {
    backend: Backend,
}

impl CredentialDb {
    /// Connect to Firestore.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        // If the emulator environment variable is set, use unauthenticated connection
        // to avoid local credential warnings and leakage.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            backend: Backend::Firestore(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            backend: Backend::Firestore(client),
        })
    }

    /// Create a store that lives in process memory.
    ///
    /// Credentials are lost on restart; intended for local runs and tests.
    pub fn new_in_memory() -> Self {
        Self {
            backend: Backend::Memory(Arc::new(RwLock::new(None))),
        }
    }

    // ─── Credential Operations ───────────────────────────────────

    /// Get the stored credential, if any.
    pub async fn get_record(&self) -> Result<Option<CredentialRecord>, AppError> {
        match &self.backend {
            Backend::Firestore(client) => client
                .fluent()
                .select()
                .by_id_in(collections::AUTH_TOKENS)
                .obj()
                .one(CREDENTIAL_DOC_ID)
                .await
                .map_err(|e| AppError::Database(e.to_string())),
            Backend::Memory(slot) => Ok(slot.read().await.clone()),
        }
    }

    /// Insert the credential, or overwrite the existing one in place.
    pub async fn upsert(&self, record: &CredentialRecord) -> Result<(), AppError> {
        match &self.backend {
            Backend::Firestore(client) => {
                let _: () = client
                    .fluent()
                    .update()
                    .in_col(collections::AUTH_TOKENS)
                    .document_id(CREDENTIAL_DOC_ID)
                    .object(record)
                    .execute()
                    .await
                    .map_err(|e| AppError::Database(e.to_string()))?;
            }
            Backend::Memory(slot) => {
                *slot.write().await = Some(record.clone());
            }
        }
        Ok(())
    }

    /// Number of credential documents present.
    ///
    /// Always 0 or 1 unless something outside this service wrote to the
    /// collection.
    pub async fn record_count(&self) -> Result<usize, AppError> {
        match &self.backend {
            Backend::Firestore(client) => {
                let records: Vec<CredentialRecord> = client
                    .fluent()
                    .select()
                    .from(collections::AUTH_TOKENS)
                    .obj()
                    .query()
                    .await
                    .map_err(|e| AppError::Database(e.to_string()))?;
                Ok(records.len())
            }
            Backend::Memory(slot) => Ok(usize::from(slot.read().await.is_some())),
        }
    }
}
