// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Stored Schwab credential.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// The single credential record (token fields encrypted at rest).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CredentialRecord {
    /// Encrypted access token
    pub access_token: String,
    /// Encrypted refresh token
    pub refresh_token: String,
    /// Encrypted OpenID token (empty if the provider sent none)
    #[serde(default)]
    pub id_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    /// When the access token stops being usable
    pub expires_at: DateTime<Utc>,
}

pub fn default_token_type() -> String {
    "Bearer".to_string()
}

impl CredentialRecord {
    /// Whether the access token is still usable `margin` from `now`.
    ///
    /// A token expiring exactly at `now + margin` is already stale.
    pub fn is_fresh_at(&self, now: DateTime<Utc>, margin: Duration) -> bool {
        now + margin < self.expires_at
    }
}
