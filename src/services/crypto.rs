// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Symmetric encryption for OAuth tokens at rest.
//!
//! The key is derived from `SECRET_KEY` at startup. Ciphertexts are
//! URL-safe base64 of `nonce || sealed`, where `sealed` is AES-256-GCM
//! output with the tag appended. Changing the secret makes every stored
//! ciphertext undecryptable, which callers treat the same as a missing
//! value.

use crate::error::AppError;
use base64::{engine::general_purpose::URL_SAFE as BASE64, Engine as _};
use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM, NONCE_LEN};
use ring::rand::{SecureRandom, SystemRandom};
use std::sync::Arc;

/// Length of the derived key in bytes.
pub const KEY_LEN: usize = 32;

/// Filler appended to secrets shorter than [`KEY_LEN`].
const KEY_PAD_BYTE: u8 = b'=';

/// Map a configured secret to a fixed-size key.
///
/// Short secrets are right-padded with `=`, long ones truncated.
pub fn derive_key(secret: &str) -> [u8; KEY_LEN] {
    let mut key = [KEY_PAD_BYTE; KEY_LEN];
    let bytes = secret.as_bytes();
    let n = bytes.len().min(KEY_LEN);
    key[..n].copy_from_slice(&bytes[..n]);
    key
}

/// Outcome of decrypting a stored field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decrypted {
    /// The field decrypted to a non-empty value.
    Value(String),
    /// The stored field was empty (never set).
    Empty,
    /// The ciphertext was corrupt or sealed under another key.
    Invalid,
}

impl Decrypted {
    /// Collapse to the usable value, if any.
    ///
    /// `Empty` and `Invalid` both mean "unusable" to every caller.
    pub fn into_option(self) -> Option<String> {
        match self {
            Decrypted::Value(v) => Some(v),
            Decrypted::Empty | Decrypted::Invalid => None,
        }
    }

    pub fn is_usable(&self) -> bool {
        matches!(self, Decrypted::Value(_))
    }
}

/// AES-256-GCM cipher keyed from the application secret.
#[derive(Clone)]
pub struct TokenCipher {
    key: Arc<LessSafeKey>,
    rng: SystemRandom,
}

impl TokenCipher {
    /// Build a cipher from the configured secret.
    pub fn new(secret: &str) -> Result<Self, AppError> {
        let unbound = UnboundKey::new(&AES_256_GCM, &derive_key(secret)).map_err(|_| {
            AppError::Internal(anyhow::anyhow!("Failed to build token encryption key"))
        })?;

        Ok(Self {
            key: Arc::new(LessSafeKey::new(unbound)),
            rng: SystemRandom::new(),
        })
    }

    /// Encrypt a token. Empty input passes through as an empty string.
    pub fn encrypt(&self, plaintext: &str) -> Result<String, AppError> {
        if plaintext.is_empty() {
            return Ok(String::new());
        }

        let mut nonce_bytes = [0u8; NONCE_LEN];
        self.rng.fill(&mut nonce_bytes).map_err(|_| {
            AppError::Internal(anyhow::anyhow!("Failed to generate encryption nonce"))
        })?;

        let mut in_out = plaintext.as_bytes().to_vec();
        self.key
            .seal_in_place_append_tag(
                Nonce::assume_unique_for_key(nonce_bytes),
                Aad::empty(),
                &mut in_out,
            )
            .map_err(|_| AppError::Internal(anyhow::anyhow!("Token encryption failed")))?;

        let mut out = Vec::with_capacity(NONCE_LEN + in_out.len());
        out.extend_from_slice(&nonce_bytes);
        out.extend_from_slice(&in_out);
        Ok(BASE64.encode(out))
    }

    /// Decrypt a stored token. Never fails; see [`Decrypted`].
    pub fn decrypt(&self, ciphertext: &str) -> Decrypted {
        if ciphertext.is_empty() {
            return Decrypted::Empty;
        }

        let Ok(mut bytes) = BASE64.decode(ciphertext) else {
            tracing::warn!("Stored token is not valid base64");
            return Decrypted::Invalid;
        };

        if bytes.len() < NONCE_LEN + AES_256_GCM.tag_len() {
            tracing::warn!(len = bytes.len(), "Stored token is too short");
            return Decrypted::Invalid;
        }

        let mut sealed = bytes.split_off(NONCE_LEN);
        let Ok(nonce) = Nonce::try_assume_unique_for_key(&bytes) else {
            return Decrypted::Invalid;
        };

        let plaintext = match self.key.open_in_place(nonce, Aad::empty(), &mut sealed) {
            Ok(p) => p,
            Err(_) => {
                // Usually a rotated SECRET_KEY; the user has to log in again.
                tracing::warn!("Stored token failed authentication, treating as unusable");
                return Decrypted::Invalid;
            }
        };

        match std::str::from_utf8(plaintext) {
            Ok("") => Decrypted::Empty,
            Ok(s) => Decrypted::Value(s.to_string()),
            Err(_) => Decrypted::Invalid,
        }
    }
}
