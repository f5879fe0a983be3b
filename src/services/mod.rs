// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod crypto;
pub mod scheduler;
pub mod schwab;

pub use crypto::{Decrypted, TokenCipher};
pub use scheduler::TokenRefreshScheduler;
pub use schwab::{AuthStatus, SchwabAuthService, SchwabClient, TokenResponse};
