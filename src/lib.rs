// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Schwab-Tracker: keeps a Schwab OAuth credential usable
//!
//! This crate provides the backend that authorizes against the Schwab API,
//! stores the resulting tokens encrypted, and refreshes them before they
//! expire.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

use config::Config;
use db::CredentialDb;
use services::SchwabAuthService;
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub db: CredentialDb,
    pub auth: Arc<SchwabAuthService>,
}
