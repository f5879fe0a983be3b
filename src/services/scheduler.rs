// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Background token freshness check.
//!
//! Every [`TOKEN_CHECK_INTERVAL`] the scheduler asks the auth service for
//! the active token, which refreshes it when it is near expiry. Request
//! handlers therefore rarely see a token that needs refreshing.

use crate::services::SchwabAuthService;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// How often the stored token is checked.
pub const TOKEN_CHECK_INTERVAL: Duration = Duration::from_secs(15 * 60);

/// Periodically keeps the stored Schwab token fresh.
pub struct TokenRefreshScheduler {
    auth: Arc<SchwabAuthService>,
    period: Duration,
}

impl TokenRefreshScheduler {
    pub fn new(auth: Arc<SchwabAuthService>) -> Self {
        Self {
            auth,
            period: TOKEN_CHECK_INTERVAL,
        }
    }

    /// Override the check period (tests).
    pub fn with_period(mut self, period: Duration) -> Self {
        self.period = period;
        self
    }

    /// Run the loop on the tokio runtime until `shutdown` is cancelled.
    pub fn spawn(self, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move { self.run(shutdown).await })
    }

    /// Check once immediately, then once per period, until cancelled.
    pub async fn run(&self, shutdown: CancellationToken) {
        tracing::info!(
            interval_secs = self.period.as_secs(),
            "Token refresh scheduler started"
        );

        let mut timer = interval(self.period);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = timer.tick() => {}
                _ = shutdown.cancelled() => {
                    tracing::info!("Shutdown, stopping token refresh scheduler");
                    return;
                }
            }

            self.check_token_expiry().await;
        }
    }

    /// One freshness check. Never fails; problems are logged.
    pub async fn check_token_expiry(&self) -> bool {
        tracing::debug!("Running scheduled token expiry check");

        let active = self.auth.get_active_token().await.is_some();
        if active {
            tracing::debug!("Schwab token is fresh");
        } else {
            tracing::warn!("No active Schwab token; authorization may be required");
        }
        active
    }
}
