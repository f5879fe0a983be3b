// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Background token refresh scheduler tests.

use chrono::{Duration, Utc};
use schwab_tracker::services::{Decrypted, TokenRefreshScheduler};
use serde_json::json;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

mod common;
use common::{seed_record, test_cipher, test_config, test_service};

#[tokio::test]
async fn test_check_without_record_does_not_fail() {
    let config = test_config("http://127.0.0.1:1");
    let (service, _db) = test_service(&config);
    let scheduler = TokenRefreshScheduler::new(Arc::new(service));

    assert!(!scheduler.check_token_expiry().await);
}

#[tokio::test]
async fn test_check_survives_refresh_failure() {
    let config = test_config("http://127.0.0.1:1");
    let cipher = test_cipher(&config);
    let (service, db) = test_service(&config);
    seed_record(&db, &cipher, "a", "r", Utc::now() - Duration::minutes(1)).await;

    let scheduler = TokenRefreshScheduler::new(Arc::new(service));

    // Two consecutive failing ticks, both absorbed.
    assert!(!scheduler.check_token_expiry().await);
    assert!(!scheduler.check_token_expiry().await);
}

#[tokio::test]
async fn test_scheduler_refreshes_on_first_tick_and_stops() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/oauth/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "SCHEDULED",
            "refresh_token": "R2",
            "expires_in": 1800
        })))
        .expect(1)
        .mount(&server)
        .await;

    let config = test_config(&server.uri());
    let cipher = test_cipher(&config);
    let (service, db) = test_service(&config);
    seed_record(&db, &cipher, "stale", "R1", Utc::now() - Duration::minutes(1)).await;

    let shutdown = CancellationToken::new();
    let handle = TokenRefreshScheduler::new(Arc::new(service))
        .with_period(std::time::Duration::from_millis(50))
        .spawn(shutdown.clone());

    // Wait for the first tick to land the refreshed token.
    let mut refreshed = false;
    for _ in 0..100 {
        let stored = db.get_record().await.unwrap().unwrap();
        if cipher.decrypt(&stored.access_token) == Decrypted::Value("SCHEDULED".into()) {
            refreshed = true;
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }
    assert!(refreshed, "Scheduler should refresh the stale token");

    // Later ticks find a fresh token and do not call the provider again.
    tokio::time::sleep(std::time::Duration::from_millis(150)).await;

    shutdown.cancel();
    tokio::time::timeout(std::time::Duration::from_secs(2), handle)
        .await
        .expect("Scheduler should stop after cancellation")
        .unwrap();
}

#[tokio::test]
async fn test_scheduler_keeps_running_after_rejected_refresh() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/oauth/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "NEW",
            "expires_in": 1_000_000_000_000_000i64
        })))
        .mount(&server)
        .await;

    let config = test_config(&server.uri());
    let cipher = test_cipher(&config);
    let (service, db) = test_service(&config);
    let seeded = seed_record(&db, &cipher, "stale", "R1", Utc::now() - Duration::minutes(1)).await;

    let shutdown = CancellationToken::new();
    let handle = TokenRefreshScheduler::new(Arc::new(service))
        .with_period(std::time::Duration::from_millis(50))
        .spawn(shutdown.clone());

    // Several ticks hit the bad response; the loop must survive all of them.
    tokio::time::sleep(std::time::Duration::from_millis(300)).await;
    assert!(!handle.is_finished(), "Scheduler must not stop on a bad response");
    let requests = server.received_requests().await.unwrap_or_default();
    assert!(requests.len() >= 2, "Expected repeated refresh attempts");
    assert_eq!(db.get_record().await.unwrap().unwrap(), seeded);

    shutdown.cancel();
    tokio::time::timeout(std::time::Duration::from_secs(2), handle)
        .await
        .expect("Scheduler should stop after cancellation")
        .unwrap();
}
