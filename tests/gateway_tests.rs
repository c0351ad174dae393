// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Gateway behavior tests against a scripted local upstream: refresh on
//! 401, rate-limit backoff on 429, retry budgets, and error propagation.

mod common;

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::{json, Value};

use common::{seed_connected_user, seed_unconnected_user, spawn_mock_upstream, ScriptedResponse};
use nova_player::crypto::TokenCipher;
use nova_player::db::{MemoryUserStore, UserStore};
use nova_player::error::AppError;
use nova_player::services::{
    ApiRequest, ResponseCache, SpotifyGateway, SpotifyService, VideoClient,
};

struct Harness {
    upstream: common::MockUpstream,
    store: Arc<dyn UserStore>,
    cipher: TokenCipher,
    gateway: SpotifyGateway,
}

async fn harness() -> Harness {
    let upstream = spawn_mock_upstream().await;
    let config = common::test_config(Some(&upstream));
    let store: Arc<dyn UserStore> = Arc::new(MemoryUserStore::new());
    let cipher = TokenCipher::new(config.encryption_key);
    let gateway = SpotifyGateway::new(&config, store.clone(), cipher.clone());
    Harness {
        upstream,
        store,
        cipher,
        gateway,
    }
}

fn service(harness: &Harness) -> SpotifyService {
    SpotifyService::new(
        harness.gateway.clone(),
        ResponseCache::in_memory(),
        harness.store.clone(),
        VideoClient::new(None),
    )
}

// ─── NotConnected ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_not_connected_fails_before_any_outbound_call() {
    let h = harness().await;
    let user_id = seed_unconnected_user(&h.store).await;
    let spotify = service(&h);

    // A plain read, a best-effort read, and a state change: all must fail
    // with NotConnected without touching the upstream.
    assert!(matches!(
        spotify.get_user_playlists(user_id).await,
        Err(AppError::NotConnected)
    ));
    assert!(matches!(
        spotify.get_top_tracks(user_id).await,
        Err(AppError::NotConnected)
    ));
    assert!(matches!(
        spotify.play(user_id, None, &[], None).await,
        Err(AppError::NotConnected)
    ));

    assert_eq!(h.upstream.hits(), 0);
}

#[tokio::test]
async fn test_unknown_user_is_not_connected() {
    let h = harness().await;
    let result = h.gateway.send(999, ApiRequest::get("/me")).await;
    assert!(matches!(result, Err(AppError::NotConnected)));
    assert_eq!(h.upstream.hits(), 0);
}

// ─── Refresh on 401 ──────────────────────────────────────────────────────

#[tokio::test]
async fn test_401_refreshes_once_and_reissues() {
    let h = harness().await;
    let user_id = seed_connected_user(&h.store, &h.cipher, "stale-access", "refresh-secret").await;

    h.upstream.push(ScriptedResponse::status(401));
    h.upstream
        .push(ScriptedResponse::ok(json!({ "access_token": "fresh-access" })));
    h.upstream
        .push(ScriptedResponse::ok(json!({ "items": [], "total": 0 })));

    let body: Value = h
        .gateway
        .json(user_id, ApiRequest::get("/me/playlists"))
        .await
        .expect("request should succeed after refresh");
    assert_eq!(body["total"], 0);

    let requests = h.upstream.requests();
    assert_eq!(requests.len(), 3);
    assert_eq!(requests[0].path, "/me/playlists");
    assert_eq!(
        requests[0].authorization.as_deref(),
        Some("Bearer stale-access")
    );
    assert_eq!(requests[1].path, "/api/token");
    assert!(requests[1]
        .authorization
        .as_deref()
        .unwrap()
        .starts_with("Basic "));
    assert!(requests[1].body.contains("grant_type=refresh_token"));
    assert!(requests[1].body.contains("refresh-secret"));
    assert_eq!(requests[2].path, "/me/playlists");
    assert_eq!(
        requests[2].authorization.as_deref(),
        Some("Bearer fresh-access")
    );

    // The fresh token is persisted; the refresh token was not rotated.
    let user = h.store.get_user(user_id).await.unwrap().unwrap();
    assert_eq!(user.spotify_access_token.as_deref(), Some("fresh-access"));
    assert_eq!(
        h.cipher
            .decrypt(user.spotify_refresh_token.as_deref().unwrap())
            .unwrap(),
        "refresh-secret"
    );
}

#[tokio::test]
async fn test_second_401_after_refresh_is_session_expired() {
    let h = harness().await;
    let user_id = seed_connected_user(&h.store, &h.cipher, "stale", "refresh-secret").await;

    h.upstream.push(ScriptedResponse::status(401));
    h.upstream
        .push(ScriptedResponse::ok(json!({ "access_token": "fresh" })));
    h.upstream.push(ScriptedResponse::status(401));

    let result = h.gateway.send(user_id, ApiRequest::get("/me")).await;
    assert!(matches!(result, Err(AppError::SessionExpired)));
    // Exactly one refresh attempt, one re-issue, no loop.
    assert_eq!(h.upstream.hits(), 3);
}

#[tokio::test]
async fn test_refresh_failure_is_session_expired_and_keeps_credentials() {
    let h = harness().await;
    let user_id = seed_connected_user(&h.store, &h.cipher, "stale", "refresh-secret").await;
    let before = h.store.get_user(user_id).await.unwrap().unwrap();

    h.upstream.push(ScriptedResponse::status(401));
    h.upstream.push(ScriptedResponse {
        status: 400,
        headers: Vec::new(),
        body: json!({ "error": "invalid_grant" }),
    });

    let result = h.gateway.send(user_id, ApiRequest::get("/me")).await;
    assert!(matches!(result, Err(AppError::SessionExpired)));

    // Stored credentials are untouched on refresh failure.
    let after = h.store.get_user(user_id).await.unwrap().unwrap();
    assert_eq!(after.spotify_access_token, before.spotify_access_token);
    assert_eq!(after.spotify_refresh_token, before.spotify_refresh_token);
}

#[tokio::test]
async fn test_refresh_token_rotation_is_persisted() {
    let h = harness().await;
    let user_id = seed_connected_user(&h.store, &h.cipher, "stale", "old-refresh").await;

    h.upstream.push(ScriptedResponse::status(401));
    h.upstream.push(ScriptedResponse::ok(json!({
        "access_token": "fresh",
        "refresh_token": "rotated-refresh",
    })));
    h.upstream.push(ScriptedResponse::ok(json!({})));

    h.gateway
        .send(user_id, ApiRequest::get("/me"))
        .await
        .expect("request should succeed after refresh");

    let user = h.store.get_user(user_id).await.unwrap().unwrap();
    let stored = user.spotify_refresh_token.unwrap();
    assert!(stored.contains(':'), "rotated token must be encrypted");
    assert_eq!(h.cipher.decrypt(&stored).unwrap(), "rotated-refresh");
}

#[tokio::test]
async fn test_force_refresh_mints_new_token() {
    let h = harness().await;
    let user_id = seed_connected_user(&h.store, &h.cipher, "current", "refresh-secret").await;

    h.upstream
        .push(ScriptedResponse::ok(json!({ "access_token": "forced" })));

    let token = h.gateway.force_refresh(user_id).await.unwrap();
    assert_eq!(token, "forced");

    let requests = h.upstream.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].path, "/api/token");
}

// ─── 429 backoff ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_429_with_budget_waits_margin_plus_jitter() {
    let h = harness().await;
    let user_id = seed_connected_user(&h.store, &h.cipher, "access", "refresh").await;

    h.upstream.push(ScriptedResponse::status(429).with_header("retry-after", "0"));
    h.upstream.push(ScriptedResponse::ok(json!({ "ok": true })));

    let started = Instant::now();
    let body: Value = h
        .gateway
        .json(user_id, ApiRequest::get("/me").retry_budget(1))
        .await
        .unwrap();
    let elapsed = started.elapsed();

    assert_eq!(body["ok"], true);
    assert_eq!(h.upstream.hits(), 2);
    // retry-after 0 still waits the 1s margin plus up to 1s of jitter.
    assert!(elapsed >= Duration::from_millis(1000), "elapsed {:?}", elapsed);
    assert!(elapsed < Duration::from_millis(2500), "elapsed {:?}", elapsed);
}

#[tokio::test]
async fn test_429_budget_zero_fails_fast() {
    let h = harness().await;
    let user_id = seed_connected_user(&h.store, &h.cipher, "access", "refresh").await;

    h.upstream.push(ScriptedResponse::status(429).with_header("retry-after", "5"));

    let started = Instant::now();
    let result = h
        .gateway
        .send(
            user_id,
            ApiRequest::get("/me/player/currently-playing").retry_budget(0),
        )
        .await;

    match result {
        Err(AppError::RateLimited { retry_after }) => assert_eq!(retry_after, Some(5)),
        other => panic!("expected RateLimited, got {:?}", other.map(|_| ())),
    }
    assert_eq!(h.upstream.hits(), 1);
    assert!(started.elapsed() < Duration::from_millis(500));
}

#[tokio::test]
async fn test_429_exhausted_budget_propagates_after_retries() {
    let h = harness().await;
    let user_id = seed_connected_user(&h.store, &h.cipher, "access", "refresh").await;

    for _ in 0..3 {
        h.upstream.push(ScriptedResponse::status(429).with_header("retry-after", "0"));
    }

    let started = Instant::now();
    let result = h
        .gateway
        .send(user_id, ApiRequest::get("/me").retry_budget(2))
        .await;

    assert!(matches!(result, Err(AppError::RateLimited { .. })));
    // Budget 2 means at most 2 retries: 3 upstream calls in total.
    assert_eq!(h.upstream.hits(), 3);
    // Two backoff cycles of at least 1s each.
    assert!(started.elapsed() >= Duration::from_millis(2000));
}

// ─── Other errors ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_other_upstream_errors_propagate_with_status_and_body() {
    let h = harness().await;
    let user_id = seed_connected_user(&h.store, &h.cipher, "access", "refresh").await;

    h.upstream.push(ScriptedResponse {
        status: 503,
        headers: Vec::new(),
        body: json!({ "error": "maintenance" }),
    });

    let result = h.gateway.send(user_id, ApiRequest::get("/me")).await;
    match result {
        Err(AppError::UpstreamUnavailable { status, body }) => {
            assert_eq!(status, Some(503));
            assert!(body.contains("maintenance"));
        }
        other => panic!("expected UpstreamUnavailable, got {:?}", other.map(|_| ())),
    }
}

#[tokio::test]
async fn test_optional_json_maps_204_to_none() {
    let h = harness().await;
    let user_id = seed_connected_user(&h.store, &h.cipher, "access", "refresh").await;

    h.upstream.push(ScriptedResponse::status(204));

    let result: Option<Value> = h
        .gateway
        .optional_json(user_id, ApiRequest::get("/me/player/currently-playing"))
        .await
        .unwrap();
    assert!(result.is_none());
}
