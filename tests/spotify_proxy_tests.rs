// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! End-to-end proxy tests: session in, scripted Spotify upstream out.

mod common;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt; // for oneshot

use common::{
    body_json, create_test_app, seed_connected_user, session_token, spawn_mock_upstream,
    test_config, ScriptedResponse,
};

async fn connected_app() -> (
    axum::Router,
    std::sync::Arc<nova_player::AppState>,
    common::MockUpstream,
    String,
) {
    let upstream = spawn_mock_upstream().await;
    let config = test_config(Some(&upstream));
    let (app, state) = create_test_app(config.clone());

    let cipher = nova_player::crypto::TokenCipher::new(config.encryption_key);
    let user_id = seed_connected_user(&state.store, &cipher, "access-token", "refresh-token").await;
    let token = session_token(&config, user_id, "listener@example.com");

    (app, state, upstream, token)
}

fn get(uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap()
}

fn send_json(method: &str, uri: &str, token: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_playlists_proxy_returns_items() {
    let (app, _, upstream, token) = connected_app().await;

    upstream.push(ScriptedResponse::ok(json!({
        "items": [
            { "id": "pl1", "name": "Morning Mix", "images": [] },
            { "id": "pl2", "name": "Focus", "images": [] },
        ],
        "total": 2,
    })));

    let response = app.oneshot(get("/spotify/playlists", &token)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    let items = body.as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0]["id"], "pl1");
    assert_eq!(items[1]["name"], "Focus");

    let requests = upstream.requests();
    assert_eq!(requests[0].path, "/me/playlists");
    assert_eq!(
        requests[0].authorization.as_deref(),
        Some("Bearer access-token")
    );
}

#[tokio::test]
async fn test_play_sends_context_and_offset_shape() {
    let (app, _, upstream, token) = connected_app().await;

    upstream.push(ScriptedResponse::status(204));

    let response = app
        .oneshot(send_json(
            "PUT",
            "/spotify/play",
            &token,
            json!({
                "device_id": "device-7",
                "context_uri": "spotify:playlist:pl1",
                "uris": ["spotify:track:abc"],
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["success"], true);

    let requests = upstream.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].method, "PUT");
    assert_eq!(requests[0].path, "/me/player/play");

    let outbound: Value = serde_json::from_str(&requests[0].body).unwrap();
    assert_eq!(
        outbound,
        json!({
            "context_uri": "spotify:playlist:pl1",
            "offset": { "uri": "spotify:track:abc" },
        })
    );
}

#[tokio::test]
async fn test_play_uri_list_without_context() {
    let (app, _, upstream, token) = connected_app().await;

    upstream.push(ScriptedResponse::status(204));

    let uris: Vec<String> = (0..3).map(|i| format!("spotify:track:t{}", i)).collect();
    let response = app
        .oneshot(send_json(
            "PUT",
            "/spotify/play",
            &token,
            json!({ "uris": uris }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let requests = upstream.requests();
    let outbound: Value = serde_json::from_str(&requests[0].body).unwrap();
    assert!(outbound.get("context_uri").is_none());
    assert_eq!(outbound["uris"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_currently_playing_204_is_null_and_cached() {
    let (app, _, upstream, token) = connected_app().await;

    upstream.push(ScriptedResponse::status(204));

    let response = app
        .clone()
        .oneshot(get("/spotify/currently-playing", &token))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, Value::Null);

    // Poll again inside the 2s TTL: served from cache, no second call.
    let response = app
        .oneshot(get("/spotify/currently-playing", &token))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, Value::Null);

    assert_eq!(upstream.hits(), 1);
}

#[tokio::test]
async fn test_currently_playing_is_reshaped() {
    let (app, _, upstream, token) = connected_app().await;

    upstream.push(ScriptedResponse::ok(json!({
        "item": {
            "id": "trk1",
            "name": "Song",
            "uri": "spotify:track:trk1",
            "duration_ms": 180000,
            "artists": [{ "id": "art1", "name": "Band" }],
        },
        "is_playing": true,
        "progress_ms": 42000,
        "device": { "id": "device-9", "name": "Kitchen" },
    })));

    let response = app
        .oneshot(get("/spotify/currently-playing", &token))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["item"]["id"], "trk1");
    assert_eq!(body["is_playing"], true);
    assert_eq!(body["device_id"], "device-9");
    assert_eq!(body["progress_ms"], 42000);
}

#[tokio::test]
async fn test_top_tracks_degrade_to_empty_on_upstream_error() {
    let (app, _, upstream, token) = connected_app().await;

    upstream.push(ScriptedResponse {
        status: 500,
        headers: Vec::new(),
        body: json!({ "error": "server_error" }),
    });

    let response = app.oneshot(get("/spotify/top-tracks", &token)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!([]));
}

#[tokio::test]
async fn test_save_track_surfaces_upstream_failure() {
    let (app, _, upstream, token) = connected_app().await;

    upstream.push(ScriptedResponse {
        status: 500,
        headers: Vec::new(),
        body: json!({ "error": "server_error" }),
    });

    // State-changing operations must not swallow failures.
    let response = app
        .oneshot(
            Request::builder()
                .method("PUT")
                .uri("/spotify/save-track/trk1")
                .header(header::AUTHORIZATION, format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn test_follow_status_is_cached() {
    let (app, _, upstream, token) = connected_app().await;

    // First check succeeds and is cached.
    upstream.push(ScriptedResponse::ok(json!([true])));
    let response = app
        .clone()
        .oneshot(get("/spotify/artist/art1/is-following", &token))
        .await
        .unwrap();
    assert_eq!(body_json(response).await, json!(true));

    // Cached: a second check does not hit the upstream.
    let response = app
        .clone()
        .oneshot(get("/spotify/artist/art1/is-following", &token))
        .await
        .unwrap();
    assert_eq!(body_json(response).await, json!(true));
    assert_eq!(upstream.hits(), 1);
}

#[tokio::test]
async fn test_spotify_token_endpoint_returns_stored_token() {
    let (app, _, _upstream, token) = connected_app().await;

    let response = app.oneshot(get("/spotify/token", &token)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["token"], "access-token");
}

#[tokio::test]
async fn test_video_lookup_without_key_is_null() {
    let (app, _, _upstream, token) = connected_app().await;

    let response = app
        .oneshot(get("/spotify/video?q=Song%20Band", &token))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, Value::Null);
}
