// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shared test harness: in-memory app state and a scripted mock upstream
//! standing in for the Spotify API (both the Web API and the accounts
//! service token endpoint).

#![allow(dead_code)]

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::{HeaderName, StatusCode};
use axum::response::{IntoResponse, Response};
use serde_json::{json, Value};

use nova_player::config::Config;
use nova_player::crypto::TokenCipher;
use nova_player::db::{MemoryUserStore, UserStore};
use nova_player::middleware::auth::create_session_token;
use nova_player::models::NewUser;
use nova_player::routes::create_router;
use nova_player::services::{
    AccountService, Mailer, ResponseCache, SpotifyGateway, SpotifyService, VideoClient,
};
use nova_player::AppState;

// ─── Mock upstream ───────────────────────────────────────────────────────

/// One canned response, served in FIFO order regardless of path.
#[derive(Debug, Clone)]
pub struct ScriptedResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Value,
}

impl ScriptedResponse {
    pub fn ok(body: Value) -> Self {
        Self {
            status: 200,
            headers: Vec::new(),
            body,
        }
    }

    pub fn status(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: json!({}),
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }
}

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub authorization: Option<String>,
    pub body: String,
}

#[derive(Default)]
pub struct MockState {
    script: Mutex<VecDeque<ScriptedResponse>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

/// A local HTTP server that records every request and replays a scripted
/// response queue. An empty queue answers `200 {}`.
pub struct MockUpstream {
    pub addr: SocketAddr,
    state: Arc<MockState>,
}

impl MockUpstream {
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn push(&self, response: ScriptedResponse) {
        self.state.script.lock().unwrap().push_back(response);
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.requests.lock().unwrap().clone()
    }

    pub fn hits(&self) -> usize {
        self.state.requests.lock().unwrap().len()
    }
}

async fn mock_handler(State(state): State<Arc<MockState>>, request: Request) -> Response {
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let authorization = request
        .headers()
        .get("authorization")
        .and_then(|h| h.to_str().ok())
        .map(|s| s.to_string());
    let body_bytes = axum::body::to_bytes(request.into_body(), 1 << 20)
        .await
        .unwrap_or_default();

    state.requests.lock().unwrap().push(RecordedRequest {
        method,
        path,
        authorization,
        body: String::from_utf8_lossy(&body_bytes).to_string(),
    });

    let scripted = state
        .script
        .lock()
        .unwrap()
        .pop_front()
        .unwrap_or_else(|| ScriptedResponse::ok(json!({})));

    let status = StatusCode::from_u16(scripted.status).expect("valid status in script");
    // 204 must not carry a body.
    let mut response = if status == StatusCode::NO_CONTENT {
        status.into_response()
    } else {
        (status, axum::Json(scripted.body)).into_response()
    };
    for (name, value) in scripted.headers {
        response.headers_mut().insert(
            HeaderName::from_bytes(name.as_bytes()).expect("valid header name"),
            value.parse().expect("valid header value"),
        );
    }
    response
}

/// Bind an ephemeral port and serve the scripted handler.
pub async fn spawn_mock_upstream() -> MockUpstream {
    let state = Arc::new(MockState::default());
    let app = axum::Router::new()
        .fallback(mock_handler)
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind mock upstream");
    let addr = listener.local_addr().expect("mock upstream addr");

    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve mock upstream");
    });

    MockUpstream { addr, state }
}

// ─── Test app ────────────────────────────────────────────────────────────

/// Test config pointing the gateway at the mock upstream (when given).
pub fn test_config(upstream: Option<&MockUpstream>) -> Config {
    let mut config = Config::test_default();
    if let Some(upstream) = upstream {
        config.spotify_api_url = upstream.base_url();
        config.spotify_accounts_url = upstream.base_url();
    }
    config
}

/// Build a full app (router + state) over an in-memory store.
pub fn create_test_app(config: Config) -> (axum::Router, Arc<AppState>) {
    let store: Arc<dyn UserStore> = Arc::new(MemoryUserStore::new());
    let cipher = TokenCipher::new(config.encryption_key);
    let mailer = Mailer::from_config(&config).expect("test mailer");

    let gateway = SpotifyGateway::new(&config, store.clone(), cipher.clone());
    let cache = ResponseCache::in_memory();
    let video = VideoClient::new(None);

    let accounts = AccountService::new(&config, store.clone(), mailer, cipher);
    let spotify = SpotifyService::new(gateway.clone(), cache, store.clone(), video);

    let state = Arc::new(AppState {
        config,
        store,
        accounts,
        gateway,
        spotify,
    });

    (create_router(state.clone()), state)
}

/// Seed a verified user whose Spotify tokens are on file.
pub async fn seed_connected_user(
    store: &Arc<dyn UserStore>,
    cipher: &TokenCipher,
    access_token: &str,
    refresh_token: &str,
) -> i64 {
    let user = store
        .create_user(NewUser {
            email: "listener@example.com".to_string(),
            name: "Listener".to_string(),
            password_hash: None,
            is_verified: true,
            verification_code: None,
            spotify_id: Some("spotify-listener".to_string()),
            spotify_access_token: Some(access_token.to_string()),
            spotify_refresh_token: Some(cipher.encrypt(refresh_token).expect("encrypt refresh")),
            image: None,
        })
        .await
        .expect("seed user");
    user.id
}

/// Seed a verified user with no Spotify connection.
pub async fn seed_unconnected_user(store: &Arc<dyn UserStore>) -> i64 {
    let user = store
        .create_user(NewUser {
            email: "offline@example.com".to_string(),
            name: "Offline".to_string(),
            password_hash: None,
            is_verified: true,
            verification_code: None,
            spotify_id: None,
            spotify_access_token: None,
            spotify_refresh_token: None,
            image: None,
        })
        .await
        .expect("seed user");
    user.id
}

/// Mint a session token the way login does.
pub fn session_token(config: &Config, user_id: i64, email: &str) -> String {
    create_session_token(user_id, email, &config.jwt_secret, config.session_ttl_secs)
        .expect("session token")
}

/// Read a JSON response body.
pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), 1 << 20)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("JSON body")
}
