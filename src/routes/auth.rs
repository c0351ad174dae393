// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Authentication routes: local credentials and Spotify OAuth.

use axum::{
    extract::{Query, State},
    response::Redirect,
    routing::{get, post},
    Extension, Json, Router,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use validator::Validate;

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::UserSummary;
use crate::services::LoginResponse;
use crate::AppState;

// Type alias for HMAC-SHA256
type HmacSha256 = Hmac<Sha256>;

/// Scopes requested from Spotify. Everything the player frontend touches:
/// profile, library, follows, playlists, cover uploads, and playback.
const SPOTIFY_SCOPES: &str = "user-read-email user-read-private user-top-read \
     user-read-recently-played user-library-read user-library-modify \
     user-follow-read user-follow-modify playlist-read-private \
     playlist-read-collaborative playlist-modify-public playlist-modify-private \
     ugc-image-upload streaming user-read-playback-state \
     user-modify-playback-state user-read-currently-playing";

/// Public auth routes (no session required).
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/verify", post(verify))
        .route("/auth/login", post(login))
        .route("/auth/forgot-password", post(forgot_password))
        .route("/auth/reset-password", post(reset_password))
        .route("/auth/spotify", get(spotify_start))
        .route("/auth/spotify/callback", get(spotify_callback))
}

/// Auth routes behind the session middleware.
pub fn protected_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/me", get(me))
        .route("/auth/spotify/refresh", post(refresh_spotify_token))
}

// ─── Local credentials ───────────────────────────────────────────────────

#[derive(Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email)]
    email: String,
    #[validate(length(min = 1, max = 100))]
    name: String,
    #[validate(length(min = 6, max = 128))]
    password: String,
}

#[derive(Serialize)]
pub struct RegisterResponse {
    pub message: String,
    pub user_id: i64,
}

async fn register(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RegisterRequest>,
) -> Result<Json<RegisterResponse>> {
    payload
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let user_id = state
        .accounts
        .register(&payload.email, &payload.name, &payload.password)
        .await?;

    Ok(Json(RegisterResponse {
        message: "Account created. Check your inbox for the verification code.".to_string(),
        user_id,
    }))
}

#[derive(Deserialize, Validate)]
pub struct VerifyRequest {
    #[validate(email)]
    email: String,
    #[validate(length(equal = 6))]
    code: String,
}

#[derive(Serialize)]
pub struct MessageResponse {
    pub message: String,
}

async fn verify(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<VerifyRequest>,
) -> Result<Json<MessageResponse>> {
    payload
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    state.accounts.verify(&payload.email, &payload.code).await?;

    Ok(Json(MessageResponse {
        message: "Account verified. You can log in now.".to_string(),
    }))
}

#[derive(Deserialize)]
pub struct LoginRequest {
    email: String,
    password: String,
}

async fn login(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<LoginResponse>> {
    let response = state
        .accounts
        .login(&payload.email, &payload.password)
        .await?;
    Ok(Json(response))
}

#[derive(Deserialize, Validate)]
pub struct ForgotPasswordRequest {
    #[validate(email)]
    email: String,
}

async fn forgot_password(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ForgotPasswordRequest>,
) -> Result<Json<MessageResponse>> {
    payload
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    state.accounts.forgot_password(&payload.email).await?;

    Ok(Json(MessageResponse {
        message: "Email sent. Check your inbox.".to_string(),
    }))
}

#[derive(Deserialize, Validate)]
pub struct ResetPasswordRequest {
    token: String,
    #[validate(length(min = 6, max = 128))]
    new_password: String,
}

async fn reset_password(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ResetPasswordRequest>,
) -> Result<Json<MessageResponse>> {
    payload
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    state
        .accounts
        .reset_password(&payload.token, &payload.new_password)
        .await?;

    Ok(Json(MessageResponse {
        message: "Password updated successfully.".to_string(),
    }))
}

// ─── Session profile ─────────────────────────────────────────────────────

async fn me(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<UserSummary>> {
    Ok(Json(state.accounts.profile(user.user_id).await?))
}

#[derive(Serialize)]
pub struct TokenBody {
    pub token: String,
}

/// Force a Spotify token refresh for the session user.
async fn refresh_spotify_token(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<TokenBody>> {
    let token = state.spotify.refresh_access_token(user.user_id).await?;
    Ok(Json(TokenBody { token }))
}

// ─── Spotify OAuth ───────────────────────────────────────────────────────

/// Query parameters for starting OAuth flow.
#[derive(Deserialize)]
pub struct AuthStartParams {
    /// Frontend URL to redirect back to after OAuth completes.
    /// If not provided, uses the configured frontend URL.
    #[serde(default)]
    redirect_uri: Option<String>,
}

/// Start OAuth flow - redirect to Spotify authorization.
async fn spotify_start(
    State(state): State<Arc<AppState>>,
    Query(params): Query<AuthStartParams>,
    headers: axum::http::HeaderMap,
) -> Result<Redirect> {
    let frontend_url = params
        .redirect_uri
        .unwrap_or_else(|| state.config.frontend_url.clone());

    // Encode frontend URL + timestamp in state
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("System time error: {}", e)))?
        .as_millis();

    // Create the data payload: "frontend_url|timestamp_hex"
    let state_payload = format!("{}|{:x}", frontend_url, timestamp);

    // Sign the payload
    let mut mac = HmacSha256::new_from_slice(&state.config.oauth_state_key)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("HMAC init failed: {}", e)))?;
    mac.update(state_payload.as_bytes());
    let signature = mac.finalize().into_bytes();

    // Combine payload + signature and base64 encode for the URL
    let signed_state = format!("{}|{}", state_payload, hex::encode(signature));
    let oauth_state = URL_SAFE_NO_PAD.encode(signed_state.as_bytes());

    let callback = callback_url(&headers);

    let auth_url = format!(
        "{}/authorize?client_id={}&response_type=code&redirect_uri={}&scope={}&state={}",
        state.config.spotify_accounts_url,
        state.config.spotify_client_id,
        urlencoding::encode(&callback),
        urlencoding::encode(SPOTIFY_SCOPES),
        oauth_state
    );

    tracing::info!(
        client_id = %state.config.spotify_client_id,
        frontend_url = %frontend_url,
        "Starting OAuth flow, redirecting to Spotify"
    );

    Ok(Redirect::temporary(&auth_url))
}

#[derive(Deserialize)]
pub struct CallbackParams {
    #[serde(default)]
    code: Option<String>,
    state: String,
    #[serde(default)]
    error: Option<String>,
}

/// OAuth callback - exchange code for tokens, link the user, mint a
/// session token, and bounce back to the frontend with the token in the
/// query string (the frontend stores it client-side).
async fn spotify_callback(
    State(state): State<Arc<AppState>>,
    headers: axum::http::HeaderMap,
    Query(params): Query<CallbackParams>,
) -> Result<Redirect> {
    // Decode and verify frontend URL from state parameter
    let frontend_url = verify_and_decode_state(&params.state, &state.config.oauth_state_key)
        .unwrap_or_else(|| {
            tracing::warn!(
                "Invalid or tampered state parameter, falling back to default frontend URL"
            );
            state.config.frontend_url.clone()
        });

    // Check for OAuth errors (user denied, etc.)
    if let Some(error) = params.error {
        tracing::warn!(error = %error, "OAuth error from Spotify");
        let redirect = format!("{}?error={}", frontend_url, error);
        return Ok(Redirect::temporary(&redirect));
    }

    let code = params
        .code
        .ok_or_else(|| AppError::BadRequest("missing authorization code".to_string()))?;

    tracing::info!("Exchanging authorization code for tokens");

    let tokens = state
        .gateway
        .exchange_code(&code, &callback_url(&headers))
        .await?;
    let profile = state.gateway.fetch_profile(&tokens.access_token).await?;

    let user = state
        .accounts
        .link_spotify_user(
            &profile,
            &tokens.access_token,
            tokens.refresh_token.as_deref(),
        )
        .await?;

    let jwt = state.accounts.session_token(&user)?;

    let redirect_url = format!("{}/callback?token={}", frontend_url, jwt);
    Ok(Redirect::temporary(&redirect_url))
}

/// Build the OAuth callback URL from the request's Host header.
fn callback_url(headers: &axum::http::HeaderMap) -> String {
    let host = headers
        .get(axum::http::header::HOST)
        .and_then(|h| h.to_str().ok())
        .map(|s| s.to_string())
        .unwrap_or_else(|| {
            std::env::var("API_HOST").unwrap_or_else(|_| "localhost:9000".to_string())
        });

    let scheme = if host.contains("localhost") || host.contains("127.0.0.1") {
        "http"
    } else {
        "https"
    };

    format!("{}://{}/auth/spotify/callback", scheme, host)
}

/// Verify HMAC signature and decode the frontend URL from the OAuth state parameter.
fn verify_and_decode_state(state: &str, secret: &[u8]) -> Option<String> {
    let bytes = URL_SAFE_NO_PAD.decode(state).ok()?;
    let state_str = String::from_utf8(bytes).ok()?;

    // Format is "frontend_url|timestamp_hex|signature_hex"
    let parts: Vec<&str> = state_str.splitn(3, '|').collect();
    if parts.len() != 3 {
        return None;
    }

    let frontend_url = parts[0];
    let timestamp_hex = parts[1];
    let signature_hex = parts[2];

    // Reconstruct payload and verify signature
    let payload = format!("{}|{}", frontend_url, timestamp_hex);

    let mut mac = HmacSha256::new_from_slice(secret).ok()?;
    mac.update(payload.as_bytes());

    let expected_signature = hex::encode(mac.finalize().into_bytes());

    if signature_hex != expected_signature {
        tracing::error!("OAuth state signature mismatch! Potential tampering.");
        return None;
    }

    Some(frontend_url.to_string())
}
