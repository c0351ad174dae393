// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Spotify Web API gateway: the single chokepoint for all outbound calls
//! on behalf of a user.
//!
//! Handles:
//! - Bearer auth from the user's stored access token
//! - Token refresh on 401 (serialized per user, one refresh per call)
//! - Rate-limit backoff with jitter on 429, bounded by a retry budget
//! - The `grant_type=refresh_token` Basic-auth flow against the accounts
//!   service, tolerating refresh-token rotation

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use rand::Rng;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::Mutex;

use crate::config::Config;
use crate::crypto::TokenCipher;
use crate::db::UserStore;
use crate::error::AppError;
use crate::models::spotify::{TokenResponse, UserProfile};

/// Default number of 429-triggered retries per logical call.
const DEFAULT_RETRY_BUDGET: u32 = 3;

/// Wait applied when a 429 carries no `retry-after` header.
const DEFAULT_RETRY_AFTER_SECS: u64 = 2;

/// Safety margin added on top of the upstream-advised wait.
const RETRY_MARGIN_SECS: u64 = 1;

/// Shared per-user refresh locks type for use in AppState.
pub type RefreshLocks = Arc<DashMap<i64, Arc<Mutex<()>>>>;

/// One outbound call: method, path (or absolute URL), query, body, extra
/// headers, and the remaining 429 retry budget. Built per call, consumed
/// by [`SpotifyGateway::send`].
#[derive(Debug, Clone)]
pub struct ApiRequest {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    json: Option<Value>,
    raw: Option<Vec<u8>>,
    headers: Vec<(&'static str, String)>,
    retry_budget: u32,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            json: None,
            raw: None,
            headers: Vec::new(),
            retry_budget: DEFAULT_RETRY_BUDGET,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn json(mut self, body: Value) -> Self {
        self.json = Some(body);
        self
    }

    /// Raw body with an explicit content type (playlist image uploads send
    /// bare base64 with `image/jpeg`).
    pub fn raw_body(mut self, content_type: &'static str, body: Vec<u8>) -> Self {
        self.headers.push(("content-type", content_type.to_string()));
        self.raw = Some(body);
        self
    }

    pub fn header(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.headers.push((name, value.into()));
        self
    }

    /// Override the retry budget. Latency-sensitive polls pass 0 so a
    /// throttle fails fast instead of blocking the caller.
    pub fn retry_budget(mut self, budget: u32) -> Self {
        self.retry_budget = budget;
        self
    }
}

/// Gateway wrapping all outbound Spotify calls.
#[derive(Clone)]
pub struct SpotifyGateway {
    http: reqwest::Client,
    api_url: String,
    accounts_url: String,
    client_id: String,
    client_secret: String,
    store: Arc<dyn UserStore>,
    cipher: TokenCipher,
    /// Per-user mutex to serialize token refresh operations.
    refresh_locks: RefreshLocks,
}

impl SpotifyGateway {
    pub fn new(config: &Config, store: Arc<dyn UserStore>, cipher: TokenCipher) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_url: config.spotify_api_url.clone(),
            accounts_url: config.spotify_accounts_url.clone(),
            client_id: config.spotify_client_id.clone(),
            client_secret: config.spotify_client_secret.clone(),
            store,
            cipher,
            refresh_locks: Arc::new(DashMap::new()),
        }
    }

    /// Perform one logical call for `user_id` and return the raw response
    /// on success. Refresh-on-401 and 429 backoff happen inside; anything
    /// still failing afterwards comes back as a typed error.
    pub async fn send(&self, user_id: i64, req: ApiRequest) -> Result<reqwest::Response, AppError> {
        let user = self
            .store
            .get_user(user_id)
            .await?
            .ok_or(AppError::NotConnected)?;
        let mut access = user.spotify_access_token.ok_or(AppError::NotConnected)?;

        let mut budget = req.retry_budget;
        let mut refreshed = false;

        loop {
            let response = self.issue(&req, &access).await?;
            let status = response.status();

            if status.is_success() {
                return Ok(response);
            }

            match status.as_u16() {
                401 if !refreshed => {
                    // Refresh is orthogonal to the rate-limit budget: the
                    // re-issued request keeps the caller's remaining budget.
                    refreshed = true;
                    access = self.refresh_access_token(user_id, Some(&access)).await?;
                }
                401 => return Err(AppError::SessionExpired),
                429 if budget > 0 => {
                    let delay = backoff_delay(retry_after_secs(&response));
                    tracing::warn!(
                        user_id,
                        path = %req.path,
                        delay_ms = delay.as_millis() as u64,
                        remaining = budget,
                        "Spotify rate limit hit, backing off"
                    );
                    tokio::time::sleep(delay).await;
                    budget -= 1;
                }
                429 => {
                    return Err(AppError::RateLimited {
                        retry_after: retry_after_secs(&response),
                    })
                }
                _ => {
                    let body = response.text().await.unwrap_or_default();
                    return Err(AppError::UpstreamUnavailable {
                        status: Some(status.as_u16()),
                        body,
                    });
                }
            }
        }
    }

    /// `send` + JSON decode.
    pub async fn json<T: DeserializeOwned>(
        &self,
        user_id: i64,
        req: ApiRequest,
    ) -> Result<T, AppError> {
        let response = self.send(user_id, req).await?;
        let status = response.status();
        response.json().await.map_err(|e| AppError::UpstreamUnavailable {
            status: Some(status.as_u16()),
            body: format!("JSON decode error: {}", e),
        })
    }

    /// `send` + JSON decode tolerating 204/empty bodies (playback state
    /// endpoints return 204 when nothing is playing).
    pub async fn optional_json<T: DeserializeOwned>(
        &self,
        user_id: i64,
        req: ApiRequest,
    ) -> Result<Option<T>, AppError> {
        let response = self.send(user_id, req).await?;
        let status = response.status();
        if status == StatusCode::NO_CONTENT {
            return Ok(None);
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| AppError::UpstreamUnavailable {
                status: Some(status.as_u16()),
                body: e.to_string(),
            })?;
        if bytes.is_empty() {
            return Ok(None);
        }
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| AppError::UpstreamUnavailable {
                status: Some(status.as_u16()),
                body: format!("JSON decode error: {}", e),
            })
    }

    /// `send` discarding the response body (transport controls).
    pub async fn empty(&self, user_id: i64, req: ApiRequest) -> Result<(), AppError> {
        self.send(user_id, req).await?;
        Ok(())
    }

    fn build_url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else {
            format!("{}{}", self.api_url, path)
        }
    }

    async fn issue(&self, req: &ApiRequest, access: &str) -> Result<reqwest::Response, AppError> {
        let url = self.build_url(&req.path);
        let mut builder = self
            .http
            .request(req.method.clone(), &url)
            .bearer_auth(access);

        if !req.query.is_empty() {
            builder = builder.query(&req.query);
        }
        for (name, value) in &req.headers {
            builder = builder.header(*name, value.as_str());
        }
        if let Some(body) = &req.json {
            builder = builder.json(body);
        }
        if let Some(raw) = &req.raw {
            builder = builder.body(raw.clone());
        }

        builder.send().await.map_err(|e| AppError::UpstreamUnavailable {
            status: None,
            body: e.to_string(),
        })
    }

    // ─── Token refresh ───────────────────────────────────────────────────

    /// Force a refresh regardless of the stored token's state (manual
    /// refresh endpoint). Returns the new access token.
    pub async fn force_refresh(&self, user_id: i64) -> Result<String, AppError> {
        self.refresh_access_token(user_id, None).await
    }

    /// Run the refresh protocol for `user_id`, serialized per user.
    ///
    /// `stale` is the access token that just got a 401. If the stored token
    /// already differs by the time the lock is held, a concurrent caller
    /// won the refresh and its token is reused without an upstream call.
    async fn refresh_access_token(
        &self,
        user_id: i64,
        stale: Option<&str>,
    ) -> Result<String, AppError> {
        let lock = self
            .refresh_locks
            .entry(user_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _guard = lock.lock().await;

        let user = self
            .store
            .get_user(user_id)
            .await?
            .ok_or(AppError::NotConnected)?;

        if let (Some(stale), Some(current)) = (stale, user.spotify_access_token.as_deref()) {
            if current != stale {
                return Ok(current.to_string());
            }
        }

        let encrypted = user
            .spotify_refresh_token
            .as_deref()
            .ok_or(AppError::NotConnected)?;
        let refresh_token = self.cipher.decrypt(encrypted)?;

        tracing::info!(user_id, "Access token rejected, refreshing");

        let token_url = format!("{}/api/token", self.accounts_url);
        let response = self
            .http
            .post(&token_url)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token.as_str()),
            ])
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(user_id, error = %e, "Token refresh request failed");
                AppError::SessionExpired
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(user_id, status = %status, body = %body, "Token refresh rejected");
            return Err(AppError::SessionExpired);
        }

        let refreshed: TokenResponse = response.json().await.map_err(|e| {
            tracing::warn!(user_id, error = %e, "Token refresh response unreadable");
            AppError::SessionExpired
        })?;

        // Rotation is optional upstream behavior; keep the stored refresh
        // token when none was issued.
        let rotated = match refreshed.refresh_token.as_deref() {
            Some(rt) => Some(self.cipher.encrypt(rt)?),
            None => None,
        };

        self.store
            .set_spotify_tokens(user_id, &refreshed.access_token, rotated.as_deref())
            .await?;

        tracing::info!(user_id, rotated = rotated.is_some(), "Access token refreshed");
        Ok(refreshed.access_token)
    }

    // ─── OAuth code exchange ─────────────────────────────────────────────

    /// Exchange an authorization code for tokens (OAuth callback).
    pub async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> Result<TokenResponse, AppError> {
        let token_url = format!("{}/api/token", self.accounts_url);
        let response = self
            .http
            .post(&token_url)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", redirect_uri),
            ])
            .send()
            .await
            .map_err(|e| AppError::UpstreamUnavailable {
                status: None,
                body: format!("Code exchange failed: {}", e),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Spotify code exchange failed");
            return Err(AppError::UpstreamUnavailable {
                status: Some(status.as_u16()),
                body,
            });
        }

        response.json().await.map_err(|e| AppError::UpstreamUnavailable {
            status: None,
            body: format!("Code exchange response unreadable: {}", e),
        })
    }

    /// Fetch the profile for a token that is not persisted yet (OAuth
    /// callback, before a user record exists).
    pub async fn fetch_profile(&self, access_token: &str) -> Result<UserProfile, AppError> {
        let url = format!("{}/me", self.api_url);
        let response = self
            .http
            .get(&url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| AppError::UpstreamUnavailable {
                status: None,
                body: e.to_string(),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::UpstreamUnavailable {
                status: Some(status.as_u16()),
                body,
            });
        }

        response.json().await.map_err(|e| AppError::UpstreamUnavailable {
            status: None,
            body: format!("Profile response unreadable: {}", e),
        })
    }
}

/// Read the advised wait from a 429 response.
fn retry_after_secs(response: &reqwest::Response) -> Option<u64> {
    response
        .headers()
        .get("retry-after")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
}

/// Advised wait (default 2s) + 1s margin + jitter in [0, 1000) ms.
///
/// The jitter desynchronizes concurrently-retrying requests that were
/// throttled in the same window.
fn backoff_delay(retry_after: Option<u64>) -> Duration {
    let advised = retry_after.unwrap_or(DEFAULT_RETRY_AFTER_SECS);
    let jitter = rand::thread_rng().gen_range(0..1000);
    Duration::from_secs(advised + RETRY_MARGIN_SECS) + Duration::from_millis(jitter)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_delay_bounds() {
        for _ in 0..100 {
            let delay = backoff_delay(Some(3));
            assert!(delay >= Duration::from_millis(4000));
            assert!(delay < Duration::from_millis(5000));
        }
    }

    #[test]
    fn test_backoff_delay_default_advice() {
        for _ in 0..100 {
            let delay = backoff_delay(None);
            assert!(delay >= Duration::from_millis(3000));
            assert!(delay < Duration::from_millis(4000));
        }
    }

    #[test]
    fn test_api_request_defaults() {
        let req = ApiRequest::get("/me/playlists");
        assert_eq!(req.retry_budget, DEFAULT_RETRY_BUDGET);
        assert!(req.json.is_none());
        assert!(req.query.is_empty());
    }

    #[test]
    fn test_api_request_budget_override() {
        let req = ApiRequest::get("/me/player/currently-playing").retry_budget(0);
        assert_eq!(req.retry_budget, 0);
    }
}
