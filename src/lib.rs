// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Nova Player backend: authenticates users (local credentials or Spotify
//! OAuth), issues session tokens, and proxies the Spotify Web API on their
//! behalf with transparent token refresh, rate-limit backoff and caching.

pub mod config;
pub mod crypto;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

use std::sync::Arc;

use config::Config;
use db::UserStore;
use services::{AccountService, SpotifyGateway, SpotifyService};

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn UserStore>,
    pub accounts: AccountService,
    pub gateway: SpotifyGateway,
    pub spotify: SpotifyService,
}
