// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Nova Player API Server
//!
//! Backend-for-frontend for the Nova Player web app: local and Spotify
//! OAuth sign-in, stateless sessions, and a proxied slice of the Spotify
//! Web API with transparent token refresh and rate-limit backoff.

use nova_player::{
    config::Config,
    crypto::TokenCipher,
    db::PgUserStore,
    services::{AccountService, Mailer, ResponseCache, SpotifyGateway, SpotifyService, VideoClient},
    AppState,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();

    // Load configuration from environment. Missing secrets are fatal;
    // there are no default keys to fall back to.
    let config = Config::from_env().expect("Failed to load configuration");
    tracing::info!(port = config.port, "Starting Nova Player API");

    let store = Arc::new(
        PgUserStore::connect(&config.database_url)
            .await
            .expect("Failed to connect to Postgres"),
    );

    let cipher = TokenCipher::new(config.encryption_key);
    let mailer = Mailer::from_config(&config).expect("Failed to initialize mailer");

    let gateway = SpotifyGateway::new(&config, store.clone(), cipher.clone());
    let cache = ResponseCache::in_memory();
    let video = VideoClient::new(config.youtube_api_key.clone());

    let accounts = AccountService::new(&config, store.clone(), mailer, cipher);
    let spotify = SpotifyService::new(gateway.clone(), cache, store.clone(), video);

    let state = Arc::new(AppState {
        config: config.clone(),
        store,
        accounts,
        gateway,
        spotify,
    });

    let app = nova_player::routes::create_router(state);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured logging (JSON in production, pretty when
/// NOVA_LOG_PRETTY is set).
fn init_logging() {
    let filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive("nova_player=debug".parse().unwrap())
        .add_directive("info".parse().unwrap());

    if std::env::var("NOVA_LOG_PRETTY").is_ok() {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    } else {
        let format = tracing_subscriber::fmt::layer()
            .json()
            .with_target(false)
            .with_current_span(true)
            .flatten_event(true);
        tracing_subscriber::registry().with(filter).with(format).init();
    }
}
