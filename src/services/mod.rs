// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod account;
pub mod cache;
pub mod gateway;
pub mod mailer;
pub mod spotify;
pub mod video;

pub use account::{AccountService, LoginResponse};
pub use cache::{CacheStore, InMemoryCacheStore, ResponseCache};
pub use gateway::{ApiRequest, SpotifyGateway};
pub use mailer::Mailer;
pub use spotify::SpotifyService;
pub use video::VideoClient;
