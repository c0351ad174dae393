// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-memory user store for tests and offline development.

use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;

use crate::db::UserStore;
use crate::error::AppError;
use crate::models::{NewUser, User};

/// DashMap-backed store with the same semantics as the Postgres adapter.
pub struct MemoryUserStore {
    users: DashMap<i64, User>,
    next_id: AtomicI64,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self {
            users: DashMap::new(),
            next_id: AtomicI64::new(1),
        }
    }

    fn update<F>(&self, id: i64, f: F) -> Result<(), AppError>
    where
        F: FnOnce(&mut User),
    {
        match self.users.get_mut(&id) {
            Some(mut user) => {
                f(&mut user);
                Ok(())
            }
            None => Err(AppError::NotFound(format!("User {}", id))),
        }
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn create_user(&self, new: NewUser) -> Result<User, AppError> {
        if self.users.iter().any(|u| u.email == new.email) {
            return Err(AppError::Conflict("email already registered".to_string()));
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let user = User {
            id,
            email: new.email,
            name: new.name,
            password_hash: new.password_hash,
            is_verified: new.is_verified,
            verification_code: new.verification_code,
            reset_token: None,
            reset_token_expires_at: None,
            spotify_id: new.spotify_id,
            spotify_access_token: new.spotify_access_token,
            spotify_refresh_token: new.spotify_refresh_token,
            image: new.image,
            created_at: Utc::now(),
        };
        self.users.insert(id, user.clone());
        Ok(user)
    }

    async fn get_user(&self, id: i64) -> Result<Option<User>, AppError> {
        Ok(self.users.get(&id).map(|u| u.clone()))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        Ok(self
            .users
            .iter()
            .find(|u| u.email == email)
            .map(|u| u.clone()))
    }

    async fn find_by_reset_token(&self, token: &str) -> Result<Option<User>, AppError> {
        Ok(self
            .users
            .iter()
            .find(|u| u.reset_token.as_deref() == Some(token))
            .map(|u| u.clone()))
    }

    async fn find_by_spotify_identity(
        &self,
        spotify_id: &str,
        email: &str,
    ) -> Result<Option<User>, AppError> {
        // Spotify id wins over email, matching the SQL adapter's ordering.
        if let Some(user) = self
            .users
            .iter()
            .find(|u| u.spotify_id.as_deref() == Some(spotify_id))
        {
            return Ok(Some(user.clone()));
        }
        self.find_by_email(email).await
    }

    async fn mark_verified(&self, id: i64) -> Result<(), AppError> {
        self.update(id, |u| {
            u.is_verified = true;
            u.verification_code = None;
        })
    }

    async fn set_reset_token(
        &self,
        id: i64,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        self.update(id, |u| {
            u.reset_token = Some(token.to_string());
            u.reset_token_expires_at = Some(expires_at);
        })
    }

    async fn set_password(&self, id: i64, password_hash: &str) -> Result<(), AppError> {
        self.update(id, |u| {
            u.password_hash = Some(password_hash.to_string());
            u.reset_token = None;
            u.reset_token_expires_at = None;
        })
    }

    async fn set_spotify_tokens(
        &self,
        id: i64,
        access_token: &str,
        refresh_encrypted: Option<&str>,
    ) -> Result<(), AppError> {
        self.update(id, |u| {
            u.spotify_access_token = Some(access_token.to_string());
            if let Some(refresh) = refresh_encrypted {
                u.spotify_refresh_token = Some(refresh.to_string());
            }
        })
    }

    async fn link_spotify(
        &self,
        id: i64,
        spotify_id: &str,
        image: Option<&str>,
        access_token: &str,
        refresh_encrypted: Option<&str>,
    ) -> Result<(), AppError> {
        self.update(id, |u| {
            u.spotify_id = Some(spotify_id.to_string());
            if let Some(image) = image {
                u.image = Some(image.to_string());
            }
            u.spotify_access_token = Some(access_token.to_string());
            if let Some(refresh) = refresh_encrypted {
                u.spotify_refresh_token = Some(refresh.to_string());
            }
        })
    }
}
