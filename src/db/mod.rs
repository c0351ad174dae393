//! Database layer.
//!
//! The user store is behind a trait so handlers and services stay agnostic
//! of the backend: Postgres in production, an in-memory adapter for tests.

pub mod memory;
pub mod postgres;

pub use memory::MemoryUserStore;
pub use postgres::PgUserStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::AppError;
use crate::models::{NewUser, User};

/// Typed operations over the `users` table. Token writes are
/// last-write-wins; no row locking is done here.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn create_user(&self, new: NewUser) -> Result<User, AppError>;

    async fn get_user(&self, id: i64) -> Result<Option<User>, AppError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError>;

    async fn find_by_reset_token(&self, token: &str) -> Result<Option<User>, AppError>;

    /// Match an OAuth identity to an existing account, by Spotify id first
    /// and then by email.
    async fn find_by_spotify_identity(
        &self,
        spotify_id: &str,
        email: &str,
    ) -> Result<Option<User>, AppError>;

    /// Flip the account to verified and consume the verification code.
    async fn mark_verified(&self, id: i64) -> Result<(), AppError>;

    async fn set_reset_token(
        &self,
        id: i64,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), AppError>;

    /// Store a new password hash and consume the reset token.
    async fn set_password(&self, id: i64, password_hash: &str) -> Result<(), AppError>;

    /// Persist a fresh access token and, when the upstream rotated it, the
    /// re-encrypted refresh token. `refresh_encrypted = None` keeps the
    /// stored refresh token.
    async fn set_spotify_tokens(
        &self,
        id: i64,
        access_token: &str,
        refresh_encrypted: Option<&str>,
    ) -> Result<(), AppError>;

    /// Attach (or re-attach) a Spotify identity to an account.
    async fn link_spotify(
        &self,
        id: i64,
        spotify_id: &str,
        image: Option<&str>,
        access_token: &str,
        refresh_encrypted: Option<&str>,
    ) -> Result<(), AppError>;
}
