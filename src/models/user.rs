//! User model for storage and API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// User record as persisted in the `users` table.
///
/// A user either registered locally (has a password hash, starts
/// unverified) or came in via Spotify OAuth (no password, pre-verified).
/// The Spotify refresh token is encrypted at rest; the short-lived access
/// token is stored as-is.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    /// Email address (unique)
    pub email: String,
    /// Display name
    pub name: String,
    /// Argon2 hash; `None` for OAuth-only accounts
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    pub is_verified: bool,
    /// Single-use 6-digit email verification code
    #[serde(skip_serializing)]
    pub verification_code: Option<String>,
    /// Single-use password reset token
    #[serde(skip_serializing)]
    pub reset_token: Option<String>,
    pub reset_token_expires_at: Option<DateTime<Utc>>,
    /// Spotify user id once the account is linked
    pub spotify_id: Option<String>,
    /// Short-lived Spotify access token (plaintext)
    #[serde(skip_serializing)]
    pub spotify_access_token: Option<String>,
    /// Long-lived Spotify refresh token, stored `<nonceHex>:<cipherHex>`
    #[serde(skip_serializing)]
    pub spotify_refresh_token: Option<String>,
    /// Profile image URL
    pub image: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Fields needed to create a user.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub name: String,
    pub password_hash: Option<String>,
    pub is_verified: bool,
    pub verification_code: Option<String>,
    pub spotify_id: Option<String>,
    pub spotify_access_token: Option<String>,
    pub spotify_refresh_token: Option<String>,
    pub image: Option<String>,
}

/// Safe projection returned by profile endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct UserSummary {
    pub id: i64,
    pub email: String,
    pub name: String,
    pub image: Option<String>,
    pub spotify_id: Option<String>,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            name: user.name.clone(),
            image: user.image.clone(),
            spotify_id: user.spotify_id.clone(),
        }
    }
}
