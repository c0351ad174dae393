// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Account lifecycle: registration, email verification, login, password
//! reset, and Spotify identity linking.

use std::sync::Arc;

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{Duration, Utc};
use rand::{Rng, RngCore};
use serde::Serialize;

use crate::config::Config;
use crate::crypto::TokenCipher;
use crate::db::UserStore;
use crate::error::AppError;
use crate::middleware::auth::create_session_token;
use crate::models::spotify::UserProfile;
use crate::models::{NewUser, User, UserSummary};
use crate::services::mailer::Mailer;

/// Reset tokens are honored for one hour.
const RESET_TOKEN_TTL_HOURS: i64 = 1;

/// Successful login payload.
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub user: UserSummary,
}

#[derive(Clone)]
pub struct AccountService {
    store: Arc<dyn UserStore>,
    mailer: Mailer,
    cipher: TokenCipher,
    jwt_secret: Vec<u8>,
    session_ttl_secs: u64,
    frontend_url: String,
}

impl AccountService {
    pub fn new(
        config: &Config,
        store: Arc<dyn UserStore>,
        mailer: Mailer,
        cipher: TokenCipher,
    ) -> Self {
        Self {
            store,
            mailer,
            cipher,
            jwt_secret: config.jwt_secret.clone(),
            session_ttl_secs: config.session_ttl_secs,
            frontend_url: config.frontend_url.clone(),
        }
    }

    /// Create an unverified account and email the verification code.
    pub async fn register(&self, email: &str, name: &str, password: &str) -> Result<i64, AppError> {
        let code = generate_verification_code();
        let password_hash = hash_password(password)?;

        let user = self
            .store
            .create_user(NewUser {
                email: email.to_string(),
                name: name.to_string(),
                password_hash: Some(password_hash),
                is_verified: false,
                verification_code: Some(code.clone()),
                spotify_id: None,
                spotify_access_token: None,
                spotify_refresh_token: None,
                image: None,
            })
            .await?;

        self.mailer
            .send_verification_code(&user.email, &user.name, &code)
            .await?;

        tracing::info!(user_id = user.id, "Account registered, verification code sent");
        Ok(user.id)
    }

    /// Consume the verification code. Single-use: the code is cleared on
    /// success, so replaying it fails.
    pub async fn verify(&self, email: &str, code: &str) -> Result<(), AppError> {
        let user = self
            .store
            .find_by_email(email)
            .await?
            .ok_or_else(|| AppError::NotFound("user".to_string()))?;

        if user.verification_code.as_deref() != Some(code) {
            return Err(AppError::InvalidCode);
        }

        self.store.mark_verified(user.id).await?;
        tracing::info!(user_id = user.id, "Account verified");
        Ok(())
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<LoginResponse, AppError> {
        let user = self
            .store
            .find_by_email(email)
            .await?
            .ok_or(AppError::IncorrectCredentials)?;

        // OAuth-only accounts have no local password.
        let Some(hash) = user.password_hash.as_deref() else {
            return Err(AppError::IncorrectCredentials);
        };

        if !user.is_verified {
            return Err(AppError::NotVerified);
        }

        if !verify_password(password, hash) {
            return Err(AppError::IncorrectCredentials);
        }

        Ok(LoginResponse {
            access_token: self.session_token(&user)?,
            user: UserSummary::from(&user),
        })
    }

    /// Issue a single-use reset token valid for one hour and email the
    /// reset link. Works from any account state.
    pub async fn forgot_password(&self, email: &str) -> Result<(), AppError> {
        let user = self
            .store
            .find_by_email(email)
            .await?
            .ok_or_else(|| AppError::NotFound("user".to_string()))?;

        let token = generate_reset_token();
        let expires_at = Utc::now() + Duration::hours(RESET_TOKEN_TTL_HOURS);
        self.store
            .set_reset_token(user.id, &token, expires_at)
            .await?;

        let reset_url = format!("{}/reset-password?token={}", self.frontend_url, token);
        self.mailer
            .send_password_reset(&user.email, &reset_url)
            .await?;

        tracing::info!(user_id = user.id, "Password reset token issued");
        Ok(())
    }

    /// Consume a reset token and store the new password hash.
    pub async fn reset_password(&self, token: &str, new_password: &str) -> Result<(), AppError> {
        let user = self
            .store
            .find_by_reset_token(token)
            .await?
            .ok_or(AppError::InvalidOrExpiredToken)?;

        match user.reset_token_expires_at {
            Some(expires_at) if expires_at > Utc::now() => {}
            _ => return Err(AppError::InvalidOrExpiredToken),
        }

        let password_hash = hash_password(new_password)?;
        self.store.set_password(user.id, &password_hash).await?;

        tracing::info!(user_id = user.id, "Password reset");
        Ok(())
    }

    /// Upsert a user from an OAuth callback: match on Spotify id or email,
    /// refresh the stored tokens, or create a pre-verified passwordless
    /// account. The refresh token is encrypted before it touches storage.
    pub async fn link_spotify_user(
        &self,
        profile: &UserProfile,
        access_token: &str,
        refresh_token: Option<&str>,
    ) -> Result<User, AppError> {
        let email = profile
            .email
            .clone()
            // Spotify may withhold the email; synthesize a stable one so the
            // unique column still works.
            .unwrap_or_else(|| format!("{}@users.spotify.local", profile.id));
        let name = profile
            .display_name
            .clone()
            .unwrap_or_else(|| profile.id.clone());
        let image = profile.images.first().map(|i| i.url.clone());

        let refresh_encrypted = match refresh_token {
            Some(token) => Some(self.cipher.encrypt(token)?),
            None => None,
        };

        let existing = self
            .store
            .find_by_spotify_identity(&profile.id, &email)
            .await?;

        let user = match existing {
            Some(user) => {
                self.store
                    .link_spotify(
                        user.id,
                        &profile.id,
                        image.as_deref(),
                        access_token,
                        refresh_encrypted.as_deref(),
                    )
                    .await?;
                self.store
                    .get_user(user.id)
                    .await?
                    .ok_or_else(|| AppError::NotFound(format!("User {}", user.id)))?
            }
            None => {
                self.store
                    .create_user(NewUser {
                        email,
                        name,
                        password_hash: None,
                        is_verified: true,
                        verification_code: None,
                        spotify_id: Some(profile.id.clone()),
                        spotify_access_token: Some(access_token.to_string()),
                        spotify_refresh_token: refresh_encrypted,
                        image,
                    })
                    .await?
            }
        };

        tracing::info!(user_id = user.id, spotify_id = %profile.id, "Spotify identity linked");
        Ok(user)
    }

    pub async fn profile(&self, user_id: i64) -> Result<UserSummary, AppError> {
        let user = self
            .store
            .get_user(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {}", user_id)))?;
        Ok(UserSummary::from(&user))
    }

    /// Mint a session token for a user (login and OAuth callback).
    pub fn session_token(&self, user: &User) -> Result<String, AppError> {
        create_session_token(user.id, &user.email, &self.jwt_secret, self.session_ttl_secs)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("session token: {}", e)))
    }
}

fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(anyhow::anyhow!("hash password: {}", e)))
}

/// Verification uses the parameters embedded in the hash itself.
fn verify_password(password: &str, hash: &str) -> bool {
    PasswordHash::new(hash)
        .map(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

/// 6-digit code delivered by email on registration.
fn generate_verification_code() -> String {
    rand::thread_rng().gen_range(100_000..1_000_000).to_string()
}

/// 256-bit single-use token for password resets, base64url without padding.
fn generate_reset_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_hash_roundtrip() {
        let hash = hash_password("hunter2!").unwrap();
        assert!(verify_password("hunter2!", &hash));
        assert!(!verify_password("hunter3!", &hash));
    }

    #[test]
    fn test_password_hashes_are_salted() {
        let a = hash_password("same").unwrap();
        let b = hash_password("same").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_verification_code_shape() {
        for _ in 0..20 {
            let code = generate_verification_code();
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn test_reset_tokens_are_unique() {
        let a = generate_reset_token();
        let b = generate_reset_token();
        assert_ne!(a, b);
        assert_eq!(a.len(), 43);
        assert!(!a.contains('='));
    }
}
