// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Postgres-backed user store (sqlx).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};

use crate::db::UserStore;
use crate::error::AppError;
use crate::models::{NewUser, User};

const USER_COLUMNS: &str = "id, email, name, password_hash, is_verified, verification_code, \
     reset_token, reset_token_expires_at, spotify_id, spotify_access_token, \
     spotify_refresh_token, image, created_at";

/// Postgres user store.
#[derive(Clone)]
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    /// Connect and run pending migrations.
    pub async fn connect(database_url: &str) -> Result<Self, AppError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Postgres: {}", e)))?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| AppError::Database(format!("Migration failed: {}", e)))?;

        tracing::info!("Connected to Postgres");
        Ok(Self { pool })
    }
}

fn db_err(e: sqlx::Error) -> AppError {
    AppError::Database(e.to_string())
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn create_user(&self, new: NewUser) -> Result<User, AppError> {
        let sql = format!(
            "INSERT INTO users \
             (email, name, password_hash, is_verified, verification_code, \
              spotify_id, spotify_access_token, spotify_refresh_token, image) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             RETURNING {USER_COLUMNS}"
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(&new.email)
            .bind(&new.name)
            .bind(&new.password_hash)
            .bind(new.is_verified)
            .bind(&new.verification_code)
            .bind(&new.spotify_id)
            .bind(&new.spotify_access_token)
            .bind(&new.spotify_refresh_token)
            .bind(&new.image)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| match &e {
                sqlx::Error::Database(db) if db.is_unique_violation() => {
                    AppError::Conflict("email already registered".to_string())
                }
                _ => db_err(e),
            })
    }

    async fn get_user(&self, id: i64) -> Result<Option<User>, AppError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        sqlx::query_as::<_, User>(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)
    }

    async fn find_by_reset_token(&self, token: &str) -> Result<Option<User>, AppError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE reset_token = $1");
        sqlx::query_as::<_, User>(&sql)
            .bind(token)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)
    }

    async fn find_by_spotify_identity(
        &self,
        spotify_id: &str,
        email: &str,
    ) -> Result<Option<User>, AppError> {
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users \
             WHERE spotify_id = $1 OR email = $2 \
             ORDER BY (spotify_id IS NOT DISTINCT FROM $1) DESC \
             LIMIT 1"
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(spotify_id)
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)
    }

    async fn mark_verified(&self, id: i64) -> Result<(), AppError> {
        sqlx::query("UPDATE users SET is_verified = TRUE, verification_code = NULL WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn set_reset_token(
        &self,
        id: i64,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        sqlx::query("UPDATE users SET reset_token = $2, reset_token_expires_at = $3 WHERE id = $1")
            .bind(id)
            .bind(token)
            .bind(expires_at)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn set_password(&self, id: i64, password_hash: &str) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE users SET password_hash = $2, reset_token = NULL, \
             reset_token_expires_at = NULL WHERE id = $1",
        )
        .bind(id)
        .bind(password_hash)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn set_spotify_tokens(
        &self,
        id: i64,
        access_token: &str,
        refresh_encrypted: Option<&str>,
    ) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE users SET spotify_access_token = $2, \
             spotify_refresh_token = COALESCE($3, spotify_refresh_token) \
             WHERE id = $1",
        )
        .bind(id)
        .bind(access_token)
        .bind(refresh_encrypted)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn link_spotify(
        &self,
        id: i64,
        spotify_id: &str,
        image: Option<&str>,
        access_token: &str,
        refresh_encrypted: Option<&str>,
    ) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE users SET spotify_id = $2, image = COALESCE($3, image), \
             spotify_access_token = $4, \
             spotify_refresh_token = COALESCE($5, spotify_refresh_token) \
             WHERE id = $1",
        )
        .bind(id)
        .bind(spotify_id)
        .bind(image)
        .bind(access_token)
        .bind(refresh_encrypted)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }
}
