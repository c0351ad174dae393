//! Application configuration loaded from environment variables.
//!
//! All cryptographic material (session signing key, token encryption key,
//! Spotify client secret) is required; startup fails if any is missing.

use std::env;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};

/// How the mailer delivers messages.
#[derive(Debug, Clone)]
pub enum EmailTransportConfig {
    /// SMTP relay (production).
    Smtp {
        host: String,
        port: u16,
        username: String,
        password: String,
    },
    /// Write messages to a directory (development).
    File { path: String },
    /// Drop messages, log only (tests).
    Disabled,
}

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Spotify OAuth client ID (public)
    pub spotify_client_id: String,
    /// Spotify OAuth client secret
    pub spotify_client_secret: String,
    /// Spotify Web API base URL
    pub spotify_api_url: String,
    /// Spotify accounts service base URL (token endpoint lives here)
    pub spotify_accounts_url: String,
    /// Frontend URL for OAuth redirects and email links
    pub frontend_url: String,
    /// Origins allowed by CORS
    pub allowed_origins: Vec<String>,
    /// Postgres connection string
    pub database_url: String,
    /// Server port
    pub port: u16,

    /// Session signing key (HS256)
    pub jwt_secret: Vec<u8>,
    /// Session token lifetime in seconds
    pub session_ttl_secs: u64,
    /// HMAC key for signing the OAuth state parameter
    pub oauth_state_key: Vec<u8>,
    /// AES-256 key for refresh tokens at rest (32 bytes)
    pub encryption_key: [u8; 32],

    /// Mail delivery
    pub email_transport: EmailTransportConfig,
    pub email_from_name: String,
    pub email_from_address: String,

    /// YouTube Data API key for video lookups (optional; lookups return
    /// nothing when unset)
    pub youtube_api_key: Option<String>,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let encryption_key_b64 =
            env::var("ENCRYPTION_KEY").map_err(|_| ConfigError::Missing("ENCRYPTION_KEY"))?;
        let encryption_key = decode_encryption_key(&encryption_key_b64)?;

        let allowed_origins = env::var("ALLOWED_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:3000,http://localhost:3001".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let email_transport = match env::var("EMAIL_TRANSPORT").as_deref() {
            Ok("file") => EmailTransportConfig::File {
                path: env::var("EMAIL_FILE_PATH").unwrap_or_else(|_| "emails".to_string()),
            },
            Ok("disabled") => EmailTransportConfig::Disabled,
            _ => EmailTransportConfig::Smtp {
                host: env::var("EMAIL_HOST").map_err(|_| ConfigError::Missing("EMAIL_HOST"))?,
                port: env::var("EMAIL_PORT")
                    .unwrap_or_else(|_| "587".to_string())
                    .parse()
                    .map_err(|_| ConfigError::Invalid("EMAIL_PORT"))?,
                username: env::var("EMAIL_USER").map_err(|_| ConfigError::Missing("EMAIL_USER"))?,
                password: env::var("EMAIL_PASS").map_err(|_| ConfigError::Missing("EMAIL_PASS"))?,
            },
        };

        Ok(Self {
            spotify_client_id: env::var("SPOTIFY_CLIENT_ID")
                .map_err(|_| ConfigError::Missing("SPOTIFY_CLIENT_ID"))?,
            spotify_client_secret: env::var("SPOTIFY_CLIENT_SECRET")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("SPOTIFY_CLIENT_SECRET"))?,
            spotify_api_url: env::var("SPOTIFY_API_URL")
                .unwrap_or_else(|_| "https://api.spotify.com/v1".to_string()),
            spotify_accounts_url: env::var("SPOTIFY_ACCOUNTS_URL")
                .unwrap_or_else(|_| "https://accounts.spotify.com".to_string()),
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:3001".to_string()),
            allowed_origins,
            database_url: env::var("DATABASE_URL")
                .map_err(|_| ConfigError::Missing("DATABASE_URL"))?,
            port: env::var("PORT")
                .unwrap_or_else(|_| "9000".to_string())
                .parse()
                .unwrap_or(9000),

            jwt_secret: env::var("JWT_SECRET")
                .map_err(|_| ConfigError::Missing("JWT_SECRET"))?
                .into_bytes(),
            session_ttl_secs: env::var("SESSION_TTL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3600),
            oauth_state_key: env::var("OAUTH_STATE_KEY")
                .map_err(|_| ConfigError::Missing("OAUTH_STATE_KEY"))?
                .into_bytes(),
            encryption_key,

            email_transport,
            email_from_name: env::var("EMAIL_FROM_NAME")
                .unwrap_or_else(|_| "Nova Player".to_string()),
            email_from_address: env::var("EMAIL_FROM_ADDRESS")
                .unwrap_or_else(|_| "no-reply@novaplayer.app".to_string()),

            youtube_api_key: env::var("YOUTUBE_API_KEY").ok().filter(|v| !v.is_empty()),
        })
    }

    /// Default config for testing only.
    pub fn test_default() -> Self {
        Self {
            spotify_client_id: "test_client_id".to_string(),
            spotify_client_secret: "test_client_secret".to_string(),
            spotify_api_url: "https://api.spotify.invalid/v1".to_string(),
            spotify_accounts_url: "https://accounts.spotify.invalid".to_string(),
            frontend_url: "http://localhost:3001".to_string(),
            allowed_origins: vec!["http://localhost:3001".to_string()],
            database_url: "postgres://localhost/nova_player_test".to_string(),
            port: 9000,
            jwt_secret: b"test_jwt_secret_32_bytes_minimum".to_vec(),
            session_ttl_secs: 3600,
            oauth_state_key: b"test_oauth_state_key".to_vec(),
            encryption_key: [7u8; 32],
            email_transport: EmailTransportConfig::Disabled,
            email_from_name: "Nova Player".to_string(),
            email_from_address: "no-reply@novaplayer.test".to_string(),
            youtube_api_key: None,
        }
    }
}

/// The encryption key arrives base64-encoded and must decode to exactly
/// 32 bytes (AES-256).
fn decode_encryption_key(b64: &str) -> Result<[u8; 32], ConfigError> {
    let bytes = BASE64
        .decode(b64.trim())
        .map_err(|_| ConfigError::Invalid("ENCRYPTION_KEY"))?;
    bytes
        .try_into()
        .map_err(|_| ConfigError::Invalid("ENCRYPTION_KEY"))
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_encryption_key() {
        let key = BASE64.encode([42u8; 32]);
        assert_eq!(decode_encryption_key(&key).unwrap(), [42u8; 32]);
    }

    #[test]
    fn test_decode_encryption_key_wrong_length() {
        let key = BASE64.encode([42u8; 16]);
        assert!(decode_encryption_key(&key).is_err());
    }

    #[test]
    fn test_decode_encryption_key_not_base64() {
        assert!(decode_encryption_key("not base64!!").is_err());
    }
}
