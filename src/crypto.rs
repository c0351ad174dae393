// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Encryption at rest for Spotify refresh tokens.
//!
//! Values are stored as `<nonceHex>:<ciphertextHex>` using AES-256-GCM with
//! a random per-value nonce. Stored values without the `:` delimiter are
//! legacy plaintext and are returned unchanged on decrypt.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use rand::RngCore;

use crate::error::AppError;

const NONCE_LEN: usize = 12;

/// Symmetric cipher for tokens at rest. The key comes from configuration
/// and is required at startup.
#[derive(Clone)]
pub struct TokenCipher {
    key: [u8; 32],
}

impl TokenCipher {
    pub fn new(key: [u8; 32]) -> Self {
        Self { key }
    }

    /// Encrypt a token. Returns `<nonceHex>:<ciphertextHex>`.
    pub fn encrypt(&self, plaintext: &str) -> Result<String, AppError> {
        let cipher = Aes256Gcm::new_from_slice(&self.key)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("cipher init failed: {}", e)))?;

        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|e| AppError::Internal(anyhow::anyhow!("encryption failed: {}", e)))?;

        Ok(format!(
            "{}:{}",
            hex::encode(nonce_bytes),
            hex::encode(ciphertext)
        ))
    }

    /// Decrypt a stored token. Values without the delimiter predate
    /// encryption at rest and pass through unchanged.
    pub fn decrypt(&self, stored: &str) -> Result<String, AppError> {
        let Some((nonce_hex, ciphertext_hex)) = stored.split_once(':') else {
            return Ok(stored.to_string());
        };

        let nonce_bytes = hex::decode(nonce_hex)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("bad nonce hex: {}", e)))?;
        if nonce_bytes.len() != NONCE_LEN {
            return Err(AppError::Internal(anyhow::anyhow!(
                "bad nonce length: {}",
                nonce_bytes.len()
            )));
        }
        let ciphertext = hex::decode(ciphertext_hex)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("bad ciphertext hex: {}", e)))?;

        let cipher = Aes256Gcm::new_from_slice(&self.key)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("cipher init failed: {}", e)))?;

        let plaintext = cipher
            .decrypt(Nonce::from_slice(&nonce_bytes), ciphertext.as_ref())
            .map_err(|_| AppError::Internal(anyhow::anyhow!("decryption failed")))?;

        String::from_utf8(plaintext)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("UTF-8 decode failed: {}", e)))
    }
}
