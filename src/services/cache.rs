// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Per-user response cache with TTL and stale-on-error fallback.
//!
//! Entries are keyed `(user id, resource key)` and never shared across
//! users. The store is behind a trait so a distributed KV with TTL support
//! can replace the process-local map when running more than one instance.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::AppError;

/// A cached value with its absolute expiry. Expired entries stay readable
/// so a failed refetch can fall back to them.
#[derive(Debug, Clone)]
pub struct CachedValue {
    pub value: Value,
    pub expires_at: Instant,
}

impl CachedValue {
    pub fn is_fresh(&self) -> bool {
        self.expires_at > Instant::now()
    }
}

/// Key-value backend for cached responses.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Option<CachedValue>;
    async fn put(&self, key: &str, entry: CachedValue);
}

/// Process-local cache store. Entries are only ever evicted by overwrite;
/// the per-user key space is small and bounded.
#[derive(Default)]
pub struct InMemoryCacheStore {
    entries: DashMap<String, CachedValue>,
}

#[async_trait]
impl CacheStore for InMemoryCacheStore {
    async fn get(&self, key: &str) -> Option<CachedValue> {
        self.entries.get(key).map(|e| e.clone())
    }

    async fn put(&self, key: &str, entry: CachedValue) {
        self.entries.insert(key.to_string(), entry);
    }
}

/// Read-through cache over a [`CacheStore`].
#[derive(Clone)]
pub struct ResponseCache {
    store: Arc<dyn CacheStore>,
}

impl ResponseCache {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self { store }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryCacheStore::default()))
    }

    /// Return the cached value for `(user_id, key)` when fresh; otherwise
    /// run `fetch` and cache the result for `ttl`. When `fetch` fails and a
    /// stale entry exists, the stale value is returned instead of the error.
    pub async fn get_or_fetch<T, F, Fut>(
        &self,
        user_id: i64,
        key: &str,
        ttl: Duration,
        fetch: F,
    ) -> Result<T, AppError>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, AppError>>,
    {
        let scoped = format!("{}:{}", user_id, key);

        let cached = self.store.get(&scoped).await;
        if let Some(entry) = &cached {
            if entry.is_fresh() {
                if let Ok(value) = serde_json::from_value(entry.value.clone()) {
                    return Ok(value);
                }
                // Shape drift after a deploy: fall through and refetch.
            }
        }

        match fetch().await {
            Ok(fresh) => {
                match serde_json::to_value(&fresh) {
                    Ok(value) => {
                        self.store
                            .put(
                                &scoped,
                                CachedValue {
                                    value,
                                    expires_at: Instant::now() + ttl,
                                },
                            )
                            .await;
                    }
                    Err(e) => {
                        tracing::warn!(key = %scoped, error = %e, "Value not cacheable, skipping store");
                    }
                }
                Ok(fresh)
            }
            Err(err) => {
                if let Some(entry) = cached {
                    if let Ok(stale) = serde_json::from_value(entry.value) {
                        tracing::warn!(
                            user_id,
                            key,
                            error = %err,
                            "Fetch failed, serving stale cache entry"
                        );
                        return Ok(stale);
                    }
                }
                Err(err)
            }
        }
    }
}

/// Recommended TTLs by resource volatility.
pub mod ttl {
    use std::time::Duration;

    /// Now-playing state changes constantly; cache only long enough to
    /// absorb poll bursts.
    pub const NOW_PLAYING: Duration = Duration::from_secs(2);
    /// Artist-follow status.
    pub const FOLLOW_STATUS: Duration = Duration::from_secs(300);
    /// Artist metadata and browse categories.
    pub const ARTIST: Duration = Duration::from_secs(3600);
    pub const CATEGORIES: Duration = Duration::from_secs(3600);
    /// Category playlist listings.
    pub const CATEGORY_PLAYLISTS: Duration = Duration::from_secs(1800);
    /// The account's country only changes when the user physically moves.
    pub const REGION: Duration = Duration::from_secs(86400);
}
