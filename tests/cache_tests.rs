// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Response cache semantics: single fetch within TTL, stale-on-error
//! fallback, per-user isolation.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use nova_player::error::AppError;
use nova_player::services::ResponseCache;

fn upstream_error() -> AppError {
    AppError::UpstreamUnavailable {
        status: Some(500),
        body: "boom".to_string(),
    }
}

#[tokio::test]
async fn test_second_read_within_ttl_skips_fetch() {
    let cache = ResponseCache::in_memory();
    let calls = Arc::new(AtomicUsize::new(0));

    for _ in 0..2 {
        let calls = calls.clone();
        let value: String = cache
            .get_or_fetch(1, "region", Duration::from_secs(60), || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok("MX".to_string())
            })
            .await
            .unwrap();
        assert_eq!(value, "MX");
    }

    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_expired_entry_is_refetched() {
    let cache = ResponseCache::in_memory();
    let calls = Arc::new(AtomicUsize::new(0));

    for expected in ["first", "second"] {
        let calls = calls.clone();
        let value: String = cache
            .get_or_fetch(1, "now-playing", Duration::ZERO, || {
                let calls = calls.clone();
                async move {
                    let n = calls.fetch_add(1, Ordering::SeqCst);
                    Ok(if n == 0 { "first" } else { "second" }.to_string())
                }
            })
            .await
            .unwrap();
        assert_eq!(value, expected);
    }

    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_failed_refetch_serves_stale_value() {
    let cache = ResponseCache::in_memory();

    // Populate with a zero TTL so the entry is immediately stale.
    let value: String = cache
        .get_or_fetch(1, "follow:artist-1", Duration::ZERO, || async {
            Ok("cached".to_string())
        })
        .await
        .unwrap();
    assert_eq!(value, "cached");

    // The refetch fails; the stale value comes back instead of the error.
    let value: String = cache
        .get_or_fetch(1, "follow:artist-1", Duration::ZERO, || async {
            Err(upstream_error())
        })
        .await
        .unwrap();
    assert_eq!(value, "cached");
}

#[tokio::test]
async fn test_fetch_failure_without_prior_entry_propagates() {
    let cache = ResponseCache::in_memory();

    let result: Result<String, _> = cache
        .get_or_fetch(1, "artist:x", Duration::from_secs(60), || async {
            Err(upstream_error())
        })
        .await;

    assert!(matches!(
        result,
        Err(AppError::UpstreamUnavailable { status: Some(500), .. })
    ));
}

#[tokio::test]
async fn test_entries_are_scoped_per_user() {
    let cache = ResponseCache::in_memory();
    let calls = Arc::new(AtomicUsize::new(0));

    for user_id in [1i64, 2] {
        let calls = calls.clone();
        let value: String = cache
            .get_or_fetch(user_id, "region", Duration::from_secs(60), || {
                let calls = calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(format!("region-for-{}", user_id))
                }
            })
            .await
            .unwrap();
        assert_eq!(value, format!("region-for-{}", user_id));
    }

    // No cross-user sharing: both users fetched.
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}
