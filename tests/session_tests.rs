// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Session token tests.
//!
//! These verify that tokens minted on login can be decoded by the auth
//! middleware, catching claim-shape incompatibilities early.

use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use nova_player::middleware::auth::{create_session_token, Claims};

const SIGNING_KEY: &[u8] = b"test_signing_key_32_bytes_long!!";

#[test]
fn test_session_token_roundtrip() {
    let token = create_session_token(42, "ada@example.com", SIGNING_KEY, 3600).unwrap();

    let key = DecodingKey::from_secret(SIGNING_KEY);
    let validation = Validation::new(Algorithm::HS256);

    let token_data = decode::<Claims>(&token, &key, &validation)
        .expect("Failed to decode session token - check Claims struct compatibility");

    assert_eq!(token_data.claims.sub, "42");
    assert_eq!(token_data.claims.email, "ada@example.com");
    assert!(token_data.claims.exp > token_data.claims.iat);
}

#[test]
fn test_session_token_user_id_parsing() {
    let token = create_session_token(9_876_543, "x@example.com", SIGNING_KEY, 3600).unwrap();

    let key = DecodingKey::from_secret(SIGNING_KEY);
    let validation = Validation::new(Algorithm::HS256);
    let token_data = decode::<Claims>(&token, &key, &validation).unwrap();

    let parsed_id: i64 = token_data
        .claims
        .sub
        .parse()
        .expect("sub claim should be parseable as i64");
    assert_eq!(parsed_id, 9_876_543);
}

#[test]
fn test_session_token_expires_in_one_hour() {
    use std::time::{SystemTime, UNIX_EPOCH};

    let token = create_session_token(1, "x@example.com", SIGNING_KEY, 3600).unwrap();

    let key = DecodingKey::from_secret(SIGNING_KEY);
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = false; // checked manually below

    let token_data = decode::<Claims>(&token, &key, &validation).unwrap();

    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs() as usize;

    assert!(token_data.claims.exp >= now + 3590);
    assert!(token_data.claims.exp <= now + 3610);
}

#[test]
fn test_wrong_key_fails_validation() {
    let token = create_session_token(1, "x@example.com", SIGNING_KEY, 3600).unwrap();

    let key = DecodingKey::from_secret(b"a_completely_different_key______");
    let validation = Validation::new(Algorithm::HS256);

    assert!(decode::<Claims>(&token, &key, &validation).is_err());
}
