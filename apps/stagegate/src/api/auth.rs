//! # Authentication Module
//!
//! Bearer API key authentication for the Stagegate HTTP API.
//!
//! ## Configuration
//!
//! Authentication is configured via environment variable:
//! - `STAGEGATE_API_KEY`: If set, every path outside [`PUBLIC_PATHS`] requires it
//!
//! ## Usage
//!
//! ```text
//! Authorization: Bearer <your-api-key>
//! ```
//!
//! The recording endpoints write the history that the revision grant reads
//! and sit behind the same key as the evaluation endpoints.

use axum::{
    body::Body,
    http::{Request, StatusCode, header},
    middleware::Next,
    response::Response,
};
use subtle::ConstantTimeEq;

/// Environment variable holding the API key.
pub const API_KEY_ENV: &str = "STAGEGATE_API_KEY";

/// Paths served without a key (load balancer probes).
pub const PUBLIC_PATHS: [&str; 1] = ["/health"];

// =============================================================================
// API KEY AUTHENTICATION
// =============================================================================

/// Get API key from environment variable.
///
/// Returns `Some(key)` if `STAGEGATE_API_KEY` is set and non-empty,
/// `None` otherwise (disabling authentication).
pub fn get_api_key_from_env() -> Option<String> {
    std::env::var(API_KEY_ENV).ok().filter(|k| !k.is_empty())
}

/// Compare two keys in constant time.
///
/// Both sides are padded to the same length so the comparison always covers
/// the same number of bytes; the length check is folded in afterwards.
fn keys_match(provided: &str, expected: &str) -> bool {
    let provided = provided.as_bytes();
    let expected = expected.as_bytes();

    let max_len = provided.len().max(expected.len());
    let mut padded_provided = vec![0u8; max_len];
    let mut padded_expected = vec![0u8; max_len];
    padded_provided[..provided.len()].copy_from_slice(provided);
    padded_expected[..expected.len()].copy_from_slice(expected);

    let bytes_match: bool = padded_provided.ct_eq(&padded_expected).into();
    bytes_match && provided.len() == expected.len()
}

/// Key carried by an `Authorization` value: `Bearer <key>` or a raw `<key>`.
fn provided_key(header_value: &str) -> &str {
    header_value
        .strip_prefix("Bearer ")
        .unwrap_or(header_value)
}

fn is_public(path: &str) -> bool {
    PUBLIC_PATHS.contains(&path)
}

/// API key authentication middleware.
///
/// If `STAGEGATE_API_KEY` is set:
/// - paths in [`PUBLIC_PATHS`] are always allowed
/// - every policy and history endpoint answers 401 without the key
///
/// If `STAGEGATE_API_KEY` is not set, all requests are allowed.
pub async fn api_key_auth_middleware(
    request: Request<Body>,
    next: Next,
) -> Result<Response, (StatusCode, &'static str)> {
    // No key configured: authentication disabled
    let Some(expected) = get_api_key_from_env() else {
        return Ok(next.run(request).await);
    };

    if is_public(request.uri().path()) {
        return Ok(next.run(request).await);
    }

    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    match auth_header {
        Some(header_value) => {
            if keys_match(provided_key(header_value), &expected) {
                Ok(next.run(request).await)
            } else {
                tracing::warn!(
                    event = "auth_failure",
                    reason = "invalid_api_key",
                    path = %request.uri().path(),
                    "Authentication failed: invalid API key"
                );
                Err((StatusCode::UNAUTHORIZED, "Unauthorized"))
            }
        }
        None => {
            tracing::warn!(
                event = "auth_failure",
                reason = "missing_authorization_header",
                path = %request.uri().path(),
                "Missing Authorization header"
            );
            Err((StatusCode::UNAUTHORIZED, "Unauthorized"))
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_keys_match() {
        assert!(keys_match("s3cret", "s3cret"));
    }

    #[test]
    fn prefix_does_not_match() {
        assert!(!keys_match("s3c", "s3cret"));
        assert!(!keys_match("s3cret-and-more", "s3cret"));
        assert!(!keys_match("", "s3cret"));
    }

    #[test]
    fn bearer_and_raw_values_carry_the_key() {
        assert_eq!(provided_key("Bearer s3cret"), "s3cret");
        assert_eq!(provided_key("s3cret"), "s3cret");
        assert_eq!(provided_key("Bearer "), "");
        assert_eq!(provided_key("bearer s3cret"), "bearer s3cret");
    }

    #[test]
    fn only_health_is_public() {
        assert!(is_public("/health"));
        for path in ["/status", "/access/evaluate", "/rounds", "/decisions", "/health/"] {
            assert!(!is_public(path), "{path} must require the key");
        }
    }
}
