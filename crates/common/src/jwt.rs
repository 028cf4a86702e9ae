//! JWT utilities shared across the booking services.
//!
//! This module provides the pieces needed to consume an already-issued user
//! token:
//! - Size limits for DoS prevention
//! - Bearer token extraction from an `Authorization` header value
//! - HS512 signature verification against a shared secret
//! - iat validation with clock skew tolerance
//! - User claims structure
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE parsing (DoS prevention)
//! - Only HS512 is accepted; the algorithm in the token header is not trusted
//! - `exp` and `nbf` are enforced when present
//! - Generic error messages prevent information leakage
//! - The `id` field in [`UserClaims`] is redacted in Debug output

use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

// =============================================================================
// Constants
// =============================================================================

/// Maximum allowed JWT size in bytes (8KB).
///
/// JWTs larger than this size are rejected BEFORE any parsing or
/// cryptographic operations.
pub const MAX_JWT_SIZE_BYTES: usize = 8192; // 8KB

/// Default JWT clock skew tolerance (5 minutes).
///
/// Applied as leeway to `exp`/`nbf` and as the future tolerance for `iat`.
pub const DEFAULT_CLOCK_SKEW: Duration = Duration::from_secs(300);

/// Maximum allowed JWT clock skew tolerance (10 minutes).
pub const MAX_CLOCK_SKEW: Duration = Duration::from_secs(600);

/// Signing algorithm used by the user-facing token issuer.
pub const USER_TOKEN_ALGORITHM: Algorithm = Algorithm::HS512;

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur during JWT validation.
///
/// Note: Error messages are intentionally generic to prevent information leakage.
/// Detailed information is logged at debug level for troubleshooting.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JwtValidationError {
    /// Token size exceeds maximum allowed.
    #[error("The access token is invalid or expired")]
    TokenTooLarge,

    /// Token format is invalid (not a valid JWT structure).
    #[error("The access token is invalid or expired")]
    MalformedToken,

    /// Signature, algorithm or time-based claims failed verification.
    #[error("The access token is invalid or expired")]
    VerificationFailed,

    /// Token carries no usable user id.
    #[error("The access token is invalid or expired")]
    MissingUserId,

    /// Token `iat` claim is too far in the future.
    #[error("The access token is invalid or expired")]
    IatTooFarInFuture,
}

// =============================================================================
// Claims Types
// =============================================================================

/// User token claims.
///
/// The issuer places the user's identifier in the `id` claim. Time-based
/// claims are optional; when present they are validated.
#[derive(Clone, Serialize, Deserialize)]
pub struct UserClaims {
    /// User identifier - redacted in Debug output.
    pub id: String,

    /// Expiration timestamp (Unix epoch seconds).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,

    /// Issued-at timestamp (Unix epoch seconds).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,

    /// Not-before timestamp (Unix epoch seconds).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nbf: Option<i64>,
}

impl fmt::Debug for UserClaims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserClaims")
            .field("id", &"[REDACTED]")
            .field("exp", &self.exp)
            .field("iat", &self.iat)
            .field("nbf", &self.nbf)
            .finish()
    }
}

impl UserClaims {
    /// Creates claims for `id` with no time-based claims.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            exp: None,
            iat: None,
            nbf: None,
        }
    }
}

// =============================================================================
// Functions
// =============================================================================

/// Extract the bearer token from an `Authorization` header value.
///
/// Returns `None` when the value does not use the `Bearer` scheme or the
/// token part is empty.
#[must_use]
pub fn extract_bearer_token(header_value: &str) -> Option<&str> {
    header_value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Verify an HS512 user token against `secret` and return its claims.
///
/// # Errors
///
/// - `TokenTooLarge` - token exceeds [`MAX_JWT_SIZE_BYTES`]
/// - `MalformedToken` - token is not a three-part JWT
/// - `VerificationFailed` - bad signature, wrong algorithm, expired or not yet valid
/// - `MissingUserId` - the `id` claim is empty
/// - `IatTooFarInFuture` - `iat` is beyond the clock skew tolerance
pub fn verify_hs512(
    token: &str,
    secret: &[u8],
    clock_skew: Duration,
) -> Result<UserClaims, JwtValidationError> {
    // Check token size first (DoS prevention)
    if token.len() > MAX_JWT_SIZE_BYTES {
        tracing::debug!(
            target: "common.jwt",
            token_size = token.len(),
            max_size = MAX_JWT_SIZE_BYTES,
            "Token rejected: size exceeds maximum allowed"
        );
        return Err(JwtValidationError::TokenTooLarge);
    }

    if token.split('.').count() != 3 {
        tracing::debug!(target: "common.jwt", "Token rejected: invalid JWT format");
        return Err(JwtValidationError::MalformedToken);
    }

    let mut validation = Validation::new(USER_TOKEN_ALGORITHM);
    validation.required_spec_claims.clear();
    validation.validate_exp = true;
    validation.validate_nbf = true;
    validation.leeway = clock_skew.as_secs();

    let data = decode::<UserClaims>(token, &DecodingKey::from_secret(secret), &validation)
        .map_err(|e| {
            tracing::debug!(target: "common.jwt", error = %e, "Token verification failed");
            JwtValidationError::VerificationFailed
        })?;

    let claims = data.claims;
    if claims.id.trim().is_empty() {
        return Err(JwtValidationError::MissingUserId);
    }
    if let Some(iat) = claims.iat {
        validate_iat(iat, clock_skew)?;
    }

    Ok(claims)
}

/// Validate the `iat` (issued-at) claim with clock skew tolerance.
///
/// # Errors
///
/// Returns `JwtValidationError::IatTooFarInFuture` if the iat timestamp is more than
/// `clock_skew` in the future.
pub fn validate_iat(iat: i64, clock_skew: Duration) -> Result<(), JwtValidationError> {
    let now = chrono::Utc::now().timestamp();
    validate_iat_at(iat, clock_skew, now)
}

/// Deterministic `iat` validation against an explicit `now` timestamp.
pub(crate) fn validate_iat_at(
    iat: i64,
    clock_skew: Duration,
    now: i64,
) -> Result<(), JwtValidationError> {
    // Safe cast: clock_skew is bounded to MAX_CLOCK_SKEW (600 seconds), well within i64 range
    #[allow(clippy::cast_possible_wrap)]
    let clock_skew_secs = clock_skew.as_secs() as i64;
    let max_iat = now + clock_skew_secs;

    if iat > max_iat {
        tracing::debug!(
            target: "common.jwt",
            iat = iat,
            now = now,
            max_allowed = max_iat,
            "Token rejected: iat too far in the future"
        );
        return Err(JwtValidationError::IatTooFarInFuture);
    }

    Ok(())
}

/// Sign `claims` with HS512. Test-only helper standing in for the issuer.
///
/// # Errors
///
/// Returns the underlying `jsonwebtoken` error if encoding fails.
#[cfg(any(test, feature = "test-utils"))]
pub fn issue_hs512(
    claims: &UserClaims,
    secret: &[u8],
) -> Result<String, jsonwebtoken::errors::Error> {
    use jsonwebtoken::{encode, EncodingKey, Header};

    encode(
        &Header::new(USER_TOKEN_ALGORITHM),
        claims,
        &EncodingKey::from_secret(secret),
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
    use jsonwebtoken::{encode, EncodingKey, Header};

    const SECRET: &[u8] = b"test-signing-secret";

    fn now() -> i64 {
        chrono::Utc::now().timestamp()
    }

    #[test]
    fn test_max_jwt_size_is_8kb() {
        assert_eq!(MAX_JWT_SIZE_BYTES, 8192);
    }

    #[test]
    fn test_default_clock_skew_is_5_minutes() {
        assert_eq!(DEFAULT_CLOCK_SKEW, Duration::from_secs(300));
    }

    // =========================================================================
    // extract_bearer_token
    // =========================================================================

    #[test]
    fn test_extract_bearer_token() {
        assert_eq!(extract_bearer_token("Bearer abc.def.ghi"), Some("abc.def.ghi"));
    }

    #[test]
    fn test_extract_bearer_token_rejects_other_schemes() {
        assert_eq!(extract_bearer_token("Basic dXNlcjpwYXNz"), None);
        assert_eq!(extract_bearer_token("abc.def.ghi"), None);
    }

    #[test]
    fn test_extract_bearer_token_rejects_empty_token() {
        assert_eq!(extract_bearer_token("Bearer "), None);
        assert_eq!(extract_bearer_token("Bearer    "), None);
    }

    // =========================================================================
    // verify_hs512
    // =========================================================================

    #[test]
    fn test_verify_accepts_token_without_time_claims() {
        let token = issue_hs512(&UserClaims::new("user-1"), SECRET).unwrap();

        let claims = verify_hs512(&token, SECRET, DEFAULT_CLOCK_SKEW).unwrap();
        assert_eq!(claims.id, "user-1");
    }

    #[test]
    fn test_verify_accepts_unexpired_token() {
        let mut claims = UserClaims::new("user-2");
        claims.exp = Some(now() + 3600);
        claims.iat = Some(now());
        let token = issue_hs512(&claims, SECRET).unwrap();

        assert_eq!(
            verify_hs512(&token, SECRET, DEFAULT_CLOCK_SKEW).unwrap().id,
            "user-2"
        );
    }

    #[test]
    fn test_verify_rejects_wrong_secret() {
        let token = issue_hs512(&UserClaims::new("user-1"), b"other-secret").unwrap();

        assert_eq!(
            verify_hs512(&token, SECRET, DEFAULT_CLOCK_SKEW).unwrap_err(),
            JwtValidationError::VerificationFailed
        );
    }

    #[test]
    fn test_verify_rejects_expired_token() {
        let mut claims = UserClaims::new("user-1");
        claims.exp = Some(now() - 3600);
        let token = issue_hs512(&claims, SECRET).unwrap();

        assert_eq!(
            verify_hs512(&token, SECRET, DEFAULT_CLOCK_SKEW).unwrap_err(),
            JwtValidationError::VerificationFailed
        );
    }

    #[test]
    fn test_verify_rejects_other_algorithm() {
        let token = encode(
            &Header::new(Algorithm::HS256),
            &UserClaims::new("user-1"),
            &EncodingKey::from_secret(SECRET),
        )
        .unwrap();

        assert_eq!(
            verify_hs512(&token, SECRET, DEFAULT_CLOCK_SKEW).unwrap_err(),
            JwtValidationError::VerificationFailed
        );
    }

    #[test]
    fn test_verify_rejects_tampered_payload() {
        let token = issue_hs512(&UserClaims::new("user-1"), SECRET).unwrap();
        let parts: Vec<&str> = token.split('.').collect();
        let forged_payload = URL_SAFE_NO_PAD.encode(br#"{"id":"user-2"}"#);
        let forged = format!("{}.{}.{}", parts[0], forged_payload, parts[2]);

        assert_eq!(
            verify_hs512(&forged, SECRET, DEFAULT_CLOCK_SKEW).unwrap_err(),
            JwtValidationError::VerificationFailed
        );
    }

    #[test]
    fn test_verify_rejects_empty_user_id() {
        let token = issue_hs512(&UserClaims::new(""), SECRET).unwrap();

        assert_eq!(
            verify_hs512(&token, SECRET, DEFAULT_CLOCK_SKEW).unwrap_err(),
            JwtValidationError::MissingUserId
        );
    }

    #[test]
    fn test_verify_rejects_malformed_token() {
        assert_eq!(
            verify_hs512("only.two", SECRET, DEFAULT_CLOCK_SKEW).unwrap_err(),
            JwtValidationError::MalformedToken
        );
        assert_eq!(
            verify_hs512("", SECRET, DEFAULT_CLOCK_SKEW).unwrap_err(),
            JwtValidationError::MalformedToken
        );
    }

    #[test]
    fn test_verify_rejects_oversized_token() {
        let token = "a".repeat(MAX_JWT_SIZE_BYTES + 1);

        assert_eq!(
            verify_hs512(&token, SECRET, DEFAULT_CLOCK_SKEW).unwrap_err(),
            JwtValidationError::TokenTooLarge
        );
    }

    #[test]
    fn test_verify_rejects_future_iat() {
        let mut claims = UserClaims::new("user-1");
        claims.iat = Some(now() + 3600);
        let token = issue_hs512(&claims, SECRET).unwrap();

        assert_eq!(
            verify_hs512(&token, SECRET, DEFAULT_CLOCK_SKEW).unwrap_err(),
            JwtValidationError::IatTooFarInFuture
        );
    }

    // =========================================================================
    // validate_iat
    // =========================================================================

    #[test]
    fn test_validate_iat_within_clock_skew() {
        assert!(validate_iat_at(1_000 + 299, DEFAULT_CLOCK_SKEW, 1_000).is_ok());
    }

    #[test]
    fn test_validate_iat_at_boundary_exact() {
        assert!(validate_iat_at(1_000 + 300, DEFAULT_CLOCK_SKEW, 1_000).is_ok());
        assert_eq!(
            validate_iat_at(1_000 + 301, DEFAULT_CLOCK_SKEW, 1_000),
            Err(JwtValidationError::IatTooFarInFuture)
        );
    }

    // =========================================================================
    // UserClaims
    // =========================================================================

    #[test]
    fn test_user_claims_debug_redacts_id() {
        let claims = UserClaims::new("secret-user-id");
        let debug_str = format!("{claims:?}");

        assert!(!debug_str.contains("secret-user-id"));
        assert!(debug_str.contains("[REDACTED]"));
    }

    #[test]
    fn test_user_claims_omit_absent_time_claims() {
        let json = serde_json::to_string(&UserClaims::new("u")).unwrap();
        assert_eq!(json, r#"{"id":"u"}"#);
    }
}
