//! Identity resolution from the `Authorization` header.
//!
//! # Check order
//!
//! 1. A signing secret must be configured (500 otherwise)
//! 2. The header must be present (400)
//! 3. It must carry a bearer token (400)
//! 4. The token must verify as HS512 with valid time claims (401)

use crate::errors::AuthError;
use common::jwt::{extract_bearer_token, verify_hs512};
use common::secret::{ExposeSecret, SecretString};
use std::fmt;
use std::time::Duration;

/// The caller resolved from a verified token.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    /// User identifier from the token's `id` claim.
    pub user_id: String,
}

impl fmt::Debug for AuthenticatedUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthenticatedUser")
            .field("user_id", &"[REDACTED]")
            .finish()
    }
}

/// Verifies bearer tokens against the shared signing secret.
///
/// Side-effect free; one instance is shared by the auth middleware.
pub struct IdentityContext {
    secret: Option<SecretString>,
    clock_skew: Duration,
}

impl IdentityContext {
    /// Create an identity context.
    ///
    /// # Arguments
    ///
    /// * `secret` - HS512 signing secret, `None` when unconfigured
    /// * `clock_skew_seconds` - Leeway for `exp`, `nbf` and `iat`
    pub fn new(secret: Option<SecretString>, clock_skew_seconds: i64) -> Self {
        Self {
            secret,
            clock_skew: Duration::from_secs(clock_skew_seconds.unsigned_abs()),
        }
    }

    /// Resolve the caller from an `Authorization` header value.
    ///
    /// # Errors
    ///
    /// - `AuthError::SecretNotConfigured` - no signing secret
    /// - `AuthError::MissingHeader` - header absent
    /// - `AuthError::MalformedHeader` - no bearer token in the header
    /// - `AuthError::InvalidToken` - signature or claims rejected
    pub fn resolve(&self, authorization: Option<&str>) -> Result<AuthenticatedUser, AuthError> {
        let secret = self.secret.as_ref().ok_or(AuthError::SecretNotConfigured)?;

        let header = authorization.ok_or(AuthError::MissingHeader)?;

        let token = extract_bearer_token(header).ok_or(AuthError::MalformedHeader)?;

        let claims = verify_hs512(token, secret.expose_secret().as_bytes(), self.clock_skew)
            .map_err(|e| AuthError::InvalidToken(e.to_string()))?;

        Ok(AuthenticatedUser { user_id: claims.id })
    }
}
