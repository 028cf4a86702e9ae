//! Authentication middleware for the booking routes.
//!
//! Resolves the caller via the shared [`IdentityContext`] and injects the
//! [`AuthenticatedUser`] into request extensions.

use crate::auth::{AuthenticatedUser, IdentityContext};
use crate::errors::{AuthError, BkError};
use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::IntoResponse,
};
use std::sync::Arc;
use tracing::instrument;

/// State for the authentication middleware.
#[derive(Clone)]
pub struct AuthState {
    /// Token verifier configured with the signing secret.
    pub identity: Arc<IdentityContext>,
}

/// Authentication middleware for the booking routes.
///
/// # Response
///
/// - 400 if the Authorization header is missing or carries no bearer token
/// - 401 with WWW-Authenticate if the token fails verification
/// - 500 if no signing secret is configured
/// - Otherwise continues with [`AuthenticatedUser`] in extensions
#[instrument(skip_all, name = "bk.middleware.auth")]
pub async fn require_auth(
    State(state): State<Arc<AuthState>>,
    mut req: Request,
    next: Next,
) -> Result<impl IntoResponse, BkError> {
    let header = match req.headers().get(AUTHORIZATION) {
        Some(value) => Some(value.to_str().map_err(|_| {
            tracing::debug!(target: "bk.middleware.auth", "Authorization header is not valid ASCII");
            BkError::Auth(AuthError::MalformedHeader)
        })?),
        None => None,
    };

    let user = state.identity.resolve(header).map_err(|e| {
        tracing::debug!(target: "bk.middleware.auth", error = %e, "Request rejected");
        BkError::Auth(e)
    })?;

    req.extensions_mut().insert::<AuthenticatedUser>(user);

    Ok(next.run(req).await)
}
