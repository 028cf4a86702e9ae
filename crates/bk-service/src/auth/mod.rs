//! Authentication for the booking service.
//!
//! Resolves the caller's user id from an HS512 bearer token signed with the
//! shared secret configured in `JWT_SECRET`.

pub mod identity;

pub use identity::{AuthenticatedUser, IdentityContext};
