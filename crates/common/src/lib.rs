//! Common utilities and types shared across the parking booking services.

#![warn(clippy::pedantic)]

/// Module for secret types that prevent accidental logging
pub mod secret;

/// Module for JWT utilities (verification, claims, constants)
pub mod jwt;
