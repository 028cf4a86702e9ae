//! Secret types for protecting sensitive values from accidental logging.
//!
//! Re-exports the [`secrecy`] types used for the booking services' sensitive
//! configuration: the token signing secret, the admin token presented to the
//! location service, and the database URL.
//!
//! `SecretString` implements `Debug` with redaction, so a config struct that
//! derives `Debug` stays safe to log. The inner value is only reachable via
//! [`ExposeSecret::expose_secret`] and is zeroized on drop.
//!
//! # Example
//!
//! ```rust
//! use common::secret::{ExposeSecret, SecretString};
//!
//! #[derive(Debug)]
//! struct UpstreamAuth {
//!     service: String,
//!     admin_token: SecretString,
//! }
//!
//! let auth = UpstreamAuth {
//!     service: "location".to_string(),
//!     admin_token: SecretString::from("admin-token"),
//! };
//!
//! assert!(!format!("{auth:?}").contains("admin-token"));
//! let header = format!("Bearer {}", auth.admin_token.expose_secret());
//! assert_eq!(header, "Bearer admin-token");
//! ```

pub use secrecy::{ExposeSecret, SecretBox, SecretString};

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[test]
    fn test_debug_is_redacted() {
        let secret = SecretString::from("signing-secret");
        let debug_str = format!("{secret:?}");

        assert!(debug_str.contains("REDACTED"));
        assert!(!debug_str.contains("signing-secret"));
    }

    #[test]
    fn test_expose_secret_returns_inner_value() {
        let secret = SecretString::from("admin-token");
        assert_eq!(secret.expose_secret(), "admin-token");
    }

    #[test]
    fn test_struct_with_secret_is_safe() {
        #[allow(dead_code)]
        #[derive(Debug)]
        struct UpstreamAuth {
            service: String,
            admin_token: SecretString,
        }

        let auth = UpstreamAuth {
            service: "location".to_string(),
            admin_token: SecretString::from("super-secret"),
        };

        let debug_str = format!("{auth:?}");

        assert!(debug_str.contains("location"));
        assert!(debug_str.contains("REDACTED"));
        assert!(!debug_str.contains("super-secret"));
    }

    #[test]
    fn test_deserialize() {
        #[allow(dead_code)]
        #[derive(Debug, Deserialize)]
        struct SigningConfig {
            issuer: String,
            secret: SecretString,
        }

        let json = r#"{"issuer": "users", "secret": "my-secret-value"}"#;
        let config: SigningConfig = serde_json::from_str(json).expect("deserialize");

        assert_eq!(config.secret.expose_secret(), "my-secret-value");

        let debug = format!("{config:?}");
        assert!(!debug.contains("my-secret-value"));
        assert!(debug.contains("REDACTED"));
    }
}
