//! Booking service configuration.
//!
//! Configuration is loaded from environment variables. All sensitive
//! fields are redacted in Debug output.

use common::jwt::{DEFAULT_CLOCK_SKEW, MAX_CLOCK_SKEW};
use common::secret::SecretString;
use std::collections::HashMap;
use std::env;
use std::fmt;
use thiserror::Error;

/// Default bind address when neither `BIND_ADDRESS` nor `PORT` is set.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8080";

/// Default location service base URL.
pub const DEFAULT_LOCATION_SERVICE_ENDPOINT: &str = "http://localhost:8081";

/// Default notification service base URL.
pub const DEFAULT_NOTIFICATION_SERVICE_ENDPOINT: &str = "http://localhost:8082";

/// Default per-call timeout for upstream HTTP requests.
pub const DEFAULT_UPSTREAM_TIMEOUT_SECONDS: u64 = 10;

/// Upper bound for `UPSTREAM_TIMEOUT_SECONDS`.
pub const MAX_UPSTREAM_TIMEOUT_SECONDS: u64 = 120;

/// Default expiry sweep period (1 hour).
pub const DEFAULT_EXPIRY_SWEEP_INTERVAL_SECONDS: u64 = 3600;

/// Booking service configuration.
///
/// Loaded from environment variables with sensible defaults.
/// The database URL, signing secret and admin token are redacted in Debug output.
#[derive(Clone)]
pub struct Config {
    /// PostgreSQL connection URL.
    pub database_url: String,

    /// Server bind address (default: "0.0.0.0:8080").
    pub bind_address: String,

    /// HS512 secret for verifying user tokens. `None` when not configured;
    /// authenticated requests then fail with 500.
    pub jwt_secret: Option<SecretString>,

    /// JWT clock skew tolerance in seconds for token validation.
    pub jwt_clock_skew_seconds: i64,

    /// Base URL of the location service.
    pub location_service_url: String,

    /// Base URL of the notification service.
    pub notification_service_url: String,

    /// Bearer credential presented on capacity increment/decrement calls.
    pub admin_token: SecretString,

    /// Per-call timeout for upstream requests.
    pub upstream_timeout_seconds: u64,

    /// Period of the expiry sweep.
    pub expiry_sweep_interval_seconds: u64,

    /// Release capacity when persisting a new booking fails after the decrement.
    pub compensate_failed_create: bool,
}

/// Custom Debug implementation that redacts sensitive fields.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("database_url", &"[REDACTED]")
            .field("bind_address", &self.bind_address)
            .field(
                "jwt_secret",
                &self.jwt_secret.as_ref().map(|_| "[REDACTED]"),
            )
            .field("jwt_clock_skew_seconds", &self.jwt_clock_skew_seconds)
            .field("location_service_url", &self.location_service_url)
            .field("notification_service_url", &self.notification_service_url)
            .field("admin_token", &"[REDACTED]")
            .field("upstream_timeout_seconds", &self.upstream_timeout_seconds)
            .field(
                "expiry_sweep_interval_seconds",
                &self.expiry_sweep_interval_seconds,
            )
            .field("compensate_failed_create", &self.compensate_failed_create)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid port configuration: {0}")]
    InvalidPort(String),

    #[error("Invalid JWT clock skew configuration: {0}")]
    InvalidJwtClockSkew(String),

    #[error("Invalid upstream timeout configuration: {0}")]
    InvalidUpstreamTimeout(String),

    #[error("Invalid expiry sweep interval configuration: {0}")]
    InvalidSweepInterval(String),

    #[error("Invalid boolean for {name}: {value}")]
    InvalidBool { name: String, value: String },
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let database_url = vars
            .get("DATABASE_URL")
            .ok_or_else(|| ConfigError::MissingEnvVar("DATABASE_URL".to_string()))?
            .clone();

        let bind_address = match (vars.get("BIND_ADDRESS"), vars.get("PORT")) {
            (Some(address), _) => address.clone(),
            (None, Some(port_str)) => {
                let port: u16 = port_str.parse().map_err(|e| {
                    ConfigError::InvalidPort(format!(
                        "PORT must be a valid port number, got '{}': {}",
                        port_str, e
                    ))
                })?;
                format!("0.0.0.0:{}", port)
            }
            (None, None) => DEFAULT_BIND_ADDRESS.to_string(),
        };

        // An empty secret is treated the same as an absent one
        let jwt_secret = vars
            .get("JWT_SECRET")
            .filter(|s| !s.is_empty())
            .map(|s| SecretString::from(s.clone()));

        let jwt_clock_skew_seconds = if let Some(value_str) = vars.get("JWT_CLOCK_SKEW_SECONDS") {
            let value: i64 = value_str.parse().map_err(|e| {
                ConfigError::InvalidJwtClockSkew(format!(
                    "JWT_CLOCK_SKEW_SECONDS must be a valid integer, got '{}': {}",
                    value_str, e
                ))
            })?;

            if value <= 0 {
                return Err(ConfigError::InvalidJwtClockSkew(format!(
                    "JWT_CLOCK_SKEW_SECONDS must be positive, got {}",
                    value
                )));
            }

            if value > MAX_CLOCK_SKEW.as_secs() as i64 {
                return Err(ConfigError::InvalidJwtClockSkew(format!(
                    "JWT_CLOCK_SKEW_SECONDS must not exceed {} seconds, got {}",
                    MAX_CLOCK_SKEW.as_secs(),
                    value
                )));
            }

            value
        } else {
            DEFAULT_CLOCK_SKEW.as_secs() as i64
        };

        let location_service_url = vars
            .get("LOCATION_SERVICE_ENDPOINT")
            .cloned()
            .unwrap_or_else(|| DEFAULT_LOCATION_SERVICE_ENDPOINT.to_string());

        let notification_service_url = vars
            .get("NOTIFICATION_SERVICE_ENDPOINT")
            .cloned()
            .unwrap_or_else(|| DEFAULT_NOTIFICATION_SERVICE_ENDPOINT.to_string());

        let admin_token = SecretString::from(vars.get("ADMIN_TOKEN").cloned().unwrap_or_default());

        let upstream_timeout_seconds =
            if let Some(value_str) = vars.get("UPSTREAM_TIMEOUT_SECONDS") {
                let value: u64 = value_str.parse().map_err(|e| {
                    ConfigError::InvalidUpstreamTimeout(format!(
                        "UPSTREAM_TIMEOUT_SECONDS must be a valid positive integer, got '{}': {}",
                        value_str, e
                    ))
                })?;

                if value == 0 || value > MAX_UPSTREAM_TIMEOUT_SECONDS {
                    return Err(ConfigError::InvalidUpstreamTimeout(format!(
                        "UPSTREAM_TIMEOUT_SECONDS must be between 1 and {}, got {}",
                        MAX_UPSTREAM_TIMEOUT_SECONDS, value
                    )));
                }

                value
            } else {
                DEFAULT_UPSTREAM_TIMEOUT_SECONDS
            };

        let expiry_sweep_interval_seconds =
            if let Some(value_str) = vars.get("EXPIRY_SWEEP_INTERVAL_SECONDS") {
                let value: u64 = value_str.parse().map_err(|e| {
                    ConfigError::InvalidSweepInterval(format!(
                        "EXPIRY_SWEEP_INTERVAL_SECONDS must be a valid positive integer, got '{}': {}",
                        value_str, e
                    ))
                })?;

                if value == 0 {
                    return Err(ConfigError::InvalidSweepInterval(
                        "EXPIRY_SWEEP_INTERVAL_SECONDS must be greater than 0".to_string(),
                    ));
                }

                value
            } else {
                DEFAULT_EXPIRY_SWEEP_INTERVAL_SECONDS
            };

        let compensate_failed_create = match vars.get("COMPENSATE_FAILED_CREATE") {
            Some(value) => parse_bool("COMPENSATE_FAILED_CREATE", value)?,
            None => true,
        };

        Ok(Config {
            database_url,
            bind_address,
            jwt_secret,
            jwt_clock_skew_seconds,
            location_service_url,
            notification_service_url,
            admin_token,
            upstream_timeout_seconds,
            expiry_sweep_interval_seconds,
            compensate_failed_create,
        })
    }
}

fn parse_bool(name: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidBool {
            name: name.to_string(),
            value: value.to_string(),
        }),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use common::secret::ExposeSecret;

    fn base_vars() -> HashMap<String, String> {
        HashMap::from([(
            "DATABASE_URL".to_string(),
            "postgresql://localhost/bookings_test".to_string(),
        )])
    }

    #[test]
    fn test_from_vars_success_with_defaults() {
        let config = Config::from_vars(&base_vars()).expect("Config should load successfully");

        assert_eq!(config.database_url, "postgresql://localhost/bookings_test");
        assert_eq!(config.bind_address, DEFAULT_BIND_ADDRESS);
        assert!(config.jwt_secret.is_none());
        assert_eq!(config.jwt_clock_skew_seconds, 300);
        assert_eq!(config.location_service_url, DEFAULT_LOCATION_SERVICE_ENDPOINT);
        assert_eq!(
            config.notification_service_url,
            DEFAULT_NOTIFICATION_SERVICE_ENDPOINT
        );
        assert_eq!(config.admin_token.expose_secret(), "");
        assert_eq!(config.upstream_timeout_seconds, 10);
        assert_eq!(config.expiry_sweep_interval_seconds, 3600);
        assert!(config.compensate_failed_create);
    }

    #[test]
    fn test_from_vars_with_custom_values() {
        let mut vars = base_vars();
        vars.insert("BIND_ADDRESS".to_string(), "127.0.0.1:9000".to_string());
        vars.insert("JWT_SECRET".to_string(), "signing-secret".to_string());
        vars.insert(
            "LOCATION_SERVICE_ENDPOINT".to_string(),
            "http://location:3000".to_string(),
        );
        vars.insert(
            "NOTIFICATION_SERVICE_ENDPOINT".to_string(),
            "http://notification:3000".to_string(),
        );
        vars.insert("ADMIN_TOKEN".to_string(), "admin".to_string());
        vars.insert("UPSTREAM_TIMEOUT_SECONDS".to_string(), "3".to_string());
        vars.insert(
            "EXPIRY_SWEEP_INTERVAL_SECONDS".to_string(),
            "60".to_string(),
        );
        vars.insert("COMPENSATE_FAILED_CREATE".to_string(), "false".to_string());

        let config = Config::from_vars(&vars).expect("Config should load successfully");

        assert_eq!(config.bind_address, "127.0.0.1:9000");
        assert_eq!(
            config.jwt_secret.as_ref().map(|s| s.expose_secret().to_string()),
            Some("signing-secret".to_string())
        );
        assert_eq!(config.location_service_url, "http://location:3000");
        assert_eq!(config.notification_service_url, "http://notification:3000");
        assert_eq!(config.admin_token.expose_secret(), "admin");
        assert_eq!(config.upstream_timeout_seconds, 3);
        assert_eq!(config.expiry_sweep_interval_seconds, 60);
        assert!(!config.compensate_failed_create);
    }

    #[test]
    fn test_missing_database_url() {
        let result = Config::from_vars(&HashMap::new());

        assert!(
            matches!(result, Err(ConfigError::MissingEnvVar(ref var)) if var == "DATABASE_URL")
        );
    }

    #[test]
    fn test_port_used_when_bind_address_absent() {
        let mut vars = base_vars();
        vars.insert("PORT".to_string(), "3005".to_string());

        let config = Config::from_vars(&vars).unwrap();
        assert_eq!(config.bind_address, "0.0.0.0:3005");
    }

    #[test]
    fn test_bind_address_takes_precedence_over_port() {
        let mut vars = base_vars();
        vars.insert("PORT".to_string(), "3005".to_string());
        vars.insert("BIND_ADDRESS".to_string(), "127.0.0.1:4000".to_string());

        let config = Config::from_vars(&vars).unwrap();
        assert_eq!(config.bind_address, "127.0.0.1:4000");
    }

    #[test]
    fn test_invalid_port_rejected() {
        let mut vars = base_vars();
        vars.insert("PORT".to_string(), "not-a-port".to_string());

        assert!(matches!(
            Config::from_vars(&vars),
            Err(ConfigError::InvalidPort(_))
        ));
    }

    #[test]
    fn test_empty_jwt_secret_treated_as_unset() {
        let mut vars = base_vars();
        vars.insert("JWT_SECRET".to_string(), String::new());

        let config = Config::from_vars(&vars).unwrap();
        assert!(config.jwt_secret.is_none());
    }

    #[test]
    fn test_jwt_clock_skew_out_of_range() {
        let mut vars = base_vars();
        vars.insert("JWT_CLOCK_SKEW_SECONDS".to_string(), "0".to_string());
        assert!(matches!(
            Config::from_vars(&vars),
            Err(ConfigError::InvalidJwtClockSkew(_))
        ));

        vars.insert("JWT_CLOCK_SKEW_SECONDS".to_string(), "601".to_string());
        assert!(matches!(
            Config::from_vars(&vars),
            Err(ConfigError::InvalidJwtClockSkew(_))
        ));
    }

    #[test]
    fn test_upstream_timeout_bounds() {
        let mut vars = base_vars();
        vars.insert("UPSTREAM_TIMEOUT_SECONDS".to_string(), "0".to_string());
        assert!(matches!(
            Config::from_vars(&vars),
            Err(ConfigError::InvalidUpstreamTimeout(_))
        ));

        vars.insert("UPSTREAM_TIMEOUT_SECONDS".to_string(), "121".to_string());
        assert!(matches!(
            Config::from_vars(&vars),
            Err(ConfigError::InvalidUpstreamTimeout(_))
        ));

        vars.insert("UPSTREAM_TIMEOUT_SECONDS".to_string(), "120".to_string());
        assert_eq!(Config::from_vars(&vars).unwrap().upstream_timeout_seconds, 120);
    }

    #[test]
    fn test_sweep_interval_must_be_positive() {
        let mut vars = base_vars();
        vars.insert(
            "EXPIRY_SWEEP_INTERVAL_SECONDS".to_string(),
            "0".to_string(),
        );

        assert!(matches!(
            Config::from_vars(&vars),
            Err(ConfigError::InvalidSweepInterval(_))
        ));
    }

    #[test]
    fn test_compensate_flag_parsing() {
        let mut vars = base_vars();
        for (raw, expected) in [("1", true), ("on", true), ("0", false), ("No", false)] {
            vars.insert("COMPENSATE_FAILED_CREATE".to_string(), raw.to_string());
            assert_eq!(
                Config::from_vars(&vars).unwrap().compensate_failed_create,
                expected,
                "value {raw}"
            );
        }

        vars.insert("COMPENSATE_FAILED_CREATE".to_string(), "maybe".to_string());
        assert!(matches!(
            Config::from_vars(&vars),
            Err(ConfigError::InvalidBool { .. })
        ));
    }

    #[test]
    fn test_debug_redacts_sensitive_fields() {
        let mut vars = base_vars();
        vars.insert("DATABASE_URL".to_string(), "postgresql://user:pw@db/x".to_string());
        vars.insert("JWT_SECRET".to_string(), "signing-secret".to_string());
        vars.insert("ADMIN_TOKEN".to_string(), "admin-credential".to_string());

        let config = Config::from_vars(&vars).unwrap();
        let debug_output = format!("{:?}", config);

        assert!(!debug_output.contains("user:pw"));
        assert!(!debug_output.contains("signing-secret"));
        assert!(!debug_output.contains("admin-credential"));
        assert!(debug_output.contains("[REDACTED]"));
    }
}
