//! Environment-driven configuration helpers shared by the intake services.
//!
//! Every setting is read from process environment variables (a `.env` file is
//! the deployment's concern, not ours). Typed settings structs implement
//! [`FromEnv`] and build on the small helpers below.

pub mod server;
pub mod tracing;

use std::env;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Configuration error type
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Environment variable '{0}' is required but not set")]
    MissingEnvVar(String),

    #[error("Failed to parse environment variable '{key}': {details}")]
    ParseError { key: String, details: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Application environment
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    pub fn from_env() -> Self {
        let app_env = env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        if app_env.eq_ignore_ascii_case("production") {
            Environment::Production
        } else {
            Environment::Development
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }

    pub fn is_development(&self) -> bool {
        matches!(self, Environment::Development)
    }
}

/// Trait for configuration that can be loaded from environment variables
pub trait FromEnv: Sized {
    fn from_env() -> Result<Self, ConfigError>;
}

/// Read a variable, falling back to `default` when unset
pub fn env_or_default(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Read a variable or fail with [`ConfigError::MissingEnvVar`]
///
/// An empty value counts as unset.
pub fn env_required(key: &str) -> Result<String, ConfigError> {
    env_optional(key).ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
}

/// Read a variable, treating an empty value as unset
pub fn env_optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Parse a variable into `T`, using `default` when unset
pub fn env_parse<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env_optional(key) {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::ParseError {
            key: key.to_string(),
            details: e.to_string(),
        }),
        None => Ok(default),
    }
}

/// Parse a boolean flag. Accepts `true`/`false`, `1`/`0` and `yes`/`no` (case-insensitive).
pub fn env_flag(key: &str, default: bool) -> Result<bool, ConfigError> {
    match env_optional(key) {
        None => Ok(default),
        Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Ok(true),
            "false" | "0" | "no" => Ok(false),
            other => Err(ConfigError::ParseError {
                key: key.to_string(),
                details: format!("expected a boolean, got '{}'", other),
            }),
        },
    }
}

/// Parse a whole number of seconds into a [`Duration`]
pub fn env_duration_secs(key: &str, default_secs: u64) -> Result<Duration, ConfigError> {
    env_parse(key, default_secs).map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_defaults_to_development() {
        temp_env::with_var_unset("APP_ENV", || {
            let env = Environment::from_env();
            assert_eq!(env, Environment::Development);
            assert!(env.is_development());
            assert!(!env.is_production());
        });
    }

    #[test]
    fn test_environment_production_case_insensitive() {
        temp_env::with_var("APP_ENV", Some("PRODUCTION"), || {
            assert_eq!(Environment::from_env(), Environment::Production);
        });
    }

    #[test]
    fn test_env_required_treats_empty_as_missing() {
        temp_env::with_var("SMTP_HOST_TEST", Some("  "), || {
            let err = env_required("SMTP_HOST_TEST").unwrap_err();
            assert!(err.to_string().contains("SMTP_HOST_TEST"));
        });
    }

    #[test]
    fn test_env_required_success() {
        temp_env::with_var("REQUIRED_VAR", Some("value"), || {
            assert_eq!(env_required("REQUIRED_VAR").unwrap(), "value");
        });
    }

    #[test]
    fn test_env_parse_uses_default_when_unset() {
        temp_env::with_var_unset("POLL_SECS_TEST", || {
            assert_eq!(env_parse("POLL_SECS_TEST", 300u64).unwrap(), 300);
        });
    }

    #[test]
    fn test_env_parse_reports_key_on_failure() {
        temp_env::with_var("POLL_SECS_TEST", Some("five"), || {
            let err = env_parse("POLL_SECS_TEST", 300u64).unwrap_err();
            assert!(err.to_string().contains("POLL_SECS_TEST"));
        });
    }

    #[test]
    fn test_env_flag_variants() {
        temp_env::with_var("FLAG_TEST", Some("0"), || {
            assert!(!env_flag("FLAG_TEST", true).unwrap());
        });
        temp_env::with_var("FLAG_TEST", Some("TRUE"), || {
            assert!(env_flag("FLAG_TEST", false).unwrap());
        });
        temp_env::with_var("FLAG_TEST", Some("yes"), || {
            assert!(env_flag("FLAG_TEST", false).unwrap());
        });
        temp_env::with_var("FLAG_TEST", Some("No"), || {
            assert!(!env_flag("FLAG_TEST", true).unwrap());
        });
        temp_env::with_var("FLAG_TEST", Some("maybe"), || {
            assert!(env_flag("FLAG_TEST", false).is_err());
        });
    }

    #[test]
    fn test_env_duration_secs() {
        temp_env::with_var("INTERVAL_TEST", Some("60"), || {
            assert_eq!(
                env_duration_secs("INTERVAL_TEST", 300).unwrap(),
                Duration::from_secs(60)
            );
        });
    }
}
