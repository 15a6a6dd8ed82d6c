//! Environment variable parsing utilities
//!
//! Shared by the pool configuration and service configuration loaders so
//! every setting is parsed the same way.

use std::str::FromStr;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnvVarError {
    #[error("environment variable {0} not set")]
    Missing(String),

    #[error("environment variable {key} has invalid value")]
    Invalid { key: String },
}

/// Parse an environment variable with a default fallback.
///
/// A present but unparsable value falls back to the default with a warning.
///
/// # Example
/// ```ignore
/// let port: u16 = parse_env_with_default("SERVER_PORT", 8000);
/// ```
pub fn parse_env_with_default<T: FromStr>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!(key, "ignoring unparsable environment value, using default");
            default
        }),
        Err(_) => default,
    }
}

/// Parse an environment variable, returning None if missing or invalid
pub fn parse_env_optional<T: FromStr>(key: &str) -> Option<T> {
    std::env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .and_then(|v| v.trim().parse().ok())
}

/// Parse a required environment variable
///
/// # Example
/// ```ignore
/// let database_url = parse_env_required::<String>("DATABASE_URL")?;
/// ```
pub fn parse_env_required<T: FromStr>(key: &str) -> Result<T, EnvVarError> {
    let raw = std::env::var(key).map_err(|_| EnvVarError::Missing(key.to_string()))?;
    if raw.trim().is_empty() {
        return Err(EnvVarError::Missing(key.to_string()));
    }
    raw.trim().parse().map_err(|_| EnvVarError::Invalid {
        key: key.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_parse_env_with_default() {
        let result: u32 = parse_env_with_default("DB_POOL_TEST_NONEXISTENT", 42);
        assert_eq!(result, 42);

        std::env::set_var("DB_POOL_TEST_PORT", "8080");
        let result: u16 = parse_env_with_default("DB_POOL_TEST_PORT", 3000);
        assert_eq!(result, 8080);

        std::env::set_var("DB_POOL_TEST_PORT", "eighty");
        let result: u16 = parse_env_with_default("DB_POOL_TEST_PORT", 3000);
        assert_eq!(result, 3000);
        std::env::remove_var("DB_POOL_TEST_PORT");
    }

    #[test]
    #[serial]
    fn test_parse_env_optional() {
        assert_eq!(parse_env_optional::<u32>("DB_POOL_TEST_NONEXISTENT"), None);

        std::env::set_var("DB_POOL_TEST_OPT", " 123 ");
        assert_eq!(parse_env_optional::<u32>("DB_POOL_TEST_OPT"), Some(123));

        std::env::set_var("DB_POOL_TEST_OPT", "");
        assert_eq!(parse_env_optional::<String>("DB_POOL_TEST_OPT"), None);
        std::env::remove_var("DB_POOL_TEST_OPT");
    }

    #[test]
    #[serial]
    fn test_parse_env_required() {
        assert_eq!(
            parse_env_required::<u32>("DB_POOL_TEST_NONEXISTENT"),
            Err(EnvVarError::Missing("DB_POOL_TEST_NONEXISTENT".to_string()))
        );

        std::env::set_var("DB_POOL_TEST_REQ", "456");
        assert_eq!(parse_env_required::<u32>("DB_POOL_TEST_REQ"), Ok(456));

        std::env::set_var("DB_POOL_TEST_REQ", "x");
        assert!(matches!(
            parse_env_required::<u32>("DB_POOL_TEST_REQ"),
            Err(EnvVarError::Invalid { .. })
        ));
        std::env::remove_var("DB_POOL_TEST_REQ");
    }
}
