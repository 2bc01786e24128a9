use std::{env, net::SocketAddr};

use thiserror::Error;

use crate::utils::jwt::{JwtSecretError, SessionVerifier};

const DEFAULT_JWT_ISSUER: &str = "portal-auth";
const DEFAULT_JWT_AUDIENCE: &str = "authenticated";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{key} is invalid: {reason}")]
    Invalid { key: &'static str, reason: String },
    #[error(transparent)]
    JwtSecret(#[from] JwtSecretError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone, Copy)]
pub struct RateLimitSettings {
    pub per_millisecond: u64,
    pub burst: u32,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub frontend_origin: String,
    pub bind_addr: SocketAddr,
    pub session: SessionVerifier,
    pub rate_limit: RateLimitSettings,
    pub run_migrations: bool,
    pub log_format: LogFormat,
}

fn required(key: &'static str) -> Result<String, ConfigError> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or(ConfigError::Missing(key))
}

fn optional(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parsed<T>(key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match optional(key) {
        Some(raw) => raw.parse::<T>().map_err(|err| ConfigError::Invalid {
            key,
            reason: err.to_string(),
        }),
        None => Ok(default),
    }
}

fn flag(key: &str) -> bool {
    optional(key)
        .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(false)
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok(); // Load .env file

        let database_url = required("DATABASE_URL")?;
        let frontend_origin = required("FRONTEND_ORIGIN")?;
        let bind_addr = parsed("BIND_ADDR", SocketAddr::from(([127, 0, 0, 1], 3000)))?;
        let session = SessionVerifier::new(
            required("JWT_SECRET")?,
            &optional("JWT_ISSUER").unwrap_or_else(|| DEFAULT_JWT_ISSUER.into()),
            &optional("JWT_AUDIENCE").unwrap_or_else(|| DEFAULT_JWT_AUDIENCE.into()),
        )?;

        let log_format = match optional("LOG_FORMAT").as_deref() {
            Some("json") => LogFormat::Json,
            _ => LogFormat::Pretty,
        };

        Ok(Config {
            database_url,
            frontend_origin,
            bind_addr,
            session,
            rate_limit: RateLimitSettings {
                // Default: 200ms/token (~5 req/sec)
                per_millisecond: parsed("RATE_LIMITER_MILLISECONDS", 200)?,
                burst: parsed("RATE_LIMITER_BURST", 20)?,
            },
            run_migrations: flag("RUN_MIGRATIONS"),
            log_format,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_key_is_reported_by_name() {
        let err = required("PORTAL_TEST_UNSET_KEY").unwrap_err();
        assert_eq!(err.to_string(), "PORTAL_TEST_UNSET_KEY must be set");
    }

    #[test]
    fn parsed_falls_back_to_default_and_rejects_garbage() {
        assert_eq!(parsed::<u32>("PORTAL_TEST_UNSET_BURST", 20).unwrap(), 20);

        env::set_var("PORTAL_TEST_BAD_BURST", "lots");
        let err = parsed::<u32>("PORTAL_TEST_BAD_BURST", 20).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                key: "PORTAL_TEST_BAD_BURST",
                ..
            }
        ));
    }

    #[test]
    fn flags_accept_common_truthy_values() {
        env::set_var("PORTAL_TEST_FLAG_ON", "TRUE");
        env::set_var("PORTAL_TEST_FLAG_OFF", "0");
        assert!(flag("PORTAL_TEST_FLAG_ON"));
        assert!(!flag("PORTAL_TEST_FLAG_OFF"));
        assert!(!flag("PORTAL_TEST_FLAG_MISSING"));
    }
}
