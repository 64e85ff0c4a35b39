//! Server configuration loaded from the environment

use std::time::Duration;

use thiserror::Error;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_RATE_LIMIT: u32 = 50;
pub const DEFAULT_RATE_WINDOW_SECS: u64 = 60;

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} is not a valid number: {value}")]
    InvalidNumber { name: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub database_url: String,
    pub port: u16,
    /// Shared secret for webhook signatures. Unset means every webhook is rejected.
    pub webhook_secret: Option<String>,
    pub rate_limit: u32,
    pub rate_window: Duration,
}

impl ServerConfig {
    /// Read configuration from environment variables
    ///
    /// - DATABASE_URL: PostgreSQL connection string (required)
    /// - PORT: listen port (default 3000)
    /// - RETELL_WEBHOOK_SECRET: webhook signing secret
    /// - WEBHOOK_RATE_LIMIT: requests per window per client (default 50)
    /// - WEBHOOK_RATE_WINDOW_SECS: window length in seconds (default 60)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let database_url = var("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?;

        Ok(Self {
            database_url,
            port: parse_or(var("PORT"), "PORT", DEFAULT_PORT)?,
            webhook_secret: var("RETELL_WEBHOOK_SECRET"),
            rate_limit: parse_or(var("WEBHOOK_RATE_LIMIT"), "WEBHOOK_RATE_LIMIT", DEFAULT_RATE_LIMIT)?,
            rate_window: Duration::from_secs(parse_or(
                var("WEBHOOK_RATE_WINDOW_SECS"),
                "WEBHOOK_RATE_WINDOW_SECS",
                DEFAULT_RATE_WINDOW_SECS,
            )?),
        })
    }
}

fn parse_or<T: std::str::FromStr>(
    value: Option<String>,
    name: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match value {
        Some(v) => v
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidNumber { name, value: v }),
        None => Ok(default),
    }
}
