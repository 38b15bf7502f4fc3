use std::env;
use std::fmt::Display;
use std::str::FromStr;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{key} has an invalid value {value:?}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Server host to bind to.
    pub host: String,
    /// Server port to bind to.
    pub port: u16,
    /// SQLite connection URL.
    pub database_url: String,
    /// Maximum database connections in the pool.
    pub db_max_connections: u32,
    /// HS256 secret for bearer tokens.
    pub jwt_secret: String,
    /// Shared secret for Lemon Squeezy webhook signatures.
    pub webhook_secret: String,
    /// Largest webhook body accepted, in bytes.
    pub webhook_max_body_bytes: usize,
    /// Seconds before the same visitor can count another view.
    pub view_cooldown_secs: u64,
    /// Chance that a gate call also sweeps expired entries.
    pub rate_limit_sweep_probability: f64,
    /// Votes allowed per voter per window.
    pub interaction_limit_max: u32,
    pub interaction_limit_window_secs: u64,
    /// Event bus channel capacity.
    pub event_bus_capacity: usize,
    /// Log level (e.g., "info", "debug", "trace").
    pub log_level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3030,
            database_url: "sqlite://catalog.db?mode=rwc".to_string(),
            db_max_connections: 5,
            jwt_secret: "dev-secret-change-me-in-production".to_string(),
            webhook_secret: String::new(),
            webhook_max_body_bytes: 64 * 1024,
            view_cooldown_secs: 30,
            rate_limit_sweep_probability: 0.01,
            interaction_limit_max: 30,
            interaction_limit_window_secs: 60,
            event_bus_capacity: 1024,
            log_level: "info".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables with sensible defaults.
    /// Only the webhook secret is mandatory.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let webhook_secret = env::var("LEMON_SQUEEZY_WEBHOOK_SECRET")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .ok_or(ConfigError::Missing("LEMON_SQUEEZY_WEBHOOK_SECRET"))?;

        Ok(Self {
            host: env::var("HOST").unwrap_or(defaults.host),
            port: parse_var("PORT", defaults.port)?,
            database_url: env::var("DATABASE_URL").unwrap_or(defaults.database_url),
            db_max_connections: parse_var("DB_MAX_CONNECTIONS", defaults.db_max_connections)?,
            jwt_secret: env::var("JWT_SECRET").unwrap_or(defaults.jwt_secret),
            webhook_secret,
            webhook_max_body_bytes: parse_var(
                "WEBHOOK_MAX_BODY_BYTES",
                defaults.webhook_max_body_bytes,
            )?,
            view_cooldown_secs: parse_var("VIEW_COOLDOWN_SECS", defaults.view_cooldown_secs)?,
            rate_limit_sweep_probability: parse_var(
                "RATE_LIMIT_SWEEP_PROBABILITY",
                defaults.rate_limit_sweep_probability,
            )?,
            interaction_limit_max: parse_var(
                "INTERACTION_LIMIT_MAX",
                defaults.interaction_limit_max,
            )?,
            interaction_limit_window_secs: parse_var(
                "INTERACTION_LIMIT_WINDOW_SECS",
                defaults.interaction_limit_window_secs,
            )?,
            event_bus_capacity: parse_var("EVENT_BUS_CAPACITY", defaults.event_bus_capacity)?,
            log_level: env::var("LOG_LEVEL").unwrap_or(defaults.log_level),
        })
    }

    /// Build the socket address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_var<T>(key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    match env::var(key) {
        Ok(raw) => parse_value(key, &raw),
        Err(_) => Ok(default),
    }
}

fn parse_value<T>(key: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        key,
        value: raw.to_string(),
        reason: e.to_string(),
    })
}
