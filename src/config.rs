use std::{env, path::PathBuf, str::FromStr, time::Duration};

use thiserror::Error;

use crate::constants;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("invalid configuration: {field} {reason}")]
    InvalidConfiguration { field: &'static str, reason: String },
    #[error("invalid value for '{name}': '{value}'")]
    InvalidValue { name: &'static str, value: String },
}

/// Runtime settings for the fetch layer and batch pacing.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub max_requests: u32,
    pub interval: Duration,
    pub cache_path: PathBuf,
    pub cache_expiry: Duration,
    pub stale_if_error: bool,
    pub batch_size: usize,
    pub batch_delay: Duration,
    pub item_delay: Duration,
    pub max_retries: u32,
    pub interactive: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_requests: constants::DEFAULT_MAX_REQUESTS,
            interval: Duration::from_secs_f64(constants::DEFAULT_INTERVAL_SECONDS),
            cache_path: PathBuf::from(constants::DEFAULT_CACHE_PATH),
            cache_expiry: Duration::from_secs(constants::DEFAULT_CACHE_EXPIRY_SECONDS),
            stale_if_error: false,
            batch_size: constants::DEFAULT_BATCH_SIZE,
            batch_delay: Duration::from_secs_f64(constants::DEFAULT_BATCH_DELAY_SECONDS),
            item_delay: Duration::from_secs_f64(constants::DEFAULT_ITEM_DELAY_SECONDS),
            max_retries: constants::DEFAULT_MAX_RETRIES,
            interactive: false,
        }
    }
}

/// Command-line overrides, applied on top of the environment.
#[derive(clap::Args, Debug, Default, Clone)]
pub struct Overrides {
    /// SQLite file backing the HTTP cache.
    #[arg(long, global = true)]
    pub cache_path: Option<PathBuf>,
    /// Requests allowed per rate-limit window.
    #[arg(long, global = true)]
    pub max_requests: Option<u32>,
    /// Length of the rate-limit window in seconds.
    #[arg(long, global = true)]
    pub interval_seconds: Option<f64>,
    /// Cache TTL in seconds.
    #[arg(long, global = true)]
    pub cache_expiry: Option<u64>,
    /// Retries per candidate when throttled.
    #[arg(long, global = true)]
    pub max_retries: Option<u32>,
}

impl Config {
    /// Reads settings from the process environment (call `dotenv` first).
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Reads settings through `lookup`, falling back to defaults for unset names.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let config = Self {
            max_requests: parse_var(&lookup, "max_requests", defaults.max_requests)?,
            interval: parse_seconds(&lookup, "interval_seconds", defaults.interval)?,
            cache_path: lookup("cache_path")
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or(defaults.cache_path),
            cache_expiry: parse_seconds(&lookup, "cache_expiry", defaults.cache_expiry)?,
            stale_if_error: parse_bool(&lookup, "stale_if_error", defaults.stale_if_error)?,
            batch_size: parse_var(&lookup, "batch_size", defaults.batch_size)?,
            batch_delay: parse_seconds(&lookup, "batch_delay", defaults.batch_delay)?,
            item_delay: parse_seconds(&lookup, "item_delay", defaults.item_delay)?,
            max_retries: parse_var(&lookup, "max_retries", defaults.max_retries)?,
            interactive: parse_bool(&lookup, "interactive", defaults.interactive)?,
        };
        Ok(config)
    }

    pub fn apply(&mut self, overrides: &Overrides) -> Result<(), ConfigError> {
        if let Some(path) = &overrides.cache_path {
            self.cache_path = path.clone();
        }
        if let Some(max_requests) = overrides.max_requests {
            self.max_requests = max_requests;
        }
        if let Some(seconds) = overrides.interval_seconds {
            self.interval = seconds_to_duration("interval_seconds", &seconds.to_string())?;
        }
        if let Some(seconds) = overrides.cache_expiry {
            self.cache_expiry = Duration::from_secs(seconds);
        }
        if let Some(max_retries) = overrides.max_retries {
            self.max_retries = max_retries;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_requests == 0 {
            return Err(ConfigError::InvalidConfiguration {
                field: "max_requests",
                reason: "must be positive".into(),
            });
        }
        if self.interval.is_zero() {
            return Err(ConfigError::InvalidConfiguration {
                field: "interval_seconds",
                reason: "must be positive".into(),
            });
        }
        if self.batch_size == 0 {
            return Err(ConfigError::InvalidConfiguration {
                field: "batch_size",
                reason: "must be positive".into(),
            });
        }
        Ok(())
    }
}

fn parse_var<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(name) {
        Some(value) if !value.trim().is_empty() => {
            value
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue { name, value })
        }
        _ => Ok(default),
    }
}

fn parse_seconds(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: Duration,
) -> Result<Duration, ConfigError> {
    match lookup(name) {
        Some(value) if !value.trim().is_empty() => seconds_to_duration(name, &value),
        _ => Ok(default),
    }
}

pub fn seconds_to_duration(name: &'static str, value: &str) -> Result<Duration, ConfigError> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
        .ok_or_else(|| ConfigError::InvalidValue {
            name,
            value: value.to_string(),
        })
}

fn parse_bool(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: bool,
) -> Result<bool, ConfigError> {
    let Some(value) = lookup(name) else {
        return Ok(default);
    };
    match value.trim().to_ascii_lowercase().as_str() {
        "" => Ok(default),
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue { name, value }),
    }
}
