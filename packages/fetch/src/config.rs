use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::safe_fetch::{FetchOptions, DEFAULT_BACKOFF, DEFAULT_RETRY_COUNT, DEFAULT_TIMEOUT};

pub const ENV_TIMEOUT_MS: &str = "TALLY_FETCH_TIMEOUT_MS";
pub const ENV_RETRIES: &str = "TALLY_FETCH_RETRIES";
pub const ENV_BACKOFF_MS: &str = "TALLY_FETCH_BACKOFF_MS";

/// Request execution settings, in the units config files use.
///
/// Deserializing goes through [`FetchConfig::validate`], so a loaded config
/// is always usable.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawFetchConfig")]
pub struct FetchConfig {
    pub timeout_ms: u64,
    pub retry_count: u32,
    pub backoff_ms: u64,
}

/// Wire shape of [`FetchConfig`]; absent fields take the defaults.
#[derive(Deserialize)]
struct RawFetchConfig {
    timeout_ms: Option<u64>,
    retry_count: Option<u32>,
    backoff_ms: Option<u64>,
}

impl TryFrom<RawFetchConfig> for FetchConfig {
    type Error = ConfigError;

    fn try_from(raw: RawFetchConfig) -> Result<Self, Self::Error> {
        let defaults = Self::default();
        let config = Self {
            timeout_ms: raw.timeout_ms.unwrap_or(defaults.timeout_ms),
            retry_count: raw.retry_count.unwrap_or(defaults.retry_count),
            backoff_ms: raw.backoff_ms.unwrap_or(defaults.backoff_ms),
        };
        config.validate()?;
        Ok(config)
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_TIMEOUT.as_millis() as u64,
            retry_count: DEFAULT_RETRY_COUNT,
            backoff_ms: DEFAULT_BACKOFF.as_millis() as u64,
        }
    }
}

impl FetchConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable lookup; unset variables keep defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(raw) = lookup(ENV_TIMEOUT_MS) {
            config.timeout_ms = parse_number(ENV_TIMEOUT_MS, &raw)?;
        }
        if let Some(raw) = lookup(ENV_RETRIES) {
            config.retry_count = parse_number(ENV_RETRIES, &raw)?;
        }
        if let Some(raw) = lookup(ENV_BACKOFF_MS) {
            config.backoff_ms = parse_number(ENV_BACKOFF_MS, &raw)?;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                name: ENV_TIMEOUT_MS,
                value: "0".to_string(),
                message: "timeout must be positive".to_string(),
            });
        }
        Ok(())
    }

    pub fn to_options(&self) -> FetchOptions {
        FetchOptions::default()
            .with_timeout(Duration::from_millis(self.timeout_ms))
            .with_retry_count(self.retry_count)
            .with_backoff(Duration::from_millis(self.backoff_ms))
    }
}

fn parse_number<N>(name: &'static str, raw: &str) -> Result<N, ConfigError>
where
    N: std::str::FromStr,
    N::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: N::Err| ConfigError::Invalid {
        name,
        value: raw.to_string(),
        message: e.to_string(),
    })
}
