//! Server configuration, read from the environment (after `.env` is loaded by `main`).
//!
//! - `CATALOG_BIND_ADDR`          (default: "0.0.0.0")
//! - `CATALOG_PORT`               (default: 3000)
//! - `GENERATION_INTERVAL_MS`     (default: 1000)
//! - `GENERATION_TIMEOUT_SECS`    (default: 15)
//! - `GENERATION_MAX_ID_ATTEMPTS` (default: 1000)
//! - `CATALOG_SEED_GAMES`         (default: 20)
//! - `WS_OUTBOUND_BUFFER`         (default: 64)

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::generation::GenerationSettings;
use crate::ws_registry::DEFAULT_OUTBOUND_BUFFER;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{key}={value:?} is invalid: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub port: u16,
    pub generation_interval: Duration,
    pub generation_timeout: Duration,
    pub max_id_attempts: u32,
    pub seed_games: usize,
    pub outbound_buffer: usize,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a config from any key lookup; `from_env` passes the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = GenerationSettings::default();

        let bind_addr = lookup("CATALOG_BIND_ADDR").unwrap_or_else(|| "0.0.0.0".to_string());
        let port = read_or_default(&lookup, "CATALOG_PORT", 3000u16)?;
        let interval_ms = read_positive(
            &lookup,
            "GENERATION_INTERVAL_MS",
            defaults.interval.as_millis() as u64,
        )?;
        let timeout_secs = read_positive(
            &lookup,
            "GENERATION_TIMEOUT_SECS",
            defaults.timeout.as_secs(),
        )?;
        let max_id_attempts = read_positive(
            &lookup,
            "GENERATION_MAX_ID_ATTEMPTS",
            u64::from(defaults.max_id_attempts),
        )?;
        let seed_games = read_or_default(&lookup, "CATALOG_SEED_GAMES", 20usize)?;
        let outbound_buffer = read_positive(
            &lookup,
            "WS_OUTBOUND_BUFFER",
            DEFAULT_OUTBOUND_BUFFER as u64,
        )?;

        Ok(Config {
            bind_addr,
            port,
            generation_interval: Duration::from_millis(interval_ms),
            generation_timeout: Duration::from_secs(timeout_secs),
            max_id_attempts: u32::try_from(max_id_attempts).map_err(|e| ConfigError::Invalid {
                key: "GENERATION_MAX_ID_ATTEMPTS",
                value: max_id_attempts.to_string(),
                reason: e.to_string(),
            })?,
            seed_games,
            outbound_buffer: outbound_buffer as usize,
        })
    }

    /// `addr:port` socket string.
    pub fn socket_addr_string(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }

    pub fn generation_settings(&self) -> GenerationSettings {
        GenerationSettings {
            interval: self.generation_interval,
            timeout: self.generation_timeout,
            max_id_attempts: self.max_id_attempts,
        }
    }
}

fn read_or_default<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let Some(value) = lookup(key) else {
        return Ok(default);
    };
    match value.trim().parse::<T>() {
        Ok(parsed) => Ok(parsed),
        Err(e) => Err(ConfigError::Invalid {
            key,
            reason: e.to_string(),
            value,
        }),
    }
}

fn read_positive<F>(lookup: &F, key: &'static str, default: u64) -> Result<u64, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let value = read_or_default(lookup, key, default)?;
    if value == 0 {
        return Err(ConfigError::Invalid {
            key,
            value: value.to_string(),
            reason: "must be greater than zero".to_string(),
        });
    }
    Ok(value)
}
