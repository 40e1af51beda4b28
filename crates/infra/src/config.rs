//! Environment-driven process settings.

use std::time::Duration;

use thiserror::Error;

use crate::import::DEFAULT_BATCH_SIZE;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{var} is required when USE_PERSISTENT_STORES=true")]
    Missing { var: &'static str },

    #[error("{var}='{value}' is invalid: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// Where products, quotes and history live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    InMemory,
    Postgres { database_url: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub bind_addr: String,
    pub store: StoreBackend,
    pub predictor_url: String,
    pub predictor_timeout: Duration,
    pub import_batch_size: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
            store: StoreBackend::InMemory,
            predictor_url: "http://127.0.0.1:8000".to_string(),
            predictor_timeout: Duration::from_millis(5_000),
            import_batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build settings from any variable source (unset and blank values use defaults).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |var: &str| lookup(var).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();

        let persistent = match get("USE_PERSISTENT_STORES") {
            Some(v) => parse_bool("USE_PERSISTENT_STORES", &v)?,
            None => false,
        };
        let store = if persistent {
            let database_url = get("DATABASE_URL").ok_or(ConfigError::Missing { var: "DATABASE_URL" })?;
            StoreBackend::Postgres { database_url }
        } else {
            StoreBackend::InMemory
        };

        let predictor_timeout = match get("PREDICTOR_TIMEOUT_MS") {
            Some(v) => Duration::from_millis(parse_positive("PREDICTOR_TIMEOUT_MS", &v)? as u64),
            None => defaults.predictor_timeout,
        };
        let import_batch_size = match get("IMPORT_BATCH_SIZE") {
            Some(v) => parse_positive("IMPORT_BATCH_SIZE", &v)?,
            None => defaults.import_batch_size,
        };

        Ok(Self {
            bind_addr: get("BIND_ADDR").unwrap_or(defaults.bind_addr),
            store,
            predictor_url: get("PREDICTOR_URL").unwrap_or(defaults.predictor_url),
            predictor_timeout,
            import_batch_size,
        })
    }
}

fn parse_bool(var: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(ConfigError::Invalid {
            var,
            value: value.to_string(),
            reason: "expected true or false".to_string(),
        }),
    }
}

fn parse_positive(var: &'static str, value: &str) -> Result<usize, ConfigError> {
    let invalid = |reason: &str| ConfigError::Invalid {
        var,
        value: value.to_string(),
        reason: reason.to_string(),
    };
    match value.parse::<usize>() {
        Ok(0) => Err(invalid("must be at least 1")),
        Ok(n) => Ok(n),
        Err(_) => Err(invalid("not a positive integer")),
    }
}
