//! Runtime configuration. Defaults work against a local generation server;
//! every value can be overridden through the environment.

use std::env;
use std::time::Duration;
use thiserror::Error;

pub const ENV_ENDPOINT: &str = "DRAFTSMITH_ENDPOINT";
pub const ENV_REQUEST_TIMEOUT_MS: &str = "DRAFTSMITH_REQUEST_TIMEOUT_MS";
pub const ENV_AWAIT_TIMEOUT_MS: &str = "DRAFTSMITH_AWAIT_TIMEOUT_MS";

const DEFAULT_ENDPOINT: &str = "http://localhost:8080/generate-document";
const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 120_000;
const DEFAULT_AWAIT_TIMEOUT_MS: u64 = 60_000;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{key} must be a whole number of milliseconds, got {value:?}")]
    InvalidMillis { key: &'static str, value: String },
    #[error("{key} must not be empty")]
    Empty { key: &'static str },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationConfig {
    /// Full URL of the document-generation endpoint.
    pub endpoint: String,
    /// Hard ceiling on one HTTP call.
    pub request_timeout: Duration,
    /// How long the terminal action waits on an in-flight background draft.
    pub await_timeout: Duration,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            request_timeout: Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS),
            await_timeout: Duration::from_millis(DEFAULT_AWAIT_TIMEOUT_MS),
        }
    }
}

impl GenerationConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds a config from an arbitrary key lookup. Missing keys keep their
    /// defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(endpoint) = lookup(ENV_ENDPOINT) {
            let endpoint = endpoint.trim();
            if endpoint.is_empty() {
                return Err(ConfigError::Empty { key: ENV_ENDPOINT });
            }
            config.endpoint = endpoint.to_string();
        }
        if let Some(raw) = lookup(ENV_REQUEST_TIMEOUT_MS) {
            config.request_timeout = parse_millis(ENV_REQUEST_TIMEOUT_MS, &raw)?;
        }
        if let Some(raw) = lookup(ENV_AWAIT_TIMEOUT_MS) {
            config.await_timeout = parse_millis(ENV_AWAIT_TIMEOUT_MS, &raw)?;
        }

        Ok(config)
    }
}

fn parse_millis(key: &'static str, raw: &str) -> Result<Duration, ConfigError> {
    raw.trim()
        .parse::<u64>()
        .map(Duration::from_millis)
        .map_err(|_| ConfigError::InvalidMillis { key, value: raw.to_string() })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        let config = GenerationConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, GenerationConfig::default());
        assert_eq!(config.await_timeout, Duration::from_secs(60));
    }

    #[test]
    fn overrides_apply() {
        let config = GenerationConfig::from_lookup(lookup(&[
            (ENV_ENDPOINT, "http://gen.internal/api/generate"),
            (ENV_REQUEST_TIMEOUT_MS, "5000"),
            (ENV_AWAIT_TIMEOUT_MS, " 250 "),
        ]))
        .unwrap();
        assert_eq!(config.endpoint, "http://gen.internal/api/generate");
        assert_eq!(config.request_timeout, Duration::from_secs(5));
        assert_eq!(config.await_timeout, Duration::from_millis(250));
    }

    #[test]
    fn bad_values_are_rejected() {
        let err = GenerationConfig::from_lookup(lookup(&[(ENV_AWAIT_TIMEOUT_MS, "soon")])).unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidMillis { key: ENV_AWAIT_TIMEOUT_MS, value: "soon".to_string() }
        );

        let err = GenerationConfig::from_lookup(lookup(&[(ENV_ENDPOINT, "  ")])).unwrap_err();
        assert_eq!(err, ConfigError::Empty { key: ENV_ENDPOINT });
    }
}
