use std::env;
use std::time::Duration;

use url::Url;

use crate::api::{ApiConfig, AuthTokens, DEFAULT_API_BASE_URL, DEFAULT_REQUEST_TIMEOUT};
use crate::error::ConfigError;

pub const DEFAULT_DB_URL: &str = "sqlite://quiz-client.sqlite3";

const API_BASE_URL_VAR: &str = "QUIZ_API_BASE_URL";
const DB_URL_VAR: &str = "QUIZ_DB_URL";
const ACCESS_TOKEN_VAR: &str = "QUIZ_ACCESS_TOKEN";
const REFRESH_TOKEN_VAR: &str = "QUIZ_REFRESH_TOKEN";
const TIMEOUT_VAR: &str = "QUIZ_REQUEST_TIMEOUT_SECS";

/// Client settings, read once at startup.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    pub api: ApiConfig,
    pub db_url: String,
    pub tokens: Option<AuthTokens>,
}

impl ClientConfig {
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is set to an invalid value.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build from any variable source; blank values count as unset.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is set to an invalid value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_owned())
                .filter(|value| !value.is_empty())
        };

        let base_url = var(API_BASE_URL_VAR).unwrap_or_else(|| DEFAULT_API_BASE_URL.into());
        let base_url = Url::parse(&base_url).map_err(|source| ConfigError::InvalidUrl {
            var: API_BASE_URL_VAR,
            source,
        })?;

        let request_timeout = match var(TIMEOUT_VAR) {
            None => DEFAULT_REQUEST_TIMEOUT,
            Some(raw) => match raw.parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => {
                    return Err(ConfigError::InvalidNumber {
                        var: TIMEOUT_VAR,
                        raw,
                    });
                }
            },
        };

        let tokens = var(ACCESS_TOKEN_VAR)
            .map(|access| AuthTokens::new(access, var(REFRESH_TOKEN_VAR)));

        Ok(Self {
            api: ApiConfig::new(base_url, request_timeout),
            db_url: var(DB_URL_VAR).unwrap_or_else(|| DEFAULT_DB_URL.into()),
            tokens,
        })
    }
}
