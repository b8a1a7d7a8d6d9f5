use std::env;

use luminous_core::model::MatchPolicy;

use crate::error::ConfigError;

pub const DB_URL_VAR: &str = "LUMINOUS_DB_URL";
pub const LOG_VAR: &str = "LUMINOUS_LOG";
pub const MATCH_CASE_VAR: &str = "LUMINOUS_MATCH_CASE";
pub const MATCH_TRIM_VAR: &str = "LUMINOUS_MATCH_TRIM";
pub const SESSION_SIZE_VAR: &str = "LUMINOUS_LEARN_SESSION_SIZE";

const DEFAULT_DB_URL: &str = "sqlite::memory:";
const DEFAULT_LOG_FILTER: &str = "info";
const DEFAULT_SESSION_SIZE: usize = 10;

/// Runtime settings for the services layer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServicesConfig {
    pub database_url: String,
    pub log_filter: String,
    pub match_policy: MatchPolicy,
    /// Maximum number of cards asked in one learn or test session.
    pub learn_session_size: usize,
}

impl Default for ServicesConfig {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DB_URL.into(),
            log_filter: DEFAULT_LOG_FILTER.into(),
            match_policy: MatchPolicy::default(),
            learn_session_size: DEFAULT_SESSION_SIZE,
        }
    }
}

impl ServicesConfig {
    /// Read settings from the process environment.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when a variable is set to an unusable value.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Read settings through `lookup`; unset or blank variables use defaults.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when a variable is set to an unusable value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let case_sensitive = parse_bool(MATCH_CASE_VAR, read(MATCH_CASE_VAR), true)?;
        let trim = parse_bool(MATCH_TRIM_VAR, read(MATCH_TRIM_VAR), false)?;
        let learn_session_size = match read(SESSION_SIZE_VAR) {
            None => DEFAULT_SESSION_SIZE,
            Some(raw) => match raw.trim().parse::<usize>() {
                Ok(size) if size > 0 => size,
                _ => {
                    return Err(ConfigError::InvalidCount {
                        var: SESSION_SIZE_VAR,
                        value: raw,
                    });
                }
            },
        };

        Ok(Self {
            database_url: read(DB_URL_VAR).unwrap_or_else(|| DEFAULT_DB_URL.into()),
            log_filter: read(LOG_VAR).unwrap_or_else(|| DEFAULT_LOG_FILTER.into()),
            match_policy: MatchPolicy::new(case_sensitive, trim),
            learn_session_size,
        })
    }
}

fn parse_bool(var: &'static str, raw: Option<String>, default: bool) -> Result<bool, ConfigError> {
    let Some(raw) = raw else {
        return Ok(default);
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(ConfigError::InvalidBool { var, value: raw }),
    }
}
