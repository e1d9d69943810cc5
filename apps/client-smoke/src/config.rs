//! Environment-backed runtime configuration for `client-smoke`.

use std::env;

use client_core::SyncTuning;
use thiserror::Error;

const DEFAULT_READY_DELAY_MS: u64 = 200;
const DEFAULT_NON_RETRYABLE_CODES: &str = "auth_denied,permission_denied";

/// Runtime configuration used by the smoke binary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmokeConfig {
    /// Tuning forwarded to `SyncRuntime::new`.
    pub tuning: SyncTuning,
    /// How long the simulated readiness task takes.
    pub ready_delay_ms: u64,
}

impl SmokeConfig {
    /// Parse configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(mut lookup: F) -> Result<Self, ConfigError>
    where
        F: FnMut(&str) -> Option<String>,
    {
        let cache_ttl_ms = parse_optional_positive_u64("COACHLINK_CACHE_TTL_MS", &mut lookup)?;
        let boot_poll_interval_ms =
            parse_optional_positive_u64("COACHLINK_BOOT_POLL_INTERVAL_MS", &mut lookup)?;
        let boot_timeout_ms = parse_optional_positive_u64("COACHLINK_BOOT_TIMEOUT_MS", &mut lookup)?;
        let retry_max_attempts =
            parse_optional_u32("COACHLINK_RETRY_MAX_ATTEMPTS", &mut lookup)?;
        let retry_base_delay_ms = parse_optional_u64("COACHLINK_RETRY_BASE_DELAY_MS", &mut lookup)?;
        let retry_max_delay_ms = parse_optional_u64("COACHLINK_RETRY_MAX_DELAY_MS", &mut lookup)?;
        let clear_cache_on_reconnect =
            parse_optional_bool("COACHLINK_CLEAR_CACHE_ON_RECONNECT", &mut lookup)?
                .unwrap_or(false);
        let ready_delay_ms = parse_optional_u64("COACHLINK_SMOKE_READY_DELAY_MS", &mut lookup)?
            .unwrap_or(DEFAULT_READY_DELAY_MS);

        if retry_max_attempts == Some(0) {
            return Err(ConfigError::InvalidValue {
                key: "COACHLINK_RETRY_MAX_ATTEMPTS",
                value: "0".to_owned(),
                reason: "must be at least 1".to_owned(),
            });
        }
        if let (Some(base), Some(max)) = (retry_base_delay_ms, retry_max_delay_ms)
            && max < base
        {
            return Err(ConfigError::InvalidValue {
                key: "COACHLINK_RETRY_MAX_DELAY_MS",
                value: max.to_string(),
                reason: format!("must not be below the base delay ({base})"),
            });
        }

        let non_retryable_codes = lookup("COACHLINK_RETRY_NON_RETRYABLE_CODES")
            .unwrap_or_else(|| DEFAULT_NON_RETRYABLE_CODES.to_owned())
            .split(',')
            .map(|code| code.trim().to_owned())
            .filter(|code| !code.is_empty())
            .collect();

        Ok(Self {
            tuning: SyncTuning {
                cache_ttl_ms,
                boot_poll_interval_ms,
                boot_timeout_ms,
                retry_max_attempts,
                retry_base_delay_ms,
                retry_max_delay_ms,
                non_retryable_codes,
                clear_cache_on_reconnect,
            },
            ready_delay_ms,
        })
    }
}

/// Errors produced while parsing runtime configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// An environment variable could not be parsed.
    #[error("invalid {key}='{value}': {reason}")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },
}

fn parse_optional_u64<F>(key: &'static str, lookup: &mut F) -> Result<Option<u64>, ConfigError>
where
    F: FnMut(&str) -> Option<String>,
{
    let Some(value) = lookup(key) else {
        return Ok(None);
    };
    value
        .trim()
        .parse::<u64>()
        .map(Some)
        .map_err(|err| ConfigError::InvalidValue {
            key,
            value,
            reason: err.to_string(),
        })
}

fn parse_optional_u32<F>(key: &'static str, lookup: &mut F) -> Result<Option<u32>, ConfigError>
where
    F: FnMut(&str) -> Option<String>,
{
    let Some(value) = lookup(key) else {
        return Ok(None);
    };
    value
        .trim()
        .parse::<u32>()
        .map(Some)
        .map_err(|err| ConfigError::InvalidValue {
            key,
            value,
            reason: err.to_string(),
        })
}

fn parse_optional_positive_u64<F>(
    key: &'static str,
    lookup: &mut F,
) -> Result<Option<u64>, ConfigError>
where
    F: FnMut(&str) -> Option<String>,
{
    match parse_optional_u64(key, lookup)? {
        Some(0) => Err(ConfigError::InvalidValue {
            key,
            value: "0".to_owned(),
            reason: "must be greater than 0".to_owned(),
        }),
        other => Ok(other),
    }
}

fn parse_optional_bool<F>(key: &'static str, lookup: &mut F) -> Result<Option<bool>, ConfigError>
where
    F: FnMut(&str) -> Option<String>,
{
    let Some(value) = lookup(key) else {
        return Ok(None);
    };
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(Some(true)),
        "0" | "false" | "no" | "off" => Ok(Some(false)),
        _ => Err(ConfigError::InvalidValue {
            key,
            value,
            reason: "expected a boolean".to_owned(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from_pairs(pairs: &[(&str, &str)]) -> Result<SmokeConfig, ConfigError> {
        let map = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect::<HashMap<_, _>>();
        SmokeConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn uses_defaults_when_environment_is_empty() {
        let cfg = config_from_pairs(&[]).expect("empty config should parse");

        assert_eq!(cfg.ready_delay_ms, DEFAULT_READY_DELAY_MS);
        assert_eq!(cfg.tuning.cache_ttl_ms, None);
        assert_eq!(cfg.tuning.retry_max_attempts, None);
        assert!(!cfg.tuning.clear_cache_on_reconnect);
        assert_eq!(
            cfg.tuning.non_retryable_codes,
            vec!["auth_denied".to_owned(), "permission_denied".to_owned()]
        );
    }

    #[test]
    fn parses_tuning_overrides() {
        let cfg = config_from_pairs(&[
            ("COACHLINK_CACHE_TTL_MS", "60000"),
            ("COACHLINK_BOOT_TIMEOUT_MS", "8000"),
            ("COACHLINK_RETRY_MAX_ATTEMPTS", "5"),
            ("COACHLINK_RETRY_BASE_DELAY_MS", "250"),
            ("COACHLINK_RETRY_MAX_DELAY_MS", "4000"),
            ("COACHLINK_RETRY_NON_RETRYABLE_CODES", " PGRST301 , ,42501"),
            ("COACHLINK_CLEAR_CACHE_ON_RECONNECT", "yes"),
        ])
        .expect("config should parse");

        assert_eq!(cfg.tuning.cache_ttl_ms, Some(60_000));
        assert_eq!(cfg.tuning.boot_timeout_ms, Some(8_000));
        assert_eq!(cfg.tuning.retry_max_attempts, Some(5));
        assert_eq!(cfg.tuning.retry_base_delay_ms, Some(250));
        assert_eq!(cfg.tuning.retry_max_delay_ms, Some(4_000));
        assert_eq!(
            cfg.tuning.non_retryable_codes,
            vec!["PGRST301".to_owned(), "42501".to_owned()]
        );
        assert!(cfg.tuning.clear_cache_on_reconnect);
    }

    #[test]
    fn rejects_invalid_numeric_values() {
        let err = config_from_pairs(&[("COACHLINK_CACHE_TTL_MS", "soon")])
            .expect_err("invalid ttl should fail");
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                key: "COACHLINK_CACHE_TTL_MS",
                ..
            }
        ));
    }

    #[test]
    fn rejects_zero_attempts_and_zero_timeouts() {
        let err = config_from_pairs(&[("COACHLINK_RETRY_MAX_ATTEMPTS", "0")])
            .expect_err("zero attempts should fail");
        assert_eq!(
            err.to_string(),
            "invalid COACHLINK_RETRY_MAX_ATTEMPTS='0': must be at least 1"
        );

        let err = config_from_pairs(&[("COACHLINK_BOOT_TIMEOUT_MS", "0")])
            .expect_err("zero timeout should fail");
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                key: "COACHLINK_BOOT_TIMEOUT_MS",
                ..
            }
        ));
    }

    #[test]
    fn rejects_max_delay_below_base() {
        let err = config_from_pairs(&[
            ("COACHLINK_RETRY_BASE_DELAY_MS", "500"),
            ("COACHLINK_RETRY_MAX_DELAY_MS", "100"),
        ])
        .expect_err("inverted delays should fail");
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                key: "COACHLINK_RETRY_MAX_DELAY_MS",
                ..
            }
        ));
    }

    #[test]
    fn rejects_unparseable_booleans() {
        let err = config_from_pairs(&[("COACHLINK_CLEAR_CACHE_ON_RECONNECT", "maybe")])
            .expect_err("bad bool should fail");
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }
}
