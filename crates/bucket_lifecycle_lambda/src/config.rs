use std::time::Duration;

use bucket_lifecycle_core::objects::{validate_batch_size, MAX_DELETE_BATCH};

use crate::adapters::retry::{RetryPolicy, DEFAULT_RETRY_BASE_DELAY, DEFAULT_RETRY_MAX_DELAY};
use crate::observability::LogFormat;

pub const DELETE_BATCH_SIZE_ENV: &str = "DELETE_BATCH_SIZE";
pub const STORAGE_MAX_ATTEMPTS_ENV: &str = "STORAGE_MAX_ATTEMPTS";
pub const STORAGE_RETRY_BASE_DELAY_MS_ENV: &str = "STORAGE_RETRY_BASE_DELAY_MS";
pub const STORAGE_RETRY_MAX_DELAY_MS_ENV: &str = "STORAGE_RETRY_MAX_DELAY_MS";
pub const CALLBACK_TIMEOUT_SECS_ENV: &str = "CALLBACK_TIMEOUT_SECS";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

pub const DEFAULT_CALLBACK_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{key}: {message}")]
pub struct ConfigError {
    pub key: &'static str,
    pub message: String,
}

impl ConfigError {
    fn new(key: &'static str, message: impl Into<String>) -> Self {
        Self {
            key,
            message: message.into(),
        }
    }
}

/// Cold-start configuration. Every setting is optional and the defaults
/// reproduce the plain behaviour: full-size delete batches, no storage
/// retries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerConfig {
    pub delete_batch_size: usize,
    pub retry: RetryPolicy,
    pub callback_timeout: Duration,
    pub log_format: LogFormat,
}

impl Default for HandlerConfig {
    fn default() -> Self {
        Self {
            delete_batch_size: MAX_DELETE_BATCH,
            retry: RetryPolicy::default(),
            callback_timeout: DEFAULT_CALLBACK_TIMEOUT,
            log_format: LogFormat::default(),
        }
    }
}

impl HandlerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let value = |key: &str| {
            lookup(key)
                .map(|raw| raw.trim().to_string())
                .filter(|raw| !raw.is_empty())
        };

        let delete_batch_size = match value(DELETE_BATCH_SIZE_ENV) {
            Some(raw) => {
                let parsed = parse_u64(DELETE_BATCH_SIZE_ENV, &raw)?;
                let size = usize::try_from(parsed)
                    .map_err(|_| ConfigError::new(DELETE_BATCH_SIZE_ENV, "value is too large"))?;
                validate_batch_size(size)
                    .map_err(|error| ConfigError::new(DELETE_BATCH_SIZE_ENV, error.message()))?
            }
            None => MAX_DELETE_BATCH,
        };

        let max_attempts = match value(STORAGE_MAX_ATTEMPTS_ENV) {
            Some(raw) => {
                let parsed = parse_u64(STORAGE_MAX_ATTEMPTS_ENV, &raw)?;
                if parsed == 0 {
                    return Err(ConfigError::new(
                        STORAGE_MAX_ATTEMPTS_ENV,
                        "must be a positive integer",
                    ));
                }
                u32::try_from(parsed)
                    .map_err(|_| ConfigError::new(STORAGE_MAX_ATTEMPTS_ENV, "value is too large"))?
            }
            None => 1,
        };

        let base_delay = match value(STORAGE_RETRY_BASE_DELAY_MS_ENV) {
            Some(raw) => Duration::from_millis(parse_u64(STORAGE_RETRY_BASE_DELAY_MS_ENV, &raw)?),
            None => DEFAULT_RETRY_BASE_DELAY,
        };
        let max_delay = match value(STORAGE_RETRY_MAX_DELAY_MS_ENV) {
            Some(raw) => Duration::from_millis(parse_u64(STORAGE_RETRY_MAX_DELAY_MS_ENV, &raw)?),
            None => DEFAULT_RETRY_MAX_DELAY.max(base_delay),
        };
        if max_delay < base_delay {
            return Err(ConfigError::new(
                STORAGE_RETRY_MAX_DELAY_MS_ENV,
                format!(
                    "must be at least {STORAGE_RETRY_BASE_DELAY_MS_ENV} ({}ms)",
                    base_delay.as_millis()
                ),
            ));
        }

        let callback_timeout = match value(CALLBACK_TIMEOUT_SECS_ENV) {
            Some(raw) => {
                let secs = parse_u64(CALLBACK_TIMEOUT_SECS_ENV, &raw)?;
                if secs == 0 {
                    return Err(ConfigError::new(
                        CALLBACK_TIMEOUT_SECS_ENV,
                        "must be a positive integer",
                    ));
                }
                Duration::from_secs(secs)
            }
            None => DEFAULT_CALLBACK_TIMEOUT,
        };

        let log_format = match value(LOG_FORMAT_ENV) {
            Some(raw) => LogFormat::parse(&raw).ok_or_else(|| {
                ConfigError::new(
                    LOG_FORMAT_ENV,
                    format!("unsupported log format '{raw}' (expected json or pretty)"),
                )
            })?,
            None => LogFormat::default(),
        };

        Ok(Self {
            delete_batch_size,
            retry: RetryPolicy {
                max_attempts,
                base_delay,
                max_delay,
            },
            callback_timeout,
            log_format,
        })
    }
}

fn parse_u64(key: &'static str, raw: &str) -> Result<u64, ConfigError> {
    raw.parse::<u64>()
        .map_err(|_| ConfigError::new(key, format!("'{raw}' is not an unsigned integer")))
}
