use std::time::Duration;
use serde::{Deserialize, Serialize};

use crate::shared::ValidationError;

/// Settings applied to every call made against a data source.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct FetchConfig {
    /// Deadline for a single histogram or identifier fetch, in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Retry behavior for transient fetch failures.
    #[serde(default)]
    pub retry: RetryConfig,
}

impl FetchConfig {
    pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.timeout_ms == 0 {
            return Err(ValidationError::invalid_field(
                "fetch.timeout_ms",
                "must be greater than 0",
            ));
        }

        self.retry.validate()
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            retry: RetryConfig::default(),
        }
    }
}

fn default_timeout_ms() -> u64 {
    FetchConfig::DEFAULT_TIMEOUT_MS
}

/// Exponential backoff for transient fetch failures.
///
/// Reconciliation is fail-fast: with the default of a single attempt, the first
/// connection failure or timeout aborts the run.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RetryConfig {
    /// Total attempts per fetch, including the first one.
    ///
    /// Default: 1 (no retries)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the first retry, in milliseconds.
    ///
    /// Default: 100ms
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    /// Upper bound for the delay between two attempts, in milliseconds.
    ///
    /// Default: 5000ms
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Multiplier applied to the delay after each failed attempt. Must be >= 1.0.
    ///
    /// Default: 2.0
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
}

impl RetryConfig {
    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    /// Returns whether failed fetches are retried at all.
    pub fn is_enabled(&self) -> bool {
        self.max_attempts > 1
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.max_attempts == 0 {
            return Err(ValidationError::invalid_field(
                "fetch.retry.max_attempts",
                "must be greater than 0",
            ));
        }

        if self.backoff_multiplier.is_nan() || self.backoff_multiplier < 1.0 {
            return Err(ValidationError::invalid_field(
                "fetch.retry.backoff_multiplier",
                "must be greater than or equal to 1.0",
            ));
        }

        if self.max_delay_ms < self.initial_delay_ms {
            return Err(ValidationError::invalid_field(
                "fetch.retry.max_delay_ms",
                "must not be lower than `initial_delay_ms`",
            ));
        }

        Ok(())
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
        }
    }
}

fn default_max_attempts() -> u32 {
    1
}

fn default_initial_delay_ms() -> u64 {
    100
}

fn default_max_delay_ms() -> u64 {
    5000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}
