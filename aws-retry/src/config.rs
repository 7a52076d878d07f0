/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

//! Retry configuration and where to load it from.

use crate::backoff::{DEFAULT_INITIAL_BACKOFF, DEFAULT_MAX_BACKOFF};
use crate::classifiers::DEFAULT_MAX_ATTEMPTS;
use crate::quota::{DEFAULT_CAPACITY, DEFAULT_RETRY_COST, DEFAULT_RETRY_TIMEOUT_COST, NO_RETRY_INCREMENT};
use aws_types::os_shim_internal::Env;
use std::error::Error;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

const ENV_VAR_MAX_ATTEMPTS: &str = "AWS_MAX_ATTEMPTS";
const ENV_VAR_RETRY_MODE: &str = "AWS_RETRY_MODE";

/// How a client retries.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum RetryMode {
    /// Backoff and a shared retry quota.
    #[default]
    Standard,
    /// Standard mode plus client-side rate limiting that reacts to throttling.
    Adaptive,
}

impl FromStr for RetryMode {
    type Err = RetryConfigError;

    fn from_str(string: &str) -> Result<Self, Self::Err> {
        let string = string.trim();
        if string.eq_ignore_ascii_case("standard") {
            Ok(RetryMode::Standard)
        } else if string.eq_ignore_ascii_case("adaptive") {
            Ok(RetryMode::Adaptive)
        } else {
            Err(RetryConfigError::new(
                RetryConfigErrorKind::InvalidRetryMode,
                string,
            ))
        }
    }
}

impl fmt::Display for RetryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetryMode::Standard => write!(f, "standard"),
            RetryMode::Adaptive => write!(f, "adaptive"),
        }
    }
}

/// Why a retry setting was rejected.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RetryConfigErrorKind {
    /// The retry mode is not one of the supported modes.
    InvalidRetryMode,
    /// Max attempts was set to zero.
    MaxAttemptsMustNotBeZero,
    /// Max attempts could not be parsed as an integer.
    FailedToParseMaxAttempts,
}

/// An invalid retry setting.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RetryConfigError {
    kind: RetryConfigErrorKind,
    value: String,
}

impl RetryConfigError {
    fn new(kind: RetryConfigErrorKind, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }

    /// What was wrong with the setting.
    pub fn kind(&self) -> RetryConfigErrorKind {
        self.kind
    }

    /// The rejected value.
    pub fn value(&self) -> &str {
        &self.value
    }
}

impl fmt::Display for RetryConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            RetryConfigErrorKind::InvalidRetryMode => write!(
                f,
                "`{}` is not a valid retry mode. Valid modes are `standard` and `adaptive`",
                self.value
            ),
            RetryConfigErrorKind::MaxAttemptsMustNotBeZero => write!(
                f,
                "it is invalid to set max attempts to 0. Unset it or set it to an integer greater than or equal to one"
            ),
            RetryConfigErrorKind::FailedToParseMaxAttempts => {
                write!(f, "failed to parse max attempts `{}` as an integer", self.value)
            }
        }
    }
}

impl Error for RetryConfigError {}

/// Retry behavior for a client.
#[non_exhaustive]
#[derive(Clone, Debug, PartialEq)]
pub struct RetryConfig {
    mode: RetryMode,
    max_attempts: u32,
    initial_backoff: Duration,
    max_backoff: Duration,
    quota_capacity: u32,
    retry_cost: u32,
    timeout_retry_cost: u32,
    no_retry_increment: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::standard()
    }
}

impl RetryConfig {
    /// Standard retries with the default settings.
    pub fn standard() -> Self {
        Self {
            mode: RetryMode::Standard,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            initial_backoff: DEFAULT_INITIAL_BACKOFF,
            max_backoff: DEFAULT_MAX_BACKOFF,
            quota_capacity: DEFAULT_CAPACITY,
            retry_cost: DEFAULT_RETRY_COST,
            timeout_retry_cost: DEFAULT_RETRY_TIMEOUT_COST,
            no_retry_increment: NO_RETRY_INCREMENT,
        }
    }

    /// Adaptive retries with the default settings.
    pub fn adaptive() -> Self {
        Self::standard().with_retry_mode(RetryMode::Adaptive)
    }

    /// Sets the retry mode.
    pub fn with_retry_mode(mut self, mode: RetryMode) -> Self {
        self.mode = mode;
        self
    }

    /// Sets the total number of attempts, including the first. `1` disables retries.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Sets the base delay of the exponential backoff.
    pub fn with_initial_backoff(mut self, initial_backoff: Duration) -> Self {
        self.initial_backoff = initial_backoff;
        self
    }

    /// Sets the largest delay between attempts.
    pub fn with_max_backoff(mut self, max_backoff: Duration) -> Self {
        self.max_backoff = max_backoff;
        self
    }

    /// Sets the capacity of the retry quota.
    pub fn with_quota_capacity(mut self, quota_capacity: u32) -> Self {
        self.quota_capacity = quota_capacity;
        self
    }

    /// Sets the quota cost of a retry.
    pub fn with_retry_cost(mut self, retry_cost: u32) -> Self {
        self.retry_cost = retry_cost;
        self
    }

    /// Sets the quota cost of retrying a timed-out request.
    pub fn with_timeout_retry_cost(mut self, timeout_retry_cost: u32) -> Self {
        self.timeout_retry_cost = timeout_retry_cost;
        self
    }

    /// Sets how much quota a call that succeeds without retrying gives back.
    pub fn with_no_retry_increment(mut self, no_retry_increment: u32) -> Self {
        self.no_retry_increment = no_retry_increment;
        self
    }

    /// The retry mode.
    pub fn mode(&self) -> RetryMode {
        self.mode
    }

    /// The total number of attempts, including the first.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// The base delay of the exponential backoff.
    pub fn initial_backoff(&self) -> Duration {
        self.initial_backoff
    }

    /// The largest delay between attempts.
    pub fn max_backoff(&self) -> Duration {
        self.max_backoff
    }

    /// The capacity of the retry quota.
    pub fn quota_capacity(&self) -> u32 {
        self.quota_capacity
    }

    /// The quota cost of a retry.
    pub fn retry_cost(&self) -> u32 {
        self.retry_cost
    }

    /// The quota cost of retrying a timed-out request.
    pub fn timeout_retry_cost(&self) -> u32 {
        self.timeout_retry_cost
    }

    /// How much quota a call that succeeds without retrying gives back.
    pub fn no_retry_increment(&self) -> u32 {
        self.no_retry_increment
    }
}

/// Load a retry config from environment variables
///
/// This provider will check the values of `AWS_RETRY_MODE` and `AWS_MAX_ATTEMPTS`
/// in order to build a retry config. Settings that aren't present keep their defaults.
#[derive(Debug, Default)]
pub struct EnvironmentVariableRetryConfigProvider {
    env: Env,
}

impl EnvironmentVariableRetryConfigProvider {
    /// Create a new `EnvironmentVariableRetryConfigProvider`
    pub fn new() -> Self {
        EnvironmentVariableRetryConfigProvider { env: Env::real() }
    }

    #[doc(hidden)]
    /// Create a retry config provider from a given `Env`
    ///
    /// This method is used for tests that need to override environment variables.
    pub fn new_with_env(env: Env) -> Self {
        EnvironmentVariableRetryConfigProvider { env }
    }

    /// Attempt to create a new `RetryConfig` from environment variables
    ///
    /// Returns `Ok(None)` when neither variable is set.
    pub fn retry_config(&self) -> Result<Option<RetryConfig>, RetryConfigError> {
        let _span = tracing::info_span!("load_retry_config_from_env").entered();
        let max_attempts = self.env.get(ENV_VAR_MAX_ATTEMPTS).ok();
        let retry_mode = self.env.get(ENV_VAR_RETRY_MODE).ok();

        // If neither env var is set, we're done with this provider
        if let (None, None) = (&max_attempts, &retry_mode) {
            return Ok(None);
        }

        let mut retry_config = RetryConfig::standard();

        if let Some(max_attempts) = max_attempts {
            let max_attempts = max_attempts.trim().parse::<u32>().map_err(|_| {
                RetryConfigError::new(RetryConfigErrorKind::FailedToParseMaxAttempts, &max_attempts)
            })?;
            if max_attempts == 0 {
                return Err(RetryConfigError::new(
                    RetryConfigErrorKind::MaxAttemptsMustNotBeZero,
                    "0",
                ));
            }
            retry_config = retry_config.with_max_attempts(max_attempts);
        }

        if let Some(retry_mode) = retry_mode {
            retry_config = retry_config.with_retry_mode(RetryMode::from_str(&retry_mode)?);
        }

        debug!(
            mode = %retry_config.mode(),
            max_attempts = retry_config.max_attempts(),
            "loaded retry config from environment"
        );
        Ok(Some(retry_config))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    fn test_provider(vars: &[(&str, &str)]) -> EnvironmentVariableRetryConfigProvider {
        EnvironmentVariableRetryConfigProvider::new_with_env(Env::from_slice(vars))
    }

    #[test]
    fn defaults() {
        let config = RetryConfig::default();
        assert_eq!(config.mode(), RetryMode::Standard);
        assert_eq!(config.max_attempts(), 3);
        assert_eq!(config.initial_backoff(), Duration::from_secs(1));
        assert_eq!(config.max_backoff(), Duration::from_secs(20));
        assert_eq!(config.quota_capacity(), 500);
        assert_eq!(config.retry_cost(), 5);
        assert_eq!(config.timeout_retry_cost(), 10);
        assert_eq!(config.no_retry_increment(), 1);
    }

    #[test]
    fn retry_mode_parsing() {
        assert_eq!("standard".parse::<RetryMode>(), Ok(RetryMode::Standard));
        assert_eq!("ADAPTIVE".parse::<RetryMode>(), Ok(RetryMode::Adaptive));
        let err = "legacy".parse::<RetryMode>().unwrap_err();
        assert_eq!(err.kind(), RetryConfigErrorKind::InvalidRetryMode);
        assert_eq!(err.value(), "legacy");
    }

    #[test]
    fn no_retry_config() {
        assert_eq!(test_provider(&[]).retry_config(), Ok(None));
    }

    #[test]
    fn max_attempts_is_read_correctly() {
        assert_eq!(
            test_provider(&[(ENV_VAR_MAX_ATTEMPTS, "88")]).retry_config(),
            Ok(Some(RetryConfig::standard().with_max_attempts(88)))
        );
    }

    #[test]
    fn retry_mode_is_read_correctly() {
        assert_eq!(
            test_provider(&[(ENV_VAR_RETRY_MODE, "adaptive")]).retry_config(),
            Ok(Some(RetryConfig::adaptive()))
        );
    }

    #[test]
    fn both_fields_can_be_set_at_once() {
        assert_eq!(
            test_provider(&[(ENV_VAR_RETRY_MODE, "adaptive"), (ENV_VAR_MAX_ATTEMPTS, "13")])
                .retry_config(),
            Ok(Some(
                RetryConfig::standard()
                    .with_max_attempts(13)
                    .with_retry_mode(RetryMode::Adaptive)
            ))
        );
    }

    #[test]
    fn disallow_zero_max_attempts() {
        let err = test_provider(&[(ENV_VAR_MAX_ATTEMPTS, "0")])
            .retry_config()
            .unwrap_err();
        assert_eq!(err.kind(), RetryConfigErrorKind::MaxAttemptsMustNotBeZero);
    }

    #[test]
    fn disallow_non_integer_max_attempts() {
        let err = test_provider(&[(ENV_VAR_MAX_ATTEMPTS, "three")])
            .retry_config()
            .unwrap_err();
        assert_eq!(err.kind(), RetryConfigErrorKind::FailedToParseMaxAttempts);
        assert_eq!(err.value(), "three");
    }

    #[test]
    fn disallow_unknown_retry_mode() {
        let err = test_provider(&[(ENV_VAR_RETRY_MODE, "legacy")])
            .retry_config()
            .unwrap_err();
        assert_eq!(err.kind(), RetryConfigErrorKind::InvalidRetryMode);
    }
}
