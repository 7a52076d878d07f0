/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

//! The per-client retry strategy built from a [`RetryConfig`](crate::RetryConfig).

use crate::adaptive::ClientRateLimiter;
use crate::backoff::{ExponentialBackoff, RandomSource};
use crate::classifiers::StandardRetryConditions;
use crate::config::{RetryConfig, RetryMode};
use crate::handler::{RetryEventAdapter, RetryHandler};
use crate::policy::RetryPolicy;
use crate::quota::{RetryQuota, RetryQuotaChecker};
use aws_types::time::SharedTimeSource;
use std::sync::Arc;

/// The retry machinery of one client.
///
/// Clones share the retry quota and the rate limiter, so every call made through a client
/// draws on the same budget.
#[derive(Clone, Debug)]
pub struct RetryStrategy {
    handler: RetryHandler,
    rate_limiter: Option<Arc<ClientRateLimiter>>,
}

impl Default for RetryStrategy {
    fn default() -> Self {
        Self::new(&RetryConfig::default())
    }
}

impl RetryStrategy {
    /// Builds the strategy described by `config`.
    pub fn new(config: &RetryConfig) -> Self {
        Self::with_sources(config, SharedTimeSource::default(), RandomSource::default())
    }

    /// Like [`RetryStrategy::new`] with explicit time and jitter sources.
    pub fn with_sources(
        config: &RetryConfig,
        time_source: SharedTimeSource,
        random: RandomSource,
    ) -> Self {
        let quota = RetryQuotaChecker::new(Arc::new(RetryQuota::new(config.quota_capacity())))
            .with_retry_cost(config.retry_cost())
            .with_timeout_retry_cost(config.timeout_retry_cost())
            .with_no_retry_increment(config.no_retry_increment());
        let backoff = ExponentialBackoff::new()
            .with_initial_backoff(config.initial_backoff())
            .with_max_backoff(config.max_backoff())
            .with_random_source(random);
        let policy = RetryPolicy::new(StandardRetryConditions::new(config.max_attempts()), backoff);
        let rate_limiter = match config.mode() {
            RetryMode::Standard => None,
            RetryMode::Adaptive => Some(Arc::new(ClientRateLimiter::new(time_source))),
        };
        Self {
            handler: RetryHandler::new(policy, RetryEventAdapter, quota),
            rate_limiter,
        }
    }

    /// The per-attempt retry decision.
    pub fn handler(&self) -> &RetryHandler {
        &self.handler
    }

    /// The client-side rate limiter, in adaptive mode.
    pub fn rate_limiter(&self) -> Option<&ClientRateLimiter> {
        self.rate_limiter.as_deref()
    }

    /// The retry quota shared by calls made with this strategy.
    pub fn quota(&self) -> &Arc<RetryQuota> {
        self.handler.retry_quota().quota()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_mode_has_no_rate_limiter() {
        let strategy = RetryStrategy::new(&RetryConfig::standard().with_quota_capacity(42));
        assert!(strategy.rate_limiter().is_none());
        assert_eq!(strategy.quota().max_capacity(), 42);
    }

    #[test]
    fn adaptive_mode_adds_a_rate_limiter() {
        let strategy = RetryStrategy::new(&RetryConfig::adaptive());
        let limiter = strategy.rate_limiter().expect("adaptive mode has a limiter");
        assert!(!limiter.is_enabled());
    }

    #[test]
    fn clones_share_the_quota() {
        let strategy = RetryStrategy::default();
        let clone = strategy.clone();
        assert!(strategy.quota().acquire(100));
        assert_eq!(clone.quota().available_capacity(), 400);
    }
}
