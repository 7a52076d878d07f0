/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

//! Retry policies: which attempts to retry and how long to wait before each retry.

use crate::backoff::ExponentialBackoff;
use crate::classifiers::{IsRetryable, RetryChecker, StandardRetryConditions};
use crate::context::RetryContext;
use std::time::Duration;

/// Pairs a retry condition with a backoff calculator.
#[derive(Clone, Debug)]
pub struct RetryPolicy {
    retry_checker: RetryChecker,
    retry_backoff: ExponentialBackoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(
            StandardRetryConditions::default(),
            ExponentialBackoff::default(),
        )
    }
}

impl RetryPolicy {
    /// Creates a policy from a condition and a backoff.
    pub fn new(retry_checker: impl Into<RetryChecker>, retry_backoff: ExponentialBackoff) -> Self {
        Self {
            retry_checker: retry_checker.into(),
            retry_backoff,
        }
    }

    /// Whether the attempt described by `ctx` may be retried.
    pub fn should_retry(&self, ctx: &mut RetryContext<'_>) -> bool {
        self.retry_checker.is_retryable(ctx)
    }

    /// How long to wait before retrying the attempt described by `ctx`.
    pub fn compute_retry_delay(&self, ctx: &RetryContext<'_>) -> Duration {
        self.retry_backoff.delay_amount(ctx)
    }
}
