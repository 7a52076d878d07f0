/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

//! Exponential backoff with full jitter.

use crate::context::RetryContext;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

pub(crate) const DEFAULT_INITIAL_BACKOFF: Duration = Duration::from_secs(1);
pub(crate) const DEFAULT_MAX_BACKOFF: Duration = Duration::from_secs(20);

/// A source of uniformly distributed values in `[0, 1)`.
#[derive(Clone)]
pub struct RandomSource(Arc<dyn Fn() -> f64 + Send + Sync>);

impl RandomSource {
    /// Creates a random source from a function.
    pub fn new(f: impl Fn() -> f64 + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    /// A source that always returns `value`. Useful for disabling jitter in tests.
    pub fn constant(value: f64) -> Self {
        Self::new(move || value)
    }

    fn sample(&self) -> f64 {
        (self.0)()
    }
}

impl Default for RandomSource {
    fn default() -> Self {
        Self::new(fastrand::f64)
    }
}

impl fmt::Debug for RandomSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RandomSource")
    }
}

/// Computes `base * min(max_backoff, initial_backoff * 2^retry_attempts)`.
///
/// `retry_attempts` is the number of retries already made, so the first retry uses `0`.
pub fn calculate_exponential_backoff(
    base: f64,
    initial_backoff: f64,
    retry_attempts: u32,
    max_backoff: Duration,
) -> Duration {
    let exponent = i32::try_from(retry_attempts).unwrap_or(i32::MAX);
    let backoff = initial_backoff * 2_f64.powi(exponent);
    let capped = if backoff.is_finite() {
        backoff.min(max_backoff.as_secs_f64())
    } else {
        max_backoff.as_secs_f64()
    };
    let delay = base * capped;
    if delay.is_finite() && delay >= 0.0 {
        Duration::from_secs_f64(delay)
    } else {
        Duration::ZERO
    }
}

/// Full-jitter exponential backoff.
///
/// The delay before retrying attempt `n` is a uniformly random fraction of
/// `min(max_backoff, initial_backoff * 2^(n - 1))`.
#[derive(Clone, Debug)]
pub struct ExponentialBackoff {
    initial_backoff: Duration,
    max_backoff: Duration,
    random: RandomSource,
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self::new()
    }
}

impl ExponentialBackoff {
    /// Creates a backoff with a 1 second base delay capped at 20 seconds.
    pub fn new() -> Self {
        Self {
            initial_backoff: DEFAULT_INITIAL_BACKOFF,
            max_backoff: DEFAULT_MAX_BACKOFF,
            random: RandomSource::default(),
        }
    }

    /// Sets the base delay.
    pub fn with_initial_backoff(mut self, initial_backoff: Duration) -> Self {
        self.initial_backoff = initial_backoff;
        self
    }

    /// Sets the largest delay before jitter is applied.
    pub fn with_max_backoff(mut self, max_backoff: Duration) -> Self {
        self.max_backoff = max_backoff;
        self
    }

    /// Replaces the jitter source.
    pub fn with_random_source(mut self, random: RandomSource) -> Self {
        self.random = random;
        self
    }

    /// The largest delay before jitter is applied.
    pub fn max_backoff(&self) -> Duration {
        self.max_backoff
    }

    /// The delay to wait after attempt `attempt_number` (1-based) before the next one.
    pub fn delay_for_attempt(&self, attempt_number: u32) -> Duration {
        calculate_exponential_backoff(
            self.random.sample(),
            self.initial_backoff.as_secs_f64(),
            attempt_number.saturating_sub(1),
            self.max_backoff,
        )
    }

    /// The delay to wait before retrying the attempt described by `ctx`.
    pub fn delay_amount(&self, ctx: &RetryContext<'_>) -> Duration {
        self.delay_for_attempt(ctx.attempt_number())
    }
}
