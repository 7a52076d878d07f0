/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

//! Client-side adaptive rate limiting.
//!
//! The limiter stays out of the way until the first throttling response. From then on
//! every request must take a token from a [`TokenBucket`] whose refill rate follows a
//! cubic curve: cut back multiplicatively on each throttle, then grown back toward (and
//! past) the rate at which the client was last throttled. A single adjustment never sets
//! the rate above twice the measured response rate.

mod bucket;
mod cubic;
mod rate_clocker;

pub use self::bucket::TokenBucket;
pub use self::cubic::{CubicCalculator, CubicParams};
pub use self::rate_clocker::RateClocker;
pub use crate::error::CapacityNotAvailable;

use crate::classifiers::ThrottlingErrorDetector;
use crate::handler::{AttemptOutcome, RetryEventAdapter};
use aws_types::time::{SharedTimeSource, TimeSource};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tracing::debug;

const INITIAL_MAX_RATE: f64 = 1.0;
const SEND_TOKEN_COST: f64 = 1.0;

#[derive(Debug)]
struct State {
    enabled: bool,
    cubic: CubicCalculator,
}

/// Rate limiter for adaptive retry.
#[derive(Debug)]
pub struct ClientRateLimiter {
    time_source: SharedTimeSource,
    token_bucket: TokenBucket,
    rate_clocker: RateClocker,
    throttling_detector: ThrottlingErrorDetector,
    retry_event_adapter: RetryEventAdapter,
    state: Mutex<State>,
}

impl Default for ClientRateLimiter {
    fn default() -> Self {
        Self::new(SharedTimeSource::default())
    }
}

impl ClientRateLimiter {
    /// Creates a disabled limiter reading time from `time_source`.
    pub fn new(time_source: SharedTimeSource) -> Self {
        let now = time_source.seconds_since_unix_epoch();
        Self {
            token_bucket: TokenBucket::new(INITIAL_MAX_RATE, time_source.clone()),
            rate_clocker: RateClocker::new(time_source.clone()),
            throttling_detector: ThrottlingErrorDetector::default(),
            retry_event_adapter: RetryEventAdapter,
            state: Mutex::new(State {
                enabled: false,
                cubic: CubicCalculator::new(0.0, now),
            }),
            time_source,
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Whether a throttling response has switched rate limiting on.
    pub fn is_enabled(&self) -> bool {
        self.lock().enabled
    }

    /// The bucket requests take send tokens from.
    pub fn token_bucket(&self) -> &TokenBucket {
        &self.token_bucket
    }

    /// The smoothed response rate.
    pub fn measured_rate(&self) -> f64 {
        self.rate_clocker.measured_rate()
    }

    /// The cubic curve's current parameters.
    pub fn cubic_params(&self) -> CubicParams {
        self.lock().cubic.params()
    }

    /// Called before a request is sent.
    ///
    /// Once rate limiting is enabled this takes a send token, blocking the calling thread
    /// until one is available when `block` is true. Without blocking it fails with
    /// [`CapacityNotAvailable`] instead.
    pub fn on_sending_request(&self, block: bool) -> Result<(), CapacityNotAvailable> {
        if !self.is_enabled() {
            return Ok(());
        }
        self.token_bucket.acquire(SEND_TOKEN_COST, block)
    }

    /// Like [`ClientRateLimiter::on_sending_request`] for async callers: takes a send token
    /// and returns how long to wait before sending.
    pub fn send_delay(&self) -> Duration {
        if !self.is_enabled() {
            return Duration::ZERO;
        }
        self.token_bucket.reserve(SEND_TOKEN_COST)
    }

    /// Called when an attempt completes. Throttling is detected from the outcome.
    pub fn on_receiving_response(&self, outcome: &mut AttemptOutcome<'_>) {
        let ctx = self.retry_event_adapter.create_retry_context(outcome);
        let is_throttling_error = self.throttling_detector.is_throttling_error(&ctx);
        self.record_response(is_throttling_error);
    }

    /// Updates the send rate after a response that was, or wasn't, a throttling error.
    pub fn record_response(&self, is_throttling_error: bool) {
        let measured_rate = self.rate_clocker.record(1);
        let timestamp = self.time_source.seconds_since_unix_epoch();
        let mut state = self.lock();
        let new_rate = if is_throttling_error {
            let rate_to_use = if state.enabled {
                f64::min(measured_rate, self.token_bucket.max_rate())
            } else {
                measured_rate
            };
            if !state.enabled {
                debug!("client rate limiting has been enabled");
            }
            state.enabled = true;
            state.cubic.error_received(rate_to_use, timestamp)
        } else {
            state.cubic.success_received(timestamp)
        };
        let fill_rate = f64::min(new_rate, 2.0 * measured_rate);
        debug!(
            is_throttling_error,
            measured_tx_rate = measured_rate,
            fill_rate,
            "client rate limiter state has been updated"
        );
        self.token_bucket.set_max_rate(fill_rate);
    }
}
