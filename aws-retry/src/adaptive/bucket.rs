/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use crate::error::CapacityNotAvailable;
use aws_types::time::{SharedTimeSource, TimeSource};
use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::Duration;
use tracing::debug;

pub(crate) const MIN_FILL_RATE: f64 = 0.5;
const MIN_CAPACITY: f64 = 1.0;

#[derive(Debug)]
struct Inner {
    /// The rate at which tokens are replenished.
    fill_rate: f64,
    /// The maximum capacity allowed in the token bucket.
    max_capacity: f64,
    /// The current capacity of the token bucket.
    current_capacity: f64,
    /// The last time the token bucket was refilled.
    last_timestamp: Option<f64>,
}

impl Inner {
    fn refill(&mut self, seconds_since_unix_epoch: f64) {
        if let Some(last_timestamp) = self.last_timestamp {
            let fill_amount = (seconds_since_unix_epoch - last_timestamp) * self.fill_rate;
            self.current_capacity = f64::min(self.max_capacity, self.current_capacity + fill_amount);
        }
        self.last_timestamp = Some(seconds_since_unix_epoch);
    }

    fn sleep_amount(&self, amount: f64) -> f64 {
        (amount - self.current_capacity) / self.fill_rate
    }
}

/// A token bucket governing the rate at which requests are sent.
///
/// The bucket starts empty. Its refill rate is never below 0.5 tokens per second and its
/// capacity never below one token.
#[derive(Debug)]
pub struct TokenBucket {
    time_source: SharedTimeSource,
    inner: Mutex<Inner>,
    new_fill_rate: Condvar,
}

impl TokenBucket {
    /// Creates an empty bucket refilling at `max_rate` tokens per second.
    pub fn new(max_rate: f64, time_source: SharedTimeSource) -> Self {
        let bucket = Self {
            time_source,
            inner: Mutex::new(Inner {
                fill_rate: MIN_FILL_RATE,
                max_capacity: MIN_CAPACITY,
                current_capacity: 0.0,
                last_timestamp: None,
            }),
            new_fill_rate: Condvar::new(),
        };
        bucket.set_max_rate(max_rate);
        bucket
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn now(&self) -> f64 {
        self.time_source.seconds_since_unix_epoch()
    }

    /// The current refill rate, in tokens per second.
    pub fn max_rate(&self) -> f64 {
        self.lock().fill_rate
    }

    /// Changes the refill rate.
    ///
    /// Tokens accrued at the old rate are credited first. The capacity follows the new rate,
    /// and any caller blocked in [`TokenBucket::acquire`] is woken to recompute its wait.
    pub fn set_max_rate(&self, value: f64) {
        let mut inner = self.lock();
        inner.refill(self.now());
        inner.fill_rate = f64::max(value, MIN_FILL_RATE);
        inner.max_capacity = if value >= MIN_CAPACITY {
            value
        } else {
            MIN_CAPACITY
        };
        inner.current_capacity = f64::min(inner.current_capacity, inner.max_capacity);
        debug!(
            fill_rate = inner.fill_rate,
            max_capacity = inner.max_capacity,
            current_capacity = inner.current_capacity,
            "send rate token bucket has been updated"
        );
        drop(inner);
        self.new_fill_rate.notify_all();
    }

    /// The tokens currently available, as of the last refill.
    pub fn available_capacity(&self) -> f64 {
        self.lock().current_capacity
    }

    /// The most tokens the bucket can hold.
    pub fn max_capacity(&self) -> f64 {
        self.lock().max_capacity
    }

    /// Takes `amount` tokens.
    ///
    /// When too few tokens are available and `block` is `false`, fails with
    /// [`CapacityNotAvailable`]. When `block` is `true`, waits on the calling thread until
    /// enough tokens have accrued. `amount` must not exceed [`TokenBucket::max_capacity`]
    /// or a blocking call never returns.
    pub fn acquire(&self, amount: f64, block: bool) -> Result<(), CapacityNotAvailable> {
        let mut inner = self.lock();
        inner.refill(self.now());
        if amount <= inner.current_capacity {
            inner.current_capacity -= amount;
            return Ok(());
        }
        if !block {
            return Err(CapacityNotAvailable::new(amount, inner.current_capacity));
        }
        let mut sleep_amount = inner.sleep_amount(amount);
        debug!(
            amount,
            current_capacity = inner.current_capacity,
            fill_rate = inner.fill_rate,
            sleep_amount,
            "waiting for send capacity"
        );
        while sleep_amount > 0.0 {
            inner = self
                .new_fill_rate
                .wait_timeout(inner, Duration::from_secs_f64(sleep_amount))
                .map(|(guard, _)| guard)
                .unwrap_or_else(|poisoned| poisoned.into_inner().0);
            inner.refill(self.now());
            sleep_amount = inner.sleep_amount(amount);
        }
        inner.current_capacity -= amount;
        Ok(())
    }

    /// Takes `amount` tokens without blocking and returns how long the caller should wait
    /// before sending.
    ///
    /// The tokens are taken even when the bucket runs short, so the deficit is paid back by
    /// later refills and concurrent callers queue up behind one another.
    pub fn reserve(&self, amount: f64) -> Duration {
        let mut inner = self.lock();
        inner.refill(self.now());
        let wait = if amount > inner.current_capacity {
            let sleep_amount = inner.sleep_amount(amount);
            debug!(
                amount,
                current_capacity = inner.current_capacity,
                fill_rate = inner.fill_rate,
                sleep_amount,
                "client rate limiter delayed a request"
            );
            Duration::from_secs_f64(sleep_amount)
        } else {
            Duration::ZERO
        };
        inner.current_capacity -= amount;
        wait
    }
}
