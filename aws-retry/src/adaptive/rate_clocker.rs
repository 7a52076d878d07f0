/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use aws_types::time::{SharedTimeSource, TimeSource};
use std::sync::{Mutex, MutexGuard};

const SMOOTH: f64 = 0.8;
const TIME_BUCKET_RANGE: f64 = 0.5;

#[derive(Debug)]
struct Inner {
    measured_rate: f64,
    last_bucket: f64,
    count: u64,
}

/// Measures the rate at which responses are received.
///
/// Responses are counted in fixed-width time buckets. When a bucket closes its rate is
/// folded into an exponentially smoothed estimate, so the estimate only moves once per
/// bucket and reflects the previous complete bucket.
#[derive(Debug)]
pub struct RateClocker {
    time_source: SharedTimeSource,
    smoothing: f64,
    time_bucket_scale: f64,
    inner: Mutex<Inner>,
}

impl RateClocker {
    /// Creates a clocker with a smoothing factor of 0.8 and half-second buckets.
    pub fn new(time_source: SharedTimeSource) -> Self {
        Self::with_settings(time_source, SMOOTH, TIME_BUCKET_RANGE)
    }

    /// Creates a clocker with explicit smoothing and bucket width (in seconds).
    pub fn with_settings(
        time_source: SharedTimeSource,
        smoothing: f64,
        time_bucket_range: f64,
    ) -> Self {
        let last_bucket = time_source.seconds_since_unix_epoch().floor();
        Self {
            time_source,
            smoothing,
            time_bucket_scale: 1.0 / time_bucket_range,
            inner: Mutex::new(Inner {
                measured_rate: 0.0,
                last_bucket,
                count: 0,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Records `amount` responses at the current time and returns the measured rate.
    pub fn record(&self, amount: u64) -> f64 {
        let t = self.time_source.seconds_since_unix_epoch();
        let mut inner = self.lock();
        let bucket = (t * self.time_bucket_scale).floor() / self.time_bucket_scale;
        inner.count += amount;
        if bucket > inner.last_bucket {
            let current_rate = inner.count as f64 / (bucket - inner.last_bucket);
            inner.measured_rate =
                current_rate * self.smoothing + inner.measured_rate * (1.0 - self.smoothing);
            inner.count = 0;
            inner.last_bucket = bucket;
        }
        inner.measured_rate
    }

    /// The current smoothed rate estimate.
    pub fn measured_rate(&self) -> f64 {
        self.lock().measured_rate
    }
}
