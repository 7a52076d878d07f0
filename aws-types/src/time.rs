/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

//! Time source abstraction to support testing

use std::fmt::Debug;
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Trait with a `now()` function returning the current time
pub trait TimeSource: Debug + Send + Sync {
    /// Returns the current time.
    fn now(&self) -> SystemTime;

    /// Returns the current time as fractional seconds since the UNIX epoch.
    ///
    /// Times before the epoch are reported as `0.0`.
    fn seconds_since_unix_epoch(&self) -> f64 {
        self.now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or_default()
    }
}

/// Timesource delegating to SystemTime::now()
#[non_exhaustive]
#[derive(Debug, Default)]
pub struct SystemTimeSource;

impl SystemTimeSource {
    /// Creates a new SystemTimeSource
    pub fn new() -> Self {
        SystemTimeSource
    }
}

impl TimeSource for SystemTimeSource {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }
}

/// Wrapper type for sharable `TimeSource`
#[derive(Clone, Debug)]
pub struct SharedTimeSource(Arc<dyn TimeSource>);

impl SharedTimeSource {
    /// Create a new `SharedTimeSource` from a `TimeSource`
    pub fn new(source: impl TimeSource + 'static) -> Self {
        Self(Arc::new(source))
    }
}

impl Default for SharedTimeSource {
    fn default() -> Self {
        Self::new(SystemTimeSource::new())
    }
}

impl TimeSource for SharedTimeSource {
    fn now(&self) -> SystemTime {
        self.0.now()
    }
}

/// A time source that only moves when told to.
///
/// Clones share the same underlying clock, so a test can keep one handle and advance it
/// while the code under test holds another.
#[derive(Clone, Debug)]
pub struct ManualTimeSource {
    now: Arc<Mutex<SystemTime>>,
}

impl ManualTimeSource {
    /// Creates a new `ManualTimeSource` starting at `start_time`.
    pub fn new(start_time: SystemTime) -> Self {
        Self {
            now: Arc::new(Mutex::new(start_time)),
        }
    }

    /// Creates a new `ManualTimeSource` positioned `secs` seconds after the UNIX epoch.
    pub fn from_secs_f64(secs: f64) -> Self {
        Self::new(UNIX_EPOCH + Duration::from_secs_f64(secs))
    }

    /// Moves the clock forward by `duration`.
    pub fn advance(&self, duration: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += duration;
    }

    /// Moves the clock to exactly `secs` seconds after the UNIX epoch.
    pub fn set_secs_f64(&self, secs: f64) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now = UNIX_EPOCH + Duration::from_secs_f64(secs);
    }
}

impl TimeSource for ManualTimeSource {
    fn now(&self) -> SystemTime {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}
