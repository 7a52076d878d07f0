/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

//! The retry quota: a process-wide budget bounding how many retries may be in flight.

use crate::context::{HttpResponse, RequestContext, RetryContext};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, trace};

pub(crate) const DEFAULT_CAPACITY: u32 = 500;
pub(crate) const DEFAULT_RETRY_COST: u32 = 5;
pub(crate) const DEFAULT_RETRY_TIMEOUT_COST: u32 = DEFAULT_RETRY_COST * 2;
pub(crate) const NO_RETRY_INCREMENT: u32 = 1;

/// A depletable retry budget shared by every call made through a client.
///
/// `0 <= available_capacity() <= max_capacity()` holds for every observable state.
#[derive(Debug)]
pub struct RetryQuota {
    max_capacity: u32,
    available_capacity: Mutex<u32>,
}

impl Default for RetryQuota {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl RetryQuota {
    /// Creates a full quota with `initial_capacity` units.
    pub fn new(initial_capacity: u32) -> Self {
        Self {
            max_capacity: initial_capacity,
            available_capacity: Mutex::new(initial_capacity),
        }
    }

    fn lock(&self) -> MutexGuard<'_, u32> {
        // The guarded value is a plain integer that is always left consistent.
        self.available_capacity
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Takes `amount` units if they are available. Returns `false` and leaves the quota
    /// untouched otherwise.
    pub fn acquire(&self, amount: u32) -> bool {
        let mut available = self.lock();
        if amount > *available {
            return false;
        }
        *available -= amount;
        true
    }

    /// Returns `amount` units to the quota, never exceeding its maximum capacity.
    pub fn release(&self, amount: u32) {
        let mut available = self.lock();
        if *available == self.max_capacity {
            return;
        }
        let released = amount.min(self.max_capacity - *available);
        trace!("adding {released} back into the retry quota");
        *available += released;
    }

    /// The units currently available.
    pub fn available_capacity(&self) -> u32 {
        *self.lock()
    }

    /// The capacity the quota was created with.
    pub fn max_capacity(&self) -> u32 {
        self.max_capacity
    }
}

/// Charges and refunds a [`RetryQuota`] according to how each call turned out.
#[derive(Clone, Debug)]
pub struct RetryQuotaChecker {
    quota: Arc<RetryQuota>,
    retry_cost: u32,
    timeout_retry_cost: u32,
    no_retry_increment: u32,
}

impl RetryQuotaChecker {
    /// Creates a checker charging the default costs against `quota`.
    pub fn new(quota: Arc<RetryQuota>) -> Self {
        Self {
            quota,
            retry_cost: DEFAULT_RETRY_COST,
            timeout_retry_cost: DEFAULT_RETRY_TIMEOUT_COST,
            no_retry_increment: NO_RETRY_INCREMENT,
        }
    }

    /// Overrides the cost of a retry.
    pub fn with_retry_cost(mut self, retry_cost: u32) -> Self {
        self.retry_cost = retry_cost;
        self
    }

    /// Overrides the cost of retrying a timed-out request.
    pub fn with_timeout_retry_cost(mut self, timeout_retry_cost: u32) -> Self {
        self.timeout_retry_cost = timeout_retry_cost;
        self
    }

    /// Overrides the amount refunded when a call succeeds without retrying.
    pub fn with_no_retry_increment(mut self, no_retry_increment: u32) -> Self {
        self.no_retry_increment = no_retry_increment;
        self
    }

    /// The quota this checker charges.
    pub fn quota(&self) -> &Arc<RetryQuota> {
        &self.quota
    }

    /// Charges the quota for retrying the attempt described by `ctx`.
    ///
    /// On success the charged amount is remembered in the request context so it can be
    /// refunded later. On failure `RetryQuotaReached` is recorded and `false` is returned.
    pub fn acquire_retry_quota(&self, ctx: &mut RetryContext<'_>) -> bool {
        let is_timeout = ctx
            .caught_exception()
            .map(|err| err.is_timeout())
            .unwrap_or_default();
        let capacity_amount = if is_timeout {
            self.timeout_retry_cost
        } else {
            self.retry_cost
        };
        if self.quota.acquire(capacity_amount) {
            ctx.request_context_mut().retry_quota_capacity = Some(capacity_amount);
            return true;
        }
        debug!(
            capacity_amount,
            available = self.quota.available_capacity(),
            "retry quota exhausted"
        );
        ctx.retry_metadata_mut().retry_quota_reached = true;
        false
    }

    /// Refunds the quota once a logical call has completed.
    ///
    /// Calls that ended in failure refund nothing, which is what shrinks the quota while a
    /// service is unhealthy. Successful calls refund whatever their retries were charged,
    /// or a small flat increment if they never retried.
    pub fn release_retry_quota(
        &self,
        request_context: &RequestContext,
        http_response: Option<&HttpResponse>,
    ) {
        let Some(http_response) = http_response else {
            return;
        };
        if !http_response.is_success() {
            return;
        }
        match request_context.retry_quota_capacity {
            Some(capacity_amount) => self.quota.release(capacity_amount),
            None => self.quota.release(self.no_retry_increment),
        }
    }
}
