/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

//! Retry behavior for AWS clients.
//!
//! After every attempt a [`RetryHandler`](handler::RetryHandler) decides whether the call
//! should be retried: the attempt must match one of the retry conditions in
//! [`classifiers`], the attempt limit must not have been reached, and the client-wide
//! [`RetryQuota`](quota::RetryQuota) must be able to pay for the retry. Retries are spaced
//! out with full-jitter exponential backoff.
//!
//! In adaptive mode a [`ClientRateLimiter`](adaptive::ClientRateLimiter) additionally slows
//! down the rate at which requests are sent once the service starts throttling.
//!
//! [`orchestrator::invoke`] ties these together for a single call.

#![warn(
    missing_docs,
    rustdoc::missing_crate_level_docs,
    unreachable_pub,
    rust_2018_idioms
)]

pub mod adaptive;
pub mod backoff;
pub mod classifiers;
pub mod config;
pub mod context;
pub mod error;
pub mod handler;
pub mod orchestrator;
pub mod policy;
pub mod quota;
pub mod strategy;

pub use config::{RetryConfig, RetryMode};
pub use strategy::RetryStrategy;
