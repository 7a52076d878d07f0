/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

//! Primitives shared by the retry and endpoint resolution crates.
//!
//! These exist so that the process environment, wall clock, and async sleeping can be
//! replaced in tests.

#![warn(
    missing_docs,
    rustdoc::missing_crate_level_docs,
    unreachable_pub,
    rust_2018_idioms
)]

pub mod os_shim_internal;
pub mod sleep;
pub mod time;

/// Type-erased error used as the cause of errors throughout the runtime.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;
