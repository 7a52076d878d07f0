/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

//! Endpoint resolution driven by endpoint rule sets.
//!
//! A [`RuleSet`] declares parameters and a tree of rules. Each rule has conditions that call
//! functions from the [`StandardLibrary`](stdlib::StandardLibrary); the first rule whose
//! conditions all hold either produces an [`Endpoint`] or fails resolution with an error
//! message. [`EndpointProvider`] pairs a rule set with partition metadata and caches
//! resolved endpoints.
//!
//! ```
//! use aws_endpoint_rules::{EndpointProvider, Params};
//!
//! let provider = EndpointProvider::with_builtin_partitions(r#"{
//!     "version": "1.0",
//!     "parameters": {"Region": {"type": "String", "required": true}},
//!     "rules": [{
//!         "type": "endpoint",
//!         "conditions": [
//!             {"fn": "aws.partition", "argv": [{"ref": "Region"}], "assign": "Partition"}
//!         ],
//!         "endpoint": {"url": "https://svc.{Region}.{Partition#dnsSuffix}"}
//!     }]
//! }"#)?;
//! let endpoint = provider.resolve_endpoint(&Params::new().with("Region", "cn-north-1"))?;
//! assert_eq!(endpoint.url(), "https://svc.cn-north-1.amazonaws.com.cn");
//! # Ok::<(), aws_endpoint_rules::ResolveEndpointError>(())
//! ```

#![warn(
    missing_docs,
    rustdoc::missing_crate_level_docs,
    unreachable_pub,
    rust_2018_idioms
)]

mod endpoint;
mod error;
pub mod parameters;
mod provider;
pub mod rules;
mod ruleset;
pub mod stdlib;
pub mod template;
mod value;

pub use endpoint::Endpoint;
pub use error::ResolveEndpointError;
pub use parameters::Params;
pub use provider::{EndpointProvider, ResolveEndpoint};
pub use ruleset::RuleSet;
pub use value::Value;

/// Variables visible to a rule: parameters plus values assigned by earlier conditions.
pub(crate) type Scope = std::collections::BTreeMap<String, Value>;
