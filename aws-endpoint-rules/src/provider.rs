/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use crate::endpoint::Endpoint;
use crate::error::ResolveEndpointError;
use crate::parameters::Params;
use crate::ruleset::RuleSet;
use crate::stdlib::partition::Partitions;
use crate::stdlib::StandardLibrary;
use std::collections::VecDeque;
use std::fmt::Write;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, trace};

const DEFAULT_CACHE_SIZE: usize = 100;

/// Resolves endpoints from parameters.
pub trait ResolveEndpoint: Send + Sync {
    /// Resolves the endpoint for `params`.
    fn resolve_endpoint(&self, params: &Params) -> Result<Endpoint, ResolveEndpointError>;
}

impl<F> ResolveEndpoint for F
where
    F: Fn(&Params) -> Result<Endpoint, ResolveEndpointError> + Send + Sync,
{
    fn resolve_endpoint(&self, params: &Params) -> Result<Endpoint, ResolveEndpointError> {
        (self)(params)
    }
}

/// A small LRU cache of resolved endpoints.
///
/// Entries are kept most recently used first. A hit moves the entry to the front, and an
/// insert into a full cache evicts the entry at the back, the least recently used one.
/// Lookups scan the entries linearly.
#[derive(Debug)]
struct ResolutionCache {
    capacity: usize,
    entries: VecDeque<(Params, Endpoint)>,
}

impl ResolutionCache {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity),
        }
    }

    fn get(&mut self, params: &Params) -> Option<Endpoint> {
        let index = self.entries.iter().position(|(p, _)| p == params)?;
        let entry = self.entries.remove(index)?;
        let endpoint = entry.1.clone();
        self.entries.push_front(entry);
        Some(endpoint)
    }

    fn insert(&mut self, params: Params, endpoint: Endpoint) {
        if self.capacity == 0 {
            return;
        }
        self.entries.retain(|(p, _)| p != &params);
        if self.entries.len() == self.capacity {
            self.entries.pop_back();
        }
        self.entries.push_front((params, endpoint));
    }
}

/// Resolves endpoints by evaluating a rule set, caching recent results.
///
/// Failed resolutions are not cached.
#[derive(Debug)]
pub struct EndpointProvider {
    ruleset: RuleSet,
    library: StandardLibrary,
    cache: Mutex<ResolutionCache>,
}

impl EndpointProvider {
    /// Creates a provider for `ruleset`, resolving partitions with `partitions`.
    pub fn new(ruleset: RuleSet, partitions: Partitions) -> Self {
        Self {
            ruleset,
            library: StandardLibrary::new(partitions),
            cache: Mutex::new(ResolutionCache::new(DEFAULT_CACHE_SIZE)),
        }
    }

    /// Parses a rule set document and a partitions document.
    pub fn from_json(ruleset: &str, partitions: &str) -> Result<Self, ResolveEndpointError> {
        Ok(Self::new(
            RuleSet::from_json(ruleset)?,
            Partitions::from_json(partitions)?,
        ))
    }

    /// Parses a rule set document and uses the built-in partitions.
    pub fn with_builtin_partitions(ruleset: &str) -> Result<Self, ResolveEndpointError> {
        Ok(Self::new(RuleSet::from_json(ruleset)?, Partitions::builtin()?))
    }

    /// Changes how many resolved endpoints are remembered. Zero disables caching.
    pub fn with_cache_size(self, capacity: usize) -> Self {
        Self {
            cache: Mutex::new(ResolutionCache::new(capacity)),
            ..self
        }
    }

    /// The rule set being evaluated.
    pub fn ruleset(&self) -> &RuleSet {
        &self.ruleset
    }

    fn cache(&self) -> MutexGuard<'_, ResolutionCache> {
        self.cache
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Resolves the endpoint for `params`.
    ///
    /// Fails when a parameter has the wrong type, a required parameter is missing, an
    /// error rule matches, or no rule matches.
    pub fn resolve_endpoint(&self, params: &Params) -> Result<Endpoint, ResolveEndpointError> {
        if let Some(endpoint) = self.cache().get(params) {
            trace!(url = endpoint.url(), "endpoint resolved from cache");
            return Ok(endpoint);
        }
        match self.ruleset.evaluate(params, &self.library)? {
            Some(endpoint) => {
                debug!(url = endpoint.url(), "resolved endpoint");
                self.cache().insert(params.clone(), endpoint.clone());
                Ok(endpoint)
            }
            None => {
                let mut message = String::from("No endpoint found for parameters:");
                for (name, value) in params.iter() {
                    let _ = write!(message, "\n{name}: {value}");
                }
                Err(ResolveEndpointError::message(message))
            }
        }
    }
}

impl ResolveEndpoint for EndpointProvider {
    fn resolve_endpoint(&self, params: &Params) -> Result<Endpoint, ResolveEndpointError> {
        EndpointProvider::resolve_endpoint(self, params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tracing_test::traced_test;

    const REGIONAL: &str = r#"{
        "version": "1.0",
        "parameters": {"Region": {"type": "String", "required": true}},
        "rules": [
            {
                "type": "endpoint",
                "conditions": [],
                "endpoint": {"url": "https://{Region}.svc.amazonaws.com"}
            }
        ]
    }"#;

    const US_EAST_1_ONLY: &str = r#"{
        "version": "1.0",
        "parameters": {"Region": {"type": "String", "required": true}},
        "rules": [
            {
                "type": "endpoint",
                "conditions": [{"fn": "stringEquals", "argv": [{"ref": "Region"}, "us-east-1"]}],
                "endpoint": {"url": "https://svc.us-east-1.amazonaws.com"}
            }
        ]
    }"#;

    #[test]
    fn resolves_a_regional_endpoint() {
        let provider = EndpointProvider::with_builtin_partitions(REGIONAL).unwrap();
        let endpoint = provider
            .resolve_endpoint(&Params::new().with("Region", "us-west-2"))
            .unwrap();
        assert_eq!(endpoint, Endpoint::new("https://us-west-2.svc.amazonaws.com"));
        assert!(endpoint.properties().is_empty());
        assert!(endpoint.headers().is_empty());
    }

    #[test]
    fn no_match_lists_the_parameters() {
        let provider = EndpointProvider::with_builtin_partitions(US_EAST_1_ONLY).unwrap();
        let err = provider
            .resolve_endpoint(&Params::new().with("Region", "eu-west-1"))
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "No endpoint found for parameters:\nRegion: eu-west-1"
        );
    }

    #[test]
    fn type_errors_name_the_parameter() {
        let provider = EndpointProvider::with_builtin_partitions(REGIONAL).unwrap();
        let err = provider
            .resolve_endpoint(&Params::new().with("Region", true))
            .unwrap_err();
        assert_eq!(err.to_string(), "Value (Region) is the wrong type. Must be string.");
    }

    #[test]
    #[traced_test]
    fn repeated_resolutions_hit_the_cache() {
        let provider = EndpointProvider::with_builtin_partitions(REGIONAL).unwrap();
        let params = Params::new().with("Region", "us-west-2");
        let first = provider.resolve_endpoint(&params).unwrap();
        let second = provider.resolve_endpoint(&params).unwrap();
        assert_eq!(first, second);
        assert!(logs_contain("endpoint resolved from cache"));
    }

    #[test]
    fn cache_evicts_least_recently_used() {
        let mut cache = ResolutionCache::new(2);
        let a = Params::new().with("Region", "a");
        let b = Params::new().with("Region", "b");
        let c = Params::new().with("Region", "c");
        cache.insert(a.clone(), Endpoint::new("https://a"));
        cache.insert(b.clone(), Endpoint::new("https://b"));
        assert!(cache.get(&a).is_some());
        cache.insert(c.clone(), Endpoint::new("https://c"));
        assert!(cache.get(&b).is_none());
        assert!(cache.get(&a).is_some());
        assert!(cache.get(&c).is_some());
    }

    #[test]
    fn zero_sized_cache_stores_nothing() {
        let mut cache = ResolutionCache::new(0);
        let a = Params::new().with("Region", "a");
        cache.insert(a.clone(), Endpoint::new("https://a"));
        assert!(cache.get(&a).is_none());
    }

    #[test]
    fn closures_are_resolvers() {
        fn resolve(resolver: &dyn ResolveEndpoint) -> Endpoint {
            resolver.resolve_endpoint(&Params::new()).unwrap()
        }
        let fixed = |_: &Params| Ok::<_, ResolveEndpointError>(Endpoint::new("https://fixed.example.com"));
        assert_eq!(resolve(&fixed).url(), "https://fixed.example.com");
    }
}
