/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use crate::endpoint::Endpoint;
use crate::error::ResolveEndpointError;
use crate::parameters::{ParameterDefinition, Params, RawParameter};
use crate::rules::{RawRule, Rule};
use crate::stdlib::StandardLibrary;
use crate::Scope;
use serde::Deserialize;
use std::collections::BTreeMap;

#[derive(Deserialize)]
struct RawRuleSet {
    version: String,
    #[serde(default)]
    parameters: BTreeMap<String, RawParameter>,
    rules: Vec<RawRule>,
}

/// A parsed endpoint rule set.
///
/// Rule sets are immutable once parsed and can be shared between concurrent resolutions.
#[derive(Clone, Debug, PartialEq)]
pub struct RuleSet {
    version: String,
    parameters: BTreeMap<String, ParameterDefinition>,
    rules: Vec<Rule>,
}

impl RuleSet {
    /// Creates a rule set from its parts.
    pub fn new(
        version: impl Into<String>,
        parameters: impl IntoIterator<Item = ParameterDefinition>,
        rules: Vec<Rule>,
    ) -> Self {
        Self {
            version: version.into(),
            parameters: parameters
                .into_iter()
                .map(|p| (p.name().to_string(), p))
                .collect(),
            rules,
        }
    }

    /// Parses a rule set document.
    pub fn from_json(document: &str) -> Result<Self, ResolveEndpointError> {
        let raw: RawRuleSet = serde_json::from_str(document)
            .map_err(|err| ResolveEndpointError::from_source("Invalid rule set document", err))?;
        let parameters = raw
            .parameters
            .into_iter()
            .map(|(name, raw)| Ok((name.clone(), ParameterDefinition::from_raw(&name, raw)?)))
            .collect::<Result<_, ResolveEndpointError>>()?;
        let rules = raw
            .rules
            .into_iter()
            .map(Rule::from_raw)
            .collect::<Result<_, _>>()?;
        Ok(Self {
            version: raw.version,
            parameters,
            rules,
        })
    }

    /// Rule set format version.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Declared parameters, by name.
    pub fn parameters(&self) -> &BTreeMap<String, ParameterDefinition> {
        &self.parameters
    }

    /// Top-level rules, in evaluation order.
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Validates `params` and applies defaults, producing the initial scope.
    ///
    /// Values for undeclared parameters are carried into the scope unchecked.
    pub fn process_input_parameters(&self, params: &Params) -> Result<Scope, ResolveEndpointError> {
        let mut scope: Scope = params
            .iter()
            .filter(|(_, value)| !value.is_null())
            .map(|(name, value)| (name.to_string(), value.clone()))
            .collect();
        for (name, definition) in &self.parameters {
            match definition.process_input(params.get(name))? {
                Some(value) => {
                    scope.insert(name.clone(), value);
                }
                None => {
                    scope.remove(name);
                }
            }
        }
        Ok(scope)
    }

    /// Evaluates the rules in order against `params`.
    ///
    /// Returns `Ok(None)` when no rule matched.
    pub fn evaluate(
        &self,
        params: &Params,
        library: &StandardLibrary,
    ) -> Result<Option<Endpoint>, ResolveEndpointError> {
        let scope = self.process_input_parameters(params)?;
        for rule in &self.rules {
            if let Some(endpoint) = rule.evaluate(scope.clone(), library)? {
                return Ok(Some(endpoint));
            }
        }
        Ok(None)
    }
}
