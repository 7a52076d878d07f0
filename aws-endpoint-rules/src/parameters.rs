/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

//! Rule set parameters and the values callers pass for them.

use crate::error::ResolveEndpointError;
use crate::value::Value;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use tracing::warn;

/// The declared type of a parameter.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParameterType {
    /// A string
    String,
    /// A boolean
    Boolean,
    /// An array of strings
    StringArray,
}

impl ParameterType {
    /// Whether `value` has this type.
    pub fn matches(&self, value: &Value) -> bool {
        match (self, value) {
            (ParameterType::String, Value::String(_)) => true,
            (ParameterType::Boolean, Value::Bool(_)) => true,
            (ParameterType::StringArray, Value::Array(items)) => {
                items.iter().all(|item| item.as_str().is_some())
            }
            _ => false,
        }
    }
}

impl FromStr for ParameterType {
    type Err = ResolveEndpointError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "string" => Ok(ParameterType::String),
            "boolean" => Ok(ParameterType::Boolean),
            "stringarray" => Ok(ParameterType::StringArray),
            _ => Err(ResolveEndpointError::message(format!(
                "Unknown parameter type: {s}. A parameter must be of type string, boolean, or stringarray."
            ))),
        }
    }
}

impl fmt::Display for ParameterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ParameterType::String => "string",
            ParameterType::Boolean => "boolean",
            ParameterType::StringArray => "stringArray",
        })
    }
}

/// Deprecation notice of a parameter.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct Deprecated {
    message: Option<String>,
    since: Option<String>,
}

impl Deprecated {
    /// Creates a deprecation notice.
    pub fn new(message: Option<String>, since: Option<String>) -> Self {
        Self { message, since }
    }

    fn notice(&self, name: &str) -> String {
        let mut notice = format!("{name} has been deprecated.");
        if let Some(message) = self.message.as_deref().filter(|m| !m.is_empty()) {
            notice.push(' ');
            notice.push_str(message);
        }
        if let Some(since) = self.since.as_deref().filter(|s| !s.is_empty()) {
            notice.push_str(&format!(" Deprecated since {since}."));
        }
        notice
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawParameter {
    #[serde(rename = "type")]
    parameter_type: String,
    #[serde(default)]
    required: bool,
    #[serde(default)]
    default: Option<serde_json::Value>,
    #[serde(default, rename = "builtIn")]
    builtin: Option<String>,
    #[serde(default)]
    documentation: Option<String>,
    #[serde(default)]
    deprecated: Option<Deprecated>,
}

/// A parameter declared by a rule set.
#[derive(Clone, Debug, PartialEq)]
pub struct ParameterDefinition {
    name: String,
    parameter_type: ParameterType,
    required: bool,
    default: Option<Value>,
    builtin: Option<String>,
    documentation: Option<String>,
    deprecated: Option<Deprecated>,
}

impl ParameterDefinition {
    /// Creates an optional parameter with no default.
    pub fn new(name: impl Into<String>, parameter_type: ParameterType) -> Self {
        Self {
            name: name.into(),
            parameter_type,
            required: false,
            default: None,
            builtin: None,
            documentation: None,
            deprecated: None,
        }
    }

    pub(crate) fn from_raw(name: &str, raw: RawParameter) -> Result<Self, ResolveEndpointError> {
        let default = match raw.default {
            Some(default) => Some(Value::from_json(default)?),
            None => None,
        };
        Ok(Self {
            name: name.to_string(),
            parameter_type: raw.parameter_type.parse()?,
            required: raw.required,
            default: default.filter(|d| !d.is_null()),
            builtin: raw.builtin,
            documentation: raw.documentation,
            deprecated: raw.deprecated,
        })
    }

    /// Marks this parameter as required.
    pub fn with_required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    /// Sets the value used when the caller provides none.
    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into()).filter(|d| !d.is_null());
        self
    }

    /// Marks this parameter as deprecated.
    pub fn with_deprecated(mut self, deprecated: Deprecated) -> Self {
        self.deprecated = Some(deprecated);
        self
    }

    /// Parameter name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared type.
    pub fn parameter_type(&self) -> ParameterType {
        self.parameter_type
    }

    /// Whether a value must be available after defaults are applied.
    pub fn is_required(&self) -> bool {
        self.required
    }

    /// Default value.
    pub fn default_value(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    /// Name of the SDK built-in that supplies this parameter, such as `AWS::Region`.
    pub fn builtin(&self) -> Option<&str> {
        self.builtin.as_deref()
    }

    /// Documentation.
    pub fn documentation(&self) -> Option<&str> {
        self.documentation.as_deref()
    }

    /// Deprecation notice.
    pub fn deprecated(&self) -> Option<&Deprecated> {
        self.deprecated.as_ref()
    }

    /// Validates a caller-provided value, falling back to the default when there is none.
    ///
    /// Returns `None` when the parameter is optional, unset, and has no default.
    pub fn process_input(&self, value: Option<&Value>) -> Result<Option<Value>, ResolveEndpointError> {
        match value.filter(|v| !v.is_null()) {
            Some(value) => {
                self.validate_input(value)?;
                Ok(Some(value.clone()))
            }
            None => match &self.default {
                Some(default) => Ok(Some(default.clone())),
                None if self.required => Err(ResolveEndpointError::message(format!(
                    "Cannot find value for required parameter {}",
                    self.name
                ))),
                None => Ok(None),
            },
        }
    }

    fn validate_input(&self, value: &Value) -> Result<(), ResolveEndpointError> {
        if !self.parameter_type.matches(value) {
            return Err(ResolveEndpointError::message(format!(
                "Value ({}) is the wrong type. Must be {}.",
                self.name, self.parameter_type
            )));
        }
        if let Some(deprecated) = &self.deprecated {
            warn!(parameter = %self.name, "{}", deprecated.notice(&self.name));
        }
        Ok(())
    }
}

/// Values passed to endpoint resolution, keyed by parameter name.
///
/// Setting a parameter to [`Value::Null`] is the same as leaving it unset.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Params {
    values: BTreeMap<String, Value>,
}

impl Params {
    /// Creates an empty parameter set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a parameter.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    /// Sets a parameter.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.values.insert(name.into(), value.into());
        self
    }

    /// The value passed for `name`.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name).filter(|v| !v.is_null())
    }

    /// Iterates over the parameters in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    #[test]
    fn parameter_types_parse_case_insensitively() {
        assert_eq!("String".parse::<ParameterType>().unwrap(), ParameterType::String);
        assert_eq!("boolean".parse::<ParameterType>().unwrap(), ParameterType::Boolean);
        assert_eq!(
            "stringArray".parse::<ParameterType>().unwrap(),
            ParameterType::StringArray
        );
        let err = "integer".parse::<ParameterType>().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Unknown parameter type: integer. A parameter must be of type string, boolean, or stringarray."
        );
    }

    #[test]
    fn defaults_fill_missing_values() {
        let param = ParameterDefinition::new("UseFIPS", ParameterType::Boolean)
            .with_required(true)
            .with_default(false);
        assert_eq!(param.process_input(None).unwrap(), Some(Value::Bool(false)));
        assert_eq!(param.process_input(Some(&Value::Null)).unwrap(), Some(Value::Bool(false)));
        assert_eq!(
            param.process_input(Some(&Value::Bool(true))).unwrap(),
            Some(Value::Bool(true))
        );
    }

    #[test]
    fn missing_required_values_fail() {
        let param = ParameterDefinition::new("Region", ParameterType::String).with_required(true);
        let err = param.process_input(None).unwrap_err();
        assert_eq!(err.to_string(), "Cannot find value for required parameter Region");
    }

    #[test]
    fn optional_values_may_be_absent() {
        let param = ParameterDefinition::new("Endpoint", ParameterType::String);
        assert_eq!(param.process_input(None).unwrap(), None);
    }

    #[test]
    fn wrong_types_fail() {
        let param = ParameterDefinition::new("UseFIPS", ParameterType::Boolean);
        let err = param.process_input(Some(&"true".into())).unwrap_err();
        assert_eq!(err.to_string(), "Value (UseFIPS) is the wrong type. Must be boolean.");

        let param = ParameterDefinition::new("Keys", ParameterType::StringArray);
        assert!(param.process_input(Some(&vec!["a", "b"].into())).is_ok());
        let err = param
            .process_input(Some(&Value::Array(vec![Value::Bool(true)])))
            .unwrap_err();
        assert_eq!(err.to_string(), "Value (Keys) is the wrong type. Must be stringArray.");
    }

    #[test]
    #[traced_test]
    fn deprecated_parameters_warn_but_resolve() {
        let param = ParameterDefinition::new("AccountIdEndpointMode", ParameterType::String)
            .with_deprecated(Deprecated::new(
                Some("Use AccountId instead".into()),
                Some("2024-01-01".into()),
            ));
        let value = param.process_input(Some(&"preferred".into())).unwrap();
        assert_eq!(value, Some(Value::from("preferred")));
        assert!(logs_contain("AccountIdEndpointMode has been deprecated."));
        assert!(logs_contain("Deprecated since 2024-01-01."));
    }

    #[test]
    fn null_params_count_as_unset() {
        let params = Params::new().with("Region", "us-east-1").with("Bucket", Value::Null);
        assert_eq!(params.get("Region"), Some(&Value::from("us-east-1")));
        assert_eq!(params.get("Bucket"), None);
    }
}
