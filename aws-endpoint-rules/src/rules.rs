/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

//! The rule tree: expressions, conditions, and endpoint, error, and tree rules.

use crate::endpoint::Endpoint;
use crate::error::ResolveEndpointError;
use crate::stdlib::StandardLibrary;
use crate::template::Template;
use crate::value::Value;
use crate::Scope;
use serde::Deserialize;
use std::collections::BTreeMap;
use tracing::trace;

/// An expression appearing as a function argument, a URL, a header value, or an error.
#[derive(Clone, Debug, PartialEq)]
pub enum Expression {
    /// A value used as-is.
    Literal(Value),
    /// A string interpolating scope variables.
    Template(Template),
    /// `{"ref": "Name"}`: the value of a scope variable, null when unset.
    Reference(String),
    /// `{"fn": ..., "argv": [...]}`: the result of a standard library function.
    Function(FunctionCall),
}

impl Expression {
    pub(crate) fn from_json(value: serde_json::Value) -> Result<Self, ResolveEndpointError> {
        match value {
            serde_json::Value::Object(fields) if fields.contains_key("fn") => Ok(
                Expression::Function(FunctionCall::from_json(serde_json::Value::Object(fields))?),
            ),
            serde_json::Value::Object(fields) if fields.contains_key("ref") => {
                match fields.get("ref") {
                    Some(serde_json::Value::String(name)) => Ok(Expression::Reference(name.clone())),
                    _ => Err(ResolveEndpointError::message(
                        "A reference must name a parameter or an assigned variable.",
                    )),
                }
            }
            serde_json::Value::String(s) if Template::is_template(&s) => {
                Ok(Expression::Template(Template::parse(&s)?))
            }
            other => Ok(Expression::Literal(Value::from_json(other)?)),
        }
    }

    /// Evaluates this expression, running any function it calls.
    pub(crate) fn resolve(
        &self,
        scope: &mut Scope,
        library: &StandardLibrary,
    ) -> Result<Value, ResolveEndpointError> {
        match self {
            Expression::Literal(value) => Ok(value.clone()),
            Expression::Template(template) => Ok(Value::String(template.render(scope)?)),
            Expression::Reference(name) => Ok(scope.get(name).cloned().unwrap_or_default()),
            Expression::Function(call) => call.evaluate(scope, library),
        }
    }
}

#[derive(Deserialize)]
struct RawFunctionCall {
    #[serde(rename = "fn")]
    name: String,
    #[serde(default)]
    argv: Vec<serde_json::Value>,
    #[serde(default)]
    assign: Option<String>,
}

/// A call to a standard library function, optionally assigning its result to a new
/// scope variable.
#[derive(Clone, Debug, PartialEq)]
pub struct FunctionCall {
    name: String,
    argv: Vec<Expression>,
    assign: Option<String>,
}

impl FunctionCall {
    /// Creates a call to `name` with `argv`.
    pub fn new(name: impl Into<String>, argv: Vec<Expression>) -> Self {
        Self {
            name: name.into(),
            argv,
            assign: None,
        }
    }

    /// Stores the result of the call under `assign`.
    pub fn with_assign(mut self, assign: impl Into<String>) -> Self {
        self.assign = Some(assign.into());
        self
    }

    pub(crate) fn from_json(value: serde_json::Value) -> Result<Self, ResolveEndpointError> {
        let raw: RawFunctionCall = serde_json::from_value(value)
            .map_err(|err| ResolveEndpointError::from_source("Invalid function call", err))?;
        Ok(Self {
            name: raw.name,
            argv: raw
                .argv
                .into_iter()
                .map(Expression::from_json)
                .collect::<Result<_, _>>()?,
            assign: raw.assign,
        })
    }

    /// Function name, such as `aws.partition`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name of the scope variable receiving the result.
    pub fn assign(&self) -> Option<&str> {
        self.assign.as_deref()
    }

    /// Calls the function and performs the assignment.
    ///
    /// Assigning to a name that is already in scope is an error: rule sets may not shadow
    /// parameters or earlier assignments.
    pub(crate) fn evaluate(
        &self,
        scope: &mut Scope,
        library: &StandardLibrary,
    ) -> Result<Value, ResolveEndpointError> {
        let args = self
            .argv
            .iter()
            .map(|arg| arg.resolve(scope, library))
            .collect::<Result<Vec<_>, _>>()?;
        let result = library.call(&self.name, args)?;
        if let Some(assign) = &self.assign {
            if scope.contains_key(assign) {
                return Err(ResolveEndpointError::message(format!(
                    "Assignment {assign} already exists in scoped variables and cannot be overwritten"
                )));
            }
            scope.insert(assign.clone(), result.clone());
        }
        Ok(result)
    }
}

/// Property values of an endpoint: any JSON value whose strings may be templates.
#[derive(Clone, Debug, PartialEq)]
enum PropertyTemplate {
    Literal(Value),
    Template(Template),
    Array(Vec<PropertyTemplate>),
    Object(BTreeMap<String, PropertyTemplate>),
}

impl PropertyTemplate {
    fn from_json(value: serde_json::Value) -> Result<Self, ResolveEndpointError> {
        Ok(match value {
            serde_json::Value::String(s) if Template::is_template(&s) => {
                PropertyTemplate::Template(Template::parse(&s)?)
            }
            serde_json::Value::Array(items) => PropertyTemplate::Array(
                items
                    .into_iter()
                    .map(PropertyTemplate::from_json)
                    .collect::<Result<_, _>>()?,
            ),
            serde_json::Value::Object(fields) => PropertyTemplate::Object(
                fields
                    .into_iter()
                    .map(|(k, v)| Ok((k, PropertyTemplate::from_json(v)?)))
                    .collect::<Result<_, ResolveEndpointError>>()?,
            ),
            other => PropertyTemplate::Literal(Value::from_json(other)?),
        })
    }

    fn render(&self, scope: &Scope) -> Result<Value, ResolveEndpointError> {
        Ok(match self {
            PropertyTemplate::Literal(value) => value.clone(),
            PropertyTemplate::Template(template) => Value::String(template.render(scope)?),
            PropertyTemplate::Array(items) => Value::Array(
                items
                    .iter()
                    .map(|item| item.render(scope))
                    .collect::<Result<_, _>>()?,
            ),
            PropertyTemplate::Object(fields) => Value::Object(
                fields
                    .iter()
                    .map(|(k, v)| Ok((k.clone(), v.render(scope)?)))
                    .collect::<Result<_, ResolveEndpointError>>()?,
            ),
        })
    }
}

#[derive(Deserialize)]
struct RawEndpoint {
    url: serde_json::Value,
    #[serde(default)]
    properties: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    headers: BTreeMap<String, Vec<serde_json::Value>>,
}

/// The endpoint an endpoint rule produces once its templates are rendered.
#[derive(Clone, Debug, PartialEq)]
pub struct EndpointTemplate {
    url: Expression,
    properties: BTreeMap<String, PropertyTemplate>,
    headers: BTreeMap<String, Vec<Expression>>,
}

impl EndpointTemplate {
    /// An endpoint template with only a URL.
    pub fn new(url: Expression) -> Self {
        Self {
            url,
            properties: BTreeMap::new(),
            headers: BTreeMap::new(),
        }
    }

    fn from_raw(raw: RawEndpoint) -> Result<Self, ResolveEndpointError> {
        Ok(Self {
            url: Expression::from_json(raw.url)?,
            properties: raw
                .properties
                .into_iter()
                .map(|(k, v)| Ok((k, PropertyTemplate::from_json(v)?)))
                .collect::<Result<_, ResolveEndpointError>>()?,
            headers: raw
                .headers
                .into_iter()
                .map(|(name, values)| {
                    let values = values
                        .into_iter()
                        .map(Expression::from_json)
                        .collect::<Result<_, _>>()?;
                    Ok((name, values))
                })
                .collect::<Result<_, ResolveEndpointError>>()?,
        })
    }

    fn render(
        &self,
        scope: &mut Scope,
        library: &StandardLibrary,
    ) -> Result<Endpoint, ResolveEndpointError> {
        let url = match self.url.resolve(scope, library)? {
            Value::String(url) => url,
            other => {
                return Err(ResolveEndpointError::message(format!(
                    "Endpoint URL must be a string, not {}.",
                    other.type_name()
                )))
            }
        };
        let properties = self
            .properties
            .iter()
            .map(|(k, v)| Ok((k.clone(), v.render(scope)?)))
            .collect::<Result<_, ResolveEndpointError>>()?;
        let mut headers = BTreeMap::new();
        for (name, values) in &self.headers {
            let mut rendered = Vec::with_capacity(values.len());
            for value in values {
                rendered.push(value.resolve(scope, library)?.to_string());
            }
            headers.insert(name.clone(), rendered);
        }
        Ok(Endpoint::new(url)
            .with_properties(properties)
            .with_headers(headers))
    }
}

#[derive(Deserialize)]
pub(crate) struct RawRule {
    #[serde(rename = "type")]
    rule_type: String,
    #[serde(default)]
    conditions: Vec<serde_json::Value>,
    #[serde(default)]
    documentation: Option<String>,
    #[serde(default)]
    endpoint: Option<RawEndpoint>,
    #[serde(default)]
    error: Option<serde_json::Value>,
    #[serde(default)]
    rules: Option<Vec<RawRule>>,
}

/// What a rule does once all of its conditions hold.
#[derive(Clone, Debug, PartialEq)]
pub enum RuleKind {
    /// Resolve to an endpoint.
    Endpoint(EndpointTemplate),
    /// Fail resolution with the rendered message.
    Error(Expression),
    /// Try nested rules in order.
    Tree(Vec<Rule>),
}

/// A rule: conditions guarding an endpoint, an error, or nested rules.
#[derive(Clone, Debug, PartialEq)]
pub struct Rule {
    conditions: Vec<FunctionCall>,
    documentation: Option<String>,
    kind: RuleKind,
}

impl Rule {
    /// Creates a rule.
    pub fn new(conditions: Vec<FunctionCall>, kind: RuleKind) -> Self {
        Self {
            conditions,
            documentation: None,
            kind,
        }
    }

    pub(crate) fn from_raw(raw: RawRule) -> Result<Self, ResolveEndpointError> {
        let conditions = raw
            .conditions
            .into_iter()
            .map(FunctionCall::from_json)
            .collect::<Result<_, _>>()?;
        let kind = match raw.rule_type.as_str() {
            "endpoint" => RuleKind::Endpoint(EndpointTemplate::from_raw(raw.endpoint.ok_or_else(
                || ResolveEndpointError::message("An endpoint rule must have an endpoint."),
            )?)?),
            "error" => RuleKind::Error(Expression::from_json(raw.error.ok_or_else(|| {
                ResolveEndpointError::message("An error rule must have an error message.")
            })?)?),
            "tree" => RuleKind::Tree(
                raw.rules
                    .ok_or_else(|| ResolveEndpointError::message("A tree rule must have rules."))?
                    .into_iter()
                    .map(Rule::from_raw)
                    .collect::<Result<_, _>>()?,
            ),
            other => {
                return Err(ResolveEndpointError::message(format!(
                    "Unknown rule type: {other}. A rule must be of type tree, endpoint or error."
                )))
            }
        };
        Ok(Self {
            conditions,
            documentation: raw.documentation,
            kind,
        })
    }

    /// Conditions, evaluated in order.
    pub fn conditions(&self) -> &[FunctionCall] {
        &self.conditions
    }

    /// Documentation.
    pub fn documentation(&self) -> Option<&str> {
        self.documentation.as_deref()
    }

    /// What this rule does when it matches.
    pub fn kind(&self) -> &RuleKind {
        &self.kind
    }

    /// Evaluates the conditions left to right, stopping at the first one that is null or
    /// `false`. Returns whether all of them held, along with the scope including any
    /// variables they assigned.
    pub(crate) fn evaluate_conditions(
        &self,
        mut scope: Scope,
        library: &StandardLibrary,
    ) -> Result<(bool, Scope), ResolveEndpointError> {
        for condition in &self.conditions {
            if !condition.evaluate(&mut scope, library)?.is_truthy() {
                trace!(function = condition.name(), "condition did not hold");
                return Ok((false, scope));
            }
        }
        Ok((true, scope))
    }

    /// Evaluates this rule against its own copy of the scope.
    ///
    /// `Ok(None)` means the rule did not match and evaluation continues with the next sibling.
    pub(crate) fn evaluate(
        &self,
        scope: Scope,
        library: &StandardLibrary,
    ) -> Result<Option<Endpoint>, ResolveEndpointError> {
        let (matched, mut scope) = self.evaluate_conditions(scope, library)?;
        if !matched {
            return Ok(None);
        }
        match &self.kind {
            RuleKind::Endpoint(endpoint) => endpoint.render(&mut scope, library).map(Some),
            RuleKind::Error(error) => Err(ResolveEndpointError::message(
                error.resolve(&mut scope, library)?.to_string(),
            )),
            RuleKind::Tree(rules) => {
                for rule in rules {
                    if let Some(endpoint) = rule.evaluate(scope.clone(), library)? {
                        return Ok(Some(endpoint));
                    }
                }
                Ok(None)
            }
        }
    }
}
