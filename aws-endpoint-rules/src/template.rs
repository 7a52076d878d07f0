/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

//! String templates such as `https://{Region}.{PartitionResult#dnsSuffix}`.
//!
//! `{Name}` is replaced by the scope variable `Name`; `{Name#a#b}` descends into its fields.
//! `{{` and `}}` produce literal braces.

use crate::error::ResolveEndpointError;
use crate::value::Value;
use crate::Scope;
use regex_lite::Regex;
use std::sync::LazyLock;

static TEMPLATE_STRING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{[a-zA-Z#]+\}").expect("valid regex"));

#[derive(Clone, Debug, PartialEq)]
enum Part {
    Literal(String),
    Reference { name: String, path: Vec<String> },
}

/// A parsed template string.
#[derive(Clone, Debug, PartialEq)]
pub struct Template {
    source: String,
    parts: Vec<Part>,
}

impl Template {
    /// Whether `value` contains at least one `{Reference}`.
    pub fn is_template(value: &str) -> bool {
        TEMPLATE_STRING_RE.is_match(value)
    }

    /// Parses a template string.
    pub fn parse(source: &str) -> Result<Self, ResolveEndpointError> {
        let mut parts = Vec::new();
        let mut literal = String::new();
        let mut chars = source.chars().peekable();
        while let Some(c) = chars.next() {
            match c {
                '{' if chars.peek() == Some(&'{') => {
                    chars.next();
                    literal.push('{');
                }
                '}' if chars.peek() == Some(&'}') => {
                    chars.next();
                    literal.push('}');
                }
                '}' => {
                    return Err(ResolveEndpointError::message(format!(
                        "Single '}}' encountered in template `{source}`"
                    )))
                }
                '{' => {
                    let mut reference = String::new();
                    loop {
                        match chars.next() {
                            Some('}') => break,
                            Some(c) => reference.push(c),
                            None => {
                                return Err(ResolveEndpointError::message(format!(
                                    "Unclosed '{{' in template `{source}`"
                                )))
                            }
                        }
                    }
                    if reference.is_empty() {
                        return Err(ResolveEndpointError::message(format!(
                            "Empty reference in template `{source}`"
                        )));
                    }
                    if !literal.is_empty() {
                        parts.push(Part::Literal(std::mem::take(&mut literal)));
                    }
                    let mut segments = reference.split('#').map(str::to_string);
                    let name = segments.next().unwrap_or_default();
                    parts.push(Part::Reference {
                        name,
                        path: segments.collect(),
                    });
                }
                c => literal.push(c),
            }
        }
        if !literal.is_empty() {
            parts.push(Part::Literal(literal));
        }
        Ok(Self {
            source: source.to_string(),
            parts,
        })
    }

    /// The unparsed template.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Renders this template against `scope`.
    pub(crate) fn render(&self, scope: &Scope) -> Result<String, ResolveEndpointError> {
        let mut out = String::new();
        for part in &self.parts {
            match part {
                Part::Literal(text) => out.push_str(text),
                Part::Reference { name, path } => {
                    let mut value = scope.get(name);
                    for field in path {
                        value = value.and_then(|v| v.get(field));
                    }
                    match value {
                        None | Some(Value::Null) => {
                            return Err(ResolveEndpointError::message(format!(
                                "Template `{}` references `{}`, which is not set",
                                self.source,
                                std::iter::once(name.as_str())
                                    .chain(path.iter().map(String::as_str))
                                    .collect::<Vec<_>>()
                                    .join("#")
                            )))
                        }
                        Some(value) => out.push_str(&value.to_string()),
                    }
                }
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn scope() -> Scope {
        let mut partition = BTreeMap::new();
        partition.insert("dnsSuffix".to_string(), Value::from("amazonaws.com"));
        let mut scope = Scope::new();
        scope.insert("Region".into(), "us-west-2".into());
        scope.insert("UseFIPS".into(), false.into());
        scope.insert("PartitionResult".into(), Value::Object(partition));
        scope
    }

    #[test]
    fn detects_templates() {
        assert!(Template::is_template("https://{Region}.amazonaws.com"));
        assert!(Template::is_template("{PartitionResult#dnsSuffix}"));
        assert!(!Template::is_template("https://s3.amazonaws.com"));
        assert!(!Template::is_template("{not_a_reference}"));
    }

    #[test]
    fn renders_references_and_paths() {
        let template =
            Template::parse("https://svc.{Region}.{PartitionResult#dnsSuffix}").unwrap();
        assert_eq!(
            template.render(&scope()).unwrap(),
            "https://svc.us-west-2.amazonaws.com"
        );
    }

    #[test]
    fn renders_non_strings() {
        let template = Template::parse("fips={UseFIPS}").unwrap();
        assert_eq!(template.render(&scope()).unwrap(), "fips=false");
    }

    #[test]
    fn escapes_braces() {
        let template = Template::parse("{{literal}} {Region}").unwrap();
        assert_eq!(template.render(&scope()).unwrap(), "{literal} us-west-2");
    }

    #[test]
    fn unset_references_fail() {
        let template = Template::parse("https://{Bucket}.s3.amazonaws.com").unwrap();
        let err = template.render(&scope()).unwrap_err();
        assert!(err.to_string().contains("`Bucket`"), "{err}");

        let template = Template::parse("{PartitionResult#missing}").unwrap();
        let err = template.render(&scope()).unwrap_err();
        assert!(err.to_string().contains("PartitionResult#missing"), "{err}");
    }

    #[test]
    fn malformed_templates_are_rejected() {
        assert!(Template::parse("{Region").is_err());
        assert!(Template::parse("Region}").is_err());
        assert!(Template::parse("{}").is_err());
    }
}
