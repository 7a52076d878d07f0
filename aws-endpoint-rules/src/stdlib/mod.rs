/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

//! Functions that rule set conditions can call.
//!
//! Functions that inspect their input return null rather than failing when it is malformed.
//! Comparisons and `substring` are strict about types and fail resolution instead, since a
//! type mismatch there means the rule set itself is broken.

pub(crate) mod arn;
pub(crate) mod attr;
pub(crate) mod host;
pub mod partition;
pub(crate) mod string;
pub(crate) mod url;

use crate::error::ResolveEndpointError;
use crate::value::Value;
use partition::Partitions;

/// The function library used to evaluate rule conditions.
#[derive(Clone, Debug)]
pub struct StandardLibrary {
    partitions: Partitions,
}

impl StandardLibrary {
    /// Creates a library whose `aws.partition` consults `partitions`.
    pub fn new(partitions: Partitions) -> Self {
        Self { partitions }
    }

    /// The partitions known to `aws.partition`.
    pub fn partitions(&self) -> &Partitions {
        &self.partitions
    }

    /// Calls the function `name` with already-evaluated arguments.
    pub fn call(&self, name: &str, args: Vec<Value>) -> Result<Value, ResolveEndpointError> {
        match name {
            "isSet" => {
                let [value] = arity(name, args)?;
                Ok(Value::Bool(!value.is_null()))
            }
            "not" => {
                let [value] = arity(name, args)?;
                Ok(Value::Bool(!value.is_truthy()))
            }
            "getAttr" => {
                let [value, path] = arity(name, args)?;
                let path = path.as_str().ok_or_else(|| {
                    ResolveEndpointError::message("getAttr path must be a string.")
                })?;
                Ok(attr::get_attr(&value, path))
            }
            "stringEquals" => {
                let [a, b] = arity(name, args)?;
                match (&a, &b) {
                    (Value::String(a), Value::String(b)) => Ok(Value::Bool(a == b)),
                    _ => Err(ResolveEndpointError::message(format!(
                        "Both values must be strings, not {} and {}.",
                        a.type_name(),
                        b.type_name()
                    ))),
                }
            }
            "booleanEquals" => {
                let [a, b] = arity(name, args)?;
                match (&a, &b) {
                    (Value::Bool(a), Value::Bool(b)) => Ok(Value::Bool(a == b)),
                    _ => Err(ResolveEndpointError::message(format!(
                        "Both arguments must be bools, not {} and {}.",
                        a.type_name(),
                        b.type_name()
                    ))),
                }
            }
            "substring" => {
                let [input, start, stop, reverse] = arity(name, args)?;
                string::substring(&input, &start, &stop, &reverse)
            }
            "split" => {
                let [value, delimiter, limit] = arity(name, args)?;
                string::split(&value, &delimiter, &limit)
            }
            "uriEncode" => {
                let [value] = arity(name, args)?;
                Ok(match value {
                    Value::String(s) => Value::String(url::uri_encode(&s)),
                    _ => Value::Null,
                })
            }
            "parseURL" => {
                let [value] = arity(name, args)?;
                Ok(value.as_str().and_then(url::parse_url).unwrap_or_default())
            }
            "isValidHostLabel" => {
                let [value, allow_subdomains] = arity(name, args)?;
                Ok(Value::Bool(value.as_str().is_some_and(|label| {
                    host::is_valid_host_label(label, allow_subdomains.as_bool() == Some(true))
                })))
            }
            "aws.isVirtualHostableS3Bucket" => {
                let [value, allow_subdomains] = arity(name, args)?;
                Ok(Value::Bool(value.as_str().is_some_and(|bucket| {
                    host::is_virtual_hostable_s3_bucket(
                        bucket,
                        allow_subdomains.as_bool() == Some(true),
                    )
                })))
            }
            "aws.partition" => {
                let [region] = arity(name, args)?;
                Ok(match region.as_str() {
                    Some(region) => self.partitions.resolve(region),
                    None => Value::Null,
                })
            }
            "aws.parseArn" => {
                let [value] = arity(name, args)?;
                Ok(value.as_str().and_then(arn::parse_arn).unwrap_or_default())
            }
            "coalesce" => Ok(args.into_iter().find(|v| !v.is_null()).unwrap_or_default()),
            "ite" => {
                let [condition, then, otherwise] = arity(name, args)?;
                match condition {
                    Value::Bool(true) => Ok(then),
                    Value::Bool(false) => Ok(otherwise),
                    other => Err(ResolveEndpointError::message(format!(
                        "ite condition must be a bool, not {}.",
                        other.type_name()
                    ))),
                }
            }
            _ => Err(ResolveEndpointError::message(format!(
                "Unknown function: {name}"
            ))),
        }
    }
}

fn arity<const N: usize>(name: &str, args: Vec<Value>) -> Result<[Value; N], ResolveEndpointError> {
    <[Value; N]>::try_from(args).map_err(|args| {
        ResolveEndpointError::message(format!(
            "{name} takes {N} argument(s) but {} were given.",
            args.len()
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn library() -> StandardLibrary {
        StandardLibrary::new(Partitions::builtin().unwrap())
    }

    fn call(name: &str, args: Vec<Value>) -> Result<Value, ResolveEndpointError> {
        library().call(name, args)
    }

    #[test]
    fn is_set_and_not() {
        assert_eq!(call("isSet", vec![Value::Null]).unwrap(), Value::Bool(false));
        assert_eq!(call("isSet", vec!["x".into()]).unwrap(), Value::Bool(true));
        assert_eq!(call("not", vec![false.into()]).unwrap(), Value::Bool(true));
        assert_eq!(call("not", vec![true.into()]).unwrap(), Value::Bool(false));
    }

    #[test]
    fn comparisons_are_type_strict() {
        assert_eq!(
            call("stringEquals", vec!["a".into(), "a".into()]).unwrap(),
            Value::Bool(true)
        );
        let err = call("stringEquals", vec!["true".into(), true.into()]).unwrap_err();
        assert_eq!(err.to_string(), "Both values must be strings, not string and boolean.");

        assert_eq!(
            call("booleanEquals", vec![true.into(), false.into()]).unwrap(),
            Value::Bool(false)
        );
        let err = call("booleanEquals", vec![Value::Null, true.into()]).unwrap_err();
        assert_eq!(err.to_string(), "Both arguments must be bools, not null and boolean.");
    }

    #[test]
    fn wrong_argument_counts_fail() {
        let err = call("isSet", vec![]).unwrap_err();
        assert_eq!(err.to_string(), "isSet takes 1 argument(s) but 0 were given.");
    }

    #[test]
    fn partition_of_a_null_region_is_null() {
        assert_eq!(call("aws.partition", vec![Value::Null]).unwrap(), Value::Null);
    }

    #[test]
    fn coalesce_and_ite() {
        assert_eq!(
            call("coalesce", vec![Value::Null, "b".into(), "c".into()]).unwrap(),
            Value::from("b")
        );
        assert_eq!(call("coalesce", vec![Value::Null]).unwrap(), Value::Null);
        assert_eq!(
            call("ite", vec![true.into(), "fips".into(), "".into()]).unwrap(),
            Value::from("fips")
        );
        assert_eq!(
            call("ite", vec![false.into(), "fips".into(), "".into()]).unwrap(),
            Value::from("")
        );
    }

    #[test]
    fn uri_encode_passes_null_through() {
        assert_eq!(call("uriEncode", vec![Value::Null]).unwrap(), Value::Null);
        assert_eq!(
            call("uriEncode", vec!["a b/c".into()]).unwrap(),
            Value::from("a%20b%2Fc")
        );
    }
}
