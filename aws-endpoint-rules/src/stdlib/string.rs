/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use crate::error::ResolveEndpointError;
use crate::value::Value;

/// Extracts `input[start..stop]`, counted from the end when `reverse` is set.
///
/// Yields null when the range is empty or out of bounds, or when `input` is not ASCII.
/// Fails when `input` is not a string.
pub(crate) fn substring(
    input: &Value,
    start: &Value,
    stop: &Value,
    reverse: &Value,
) -> Result<Value, ResolveEndpointError> {
    let input = input.as_str().ok_or_else(|| {
        ResolveEndpointError::message(format!(
            "Input must be a string, not {}.",
            input.type_name()
        ))
    })?;
    let (start, stop) = match (index(start)?, index(stop)?) {
        (start, stop) if start < stop && stop <= input.len() && input.is_ascii() => (start, stop),
        _ => return Ok(Value::Null),
    };
    let (start, stop) = if reverse.as_bool() == Some(true) {
        (input.len() - stop, input.len() - start)
    } else {
        (start, stop)
    };
    Ok(Value::from(&input[start..stop]))
}

fn index(value: &Value) -> Result<usize, ResolveEndpointError> {
    value
        .as_number()
        .and_then(|n| usize::try_from(n).ok())
        .ok_or_else(|| {
            ResolveEndpointError::message(format!(
                "substring indexes must be non-negative integers, not {value}."
            ))
        })
}

/// Splits `value` on `delimiter`.
///
/// A `limit` of 0 splits on every occurrence; otherwise at most `limit` parts are produced.
pub(crate) fn split(
    value: &Value,
    delimiter: &Value,
    limit: &Value,
) -> Result<Value, ResolveEndpointError> {
    let Some(value) = value.as_str() else {
        return Ok(Value::Null);
    };
    let delimiter = match delimiter.as_str() {
        Some(d) if !d.is_empty() => d,
        _ => {
            return Err(ResolveEndpointError::message(
                "split delimiter must be a non-empty string.",
            ))
        }
    };
    let limit = limit
        .as_number()
        .and_then(|n| usize::try_from(n).ok())
        .ok_or_else(|| ResolveEndpointError::message("split limit must be a non-negative integer."))?;
    let parts: Vec<Value> = if limit == 0 {
        value.split(delimiter).map(Value::from).collect()
    } else {
        value.splitn(limit, delimiter).map(Value::from).collect()
    };
    Ok(Value::Array(parts))
}
