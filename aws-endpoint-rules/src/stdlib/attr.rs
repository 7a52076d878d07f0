/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use crate::value::Value;
use regex_lite::Regex;
use std::sync::LazyLock;

static GET_ATTR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\w*)\[(\d+)\]$").expect("valid regex"));

/// Looks up a path such as `resourceId[1]` or `a.b` in `value`.
///
/// Missing fields and out-of-range indexes yield null.
pub(crate) fn get_attr(value: &Value, path: &str) -> Value {
    let mut current = value;
    for part in path.split('.') {
        let next = match GET_ATTR_RE.captures(part) {
            Some(captures) => {
                let name = captures.get(1).map_or("", |m| m.as_str());
                // Only overflow can fail to parse, and such an index is out of range.
                let Ok(index) = captures.get(2).map_or("", |m| m.as_str()).parse::<usize>()
                else {
                    return Value::Null;
                };
                let list = if name.is_empty() {
                    Some(current)
                } else {
                    current.get(name)
                };
                list.and_then(Value::as_array)
                    .and_then(|items| items.get(index))
            }
            None => current.get(part),
        };
        match next {
            Some(next) => current = next,
            None => return Value::Null,
        }
    }
    current.clone()
}
