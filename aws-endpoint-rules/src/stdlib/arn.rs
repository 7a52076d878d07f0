/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use crate::value::Value;
use std::collections::BTreeMap;

/// Parses `arn:partition:service:region:account-id:resource`.
///
/// The resource is split on `:` and `/` into `resourceId`. Returns `None` when the value is
/// not an ARN or when the partition, service, or resource is empty.
pub(crate) fn parse_arn(value: &str) -> Option<Value> {
    let rest = value.strip_prefix("arn:")?;
    let mut parts = rest.splitn(5, ':');
    let partition = parts.next()?;
    let service = parts.next()?;
    let region = parts.next()?;
    let account_id = parts.next()?;
    let resource = parts.next()?;
    if partition.is_empty() || service.is_empty() || resource.is_empty() {
        return None;
    }
    let resource_id = resource
        .split([':', '/'])
        .map(Value::from)
        .collect::<Vec<_>>();

    let mut arn = BTreeMap::new();
    arn.insert("partition".to_string(), Value::from(partition));
    arn.insert("service".to_string(), Value::from(service));
    arn.insert("region".to_string(), Value::from(region));
    arn.insert("accountId".to_string(), Value::from(account_id));
    arn.insert("resourceId".to_string(), Value::Array(resource_id));
    Some(Value::Object(arn))
}
