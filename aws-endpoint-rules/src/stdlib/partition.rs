/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

//! Partition metadata backing `aws.partition`.

use crate::error::ResolveEndpointError;
use crate::value::Value;
use regex_lite::Regex;
use serde::Deserialize;
use std::collections::BTreeMap;
use tracing::trace;

const BUILTIN_PARTITIONS: &str = include_str!("partitions.json");

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPartitions {
    #[serde(default)]
    version: Option<String>,
    partitions: Vec<RawPartition>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPartition {
    id: String,
    region_regex: String,
    #[serde(default)]
    regions: BTreeMap<String, serde_json::Value>,
    outputs: serde_json::Value,
}

#[derive(Clone, Debug)]
struct Partition {
    id: String,
    region_regex: Regex,
    regions: BTreeMap<String, BTreeMap<String, Value>>,
    outputs: BTreeMap<String, Value>,
}

impl Partition {
    fn from_raw(raw: RawPartition) -> Result<Self, ResolveEndpointError> {
        let region_regex = Regex::new(&raw.region_regex).map_err(|err| {
            ResolveEndpointError::from_source(
                format!("Invalid regionRegex for partition {}", raw.id),
                err,
            )
        })?;
        let regions = raw
            .regions
            .into_iter()
            .map(|(region, overrides)| Ok((region, object(Value::from_json(overrides)?))))
            .collect::<Result<_, ResolveEndpointError>>()?;
        Ok(Self {
            region_regex,
            regions,
            outputs: object(Value::from_json(raw.outputs)?),
            id: raw.id,
        })
    }

    /// `name` is the partition id unless the outputs say otherwise; region-specific
    /// entries override partition-wide outputs.
    fn result_for(&self, region: &str) -> Value {
        let mut result = BTreeMap::new();
        result.insert("name".to_string(), Value::from(self.id.as_str()));
        result.extend(self.outputs.clone());
        if let Some(overrides) = self.regions.get(region) {
            result.extend(overrides.clone());
        }
        Value::Object(result)
    }
}

fn object(value: Value) -> BTreeMap<String, Value> {
    match value {
        Value::Object(fields) => fields,
        _ => BTreeMap::new(),
    }
}

/// The partitions `aws.partition` can resolve a region to.
#[derive(Clone, Debug)]
pub struct Partitions {
    version: Option<String>,
    partitions: Vec<Partition>,
    default_index: usize,
}

impl Partitions {
    /// Parses a partitions document.
    ///
    /// The document must declare at least one partition. Unknown regions that match no
    /// `regionRegex` resolve to the `aws` partition, or to the first one when there is no
    /// `aws` partition.
    pub fn from_json(document: &str) -> Result<Self, ResolveEndpointError> {
        let raw: RawPartitions = serde_json::from_str(document).map_err(|err| {
            ResolveEndpointError::from_source("Invalid partitions document", err)
        })?;
        let partitions = raw
            .partitions
            .into_iter()
            .map(Partition::from_raw)
            .collect::<Result<Vec<_>, _>>()?;
        if partitions.is_empty() {
            return Err(ResolveEndpointError::message(
                "A partitions document must declare at least one partition.",
            ));
        }
        let default_index = partitions.iter().position(|p| p.id == "aws").unwrap_or(0);
        Ok(Self {
            version: raw.version,
            partitions,
            default_index,
        })
    }

    /// The partitions document shipped with this crate.
    pub fn builtin() -> Result<Self, ResolveEndpointError> {
        Self::from_json(BUILTIN_PARTITIONS)
    }

    /// Version of the partitions document.
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    /// Partition ids, in document order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.partitions.iter().map(|p| p.id.as_str())
    }

    /// Resolves `region` to partition metadata.
    ///
    /// Explicitly listed regions win over `regionRegex` matches.
    pub fn resolve(&self, region: &str) -> Value {
        let partition = self
            .partitions
            .iter()
            .find(|p| p.regions.contains_key(region))
            .or_else(|| {
                self.partitions
                    .iter()
                    .find(|p| p.region_regex.is_match(region))
            })
            .unwrap_or_else(|| {
                trace!(region, "region matched no partition, using the default partition");
                &self.partitions[self.default_index]
            });
        partition.result_for(region)
    }
}
