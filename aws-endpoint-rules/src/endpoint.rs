/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use crate::value::Value;
use std::collections::BTreeMap;

/// A resolved endpoint.
///
/// `properties` carries free-form metadata such as `authSchemes`. `headers` maps each
/// header name to the values that must be sent with it.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Endpoint {
    url: String,
    properties: BTreeMap<String, Value>,
    headers: BTreeMap<String, Vec<String>>,
}

impl Endpoint {
    /// Creates an endpoint for `url` with no properties or headers.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Sets a property.
    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    /// Appends a header value.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .entry(name.into())
            .or_default()
            .push(value.into());
        self
    }

    pub(crate) fn with_properties(mut self, properties: BTreeMap<String, Value>) -> Self {
        self.properties = properties;
        self
    }

    pub(crate) fn with_headers(mut self, headers: BTreeMap<String, Vec<String>>) -> Self {
        self.headers = headers;
        self
    }

    /// The endpoint URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Endpoint properties.
    pub fn properties(&self) -> &BTreeMap<String, Value> {
        &self.properties
    }

    /// Headers to attach to requests sent to this endpoint.
    pub fn headers(&self) -> &BTreeMap<String, Vec<String>> {
        &self.headers
    }
}
