/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use aws_types::BoxError;
use std::error::Error as StdError;
use std::fmt;

/// Endpoint resolution failed.
///
/// This is raised when a rule set is malformed, when a standard library function is called
/// with arguments of the wrong type, when an error rule matches, and when no rule matches
/// at all. The message is meant for humans; error rules use their rendered template as
/// the message verbatim.
#[derive(Debug)]
pub struct ResolveEndpointError {
    message: String,
    source: Option<BoxError>,
}

impl ResolveEndpointError {
    /// Creates a [`ResolveEndpointError`] with a message.
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Attaches the underlying cause.
    pub fn with_source(self, source: impl Into<BoxError>) -> Self {
        Self {
            source: Some(source.into()),
            ..self
        }
    }

    pub(crate) fn from_source(message: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::message(message).with_source(source)
    }

    /// The human-readable message.
    pub fn as_str(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for ResolveEndpointError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl StdError for ResolveEndpointError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source.as_ref().map(|err| err.as_ref() as _)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_is_displayed_verbatim() {
        let err = ResolveEndpointError::message("Invalid region: region was not a valid DNS name.");
        assert_eq!(
            err.to_string(),
            "Invalid region: region was not a valid DNS name."
        );
        assert!(err.source().is_none());
    }

    #[test]
    fn source_is_preserved() {
        let cause = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = ResolveEndpointError::from_source("invalid rule set", cause);
        assert_eq!(err.as_str(), "invalid rule set");
        assert!(err.source().is_some());
    }
}
