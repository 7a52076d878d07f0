/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

//! Errors produced or inspected by the retry layer.

use aws_types::BoxError;
use std::error::Error as StdError;
use std::fmt;

/// What went wrong while sending a request.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ConnectorErrorKind {
    /// Establishing the connection timed out.
    ConnectTimeout,
    /// Waiting for the response timed out.
    ReadTimeout,
    /// The endpoint could not be reached.
    Connect,
    /// The connection was closed before a response was received.
    ConnectionClosed,
    /// Some other I/O or HTTP client failure.
    HttpClient,
    /// An error that isn't related to the network at all.
    Other,
}

/// An error raised by the HTTP layer while sending a request.
#[derive(Debug)]
pub struct ConnectorError {
    kind: ConnectorErrorKind,
    source: BoxError,
}

impl ConnectorError {
    /// Creates a new `ConnectorError` of the given kind.
    pub fn new(kind: ConnectorErrorKind, source: impl Into<BoxError>) -> Self {
        Self {
            kind,
            source: source.into(),
        }
    }

    /// Creates a read timeout error.
    pub fn read_timeout(source: impl Into<BoxError>) -> Self {
        Self::new(ConnectorErrorKind::ReadTimeout, source)
    }

    /// Creates a connect timeout error.
    pub fn connect_timeout(source: impl Into<BoxError>) -> Self {
        Self::new(ConnectorErrorKind::ConnectTimeout, source)
    }

    /// Creates a connection error.
    pub fn connect(source: impl Into<BoxError>) -> Self {
        Self::new(ConnectorErrorKind::Connect, source)
    }

    /// Creates an error unrelated to the network.
    pub fn other(source: impl Into<BoxError>) -> Self {
        Self::new(ConnectorErrorKind::Other, source)
    }

    /// The kind of this error.
    pub fn kind(&self) -> ConnectorErrorKind {
        self.kind
    }

    /// True for connection and socket level failures.
    pub fn is_transient(&self) -> bool {
        !matches!(self.kind, ConnectorErrorKind::Other)
    }

    /// True if the request timed out.
    pub fn is_timeout(&self) -> bool {
        matches!(
            self.kind,
            ConnectorErrorKind::ConnectTimeout | ConnectorErrorKind::ReadTimeout
        )
    }
}

impl fmt::Display for ConnectorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ConnectorErrorKind::ConnectTimeout => write!(f, "connect timeout"),
            ConnectorErrorKind::ReadTimeout => write!(f, "read timeout"),
            ConnectorErrorKind::Connect => write!(f, "could not connect to the endpoint"),
            ConnectorErrorKind::ConnectionClosed => {
                write!(f, "connection was closed before a response was received")
            }
            ConnectorErrorKind::HttpClient => write!(f, "HTTP client error"),
            ConnectorErrorKind::Other => write!(f, "other error"),
        }
    }
}

impl StdError for ConnectorError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        Some(self.source.as_ref() as _)
    }
}

/// The send-rate token bucket did not have enough capacity and the caller asked not to block.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CapacityNotAvailable {
    requested: f64,
    available: f64,
}

impl CapacityNotAvailable {
    pub(crate) fn new(requested: f64, available: f64) -> Self {
        Self {
            requested,
            available,
        }
    }

    /// The number of tokens requested.
    pub fn requested(&self) -> f64 {
        self.requested
    }

    /// The number of tokens that were available.
    pub fn available(&self) -> f64 {
        self.available
    }
}

impl fmt::Display for CapacityNotAvailable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "insufficient send capacity: requested {} tokens but only {} are available",
            self.requested, self.available
        )
    }
}

impl StdError for CapacityNotAvailable {}

/// A call failed at the network level and the retry layer gave up on it.
#[derive(Debug)]
pub struct RetryError {
    source: ConnectorError,
    attempts: u32,
}

impl RetryError {
    pub(crate) fn new(source: ConnectorError, attempts: u32) -> Self {
        Self { source, attempts }
    }

    /// The total number of attempts made, including the first.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// The error raised by the final attempt.
    pub fn connector_error(&self) -> &ConnectorError {
        &self.source
    }

    /// Consumes this error, returning the error raised by the final attempt.
    pub fn into_connector_error(self) -> ConnectorError {
        self.source
    }
}

impl fmt::Display for RetryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "request failed after {} attempt(s)", self.attempts)
    }
}

impl StdError for RetryError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        Some(&self.source)
    }
}
