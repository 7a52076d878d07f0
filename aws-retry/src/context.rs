/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

//! Types describing a single call attempt, as seen by the retry layer.

use crate::error::ConnectorError;
use bytes::Bytes;
use http::HeaderMap;

/// The raw HTTP response received for an attempt.
#[derive(Clone, Debug, Default)]
pub struct HttpResponse {
    status: u16,
    headers: HeaderMap,
    body: Bytes,
}

impl HttpResponse {
    /// Creates a new `HttpResponse` with the given status code and an empty body.
    pub fn new(status: u16) -> Self {
        Self {
            status,
            ..Default::default()
        }
    }

    /// Sets the response headers.
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    /// Sets the response body.
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// The HTTP status code.
    pub fn status(&self) -> u16 {
        self.status
    }

    /// The HTTP response headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// The raw response body.
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// True for 2xx and 3xx responses.
    pub fn is_success(&self) -> bool {
        (200..400).contains(&self.status)
    }
}

/// The error envelope of a parsed response.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ErrorMetadata {
    code: Option<String>,
    message: Option<String>,
}

impl ErrorMetadata {
    /// Creates error metadata with the given code.
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: Some(code.into()),
            message: None,
        }
    }

    /// Sets the error message.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// The service error code, e.g. `ThrottlingException`.
    pub fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }

    /// The service error message.
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }
}

/// Response metadata envelope.
///
/// The retry layer records how many attempts were made and why it stopped retrying here.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResponseMetadata {
    /// The number of attempts made beyond the first.
    pub retry_attempts: u32,
    /// Set when retrying stopped because the attempt limit was reached.
    pub max_attempts_reached: bool,
    /// Set when retrying stopped because the retry quota was exhausted.
    pub retry_quota_reached: bool,
    /// The request ID returned by the service, if any.
    pub request_id: Option<String>,
}

/// A deserialized service response.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ParsedResponse {
    error: Option<ErrorMetadata>,
    metadata: ResponseMetadata,
}

impl ParsedResponse {
    /// A successful parsed response.
    pub fn new() -> Self {
        Self::default()
    }

    /// A parsed response carrying a service error.
    pub fn error(error: ErrorMetadata) -> Self {
        Self {
            error: Some(error),
            metadata: ResponseMetadata::default(),
        }
    }

    /// The service error, if this response carries one.
    pub fn error_metadata(&self) -> Option<&ErrorMetadata> {
        self.error.as_ref()
    }

    /// The response metadata.
    pub fn metadata(&self) -> &ResponseMetadata {
        &self.metadata
    }

    /// Mutable access to the response metadata.
    pub fn metadata_mut(&mut self) -> &mut ResponseMetadata {
        &mut self.metadata
    }
}

/// The retry trait of a modeled error shape.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RetryableTrait {
    /// Whether the error indicates throttling.
    pub throttling: bool,
}

/// An error shape declared in the service model.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ErrorShape {
    name: String,
    code: Option<String>,
    retryable: Option<RetryableTrait>,
}

impl ErrorShape {
    /// Creates an error shape named `name` with no retry trait.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            code: None,
            retryable: None,
        }
    }

    /// Overrides the wire error code of this shape. Defaults to the shape name.
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Marks this shape as retryable.
    pub fn retryable(mut self, throttling: bool) -> Self {
        self.retryable = Some(RetryableTrait { throttling });
        self
    }

    /// The shape name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The error code this shape is matched against.
    pub fn error_code(&self) -> &str {
        self.code.as_deref().unwrap_or(&self.name)
    }

    /// The retry trait, if the shape is modeled as retryable.
    pub fn retryable_trait(&self) -> Option<RetryableTrait> {
        self.retryable
    }
}

/// The parts of an operation's model the retry layer consults.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OperationModel {
    name: String,
    service_id: String,
    error_shapes: Vec<ErrorShape>,
}

impl OperationModel {
    /// Creates an operation model for `name` on the service identified by `service_id`.
    pub fn new(service_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            service_id: service_id.into(),
            error_shapes: Vec::new(),
        }
    }

    /// Adds an error shape the operation can return.
    pub fn with_error_shape(mut self, shape: ErrorShape) -> Self {
        self.error_shapes.push(shape);
        self
    }

    /// The operation name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The service identifier, e.g. `dynamodb`.
    pub fn service_id(&self) -> &str {
        &self.service_id
    }

    /// The modeled error shapes.
    pub fn error_shapes(&self) -> &[ErrorShape] {
        &self.error_shapes
    }
}

/// Attempt bookkeeping shared by the attempts of one logical call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RetriesContext {
    /// The current attempt number, starting at 1.
    pub attempt: u32,
    /// The largest attempt limit any retry condition has enforced.
    pub max: u32,
}

/// State that persists across the attempts of a single logical call.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RequestContext {
    /// The retry quota charged for the most recent retry of this call.
    pub retry_quota_capacity: Option<u32>,
    /// Attempt bookkeeping, when the caller tracks it.
    pub retries: Option<RetriesContext>,
}

impl RequestContext {
    /// Creates an empty request context.
    pub fn new() -> Self {
        Self::default()
    }
}

/// Diagnostic flags accumulated while deciding whether to retry.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RetryMetadata {
    /// The attempt limit was reached.
    pub max_attempts_reached: bool,
    /// The retry quota was exhausted.
    pub retry_quota_reached: bool,
}

/// Everything the retry layer needs to know about one attempt.
///
/// A fresh context is built for every attempt. Only [`RequestContext`] outlives it.
#[derive(Debug)]
pub struct RetryContext<'a> {
    attempt_number: u32,
    operation_model: Option<&'a OperationModel>,
    parsed_response: Option<&'a ParsedResponse>,
    http_response: Option<&'a HttpResponse>,
    caught_exception: Option<&'a ConnectorError>,
    request_context: &'a mut RequestContext,
    retry_metadata: RetryMetadata,
}

impl<'a> RetryContext<'a> {
    /// Creates a context for attempt `attempt_number` (1-based).
    pub fn new(attempt_number: u32, request_context: &'a mut RequestContext) -> Self {
        Self {
            attempt_number,
            operation_model: None,
            parsed_response: None,
            http_response: None,
            caught_exception: None,
            request_context,
            retry_metadata: RetryMetadata::default(),
        }
    }

    /// Sets the operation model.
    pub fn with_operation_model(mut self, operation_model: Option<&'a OperationModel>) -> Self {
        self.operation_model = operation_model;
        self
    }

    /// Sets the parsed response.
    pub fn with_parsed_response(mut self, parsed_response: Option<&'a ParsedResponse>) -> Self {
        self.parsed_response = parsed_response;
        self
    }

    /// Sets the HTTP response.
    pub fn with_http_response(mut self, http_response: Option<&'a HttpResponse>) -> Self {
        self.http_response = http_response;
        self
    }

    /// Sets the error raised while sending the request.
    pub fn with_caught_exception(mut self, caught_exception: Option<&'a ConnectorError>) -> Self {
        self.caught_exception = caught_exception;
        self
    }

    /// The 1-based attempt number.
    pub fn attempt_number(&self) -> u32 {
        self.attempt_number
    }

    /// The operation model, if known.
    pub fn operation_model(&self) -> Option<&OperationModel> {
        self.operation_model
    }

    /// The parsed response, if one was received.
    pub fn parsed_response(&self) -> Option<&ParsedResponse> {
        self.parsed_response
    }

    /// The HTTP response, if one was received.
    pub fn http_response(&self) -> Option<&HttpResponse> {
        self.http_response
    }

    /// The error raised while sending the request, if any.
    pub fn caught_exception(&self) -> Option<&ConnectorError> {
        self.caught_exception
    }

    /// The state shared across attempts of this call.
    pub fn request_context(&self) -> &RequestContext {
        &*self.request_context
    }

    /// Mutable access to the state shared across attempts of this call.
    pub fn request_context_mut(&mut self) -> &mut RequestContext {
        &mut *self.request_context
    }

    /// The error code of the parsed response, if any.
    pub fn error_code(&self) -> Option<&str> {
        self.parsed_response?.error_metadata()?.code()
    }

    /// Diagnostic flags recorded so far.
    pub fn retry_metadata(&self) -> RetryMetadata {
        self.retry_metadata
    }

    pub(crate) fn retry_metadata_mut(&mut self) -> &mut RetryMetadata {
        &mut self.retry_metadata
    }
}
