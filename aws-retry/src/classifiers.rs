/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

//! Conditions deciding whether a failed attempt may be retried.
//!
//! Each condition implements [`IsRetryable`]. The standard set is a closed list of
//! [`RetryChecker`] variants combined with [`OrRetryChecker`], gated by a
//! [`MaxAttemptsChecker`].

use crate::context::RetryContext;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

pub(crate) const DEFAULT_MAX_ATTEMPTS: u32 = 3;

const TRANSIENT_ERROR_CODES: &[&str] = &[
    "RequestTimeout",
    "RequestTimeoutException",
    "PriorRequestNotComplete",
];

const TRANSIENT_ERROR_STATUS_CODES: &[u16] = &[500, 502, 503, 504];

const THROTTLING_ERROR_CODES: &[&str] = &[
    "Throttling",
    "ThrottlingException",
    "ThrottledException",
    "RequestThrottledException",
    "TooManyRequestsException",
    "ProvisionedThroughputExceededException",
    "TransactionInProgressException",
    "RequestLimitExceeded",
    "BandwidthLimitExceeded",
    "LimitExceededException",
    "RequestThrottled",
    "SlowDown",
    "PriorRequestNotComplete",
    "EC2ThrottledException",
];

const CRC32_HEADER: &str = "x-amz-crc32";

/// Decides whether the attempt described by a [`RetryContext`] may be retried.
///
/// Implementations may record diagnostics in the context but have no other side effects.
pub trait IsRetryable: Send + Sync + fmt::Debug {
    /// Returns `true` if the attempt may be retried.
    fn is_retryable(&self, ctx: &mut RetryContext<'_>) -> bool;
}

/// A caller-supplied retry condition.
#[derive(Clone, Debug)]
pub struct SharedRetryChecker(Arc<dyn IsRetryable>);

impl SharedRetryChecker {
    /// Wraps a custom condition.
    pub fn new(checker: impl IsRetryable + 'static) -> Self {
        Self(Arc::new(checker))
    }
}

impl IsRetryable for SharedRetryChecker {
    fn is_retryable(&self, ctx: &mut RetryContext<'_>) -> bool {
        self.0.is_retryable(ctx)
    }
}

/// Retries connection failures, 5xx gateway errors, and request timeouts.
#[derive(Clone, Debug, Default)]
pub struct TransientRetryableChecker;

impl IsRetryable for TransientRetryableChecker {
    fn is_retryable(&self, ctx: &mut RetryContext<'_>) -> bool {
        if ctx
            .error_code()
            .is_some_and(|code| TRANSIENT_ERROR_CODES.contains(&code))
        {
            return true;
        }
        if ctx
            .http_response()
            .is_some_and(|res| TRANSIENT_ERROR_STATUS_CODES.contains(&res.status()))
        {
            return true;
        }
        ctx.caught_exception()
            .is_some_and(|err| err.is_transient())
    }
}

/// Retries errors whose code is a known throttling code.
///
/// The status code is ignored; only the error code decides.
#[derive(Clone, Debug, Default)]
pub struct ThrottledRetryableChecker;

impl ThrottledRetryableChecker {
    pub(crate) fn is_throttled(ctx: &RetryContext<'_>) -> bool {
        ctx.error_code()
            .is_some_and(|code| THROTTLING_ERROR_CODES.contains(&code))
    }
}

impl IsRetryable for ThrottledRetryableChecker {
    fn is_retryable(&self, ctx: &mut RetryContext<'_>) -> bool {
        Self::is_throttled(ctx)
    }
}

/// How a modeled error is marked in the service model.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ModeledErrorType {
    /// Retryable, but not throttling.
    Transient,
    /// Retryable and marked as throttling.
    Throttling,
}

/// Finds the modeled error shape matching the error code of a response.
#[derive(Clone, Debug, Default)]
pub struct ModeledRetryErrorDetector;

impl ModeledRetryErrorDetector {
    /// Returns how the error in `ctx` is modeled, or `None` if it isn't modeled as retryable.
    pub fn detect_error_type(&self, ctx: &RetryContext<'_>) -> Option<ModeledErrorType> {
        let error_code = ctx.error_code()?;
        let operation = ctx.operation_model()?;
        operation
            .error_shapes()
            .iter()
            .filter(|shape| shape.error_code() == error_code)
            .find_map(|shape| shape.retryable_trait())
            .map(|retryable| {
                if retryable.throttling {
                    ModeledErrorType::Throttling
                } else {
                    ModeledErrorType::Transient
                }
            })
    }
}

/// Retries errors the service model marks as retryable.
#[derive(Clone, Debug, Default)]
pub struct ModeledRetryableChecker {
    detector: ModeledRetryErrorDetector,
}

impl IsRetryable for ModeledRetryableChecker {
    fn is_retryable(&self, ctx: &mut RetryContext<'_>) -> bool {
        if ctx.error_code().is_none() {
            return false;
        }
        self.detector.detect_error_type(ctx).is_some()
    }
}

/// Classifies responses as throttling for the adaptive rate limiter.
#[derive(Clone, Debug, Default)]
pub struct ThrottlingErrorDetector {
    modeled: ModeledRetryErrorDetector,
}

impl ThrottlingErrorDetector {
    /// Returns `true` if the response in `ctx` indicates throttling.
    pub fn is_throttling_error(&self, ctx: &RetryContext<'_>) -> bool {
        if ThrottledRetryableChecker::is_throttled(ctx) {
            return true;
        }
        self.modeled.detect_error_type(ctx) == Some(ModeledErrorType::Throttling)
    }
}

/// Stops retrying once `max_attempts` attempts have been made.
#[derive(Clone, Debug)]
pub struct MaxAttemptsChecker {
    max_attempts: u32,
}

impl MaxAttemptsChecker {
    /// Creates a checker allowing up to `max_attempts` attempts in total.
    pub fn new(max_attempts: u32) -> Self {
        Self { max_attempts }
    }

    /// The total number of attempts allowed.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}

impl IsRetryable for MaxAttemptsChecker {
    fn is_retryable(&self, ctx: &mut RetryContext<'_>) -> bool {
        let under_max_attempts = ctx.attempt_number() < self.max_attempts;
        if let Some(retries) = ctx.request_context_mut().retries.as_mut() {
            retries.max = retries.max.max(self.max_attempts);
        }
        if !under_max_attempts {
            debug!(max_attempts = self.max_attempts, "max attempts reached");
            ctx.retry_metadata_mut().max_attempts_reached = true;
        }
        under_max_attempts
    }
}

/// Retries STS identity provider communication failures.
#[derive(Clone, Debug, Default)]
pub struct RetryIdpCommunicationError;

impl IsRetryable for RetryIdpCommunicationError {
    fn is_retryable(&self, ctx: &mut RetryContext<'_>) -> bool {
        let is_sts = ctx
            .operation_model()
            .is_some_and(|op| op.service_id().eq_ignore_ascii_case("sts"));
        is_sts && ctx.error_code() == Some("IDPCommunicationError")
    }
}

/// Retries DynamoDB responses whose body does not match their `x-amz-crc32` header.
#[derive(Clone, Debug, Default)]
pub struct RetryDdbChecksumError;

impl IsRetryable for RetryDdbChecksumError {
    fn is_retryable(&self, ctx: &mut RetryContext<'_>) -> bool {
        let is_dynamodb = ctx
            .operation_model()
            .is_some_and(|op| op.service_id().eq_ignore_ascii_case("dynamodb"));
        if !is_dynamodb {
            return false;
        }
        let Some(response) = ctx.http_response() else {
            return false;
        };
        let Some(expected) = response
            .headers()
            .get(CRC32_HEADER)
            .and_then(|value| value.to_str().ok())
        else {
            return false;
        };
        let actual = crc32fast::hash(response.body());
        match expected.parse::<u32>() {
            Ok(expected) if expected == actual => false,
            _ => {
                debug!(expected, actual, "DynamoDB CRC32 checksum mismatch");
                true
            }
        }
    }
}

/// The retry conditions this crate knows how to evaluate.
#[non_exhaustive]
#[derive(Clone, Debug)]
pub enum RetryChecker {
    /// See [`TransientRetryableChecker`].
    Transient(TransientRetryableChecker),
    /// See [`ThrottledRetryableChecker`].
    Throttled(ThrottledRetryableChecker),
    /// See [`ModeledRetryableChecker`].
    Modeled(ModeledRetryableChecker),
    /// See [`MaxAttemptsChecker`].
    MaxAttempts(MaxAttemptsChecker),
    /// See [`RetryIdpCommunicationError`].
    IdpCommunicationError(RetryIdpCommunicationError),
    /// See [`RetryDdbChecksumError`].
    DdbChecksumError(RetryDdbChecksumError),
    /// See [`OrRetryChecker`].
    Or(OrRetryChecker),
    /// See [`StandardRetryConditions`].
    Standard(StandardRetryConditions),
    /// A caller-supplied condition.
    Custom(SharedRetryChecker),
}

impl IsRetryable for RetryChecker {
    fn is_retryable(&self, ctx: &mut RetryContext<'_>) -> bool {
        match self {
            Self::Transient(checker) => checker.is_retryable(ctx),
            Self::Throttled(checker) => checker.is_retryable(ctx),
            Self::Modeled(checker) => checker.is_retryable(ctx),
            Self::MaxAttempts(checker) => checker.is_retryable(ctx),
            Self::IdpCommunicationError(checker) => checker.is_retryable(ctx),
            Self::DdbChecksumError(checker) => checker.is_retryable(ctx),
            Self::Or(checker) => checker.is_retryable(ctx),
            Self::Standard(checker) => checker.is_retryable(ctx),
            Self::Custom(checker) => checker.is_retryable(ctx),
        }
    }
}

macro_rules! impl_from_checker {
    ($($ty:ident => $variant:ident),+ $(,)?) => {
        $(
            impl From<$ty> for RetryChecker {
                fn from(checker: $ty) -> Self {
                    Self::$variant(checker)
                }
            }
        )+
    };
}

impl_from_checker!(
    TransientRetryableChecker => Transient,
    ThrottledRetryableChecker => Throttled,
    ModeledRetryableChecker => Modeled,
    MaxAttemptsChecker => MaxAttempts,
    RetryIdpCommunicationError => IdpCommunicationError,
    RetryDdbChecksumError => DdbChecksumError,
    OrRetryChecker => Or,
    StandardRetryConditions => Standard,
    SharedRetryChecker => Custom,
);

/// Retryable if any of its conditions is. Evaluation stops at the first match.
#[derive(Clone, Debug, Default)]
pub struct OrRetryChecker {
    checkers: Vec<RetryChecker>,
}

impl OrRetryChecker {
    /// Combines `checkers`.
    pub fn new(checkers: impl IntoIterator<Item = RetryChecker>) -> Self {
        Self {
            checkers: checkers.into_iter().collect(),
        }
    }

    /// Appends a condition.
    pub fn push(&mut self, checker: impl Into<RetryChecker>) {
        self.checkers.push(checker.into());
    }
}

impl IsRetryable for OrRetryChecker {
    fn is_retryable(&self, ctx: &mut RetryContext<'_>) -> bool {
        self.checkers.iter().any(|checker| checker.is_retryable(ctx))
    }
}

/// The conditions used by the standard retry mode.
///
/// The attempt limit is checked first and on its own, so `MaxAttemptsReached` is recorded
/// whenever a call runs out of attempts regardless of why the attempt failed.
#[derive(Clone, Debug)]
pub struct StandardRetryConditions {
    max_attempts_checker: MaxAttemptsChecker,
    additional_checkers: OrRetryChecker,
}

impl Default for StandardRetryConditions {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS)
    }
}

impl StandardRetryConditions {
    /// Creates the standard conditions allowing up to `max_attempts` attempts.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts_checker: MaxAttemptsChecker::new(max_attempts),
            additional_checkers: OrRetryChecker::new([
                TransientRetryableChecker.into(),
                ThrottledRetryableChecker.into(),
                ModeledRetryableChecker::default().into(),
                OrRetryChecker::new([
                    RetryIdpCommunicationError.into(),
                    RetryDdbChecksumError.into(),
                ])
                .into(),
            ]),
        }
    }

    /// Adds another condition under which a failed attempt is retryable.
    pub fn add_retry_condition(&mut self, checker: impl Into<RetryChecker>) {
        self.additional_checkers.push(checker);
    }

    /// The total number of attempts allowed.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts_checker.max_attempts()
    }
}

impl IsRetryable for StandardRetryConditions {
    fn is_retryable(&self, ctx: &mut RetryContext<'_>) -> bool {
        self.max_attempts_checker.is_retryable(ctx) && self.additional_checkers.is_retryable(ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{
        ErrorMetadata, ErrorShape, HttpResponse, OperationModel, ParsedResponse, RequestContext,
        RetriesContext,
    };
    use crate::error::ConnectorError;
    use http::{HeaderMap, HeaderValue};

    fn error_response(code: &str) -> ParsedResponse {
        ParsedResponse::error(ErrorMetadata::new(code))
    }

    #[test]
    fn transient_error_codes() {
        for code in TRANSIENT_ERROR_CODES {
            let parsed = error_response(code);
            let mut request_context = RequestContext::new();
            let mut ctx =
                RetryContext::new(1, &mut request_context).with_parsed_response(Some(&parsed));
            assert!(TransientRetryableChecker.is_retryable(&mut ctx), "{code}");
        }
    }

    #[test]
    fn transient_status_codes() {
        for status in [500, 502, 503, 504] {
            let response = HttpResponse::new(status);
            let mut request_context = RequestContext::new();
            let mut ctx =
                RetryContext::new(1, &mut request_context).with_http_response(Some(&response));
            assert!(TransientRetryableChecker.is_retryable(&mut ctx), "{status}");
        }
        for status in [200, 400, 403, 501] {
            let response = HttpResponse::new(status);
            let mut request_context = RequestContext::new();
            let mut ctx =
                RetryContext::new(1, &mut request_context).with_http_response(Some(&response));
            assert!(!TransientRetryableChecker.is_retryable(&mut ctx), "{status}");
        }
    }

    #[test]
    fn transient_connection_errors() {
        let err = ConnectorError::connect("refused");
        let mut request_context = RequestContext::new();
        let mut ctx = RetryContext::new(1, &mut request_context).with_caught_exception(Some(&err));
        assert!(TransientRetryableChecker.is_retryable(&mut ctx));

        let err = ConnectorError::other("not the network");
        let mut request_context = RequestContext::new();
        let mut ctx = RetryContext::new(1, &mut request_context).with_caught_exception(Some(&err));
        assert!(!TransientRetryableChecker.is_retryable(&mut ctx));
    }

    #[test]
    fn throttling_is_decided_by_error_code() {
        let parsed = error_response("SlowDown");
        let response = HttpResponse::new(400);
        let mut request_context = RequestContext::new();
        let mut ctx = RetryContext::new(1, &mut request_context)
            .with_parsed_response(Some(&parsed))
            .with_http_response(Some(&response));
        assert!(ThrottledRetryableChecker.is_retryable(&mut ctx));

        let parsed = error_response("AccessDenied");
        let response = HttpResponse::new(429);
        let mut request_context = RequestContext::new();
        let mut ctx = RetryContext::new(1, &mut request_context)
            .with_parsed_response(Some(&parsed))
            .with_http_response(Some(&response));
        assert!(!ThrottledRetryableChecker.is_retryable(&mut ctx));
    }

    fn modeled_operation() -> OperationModel {
        OperationModel::new("kinesis", "PutRecord")
            .with_error_shape(ErrorShape::new("ModeledThrottle").retryable(true))
            .with_error_shape(ErrorShape::new("ModeledRetry").retryable(false))
            .with_error_shape(ErrorShape::new("WireName").with_code("CustomCode").retryable(false))
            .with_error_shape(ErrorShape::new("NotRetryable"))
    }

    #[test]
    fn modeled_errors() {
        let operation = modeled_operation();
        let cases = [
            ("ModeledThrottle", true),
            ("ModeledRetry", true),
            ("CustomCode", true),
            ("WireName", false),
            ("NotRetryable", false),
            ("Unknown", false),
        ];
        for (code, expected) in cases {
            let parsed = error_response(code);
            let mut request_context = RequestContext::new();
            let mut ctx = RetryContext::new(1, &mut request_context)
                .with_parsed_response(Some(&parsed))
                .with_operation_model(Some(&operation));
            assert_eq!(
                ModeledRetryableChecker::default().is_retryable(&mut ctx),
                expected,
                "{code}"
            );
        }
    }

    #[test]
    fn throttling_detector_uses_fixed_and_modeled_codes() {
        let operation = modeled_operation();
        let detector = ThrottlingErrorDetector::default();
        for (code, expected) in [
            ("ThrottlingException", true),
            ("ModeledThrottle", true),
            ("ModeledRetry", false),
            ("InternalError", false),
        ] {
            let parsed = error_response(code);
            let mut request_context = RequestContext::new();
            let ctx = RetryContext::new(1, &mut request_context)
                .with_parsed_response(Some(&parsed))
                .with_operation_model(Some(&operation));
            assert_eq!(detector.is_throttling_error(&ctx), expected, "{code}");
        }
    }

    #[test]
    fn max_attempts_boundary() {
        let checker = MaxAttemptsChecker::new(3);
        for attempt in [1, 2] {
            let mut request_context = RequestContext::new();
            let mut ctx = RetryContext::new(attempt, &mut request_context);
            assert!(checker.is_retryable(&mut ctx));
            assert!(!ctx.retry_metadata().max_attempts_reached);
        }
        let mut request_context = RequestContext::new();
        let mut ctx = RetryContext::new(3, &mut request_context);
        assert!(!checker.is_retryable(&mut ctx));
        assert!(ctx.retry_metadata().max_attempts_reached);
    }

    #[test]
    fn max_attempts_recorded_in_request_context() {
        let mut request_context = RequestContext::new();
        request_context.retries = Some(RetriesContext { attempt: 1, max: 2 });
        let mut ctx = RetryContext::new(1, &mut request_context);
        assert!(MaxAttemptsChecker::new(5).is_retryable(&mut ctx));
        assert_eq!(request_context.retries.map(|r| r.max), Some(5));
    }

    #[test]
    fn idp_communication_error_only_for_sts() {
        let parsed = error_response("IDPCommunicationError");
        let sts = OperationModel::new("sts", "AssumeRoleWithWebIdentity");
        let mut request_context = RequestContext::new();
        let mut ctx = RetryContext::new(1, &mut request_context)
            .with_parsed_response(Some(&parsed))
            .with_operation_model(Some(&sts));
        assert!(RetryIdpCommunicationError.is_retryable(&mut ctx));

        let s3 = OperationModel::new("s3", "GetObject");
        let mut request_context = RequestContext::new();
        let mut ctx = RetryContext::new(1, &mut request_context)
            .with_parsed_response(Some(&parsed))
            .with_operation_model(Some(&s3));
        assert!(!RetryIdpCommunicationError.is_retryable(&mut ctx));
    }

    #[test]
    fn ddb_checksum_mismatch() {
        let body = "{\"Items\":[]}";
        let good = crc32fast::hash(body.as_bytes());
        let ddb = OperationModel::new("dynamodb", "Scan");

        let mut headers = HeaderMap::new();
        headers.insert(CRC32_HEADER, HeaderValue::from(good));
        let response = HttpResponse::new(200).with_headers(headers).with_body(body);
        let mut request_context = RequestContext::new();
        let mut ctx = RetryContext::new(1, &mut request_context)
            .with_http_response(Some(&response))
            .with_operation_model(Some(&ddb));
        assert!(!RetryDdbChecksumError.is_retryable(&mut ctx));

        let mut headers = HeaderMap::new();
        headers.insert(CRC32_HEADER, HeaderValue::from(good.wrapping_add(1)));
        let response = HttpResponse::new(200).with_headers(headers).with_body(body);
        let mut request_context = RequestContext::new();
        let mut ctx = RetryContext::new(1, &mut request_context)
            .with_http_response(Some(&response))
            .with_operation_model(Some(&ddb));
        assert!(RetryDdbChecksumError.is_retryable(&mut ctx));
    }

    #[test]
    fn standard_conditions_gate_on_max_attempts() {
        let conditions = StandardRetryConditions::new(3);
        let response = HttpResponse::new(503);

        let mut request_context = RequestContext::new();
        let mut ctx =
            RetryContext::new(2, &mut request_context).with_http_response(Some(&response));
        assert!(conditions.is_retryable(&mut ctx));

        let mut request_context = RequestContext::new();
        let mut ctx =
            RetryContext::new(3, &mut request_context).with_http_response(Some(&response));
        assert!(!conditions.is_retryable(&mut ctx));
        assert!(ctx.retry_metadata().max_attempts_reached);
    }

    #[test]
    fn standard_conditions_reject_client_errors() {
        let conditions = StandardRetryConditions::default();
        let parsed = error_response("ValidationException");
        let response = HttpResponse::new(400);
        let mut request_context = RequestContext::new();
        let mut ctx = RetryContext::new(1, &mut request_context)
            .with_parsed_response(Some(&parsed))
            .with_http_response(Some(&response));
        assert!(!conditions.is_retryable(&mut ctx));
        assert!(!ctx.retry_metadata().max_attempts_reached);
    }

    #[derive(Debug)]
    struct RetryOnTeapot;

    impl IsRetryable for RetryOnTeapot {
        fn is_retryable(&self, ctx: &mut RetryContext<'_>) -> bool {
            ctx.http_response().is_some_and(|res| res.status() == 418)
        }
    }

    #[test]
    fn custom_conditions_can_be_added() {
        let mut conditions = StandardRetryConditions::default();
        let response = HttpResponse::new(418);
        let mut request_context = RequestContext::new();
        let mut ctx =
            RetryContext::new(1, &mut request_context).with_http_response(Some(&response));
        assert!(!conditions.is_retryable(&mut ctx));

        conditions.add_retry_condition(SharedRetryChecker::new(RetryOnTeapot));
        let mut request_context = RequestContext::new();
        let mut ctx =
            RetryContext::new(1, &mut request_context).with_http_response(Some(&response));
        assert!(conditions.is_retryable(&mut ctx));
    }
}
