/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

//! The per-attempt retry decision.

use crate::context::{
    HttpResponse, OperationModel, ParsedResponse, RequestContext, RetryContext, RetryMetadata,
};
use crate::error::ConnectorError;
use crate::policy::RetryPolicy;
use crate::quota::RetryQuotaChecker;
use std::time::Duration;
use tracing::debug;

/// What happened on one attempt of a call, as reported by the layer that sent it.
#[derive(Debug)]
pub struct AttemptOutcome<'a> {
    http_response: Option<&'a HttpResponse>,
    parsed_response: Option<&'a mut ParsedResponse>,
    caught_exception: Option<&'a ConnectorError>,
    attempts: u32,
    operation: &'a OperationModel,
    request_context: &'a mut RequestContext,
}

impl<'a> AttemptOutcome<'a> {
    /// Creates the outcome of attempt number `attempts` (1-based) of `operation`.
    pub fn new(
        attempts: u32,
        operation: &'a OperationModel,
        request_context: &'a mut RequestContext,
    ) -> Self {
        Self {
            http_response: None,
            parsed_response: None,
            caught_exception: None,
            attempts,
            operation,
            request_context,
        }
    }

    /// Sets the received response.
    pub fn with_response(
        mut self,
        http_response: &'a HttpResponse,
        parsed_response: &'a mut ParsedResponse,
    ) -> Self {
        self.http_response = Some(http_response);
        self.parsed_response = Some(parsed_response);
        self
    }

    /// Sets the error raised while sending the request.
    pub fn with_caught_exception(mut self, caught_exception: &'a ConnectorError) -> Self {
        self.caught_exception = Some(caught_exception);
        self
    }

    /// The 1-based attempt number.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// The HTTP response, if one was received.
    pub fn http_response(&self) -> Option<&HttpResponse> {
        self.http_response
    }

    /// The state shared across attempts of this call.
    pub fn request_context(&self) -> &RequestContext {
        &*self.request_context
    }
}

/// Converts attempt outcomes into [`RetryContext`]s and merges retry diagnostics back into
/// the parsed response.
#[derive(Clone, Copy, Debug, Default)]
pub struct RetryEventAdapter;

impl RetryEventAdapter {
    /// Builds the retry context for `outcome`.
    pub fn create_retry_context<'b>(&self, outcome: &'b mut AttemptOutcome<'_>) -> RetryContext<'b> {
        RetryContext::new(outcome.attempts, &mut *outcome.request_context)
            .with_operation_model(Some(outcome.operation))
            .with_http_response(outcome.http_response)
            .with_parsed_response(outcome.parsed_response.as_deref())
            .with_caught_exception(outcome.caught_exception)
    }

    /// Records `metadata` in the response metadata of `parsed_response`, if there is one.
    ///
    /// Flags are only ever set here, never cleared.
    pub fn adapt_retry_response_from_context(
        &self,
        metadata: RetryMetadata,
        parsed_response: Option<&mut ParsedResponse>,
    ) {
        if let Some(parsed_response) = parsed_response {
            let response_metadata = parsed_response.metadata_mut();
            response_metadata.max_attempts_reached |= metadata.max_attempts_reached;
            response_metadata.retry_quota_reached |= metadata.retry_quota_reached;
        }
    }
}

/// Decides, after each attempt, whether to retry and how long to wait first.
#[derive(Clone, Debug)]
pub struct RetryHandler {
    retry_policy: RetryPolicy,
    retry_event_adapter: RetryEventAdapter,
    retry_quota: RetryQuotaChecker,
}

impl RetryHandler {
    /// Creates a handler.
    pub fn new(
        retry_policy: RetryPolicy,
        retry_event_adapter: RetryEventAdapter,
        retry_quota: RetryQuotaChecker,
    ) -> Self {
        Self {
            retry_policy,
            retry_event_adapter,
            retry_quota,
        }
    }

    /// The quota checker charged by this handler.
    pub fn retry_quota(&self) -> &RetryQuotaChecker {
        &self.retry_quota
    }

    /// Returns the delay to wait before retrying, or `None` if the call should not be retried.
    ///
    /// Retries are only scheduled when the policy allows them and the retry quota can pay
    /// for them. Either way, diagnostics are merged into the parsed response.
    pub fn needs_retry(&self, outcome: &mut AttemptOutcome<'_>) -> Option<Duration> {
        let attempt = outcome.attempts;
        let mut ctx = self.retry_event_adapter.create_retry_context(outcome);
        let retry_delay = if self.retry_policy.should_retry(&mut ctx) {
            if self.retry_quota.acquire_retry_quota(&mut ctx) {
                let delay = self.retry_policy.compute_retry_delay(&ctx);
                debug!(attempt, ?delay, "retry needed, retrying request after delay");
                Some(delay)
            } else {
                debug!(attempt, "retry needed but retry quota reached, not retrying request");
                None
            }
        } else {
            debug!(attempt, "not retrying request");
            None
        };
        let metadata = ctx.retry_metadata();
        self.retry_event_adapter
            .adapt_retry_response_from_context(metadata, outcome.parsed_response.as_deref_mut());
        retry_delay
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backoff::{ExponentialBackoff, RandomSource};
    use crate::classifiers::StandardRetryConditions;
    use crate::context::ErrorMetadata;
    use crate::quota::RetryQuota;
    use std::sync::Arc;
    use tracing_test::traced_test;

    fn handler(quota: u32) -> RetryHandler {
        let policy = RetryPolicy::new(
            StandardRetryConditions::new(3),
            ExponentialBackoff::new().with_random_source(RandomSource::constant(1.0)),
        );
        RetryHandler::new(
            policy,
            RetryEventAdapter,
            RetryQuotaChecker::new(Arc::new(RetryQuota::new(quota))),
        )
    }

    #[test]
    fn retryable_error_schedules_a_retry() {
        let handler = handler(500);
        let operation = OperationModel::new("s3", "GetObject");
        let http = HttpResponse::new(503);
        let mut parsed = ParsedResponse::error(ErrorMetadata::new("ServiceUnavailable"));
        let mut request_context = RequestContext::new();
        let mut outcome =
            AttemptOutcome::new(2, &operation, &mut request_context).with_response(&http, &mut parsed);
        assert_eq!(handler.needs_retry(&mut outcome), Some(Duration::from_secs(2)));
        assert_eq!(handler.retry_quota().quota().available_capacity(), 495);
        assert_eq!(request_context.retry_quota_capacity, Some(5));
        assert!(!parsed.metadata().max_attempts_reached);
    }

    #[test]
    fn non_retryable_error_is_terminal() {
        let handler = handler(500);
        let operation = OperationModel::new("s3", "GetObject");
        let http = HttpResponse::new(403);
        let mut parsed = ParsedResponse::error(ErrorMetadata::new("AccessDenied"));
        let mut request_context = RequestContext::new();
        let mut outcome =
            AttemptOutcome::new(1, &operation, &mut request_context).with_response(&http, &mut parsed);
        assert_eq!(handler.needs_retry(&mut outcome), None);
        assert_eq!(handler.retry_quota().quota().available_capacity(), 500);
    }

    #[test]
    fn max_attempts_flag_is_merged_into_the_response() {
        let handler = handler(500);
        let operation = OperationModel::new("s3", "GetObject");
        let http = HttpResponse::new(500);
        let mut parsed = ParsedResponse::error(ErrorMetadata::new("InternalError"));
        let mut request_context = RequestContext::new();
        let mut outcome =
            AttemptOutcome::new(3, &operation, &mut request_context).with_response(&http, &mut parsed);
        assert_eq!(handler.needs_retry(&mut outcome), None);
        assert!(parsed.metadata().max_attempts_reached);
        assert!(!parsed.metadata().retry_quota_reached);
    }

    #[test]
    fn exhausted_quota_wins_over_retryability() {
        let handler = handler(3);
        let operation = OperationModel::new("s3", "GetObject");
        let http = HttpResponse::new(500);
        let mut parsed = ParsedResponse::error(ErrorMetadata::new("InternalError"));
        let mut request_context = RequestContext::new();
        let mut outcome =
            AttemptOutcome::new(1, &operation, &mut request_context).with_response(&http, &mut parsed);
        assert_eq!(handler.needs_retry(&mut outcome), None);
        assert!(parsed.metadata().retry_quota_reached);
        assert_eq!(handler.retry_quota().quota().available_capacity(), 3);
    }

    #[test]
    fn connection_errors_have_no_response_to_annotate() {
        let handler = handler(500);
        let operation = OperationModel::new("s3", "GetObject");
        let err = ConnectorError::read_timeout("timed out");
        let mut request_context = RequestContext::new();
        let mut outcome =
            AttemptOutcome::new(1, &operation, &mut request_context).with_caught_exception(&err);
        assert_eq!(handler.needs_retry(&mut outcome), Some(Duration::from_secs(1)));
        assert_eq!(handler.retry_quota().quota().available_capacity(), 490);
    }

    #[test]
    #[traced_test]
    fn decisions_are_logged() {
        let handler = handler(0);
        let operation = OperationModel::new("s3", "GetObject");
        let http = HttpResponse::new(503);
        let mut parsed = ParsedResponse::error(ErrorMetadata::new("ServiceUnavailable"));
        let mut request_context = RequestContext::new();
        let mut outcome =
            AttemptOutcome::new(1, &operation, &mut request_context).with_response(&http, &mut parsed);
        handler.needs_retry(&mut outcome);
        assert!(logs_contain("retry quota exhausted"));
        assert!(logs_contain("retry needed but retry quota reached"));
    }
}
