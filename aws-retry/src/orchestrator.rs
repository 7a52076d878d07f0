/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

//! Drives one logical call through as many attempts as the retry strategy allows.

use crate::context::{HttpResponse, OperationModel, ParsedResponse, RequestContext, RetriesContext};
use crate::error::{ConnectorError, RetryError};
use crate::handler::AttemptOutcome;
use crate::strategy::RetryStrategy;
use aws_types::sleep::{AsyncSleep, SharedAsyncSleep};
use std::future::Future;
use tracing::{debug, debug_span, Instrument};

/// A response received for an attempt.
#[derive(Clone, Debug)]
pub struct OperationResponse {
    http_response: HttpResponse,
    parsed_response: ParsedResponse,
}

impl OperationResponse {
    /// Pairs a raw response with its parsed form.
    pub fn new(http_response: HttpResponse, parsed_response: ParsedResponse) -> Self {
        Self {
            http_response,
            parsed_response,
        }
    }

    /// The raw response.
    pub fn http_response(&self) -> &HttpResponse {
        &self.http_response
    }

    /// The parsed response, including its metadata envelope.
    pub fn parsed_response(&self) -> &ParsedResponse {
        &self.parsed_response
    }

    /// Splits this response into its raw and parsed parts.
    pub fn into_parts(self) -> (HttpResponse, ParsedResponse) {
        (self.http_response, self.parsed_response)
    }
}

/// Runs `dispatch` until it succeeds or the retry strategy gives up.
///
/// `dispatch` is called with the 1-based attempt number and sends the request once. When the
/// final attempt received a response, that response is returned even if it is an error,
/// with `retry_attempts` and the give-up flags recorded in its metadata. When it never
/// received one, the connector error is returned inside a [`RetryError`].
///
/// Dropping the returned future cancels the call, including any backoff in progress.
pub async fn invoke<F, Fut>(
    strategy: &RetryStrategy,
    sleep_impl: &SharedAsyncSleep,
    operation: &OperationModel,
    mut dispatch: F,
) -> Result<OperationResponse, RetryError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<OperationResponse, ConnectorError>>,
{
    let mut request_context = RequestContext::new();
    request_context.retries = Some(RetriesContext { attempt: 1, max: 0 });
    let mut attempt = 1;
    loop {
        if let Some(rate_limiter) = strategy.rate_limiter() {
            let send_delay = rate_limiter.send_delay();
            if !send_delay.is_zero() {
                debug!(attempt, ?send_delay, "client rate limiter delayed the request");
                sleep_impl.sleep(send_delay).await;
            }
        }
        if let Some(retries) = request_context.retries.as_mut() {
            retries.attempt = attempt;
        }

        let result = dispatch(attempt)
            .instrument(debug_span!("attempt", attempt))
            .await;
        match result {
            Ok(mut response) => {
                let retry_delay = {
                    let mut outcome = AttemptOutcome::new(attempt, operation, &mut request_context)
                        .with_response(&response.http_response, &mut response.parsed_response);
                    if let Some(rate_limiter) = strategy.rate_limiter() {
                        rate_limiter.on_receiving_response(&mut outcome);
                    }
                    strategy.handler().needs_retry(&mut outcome)
                };
                match retry_delay {
                    Some(delay) => sleep_impl.sleep(delay).await,
                    None => {
                        strategy
                            .handler()
                            .retry_quota()
                            .release_retry_quota(&request_context, Some(&response.http_response));
                        response.parsed_response.metadata_mut().retry_attempts = attempt - 1;
                        return Ok(response);
                    }
                }
            }
            Err(err) => {
                let retry_delay = {
                    let mut outcome = AttemptOutcome::new(attempt, operation, &mut request_context)
                        .with_caught_exception(&err);
                    if let Some(rate_limiter) = strategy.rate_limiter() {
                        rate_limiter.on_receiving_response(&mut outcome);
                    }
                    strategy.handler().needs_retry(&mut outcome)
                };
                match retry_delay {
                    Some(delay) => sleep_impl.sleep(delay).await,
                    None => {
                        strategy
                            .handler()
                            .retry_quota()
                            .release_retry_quota(&request_context, None);
                        return Err(RetryError::new(err, attempt));
                    }
                }
            }
        }
        attempt += 1;
    }
}
