//! Retry-limiting stage.

use std::sync::Mutex;

use crate::PipelineError;
use crate::chain::Activation;
use crate::config::{ExponentialBackoff, RetryPolicy};
use crate::context::{RequestContext, ResponseContext};
use crate::interceptor::{BoxFuture, Interceptor};

/// Bounds how often a chain may restart.
///
/// Placed first in the chain, it sees every attempt. Once the request has
/// been retried more than `max_retries` times, it fails the chain with
/// [`PipelineError::MaxRetriesExceeded`] instead of proceeding. With a
/// backoff-enabled policy, retried attempts wait for the next backoff delay
/// before proceeding.
pub struct MaxRetryInterceptor {
    max_retries: u32,
    backoff: Option<Mutex<ExponentialBackoff>>,
}

impl MaxRetryInterceptor {
    /// Allow `max_retries` retries with no delay.
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            backoff: None,
        }
    }

    /// Allow retries according to `policy`, sleeping between attempts when
    /// the policy has a non-zero base delay.
    pub fn with_policy(policy: &RetryPolicy) -> Self {
        Self {
            max_retries: policy.max_retries,
            backoff: policy.has_backoff().then(|| Mutex::new(policy.backoff())),
        }
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    fn next_delay(&self) -> Option<std::time::Duration> {
        let backoff = self.backoff.as_ref()?;
        let mut backoff = backoff
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        Some(backoff.next_delay())
    }
}

impl Interceptor for MaxRetryInterceptor {
    fn id(&self) -> &str {
        "max-retry"
    }

    fn intercept(
        &self,
        chain: Activation,
        request: RequestContext,
        response: Option<ResponseContext>,
    ) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            let retries = request.retries();
            if retries > self.max_retries {
                tracing::debug!(
                    operation = request.operation.name(),
                    retries,
                    max_retries = self.max_retries,
                    "retry limit exceeded"
                );
                let error = PipelineError::MaxRetriesExceeded {
                    operation: request.operation.name().to_owned(),
                    max_retries: self.max_retries,
                };
                chain.fail(&request, response.as_ref(), error);
                return;
            }

            if retries > 0 {
                if let Some(delay) = self.next_delay().filter(|d| !d.is_zero()) {
                    tracing::debug!(
                        attempt = request.attempt(),
                        delay_ms = delay.as_millis() as u64,
                        "backing off before retried attempt"
                    );
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = chain.cancelled() => return,
                    }
                }
            }

            chain.proceed(request, response)
        })
    }
}
