//! Automatic persisted query retry stage.

use gqlchain_core::PersistedQuerySignal;

use crate::chain::Activation;
use crate::context::{RequestContext, ResponseContext};
use crate::interceptor::{BoxFuture, Interceptor};

/// Restarts the chain with the full document when the server doesn't know
/// a persisted query's hash.
///
/// Only the first miss triggers a retry. A second miss on the retried
/// attempt flows through as an ordinary result carrying the GraphQL errors.
#[derive(Debug)]
pub struct AutomaticPersistedQueryInterceptor {
    enabled: bool,
}

impl AutomaticPersistedQueryInterceptor {
    /// `enabled` mirrors the pipeline's `auto_persist_queries` setting.
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }
}

impl Interceptor for AutomaticPersistedQueryInterceptor {
    fn id(&self) -> &str {
        "persisted-query"
    }

    fn intercept(
        &self,
        chain: Activation,
        mut request: RequestContext,
        response: Option<ResponseContext>,
    ) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            if !self.enabled
                || request.is_persisted_query_retry()
                || request.operation.document().is_none()
            {
                chain.proceed(request, response);
                return;
            }

            let signal = response
                .as_ref()
                .and_then(ResponseContext::parsed)
                .and_then(|result| PersistedQuerySignal::detect(&result.errors));
            match signal {
                Some(signal) => {
                    tracing::debug!(
                        operation = request.operation.name(),
                        ?signal,
                        "persisted query miss, retrying with document"
                    );
                    request.mark_persisted_query_retry();
                    chain.retry(request);
                }
                None => chain.proceed(request, response),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::InterceptorChain;
    use crate::interceptor::FnInterceptor;
    use crate::result::GraphQLResult;
    use crate::test_support::{hero_query, http_response, value};
    use futures::StreamExt;
    use gqlchain_core::{GraphqlError, GraphqlResponse, Operation, OperationKind};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn not_found() -> GraphQLResult {
        GraphQLResult::from_server(GraphqlResponse {
            errors: vec![GraphqlError::new("PersistedQueryNotFound")],
            ..Default::default()
        })
    }

    /// Responds with a persisted-query miss until the request is marked as
    /// a retry, then with `value()`.
    fn server(attempts: Arc<AtomicU32>, always_miss: bool) -> Box<dyn Interceptor> {
        Box::new(FnInterceptor::new("server", move |chain, request, _response| {
            attempts.fetch_add(1, Ordering::SeqCst);
            let parsed = if always_miss || !request.is_persisted_query_retry() {
                not_found()
            } else {
                GraphQLResult::from_cache(value())
            };
            Box::pin(async move {
                let response = http_response(200, "{}").with_parsed(parsed);
                chain.proceed(request, Some(response))
            })
        }))
    }

    fn finish() -> Box<dyn Interceptor> {
        Box::new(FnInterceptor::new("finish", |chain, _request, response| {
            Box::pin(async move {
                let response: ResponseContext = response.unwrap();
                chain.finish(response.parsed().cloned().unwrap())
            })
        }))
    }

    async fn run(enabled: bool, op: Operation, always_miss: bool) -> (u32, Vec<crate::Delivery>) {
        let attempts = Arc::new(AtomicU32::new(0));
        let chain = InterceptorChain::new(
            vec![
                server(attempts.clone(), always_miss),
                Box::new(AutomaticPersistedQueryInterceptor::new(enabled)),
                finish(),
            ],
            None,
        );
        let deliveries = chain
            .kickoff(RequestContext::new(op))
            .unwrap()
            .collect()
            .await;
        (attempts.load(Ordering::SeqCst), deliveries)
    }

    #[tokio::test]
    async fn test_miss_retries_once_with_document() {
        let (attempts, deliveries) = run(true, hero_query(), false).await;
        assert_eq!(attempts, 2);
        assert_eq!(deliveries.len(), 1);
        assert_eq!(deliveries[0].result.as_ref().unwrap().data, Some(value()));
    }

    #[tokio::test]
    async fn test_second_miss_flows_through() {
        let (attempts, deliveries) = run(true, hero_query(), true).await;
        assert_eq!(attempts, 2);
        assert_eq!(deliveries.len(), 1);
        let result = deliveries[0].result.as_ref().unwrap();
        assert_eq!(result.errors[0].message, "PersistedQueryNotFound");
    }

    #[tokio::test]
    async fn test_disabled_passes_through() {
        let (attempts, deliveries) = run(false, hero_query(), false).await;
        assert_eq!(attempts, 1);
        assert_eq!(deliveries[0].result.as_ref().unwrap().errors.len(), 1);
    }

    #[tokio::test]
    async fn test_persisted_only_operation_cannot_retry() {
        let op = Operation::persisted(OperationKind::Query, "Hero", "abc123");
        let (attempts, deliveries) = run(true, op, false).await;
        assert_eq!(attempts, 1);
        assert_eq!(deliveries.len(), 1);
    }
}
