//! Cache-write stage.

use std::sync::Arc;

use gqlchain_core::OperationKind;

use crate::cache::NormalizedCache;
use crate::chain::Activation;
use crate::context::{RequestContext, ResponseContext};
use crate::interceptor::{BoxFuture, Interceptor};

/// Stores parsed query results in the cache.
///
/// Writes happen for every cache policy except
/// `FetchIgnoringCacheCompletely`, whenever the parsed result carries
/// non-null `data`. A failed write is logged and never fails the chain.
pub struct CacheWriteInterceptor {
    cache: Arc<dyn NormalizedCache>,
}

impl CacheWriteInterceptor {
    pub fn new(cache: Arc<dyn NormalizedCache>) -> Self {
        Self { cache }
    }
}

impl Interceptor for CacheWriteInterceptor {
    fn id(&self) -> &str {
        "cache-write"
    }

    fn intercept(
        &self,
        chain: Activation,
        request: RequestContext,
        response: Option<ResponseContext>,
    ) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            let operation = &request.operation;
            let writable =
                operation.kind() == OperationKind::Query && operation.cache_policy().writes_cache();
            let data = response
                .as_ref()
                .and_then(ResponseContext::parsed)
                .filter(|result| writable && result.has_data())
                .and_then(|result| result.data.clone());

            if let Some(data) = data {
                let key = operation.cache_key();
                if let Err(err) = self.cache.write(key.clone(), data).await {
                    tracing::warn!(key = %key, error = %err, "cache write failed");
                }
            }

            chain.proceed(request, response)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::InterceptorChain;
    use crate::result::GraphQLResult;
    use crate::test_support::{RecordingCache, hero_query, result_stage, value};
    use gqlchain_core::{CachePolicy, GraphqlError, GraphqlResponse, Operation};
    use serde_json::Value;

    /// Attaches `parsed`, writes, then finishes with whatever is attached.
    async fn run(cache: Arc<RecordingCache>, op: Operation, parsed: GraphQLResult) {
        let chain = InterceptorChain::new(
            vec![
                crate::test_support::parsed_stage(parsed),
                Box::new(CacheWriteInterceptor::new(cache)),
                result_stage(value()),
            ],
            None,
        );
        let response = chain.kickoff(RequestContext::new(op)).unwrap();
        assert!(response.final_result().await.is_ok());
    }

    fn server(data: Value) -> GraphQLResult {
        GraphQLResult::from_server(GraphqlResponse {
            data: Some(data),
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn test_writes_data() {
        let cache = RecordingCache::new();
        run(cache.clone(), hero_query(), server(value())).await;

        assert_eq!(cache.writes(), vec![(hero_query().cache_key(), value())]);
    }

    #[tokio::test]
    async fn test_writes_partial_data_with_errors() {
        let cache = RecordingCache::new();
        let mut parsed = server(value());
        parsed.errors.push(GraphqlError::new("partial"));
        run(cache.clone(), hero_query(), parsed).await;

        assert_eq!(cache.writes().len(), 1);
    }

    #[tokio::test]
    async fn test_skips_null_data() {
        let cache = RecordingCache::new();
        run(cache.clone(), hero_query(), server(Value::Null)).await;
        assert!(cache.writes().is_empty());
    }

    #[tokio::test]
    async fn test_skips_fetch_ignoring_cache_completely() {
        let cache = RecordingCache::new();
        let op = hero_query().with_cache_policy(CachePolicy::FetchIgnoringCacheCompletely);
        run(cache.clone(), op, server(value())).await;
        assert!(cache.writes().is_empty());
    }

    #[tokio::test]
    async fn test_write_failure_still_proceeds() {
        let cache = RecordingCache::failing();
        run(cache.clone(), hero_query(), server(value())).await;
        assert!(cache.writes().is_empty());
    }
}
