//! Cache-read stage.

use std::sync::Arc;

use gqlchain_core::{CachePolicy, OperationKind};

use crate::PipelineError;
use crate::cache::NormalizedCache;
use crate::chain::Activation;
use crate::context::{RequestContext, ResponseContext};
use crate::interceptor::{BoxFuture, Interceptor};
use crate::result::GraphQLResult;

/// Serves queries from the cache according to their [`CachePolicy`].
///
/// | Policy | Hit | Miss |
/// |---|---|---|
/// | `ReturnCacheDataElseFetch` | final value | proceed |
/// | `ReturnCacheDataAndFetch` | intermediate value, then proceed | proceed |
/// | `ReturnCacheDataDontFetch` | final value | fail with `CacheMiss` |
/// | `FetchIgnoringCache*` | proceed | proceed |
///
/// Mutations and subscriptions always proceed. Read errors count as misses.
/// A retried `ReturnCacheDataAndFetch` attempt skips the cache, since the
/// intermediate value was already delivered on the first attempt.
pub struct CacheReadInterceptor {
    cache: Arc<dyn NormalizedCache>,
}

impl CacheReadInterceptor {
    pub fn new(cache: Arc<dyn NormalizedCache>) -> Self {
        Self { cache }
    }
}

impl Interceptor for CacheReadInterceptor {
    fn id(&self) -> &str {
        "cache-read"
    }

    fn intercept(
        &self,
        chain: Activation,
        request: RequestContext,
        response: Option<ResponseContext>,
    ) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            let policy = request.operation.cache_policy();
            if request.operation.kind() != OperationKind::Query || !policy.reads_cache() {
                chain.proceed(request, response);
                return;
            }
            if policy == CachePolicy::ReturnCacheDataAndFetch && request.retries() > 0 {
                tracing::trace!(retries = request.retries(), "cached value already delivered");
                chain.proceed(request, response);
                return;
            }

            let key = request.operation.cache_key();
            let cached = match self.cache.read(&key).await {
                Ok(record) => record,
                Err(err) => {
                    tracing::debug!(key = %key, error = %err, "cache read failed, treating as miss");
                    None
                }
            };
            if chain.is_cancelled() {
                return;
            }

            match (cached, policy) {
                (Some(data), CachePolicy::ReturnCacheDataAndFetch) => {
                    tracing::trace!(key = %key, "cache hit, fetching as well");
                    chain.return_value(GraphQLResult::from_cache(data));
                    chain.proceed(request, response);
                }
                (Some(data), _) => {
                    tracing::trace!(key = %key, "cache hit");
                    chain.finish(GraphQLResult::from_cache(data));
                }
                (None, CachePolicy::ReturnCacheDataDontFetch) => {
                    let error = PipelineError::CacheMiss(key.to_string());
                    chain.fail(&request, response.as_ref(), error);
                }
                (None, _) => chain.proceed(request, response),
            }
        })
    }
}
