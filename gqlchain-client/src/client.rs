//! GraphQL client.
//!
//! [`GraphqlClient`] turns an [`Operation`] into a running interceptor chain
//! and hands back its delivery stream.

use std::sync::Arc;

use gqlchain_core::Operation;
use http::Uri;

use crate::PipelineError;
use crate::builder::ClientBuilder;
use crate::cache::NormalizedCache;
use crate::chain::ChainResponse;
use crate::config::{CallOptions, PipelineConfig};
use crate::context::RequestContext;
use crate::provider::InterceptorProvider;
use crate::result::GraphQLResult;

/// A GraphQL client running every operation through an interceptor chain.
///
/// Cloning is cheap: clones share the transport, cache and provider.
///
/// # Example
///
/// ```ignore
/// use futures::StreamExt;
/// use gqlchain_client::{CachePolicy, GraphqlClient, Operation};
///
/// let client = GraphqlClient::builder("https://api.example.com/graphql").build()?;
///
/// let hero = Operation::query("Hero", "query Hero { hero { name } }")
///     .with_cache_policy(CachePolicy::ReturnCacheDataAndFetch);
///
/// let mut deliveries = client.fetch(hero)?;
/// while let Some(delivery) = deliveries.next().await {
///     println!("{:?} (final: {})", delivery.result, delivery.is_final());
/// }
/// ```
#[derive(Clone)]
pub struct GraphqlClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    endpoint: Uri,
    config: Arc<PipelineConfig>,
    cache: Arc<dyn NormalizedCache>,
    provider: Arc<dyn InterceptorProvider>,
}

impl std::fmt::Debug for GraphqlClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphqlClient")
            .field("endpoint", &self.inner.endpoint)
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

impl GraphqlClient {
    /// Create a builder for a client talking to `endpoint`.
    pub fn builder<S: Into<String>>(endpoint: S) -> ClientBuilder {
        ClientBuilder::new(endpoint)
    }

    pub(crate) fn from_parts(
        endpoint: Uri,
        config: Arc<PipelineConfig>,
        cache: Arc<dyn NormalizedCache>,
        provider: Arc<dyn InterceptorProvider>,
    ) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                endpoint,
                config,
                cache,
                provider,
            }),
        }
    }

    pub fn endpoint(&self) -> &Uri {
        &self.inner.endpoint
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.inner.config
    }

    /// The cache shared by every chain of this client.
    pub fn cache(&self) -> &Arc<dyn NormalizedCache> {
        &self.inner.cache
    }

    /// Start `operation` and return its delivery stream.
    ///
    /// Must be called from within a Tokio runtime. Dropping the returned
    /// stream cancels the chain.
    pub fn fetch(&self, operation: Operation) -> Result<ChainResponse, PipelineError> {
        self.fetch_with_options(operation, CallOptions::default())
    }

    /// Start `operation` with per-call headers and cache policy.
    pub fn fetch_with_options(
        &self,
        operation: Operation,
        options: CallOptions,
    ) -> Result<ChainResponse, PipelineError> {
        let operation = match options.get_cache_policy() {
            Some(policy) => operation.with_cache_policy(policy),
            None => operation,
        };
        let chain = self.inner.provider.chain_for(&operation);
        let request = RequestContext::new(operation).with_headers(options.headers);
        chain.kickoff(request)
    }

    /// Run `operation` to completion and return its final result.
    ///
    /// Intermediate deliveries, such as a cached value followed by a
    /// refresh, are skipped.
    pub async fn fetch_final(&self, operation: Operation) -> Result<GraphQLResult, PipelineError> {
        self.fetch(operation)?.final_result().await
    }
}
