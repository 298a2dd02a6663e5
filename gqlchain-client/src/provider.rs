//! Per-operation assembly of interceptor chains.

use std::sync::Arc;

use gqlchain_core::Operation;
use http::Uri;

use crate::cache::NormalizedCache;
use crate::chain::InterceptorChain;
use crate::config::PipelineConfig;
use crate::interceptor::{
    AutomaticPersistedQueryInterceptor, CacheReadInterceptor, CacheWriteInterceptor,
    ErrorInterceptor, Interceptor, JsonParsingInterceptor, MaxRetryInterceptor,
    NetworkFetchInterceptor, ResponseCodeInterceptor,
};
use crate::transport::Transport;

/// Builds a fresh interceptor for each operation.
pub type InterceptorFactory = Arc<dyn Fn(&Operation) -> Box<dyn Interceptor> + Send + Sync>;

/// Produces the ordered interceptors for one operation.
///
/// Every call must return newly constructed interceptors: a chain owns its
/// interceptors and state kept inside one (a retry counter, a backoff) must
/// never leak into another execution. Long-lived dependencies such as the
/// transport and cache are shared by handle.
pub trait InterceptorProvider: Send + Sync {
    fn interceptors(&self, operation: &Operation) -> Vec<Box<dyn Interceptor>>;

    /// Error observer for chains built for `operation`.
    fn additional_error_interceptor(&self, _operation: &Operation) -> Option<Arc<dyn ErrorInterceptor>> {
        None
    }

    /// Build a chain ready for kickoff.
    fn chain_for(&self, operation: &Operation) -> InterceptorChain {
        InterceptorChain::new(
            self.interceptors(operation),
            self.additional_error_interceptor(operation),
        )
    }
}

/// The standard pipeline:
///
/// retry limiter → cache read → custom stages → network fetch → response
/// validation → response parsing → persisted-query retry → cache write.
pub struct DefaultInterceptorProvider {
    transport: Arc<dyn Transport>,
    cache: Arc<dyn NormalizedCache>,
    endpoint: Uri,
    config: Arc<PipelineConfig>,
    factories: Vec<InterceptorFactory>,
    error_interceptor: Option<Arc<dyn ErrorInterceptor>>,
}

impl std::fmt::Debug for DefaultInterceptorProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DefaultInterceptorProvider")
            .field("endpoint", &self.endpoint)
            .field("config", &self.config)
            .field("factories", &self.factories.len())
            .field("error_interceptor", &self.error_interceptor.is_some())
            .finish_non_exhaustive()
    }
}

impl DefaultInterceptorProvider {
    pub fn new(
        transport: Arc<dyn Transport>,
        cache: Arc<dyn NormalizedCache>,
        endpoint: Uri,
        config: Arc<PipelineConfig>,
    ) -> Self {
        Self {
            transport,
            cache,
            endpoint,
            config,
            factories: Vec::new(),
            error_interceptor: None,
        }
    }

    /// Insert a custom stage after cache read and before network fetch.
    ///
    /// Stages run in the order they are added.
    pub fn with_interceptor(mut self, factory: InterceptorFactory) -> Self {
        self.factories.push(factory);
        self
    }

    /// Observe every error emitted by chains from this provider.
    pub fn with_error_interceptor(mut self, interceptor: Arc<dyn ErrorInterceptor>) -> Self {
        self.error_interceptor = Some(interceptor);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }
}

impl InterceptorProvider for DefaultInterceptorProvider {
    fn interceptors(&self, operation: &Operation) -> Vec<Box<dyn Interceptor>> {
        let mut interceptors: Vec<Box<dyn Interceptor>> =
            Vec::with_capacity(7 + self.factories.len());
        interceptors.push(Box::new(MaxRetryInterceptor::with_policy(
            &self.config.retry_policy,
        )));
        interceptors.push(Box::new(CacheReadInterceptor::new(self.cache.clone())));
        interceptors.extend(self.factories.iter().map(|factory| factory(operation)));
        interceptors.push(Box::new(NetworkFetchInterceptor::new(
            self.transport.clone(),
            self.endpoint.clone(),
            self.config.clone(),
        )));
        interceptors.push(Box::new(ResponseCodeInterceptor::new()));
        interceptors.push(Box::new(JsonParsingInterceptor::new()));
        interceptors.push(Box::new(AutomaticPersistedQueryInterceptor::new(
            self.config.auto_persist_queries,
        )));
        interceptors.push(Box::new(CacheWriteInterceptor::new(self.cache.clone())));
        interceptors
    }

    fn additional_error_interceptor(&self, _operation: &Operation) -> Option<Arc<dyn ErrorInterceptor>> {
        self.error_interceptor.clone()
    }
}
