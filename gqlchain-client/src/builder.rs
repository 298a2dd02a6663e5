//! Client builder.
//!
//! Provides a fluent API for configuring and building a [`GraphqlClient`].

use std::sync::Arc;
use std::time::Duration;

use gqlchain_core::Operation;
use http::{HeaderMap, HeaderName, HeaderValue, Uri};

use crate::cache::{InMemoryCache, NormalizedCache};
use crate::client::GraphqlClient;
use crate::config::{PipelineConfig, RetryPolicy};
use crate::error::ClientBuildError;
use crate::interceptor::{ErrorInterceptor, Interceptor};
use crate::provider::{DefaultInterceptorProvider, InterceptorFactory, InterceptorProvider};
use crate::transport::{HyperTransport, Transport};

/// Builder for creating a [`GraphqlClient`].
///
/// # Example
///
/// ```ignore
/// use gqlchain_client::GraphqlClient;
/// use std::time::Duration;
///
/// let client = GraphqlClient::builder("https://api.example.com/graphql")
///     .auto_persist_queries(true)
///     .use_get_for_persisted_query_retry(true)
///     .timeout(Duration::from_secs(30))
///     .header("authorization", "Bearer token")
///     .build()?;
/// ```
pub struct ClientBuilder {
    endpoint: String,
    transport: Option<Arc<dyn Transport>>,
    cache: Option<Arc<dyn NormalizedCache>>,
    config: PipelineConfig,
    factories: Vec<InterceptorFactory>,
    error_interceptor: Option<Arc<dyn ErrorInterceptor>>,
    provider: Option<Arc<dyn InterceptorProvider>>,
    header_error: Option<String>,
}

impl std::fmt::Debug for ClientBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientBuilder")
            .field("endpoint", &self.endpoint)
            .field("transport", &self.transport.is_some())
            .field("cache", &self.cache.is_some())
            .field("config", &self.config)
            .field("interceptor_count", &self.factories.len())
            .field("error_interceptor", &self.error_interceptor.is_some())
            .field("provider", &self.provider.is_some())
            .finish()
    }
}

impl ClientBuilder {
    /// Create a new builder for the given endpoint URL.
    pub fn new<S: Into<String>>(endpoint: S) -> Self {
        Self {
            endpoint: endpoint.into(),
            transport: None,
            cache: None,
            config: PipelineConfig::default(),
            factories: Vec::new(),
            error_interceptor: None,
            provider: None,
            header_error: None,
        }
    }

    /// Use a custom transport.
    ///
    /// Defaults to a [`HyperTransport`] with default settings.
    pub fn transport<T: Transport + 'static>(mut self, transport: T) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    /// Use a shared transport.
    pub fn transport_arc(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Use a custom cache.
    ///
    /// Defaults to an [`InMemoryCache`].
    pub fn cache(mut self, cache: Arc<dyn NormalizedCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Replace the whole pipeline configuration.
    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// Send only document hashes until the server asks for the document.
    pub fn auto_persist_queries(mut self, enabled: bool) -> Self {
        self.config.auto_persist_queries = enabled;
        self
    }

    /// Send queries with GET.
    pub fn use_get_for_queries(mut self, enabled: bool) -> Self {
        self.config.use_get_for_queries = enabled;
        self
    }

    /// Send persisted-query attempts with GET.
    pub fn use_get_for_persisted_query_retry(mut self, enabled: bool) -> Self {
        self.config.use_get_for_persisted_query_retry = enabled;
        self
    }

    /// Set the retry policy.
    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.config.retry_policy = policy;
        self
    }

    /// Set the retry limit, keeping the rest of the retry policy.
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.config.retry_policy.max_retries = max_retries;
        self
    }

    /// Add a header sent with every request.
    ///
    /// An invalid name or value is reported by [`build`](Self::build).
    pub fn header<K, V>(mut self, name: K, value: V) -> Self
    where
        K: TryInto<HeaderName>,
        K::Error: std::fmt::Display,
        V: TryInto<HeaderValue>,
        V::Error: std::fmt::Display,
    {
        match (name.try_into(), value.try_into()) {
            (Ok(name), Ok(value)) => {
                self.config.additional_headers.insert(name, value);
            }
            (Err(e), _) => {
                self.header_error.get_or_insert_with(|| format!("name: {}", e));
            }
            (_, Err(e)) => {
                self.header_error.get_or_insert_with(|| format!("value: {}", e));
            }
        }
        self
    }

    /// Add headers sent with every request.
    pub fn headers(mut self, headers: HeaderMap) -> Self {
        self.config.additional_headers.extend(headers);
        self
    }

    /// Sent as `apollographql-client-name`.
    pub fn client_name<S: Into<String>>(mut self, name: S) -> Self {
        self.config.client_name = Some(name.into());
        self
    }

    /// Sent as `apollographql-client-version`.
    pub fn client_version<S: Into<String>>(mut self, version: S) -> Self {
        self.config.client_version = Some(version.into());
        self
    }

    /// Set a per-request timeout for the network-fetch stage.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = Some(timeout);
        self
    }

    /// Add a custom stage, built fresh for every operation.
    ///
    /// Custom stages run after cache read and before network fetch, in the
    /// order they are added.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let client = GraphqlClient::builder("http://localhost:4000/graphql")
    ///     .interceptor(|_operation| Box::new(AuthInterceptor::new(tokens.clone())))
    ///     .build()?;
    /// ```
    pub fn interceptor<F>(mut self, factory: F) -> Self
    where
        F: Fn(&Operation) -> Box<dyn Interceptor> + Send + Sync + 'static,
    {
        self.factories.push(Arc::new(factory));
        self
    }

    /// Observe every error emitted by the client's chains.
    pub fn error_interceptor<E: ErrorInterceptor + 'static>(mut self, interceptor: E) -> Self {
        self.error_interceptor = Some(Arc::new(interceptor));
        self
    }

    /// Replace the default pipeline with a custom provider.
    ///
    /// The provider builds every chain itself; custom stages, the error
    /// interceptor and pipeline options set on this builder are not applied
    /// to it.
    pub fn provider<P: InterceptorProvider + 'static>(mut self, provider: P) -> Self {
        self.provider = Some(Arc::new(provider));
        self
    }

    /// Build the client.
    pub fn build(self) -> Result<GraphqlClient, ClientBuildError> {
        let endpoint = parse_endpoint(&self.endpoint)?;
        if let Some(reason) = self.header_error {
            return Err(ClientBuildError::InvalidHeader(reason));
        }
        self.config
            .retry_policy
            .validate()
            .map_err(ClientBuildError::InvalidRetryPolicy)?;

        let cache: Arc<dyn NormalizedCache> = match self.cache {
            Some(cache) => cache,
            None => Arc::new(InMemoryCache::new()),
        };
        let config = Arc::new(self.config);

        let provider: Arc<dyn InterceptorProvider> = match self.provider {
            Some(provider) => provider,
            None => {
                let transport: Arc<dyn Transport> = match self.transport {
                    Some(transport) => transport,
                    None => Arc::new(HyperTransport::new().map_err(ClientBuildError::Transport)?),
                };
                let mut provider = DefaultInterceptorProvider::new(
                    transport,
                    cache.clone(),
                    endpoint.clone(),
                    config.clone(),
                );
                for factory in self.factories {
                    provider = provider.with_interceptor(factory);
                }
                if let Some(interceptor) = self.error_interceptor {
                    provider = provider.with_error_interceptor(interceptor);
                }
                Arc::new(provider)
            }
        };

        Ok(GraphqlClient::from_parts(endpoint, config, cache, provider))
    }
}

fn parse_endpoint(endpoint: &str) -> Result<Uri, ClientBuildError> {
    let invalid = |reason: String| ClientBuildError::InvalidEndpoint {
        endpoint: endpoint.to_owned(),
        reason,
    };
    let uri: Uri = endpoint.parse().map_err(|e: http::uri::InvalidUri| invalid(e.to_string()))?;
    match uri.scheme_str() {
        Some("http") | Some("https") => {}
        Some(other) => return Err(invalid(format!("unsupported scheme `{}`", other))),
        None => return Err(invalid("missing scheme".into())),
    }
    if uri.authority().is_none() {
        return Err(invalid("missing host".into()));
    }
    Ok(uri)
}
