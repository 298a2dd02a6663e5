//! Interceptors for the GraphQL request pipeline.
//!
//! An interceptor is one pluggable stage of a chain. It receives the request
//! context, the response context (once a stage has produced one) and an
//! [`Activation`] continuation, and must eventually call exactly one of
//! [`Activation::proceed`], [`Activation::retry`], [`Activation::finish`] or
//! [`Activation::fail`], possibly after asynchronous work. Intermediate
//! emissions go through [`Activation::return_value`] and
//! [`Activation::handle_error`].
//!
//! The built-in stages, in the order the default provider assembles them:
//!
//! | Stage | Type |
//! |---|---|
//! | retry limiter | [`MaxRetryInterceptor`] |
//! | cache read | [`CacheReadInterceptor`] |
//! | network fetch | [`NetworkFetchInterceptor`] |
//! | response validation | [`ResponseCodeInterceptor`] |
//! | response parsing | [`JsonParsingInterceptor`] |
//! | persisted-query retry | [`AutomaticPersistedQueryInterceptor`] |
//! | cache write | [`CacheWriteInterceptor`] |
//!
//! # Example
//!
//! ```ignore
//! use gqlchain_client::{FnInterceptor, GraphqlClient};
//!
//! let auth = FnInterceptor::new("auth", |chain, mut request, response| {
//!     Box::pin(async move {
//!         let token = refresh_token().await;
//!         request.headers.insert("authorization", token.parse().unwrap());
//!         chain.proceed(request, response)
//!     })
//! });
//! ```

use std::future::Future;
use std::pin::Pin;

use crate::PipelineError;
use crate::chain::Activation;
use crate::context::{RequestContext, ResponseContext};

mod cache_read;
mod cache_write;
mod json_parsing;
mod max_retry;
mod network_fetch;
mod persisted_query;
mod response_code;

pub use cache_read::CacheReadInterceptor;
pub use cache_write::CacheWriteInterceptor;
pub use json_parsing::JsonParsingInterceptor;
pub use max_retry::MaxRetryInterceptor;
pub use network_fetch::NetworkFetchInterceptor;
pub use persisted_query::AutomaticPersistedQueryInterceptor;
pub use response_code::ResponseCodeInterceptor;

/// Type alias for a boxed, sendable future.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// One stage of an interceptor chain.
///
/// Instances are built fresh for every execution by an
/// [`InterceptorProvider`](crate::InterceptorProvider), so per-execution
/// state may live on `self`.
pub trait Interceptor: Send + Sync {
    /// Identifier used in logs.
    fn id(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Run this stage.
    fn intercept(
        &self,
        chain: Activation,
        request: RequestContext,
        response: Option<ResponseContext>,
    ) -> BoxFuture<'_, ()>;
}

/// A closure-based interceptor.
///
/// # Example
///
/// ```ignore
/// use gqlchain_client::FnInterceptor;
///
/// let logging = FnInterceptor::new("logging", |chain, request, response| {
///     Box::pin(async move {
///         println!("attempt {} of {}", request.attempt(), request.operation.name());
///         chain.proceed(request, response)
///     })
/// });
/// ```
pub struct FnInterceptor<F> {
    id: String,
    func: F,
}

impl<F> FnInterceptor<F>
where
    F: Fn(Activation, RequestContext, Option<ResponseContext>) -> BoxFuture<'static, ()>
        + Send
        + Sync
        + 'static,
{
    /// Create a new closure-based interceptor.
    pub fn new(id: impl Into<String>, func: F) -> Self {
        Self {
            id: id.into(),
            func,
        }
    }
}

impl<F> Interceptor for FnInterceptor<F>
where
    F: Fn(Activation, RequestContext, Option<ResponseContext>) -> BoxFuture<'static, ()>
        + Send
        + Sync
        + 'static,
{
    fn id(&self) -> &str {
        &self.id
    }

    fn intercept(
        &self,
        chain: Activation,
        request: RequestContext,
        response: Option<ResponseContext>,
    ) -> BoxFuture<'_, ()> {
        (self.func)(chain, request, response)
    }
}

impl<F> std::fmt::Debug for FnInterceptor<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnInterceptor")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

/// A process-wide hook observing every error emission.
///
/// It runs before the error reaches the caller and cannot alter it.
/// Closures with the matching signature implement this trait.
pub trait ErrorInterceptor: Send + Sync {
    fn intercept_error(
        &self,
        error: &PipelineError,
        request: &RequestContext,
        response: Option<&ResponseContext>,
    );
}

impl<F> ErrorInterceptor for F
where
    F: Fn(&PipelineError, &RequestContext, Option<&ResponseContext>) + Send + Sync,
{
    fn intercept_error(
        &self,
        error: &PipelineError,
        request: &RequestContext,
        response: Option<&ResponseContext>,
    ) {
        self(error, request, response)
    }
}
