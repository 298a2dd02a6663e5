//! GraphQL client built on an interceptor chain.
//!
//! Every operation runs through a freshly assembled chain of interceptors.
//! Each interceptor does one job (read the cache, send the request, parse
//! the body) and then hands control on through its [`Activation`]. Results
//! reach the caller as a stream of [`Delivery`] values, each flagged as
//! final or intermediate.
//!
//! ## Features
//!
//! - Cache policies with cache-then-network delivery
//! - Automatic persisted queries with document fallback
//! - GET or POST encoding per operation kind
//! - Bounded retries with optional exponential backoff
//! - Custom interceptors and error observers
//! - Cancellation by dropping the delivery stream
//!
//! ## Example
//!
//! ```ignore
//! use gqlchain_client::{GraphqlClient, Operation};
//!
//! let client = GraphqlClient::builder("https://api.example.com/graphql")
//!     .auto_persist_queries(true)
//!     .build()?;
//!
//! let hero = Operation::query("Hero", "query Hero($episode: Episode) { hero(episode: $episode) { name } }")
//!     .variable("episode", "JEDI");
//!
//! let result = client.fetch_final(hero).await?;
//! println!("{:?}", result.data);
//! ```
//!
//! ## Cache-then-network
//!
//! ```ignore
//! use futures::StreamExt;
//! use gqlchain_client::{CachePolicy, CallOptions};
//!
//! let options = CallOptions::new().cache_policy(CachePolicy::ReturnCacheDataAndFetch);
//! let mut deliveries = client.fetch_with_options(hero, options)?;
//!
//! while let Some(delivery) = deliveries.next().await {
//!     match delivery.result {
//!         Ok(result) => render(result, delivery.chain_active),
//!         Err(e) => eprintln!("Error: {}", e),
//!     }
//! }
//! ```
//!
//! ## Custom Interceptors
//!
//! An interceptor receives the request, the response (once a stage has
//! produced one) and an [`Activation`]. It must end by calling exactly one
//! of `proceed`, `retry`, `finish` or `fail`:
//!
//! ```ignore
//! use gqlchain_client::{FnInterceptor, GraphqlClient, Interceptor};
//!
//! let client = GraphqlClient::builder("https://api.example.com/graphql")
//!     .interceptor(|_operation| {
//!         Box::new(FnInterceptor::new("auth", |chain, mut request, response| {
//!             Box::pin(async move {
//!                 request.headers.insert("authorization", "Bearer token".parse().unwrap());
//!                 chain.proceed(request, response)
//!             })
//!         })) as Box<dyn Interceptor>
//!     })
//!     .build()?;
//! ```
//!
//! ## Observability
//!
//! Each chain runs inside a `graphql.operation` span with:
//! - `graphql.operation.name`: the operation name
//! - `graphql.operation.kind`: "query", "mutation" or "subscription"
//! - `otel.kind`: "client"
//!
//! No subscriber is installed by this crate.
//!
//! ## Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `tls` (default) | `tls-ring` + `tls-native-roots` |
//! | `tls-ring` / `tls-aws-lc` | rustls crypto provider |
//! | `tls-native-roots` / `tls-webpki-roots` | root certificates |

mod builder;
mod cache;
mod chain;
mod client;
pub mod config;
mod context;
mod error;
pub mod interceptor;
mod provider;
mod result;
pub mod transport;

#[cfg(test)]
mod test_support;

pub use builder::ClientBuilder;
pub use cache::{InMemoryCache, NormalizedCache, Record};
pub use chain::{Activation, ChainResponse, ChainState, InterceptorChain};
pub use client::GraphqlClient;
pub use context::{RequestContext, ResponseContext};
pub use error::{CacheError, ClientBuildError, PipelineError};
pub use provider::{DefaultInterceptorProvider, InterceptorFactory, InterceptorProvider};
pub use result::{Delivery, GraphQLResult, ResultSource};

// Re-export from config module
pub use config::{CallOptions, ExponentialBackoff, PipelineConfig, RetryPolicy};

// Re-export from interceptor module
pub use interceptor::{
    AutomaticPersistedQueryInterceptor, BoxFuture, CacheReadInterceptor, CacheWriteInterceptor,
    ErrorInterceptor, FnInterceptor, Interceptor, JsonParsingInterceptor, MaxRetryInterceptor,
    NetworkFetchInterceptor, ResponseCodeInterceptor,
};

// Re-export transport types at the top level for convenience
pub use transport::{HyperTransport, HyperTransportBuilder, TlsClientConfig, Transport};

// Re-export core types that users need
pub use gqlchain_core::{
    CacheKey, CachePolicy, GraphqlError, GraphqlErrorLocation, GraphqlPathSegment,
    GraphqlResponse, Operation, OperationKind, Variables,
};
